//! Audio-reactive brightness effect.
//!
//! The engine does not analyze audio; the host supplies an already-smoothed
//! level in `[0, 1]` (at least once per frame while enabled) through the
//! handle. The callback forwards level and reactivity to the shader, where
//! brightness is scaled between the silence floor and the loudness ceiling
//! (see [`crate::convert`]).

use std::cell::RefCell;
use std::rc::Rc;

use crate::effects::{EffectCallback, EffectContext};
use crate::program::{U_AUDIO_LEVEL, U_AUDIO_REACTIVITY};

pub const AUDIO_EFFECT_ID: &str = "audio-reactive";

#[derive(Debug)]
struct AudioScratch {
    level: f32,
    reactivity: f32,
}

#[derive(Clone)]
pub struct AudioHandle {
    scratch: Rc<RefCell<AudioScratch>>,
}

impl AudioHandle {
    /// Latest smoothed volume, clamped into `[0, 1]`.
    pub fn set_level(&self, level: f32) {
        self.scratch.borrow_mut().level = level.clamp(0.0, 1.0);
    }

    /// How strongly audio modulates brightness: 0 = off, 1 = fully driven.
    pub fn set_reactivity(&self, reactivity: f32) {
        self.scratch.borrow_mut().reactivity = reactivity.clamp(0.0, 1.0);
    }
}

pub struct AudioReactive {
    scratch: Rc<RefCell<AudioScratch>>,
}

impl AudioReactive {
    pub fn new(reactivity: f32) -> Self {
        Self {
            scratch: Rc::new(RefCell::new(AudioScratch {
                level: 0.0,
                reactivity: reactivity.clamp(0.0, 1.0),
            })),
        }
    }

    pub fn handle(&self) -> AudioHandle {
        AudioHandle {
            scratch: self.scratch.clone(),
        }
    }

    pub fn callback(&self) -> EffectCallback {
        let scratch = self.scratch.clone();
        Box::new(move |ctx: &mut EffectContext<'_>| {
            let scratch = scratch.borrow();
            ctx.uniforms
                .set_f32(ctx.table.get(U_AUDIO_LEVEL), scratch.level);
            ctx.uniforms
                .set_f32(ctx.table.get(U_AUDIO_REACTIVITY), scratch.reactivity);
        })
    }
}
