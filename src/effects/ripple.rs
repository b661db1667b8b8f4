//! Click ripple effect.
//!
//! Each click spawns an expanding ring that fades over a fixed lifetime.
//! Live ripples occupy a bounded ring buffer sized to the shader's uniform
//! array capacity: spawning past capacity evicts the oldest ripple instead
//! of erroring. The fade duration is an aesthetic constant, not a
//! structural one, so it is configurable per instance.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::effects::{EffectCallback, EffectContext};
use crate::program::{RIPPLE_CAPACITY, U_RIPPLES, U_RIPPLE_COUNT};

/// Default ripple fade time. Chosen by eye.
pub const DEFAULT_RIPPLE_LIFETIME: Duration = Duration::from_millis(1200);

pub const RIPPLE_EFFECT_ID: &str = "click-ripple";

#[derive(Debug, Clone, Copy)]
struct Ripple {
    cell: [f32; 2],
    spawned: Instant,
    strength: f32,
}

/// Bounded ripple ring. Oldest-first; eviction happens on spawn, expiry on
/// both spawn and read.
#[derive(Debug)]
pub struct RippleRing {
    ripples: VecDeque<Ripple>,
    lifetime: Duration,
}

impl RippleRing {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            ripples: VecDeque::with_capacity(RIPPLE_CAPACITY as usize),
            lifetime,
        }
    }

    pub fn spawn(&mut self, cell_x: f32, cell_y: f32, strength: f32, at: Instant) {
        self.cull(at);
        while self.ripples.len() >= RIPPLE_CAPACITY as usize {
            self.ripples.pop_front();
        }
        self.ripples.push_back(Ripple {
            cell: [cell_x, cell_y],
            spawned: at,
            strength: strength.clamp(0.0, 1.0),
        });
    }

    fn cull(&mut self, now: Instant) {
        self.ripples
            .retain(|ripple| now.duration_since(ripple.spawned) < self.lifetime);
    }

    pub fn live_count(&self, now: Instant) -> usize {
        self.ripples
            .iter()
            .filter(|ripple| now.duration_since(ripple.spawned) < self.lifetime)
            .count()
    }

    /// Live ripples as shader array elements: `[cell_x, cell_y, age_seconds,
    /// strength]`, oldest first.
    fn elements(&mut self, now: Instant) -> Vec<[f32; 4]> {
        self.cull(now);
        self.ripples
            .iter()
            .map(|ripple| {
                let age = now.duration_since(ripple.spawned).as_secs_f32();
                [ripple.cell[0], ripple.cell[1], age, ripple.strength]
            })
            .collect()
    }

    #[cfg(test)]
    fn cells(&self) -> Vec<[f32; 2]> {
        self.ripples.iter().map(|ripple| ripple.cell).collect()
    }
}

/// Host-facing handle for spawning ripples from click handlers.
#[derive(Clone)]
pub struct RippleHandle {
    ring: Rc<RefCell<RippleRing>>,
}

impl RippleHandle {
    pub fn spawn_at_cell(&self, cell_x: f32, cell_y: f32) {
        self.ring
            .borrow_mut()
            .spawn(cell_x, cell_y, 1.0, Instant::now());
    }
}

pub struct ClickRipples {
    ring: Rc<RefCell<RippleRing>>,
}

impl ClickRipples {
    pub fn new() -> Self {
        Self::with_lifetime(DEFAULT_RIPPLE_LIFETIME)
    }

    pub fn with_lifetime(lifetime: Duration) -> Self {
        Self {
            ring: Rc::new(RefCell::new(RippleRing::new(lifetime))),
        }
    }

    pub fn handle(&self) -> RippleHandle {
        RippleHandle {
            ring: self.ring.clone(),
        }
    }

    pub fn callback(&self) -> EffectCallback {
        let ring = self.ring.clone();
        Box::new(move |ctx: &mut EffectContext<'_>| {
            let elements = ring.borrow_mut().elements(Instant::now());
            let ripples = ctx.table.get(U_RIPPLES);
            for (index, element) in elements.iter().enumerate() {
                ctx.uniforms
                    .set_vec4_element(ripples, index as u32, *element);
            }
            ctx.uniforms
                .set_u32(ctx.table.get(U_RIPPLE_COUNT), elements.len() as u32);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ninth_spawn_evicts_the_oldest() {
        let mut ring = RippleRing::new(Duration::from_secs(60));
        let start = Instant::now();
        for i in 0..9_u64 {
            ring.spawn(i as f32, 0.0, 1.0, start + Duration::from_millis(i * 10));
        }

        let now = start + Duration::from_millis(100);
        assert_eq!(ring.live_count(now), 8);
        // Ripple 0 evicted; 1..=8 survive, recency order preserved.
        let cells = ring.cells();
        assert_eq!(cells.first().unwrap()[0], 1.0);
        assert_eq!(cells.last().unwrap()[0], 8.0);
        for window in cells.windows(2) {
            assert!(window[0][0] < window[1][0]);
        }
    }

    #[test]
    fn expired_ripples_are_culled_not_counted() {
        let mut ring = RippleRing::new(Duration::from_millis(100));
        let start = Instant::now();
        ring.spawn(1.0, 1.0, 1.0, start);
        ring.spawn(2.0, 2.0, 1.0, start + Duration::from_millis(80));

        let later = start + Duration::from_millis(150);
        assert_eq!(ring.live_count(later), 1);
        let elements = ring.elements(later);
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0][0], 2.0);
        assert!(elements[0][2] > 0.0);
    }

    #[test]
    fn strength_is_clamped_into_unit_range() {
        let mut ring = RippleRing::new(Duration::from_secs(1));
        let now = Instant::now();
        ring.spawn(0.0, 0.0, 5.0, now);
        let elements = ring.elements(now);
        assert_eq!(elements[0][3], 1.0);
    }
}
