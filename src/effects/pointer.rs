//! Cursor glow effect.
//!
//! Input handlers write the pointer position into shared scratch state at
//! whatever rate the host delivers events; the registered callback reads it
//! once per tick and writes the cursor uniforms. Single-threaded model, so
//! the shared handle is `Rc<RefCell<_>>`, not a lock.

use std::cell::RefCell;
use std::rc::Rc;

use crate::effects::{EffectCallback, EffectContext};
use crate::program::{U_CURSOR_POS, U_CURSOR_STRENGTH};

pub const POINTER_EFFECT_ID: &str = "pointer-glow";

#[derive(Debug, Default)]
struct PointerScratch {
    /// Pointer position in grid-cell coordinates, `None` while the pointer
    /// is outside the surface.
    position: Option<[f32; 2]>,
    strength: f32,
}

/// Host-facing handle for feeding pointer events.
#[derive(Clone)]
pub struct PointerHandle {
    scratch: Rc<RefCell<PointerScratch>>,
}

impl PointerHandle {
    /// Update the pointer position, in grid-cell coordinates.
    pub fn set_cell(&self, x: f32, y: f32) {
        let mut scratch = self.scratch.borrow_mut();
        scratch.position = Some([x, y]);
        scratch.strength = 1.0;
    }

    /// Pointer left the surface; the glow goes dark next tick.
    pub fn clear(&self) {
        let mut scratch = self.scratch.borrow_mut();
        scratch.position = None;
        scratch.strength = 0.0;
    }
}

pub struct PointerGlow {
    scratch: Rc<RefCell<PointerScratch>>,
}

impl PointerGlow {
    pub fn new() -> Self {
        Self {
            scratch: Rc::new(RefCell::new(PointerScratch::default())),
        }
    }

    pub fn handle(&self) -> PointerHandle {
        PointerHandle {
            scratch: self.scratch.clone(),
        }
    }

    /// Build the per-frame callback for the registry.
    pub fn callback(&self) -> EffectCallback {
        let scratch = self.scratch.clone();
        Box::new(move |ctx: &mut EffectContext<'_>| {
            let scratch = scratch.borrow();
            match scratch.position {
                Some(position) => {
                    ctx.uniforms.set_vec2(ctx.table.get(U_CURSOR_POS), position);
                    ctx.uniforms
                        .set_f32(ctx.table.get(U_CURSOR_STRENGTH), scratch.strength);
                }
                None => {
                    ctx.uniforms.set_f32(ctx.table.get(U_CURSOR_STRENGTH), 0.0);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridDimensions;
    use crate::program::ascii_uniform_layout;
    use crate::uniforms::{UniformTable, UniformValues};

    fn run_callback(effect: &PointerGlow, values: &mut UniformValues) {
        let layout = ascii_uniform_layout();
        let table = UniformTable::resolve(&layout);
        let mut ctx = EffectContext {
            table: &table,
            uniforms: values,
            grid: GridDimensions { cols: 80, rows: 24 },
            time: 0.0,
        };
        let mut callback = effect.callback();
        callback(&mut ctx);
    }

    fn read_f32(values: &UniformValues, offset: usize) -> f32 {
        bytemuck::pod_read_unaligned(&values.as_bytes()[offset..offset + 4])
    }

    #[test]
    fn pointer_position_reaches_the_cursor_uniforms() {
        let layout = ascii_uniform_layout();
        let effect = PointerGlow::new();
        effect.handle().set_cell(12.5, 6.0);

        let mut values = UniformValues::new(&layout);
        run_callback(&effect, &mut values);

        // u_cursor_pos at offset 8, u_cursor_strength at 44.
        assert_eq!(read_f32(&values, 8), 12.5);
        assert_eq!(read_f32(&values, 12), 6.0);
        assert_eq!(read_f32(&values, 44), 1.0);
    }

    #[test]
    fn clearing_the_pointer_zeroes_the_strength() {
        let layout = ascii_uniform_layout();
        let effect = PointerGlow::new();
        let handle = effect.handle();
        handle.set_cell(3.0, 3.0);
        handle.clear();

        let mut values = UniformValues::new(&layout);
        run_callback(&effect, &mut values);
        assert_eq!(read_f32(&values, 44), 0.0);
    }
}
