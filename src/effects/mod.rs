//! Effect registry: the plugin bus for per-frame uniform writers.
//!
//! An effect is an id plus a closure. Each tick the render loop invokes
//! every registered closure exactly once with an [`EffectContext`]; the
//! closure writes its own uniform slots and nothing else. Effects never hold
//! GPU handles: the uniform table and staging block arrive as parameters and
//! go away when the callback returns, so an effect cannot outlive or race
//! the core's resource lifecycle.
//!
//! Iteration order is unspecified on purpose. Each effect owns disjoint
//! uniform slots, so no callback may depend on running before another.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::grid::GridDimensions;
use crate::uniforms::{UniformTable, UniformValues};

pub mod audio;
pub mod pointer;
pub mod ripple;

/// Per-frame view handed to each effect callback.
pub struct EffectContext<'a> {
    pub table: &'a UniformTable,
    pub uniforms: &'a mut UniformValues,
    pub grid: GridDimensions,
    /// Seconds since initialization.
    pub time: f32,
}

pub type EffectCallback = Box<dyn FnMut(&mut EffectContext<'_>)>;

#[derive(Default)]
pub struct EffectRegistry {
    effects: HashMap<String, EffectCallback>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self {
            effects: HashMap::new(),
        }
    }

    /// Store `callback` under `id`, replacing any previous registration with
    /// the same id.
    pub fn register(&mut self, id: impl Into<String>, callback: EffectCallback) {
        self.effects.insert(id.into(), callback);
    }

    /// Remove the effect under `id`. Unregistering an absent id is fine.
    pub fn unregister(&mut self, id: &str) {
        self.effects.remove(id);
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.effects.contains_key(id)
    }

    /// Invoke every registered callback once. A panicking callback loses its
    /// contribution for this frame only: the panic is caught and logged, the
    /// remaining callbacks still run, and the effect stays registered for
    /// the next tick.
    pub fn run_frame(&mut self, ctx: &mut EffectContext<'_>) {
        for (id, callback) in self.effects.iter_mut() {
            let outcome = catch_unwind(AssertUnwindSafe(|| callback(&mut *ctx)));
            if outcome.is_err() {
                log::error!("effect '{id}' panicked during its frame callback; skipped this frame");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::ascii_uniform_layout;
    use crate::uniforms::UniformTable;

    use std::cell::Cell;
    use std::rc::Rc;

    fn context_parts() -> (crate::uniforms::UniformLayout, UniformTable) {
        let layout = ascii_uniform_layout();
        let table = UniformTable::resolve(&layout);
        (layout, table)
    }

    fn run(registry: &mut EffectRegistry) {
        let (layout, table) = context_parts();
        let mut values = UniformValues::new(&layout);
        let mut ctx = EffectContext {
            table: &table,
            uniforms: &mut values,
            grid: GridDimensions { cols: 80, rows: 24 },
            time: 0.0,
        };
        registry.run_frame(&mut ctx);
    }

    #[test]
    fn register_then_unregister_never_fires() {
        let fired = Rc::new(Cell::new(0_u32));
        let mut registry = EffectRegistry::new();

        let counter = fired.clone();
        registry.register("mouse", Box::new(move |_| counter.set(counter.get() + 1)));
        registry.unregister("mouse");

        run(&mut registry);
        assert_eq!(fired.get(), 0);
    }

    #[test]
    fn unregistering_an_absent_id_is_not_an_error() {
        let mut registry = EffectRegistry::new();
        registry.unregister("never-registered");
        registry.unregister("never-registered");
    }

    #[test]
    fn re_registering_replaces_instead_of_duplicating() {
        let first = Rc::new(Cell::new(0_u32));
        let second = Rc::new(Cell::new(0_u32));
        let mut registry = EffectRegistry::new();

        let a = first.clone();
        registry.register("mouse", Box::new(move |_| a.set(a.get() + 1)));
        let b = second.clone();
        registry.register("mouse", Box::new(move |_| b.set(b.get() + 1)));

        run(&mut registry);
        assert_eq!(first.get(), 0, "replaced callback must not fire");
        assert_eq!(second.get(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn a_panicking_callback_does_not_stop_the_others() {
        let fired = Rc::new(Cell::new(0_u32));
        let mut registry = EffectRegistry::new();

        registry.register("broken", Box::new(|_| panic!("effect bug")));
        let counter = fired.clone();
        registry.register("healthy", Box::new(move |_| counter.set(counter.get() + 1)));

        // Keep the expected panic out of test output.
        let previous_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(|_| {}));
        run(&mut registry);
        run(&mut registry);
        std::panic::set_hook(previous_hook);

        // Healthy callback ran on both ticks; broken one stayed registered.
        assert_eq!(fired.get(), 2);
        assert!(registry.contains("broken"));
    }
}
