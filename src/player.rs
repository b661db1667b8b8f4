//! Render loop and cooperative scheduler.
//!
//! [`AsciiPlayer`] drives the per-frame sequence and owns the state
//! machine: `Uninitialized → Initializing → Idle → Running → (Idle |
//! Destroyed)`. One logical tick is in flight at a time; a completed tick
//! requests the next one through the host's [`Scheduler`], so a slow frame
//! delays its successor instead of overlapping it, and pausing simply stops
//! the chain.
//!
//! The player is generic over [`TickPipeline`] so the loop's gating,
//! effect dispatch and statistics can be tested against a counting stub;
//! production code uses [`crate::renderer::Renderer`].

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::effects::{EffectCallback, EffectContext, EffectRegistry};
use crate::grid::GridDimensions;
use crate::program::U_TIME;
use crate::source::{FrameSource, SourceState};
use crate::uniforms::{UniformTable, UniformValues};

const STATS_INTERVAL: Duration = Duration::from_secs(1);

/// Everything the loop needs from the GPU side of the house, per tick.
pub trait TickPipeline {
    fn grid(&self) -> GridDimensions;

    /// False once destroyed or otherwise unusable; the loop aborts the
    /// frame silently when this fails.
    fn is_valid(&self) -> bool;

    /// Copy the current decoded frame into GPU memory and refresh derived
    /// data (mip levels).
    fn upload_frame(&mut self, pixels: &[u8]) -> Result<()>;

    /// Uniform table + staging split borrow for effect invocation. `None`
    /// when no program is alive.
    fn uniform_frame(&mut self) -> Option<(&UniformTable, &mut UniformValues)>;

    /// Issue the draw call for the staged frame.
    fn draw(&mut self) -> Result<()>;

    /// Release GPU resources. Must be idempotent.
    fn destroy(&mut self);
}

/// Host-provided timing primitive. `request_tick` arms exactly one future
/// tick (think `requestAnimationFrame`, or a redraw request); `cancel`
/// disarms it.
pub trait Scheduler {
    fn request_tick(&mut self);
    fn cancel(&mut self);
}

/// Scheduler for hosts that drive the loop themselves: the demo CLI and
/// tests poll `take_pending` and call [`AsciiPlayer::tick`] when it fires.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    pending: bool,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self { pending: false }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Consume the pending request, if any.
    pub fn take_pending(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }
}

impl Scheduler for ManualScheduler {
    fn request_tick(&mut self) {
        self.pending = true;
    }

    fn cancel(&mut self) {
        self.pending = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Uninitialized,
    Initializing,
    Idle,
    Running,
    Destroyed,
}

/// Rolling frame statistics, aggregated over ~1 second windows.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RenderStats {
    pub fps: f32,
    pub frame_time_ms: f32,
}

/// Read-only view of the player for UI consumers.
#[derive(Debug, Clone, Copy)]
pub struct StateSnapshot {
    pub dimensions: Option<GridDimensions>,
    pub stats: RenderStats,
    pub is_ready: bool,
    pub is_playing: bool,
}

#[derive(Debug, Default)]
struct StatsWindow {
    window_start: Option<Instant>,
    frames: u32,
    accum: Duration,
    current: RenderStats,
}

impl StatsWindow {
    fn record(
        &mut self,
        tick_start: Instant,
        tick_end: Instant,
        sink: &mut Option<Box<dyn FnMut(RenderStats)>>,
    ) {
        let window_start = *self.window_start.get_or_insert(tick_start);
        self.frames += 1;
        self.accum += tick_end.duration_since(tick_start);

        let elapsed = tick_end.duration_since(window_start);
        if elapsed >= STATS_INTERVAL && self.frames > 0 {
            let stats = RenderStats {
                fps: self.frames as f32 / elapsed.as_secs_f32(),
                frame_time_ms: self.accum.as_secs_f32() * 1000.0 / self.frames as f32,
            };
            self.current = stats;
            if let Some(callback) = sink {
                callback(stats);
            }
            self.window_start = Some(tick_end);
            self.frames = 0;
            self.accum = Duration::ZERO;
        }
    }

    fn reset(&mut self) {
        self.window_start = None;
        self.frames = 0;
        self.accum = Duration::ZERO;
    }
}

pub struct AsciiPlayer<P: TickPipeline> {
    source: Rc<RefCell<dyn FrameSource>>,
    scheduler: Rc<RefCell<dyn Scheduler>>,
    registry: EffectRegistry,
    pipeline: Option<P>,
    state: LoopState,
    ready: bool,
    epoch: Option<Instant>,
    stats: StatsWindow,
    on_stats: Option<Box<dyn FnMut(RenderStats)>>,
    on_error: Option<Box<dyn FnMut(&anyhow::Error)>>,
}

impl<P: TickPipeline> AsciiPlayer<P> {
    pub fn new(
        source: Rc<RefCell<dyn FrameSource>>,
        scheduler: Rc<RefCell<dyn Scheduler>>,
    ) -> Self {
        Self {
            source,
            scheduler,
            registry: EffectRegistry::new(),
            pipeline: None,
            state: LoopState::Uninitialized,
            ready: false,
            epoch: None,
            stats: StatsWindow::default(),
            on_stats: None,
            on_error: None,
        }
    }

    /// Run one initialization cycle with a caller-supplied pipeline build.
    ///
    /// Any previous pipeline is destroyed first; on failure the machine
    /// stays in `Initializing`, the error is reported through the fatal
    /// channel, and the caller may re-trigger with fixed inputs. On success
    /// the loop is `Idle` and ready; if the source is already playing it
    /// starts running immediately.
    pub fn initialize_with<F>(&mut self, build: F) -> Result<()>
    where
        F: FnOnce() -> Result<P>,
    {
        if let Some(mut previous) = self.pipeline.take() {
            previous.destroy();
        }
        self.ready = false;
        self.stats.reset();
        self.state = LoopState::Initializing;

        match build() {
            Ok(pipeline) => {
                self.pipeline = Some(pipeline);
                self.state = LoopState::Idle;
                self.ready = true;
                self.epoch = Some(Instant::now());
                if self.source.borrow().state() == SourceState::Playing {
                    self.state = LoopState::Running;
                    self.scheduler.borrow_mut().request_tick();
                }
                Ok(())
            }
            Err(error) => {
                self.report_fatal(&error);
                Err(error)
            }
        }
    }

    /// Register an effect callback. Re-registering under the same id
    /// replaces the previous callback.
    pub fn register_effect(&mut self, id: impl Into<String>, callback: EffectCallback) {
        self.registry.register(id, callback);
    }

    /// Remove an effect. Unknown ids are ignored.
    pub fn unregister_effect(&mut self, id: &str) {
        self.registry.unregister(id);
    }

    pub fn on_stats(&mut self, callback: impl FnMut(RenderStats) + 'static) {
        self.on_stats = Some(Box::new(callback));
    }

    /// Single reporting channel for fatal errors (GPU unavailable, shader
    /// build failure). Transient frame skips never reach it.
    pub fn on_error(&mut self, callback: impl FnMut(&anyhow::Error) + 'static) {
        self.on_error = Some(Box::new(callback));
    }

    pub fn play(&mut self) {
        self.source.borrow_mut().set_playing(true);
        if self.ready && self.state == LoopState::Idle {
            self.state = LoopState::Running;
            self.scheduler.borrow_mut().request_tick();
        }
    }

    pub fn pause(&mut self) {
        self.source.borrow_mut().set_playing(false);
        if self.state == LoopState::Running {
            self.state = LoopState::Idle;
        }
        self.scheduler.borrow_mut().cancel();
    }

    pub fn toggle(&mut self) {
        if self.source.borrow().state() == SourceState::Playing {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            dimensions: self.pipeline.as_ref().map(|pipeline| pipeline.grid()),
            stats: self.stats.current,
            is_ready: self.ready && self.pipeline.is_some(),
            is_playing: self.source.borrow().state() == SourceState::Playing,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn pipeline(&self) -> Option<&P> {
        self.pipeline.as_ref()
    }

    pub fn pipeline_mut(&mut self) -> Option<&mut P> {
        self.pipeline.as_mut()
    }

    /// One frame tick. Fixed step order; each step is gated on the previous
    /// one succeeding:
    /// handles valid → source playing → upload → effects → draw → stats →
    /// reschedule.
    pub fn tick(&mut self) {
        if self.state != LoopState::Running {
            return;
        }
        let tick_start = Instant::now();

        let Some(pipeline) = self.pipeline.as_mut() else {
            return;
        };
        if !pipeline.is_valid() {
            return;
        }

        match self.source.borrow().state() {
            SourceState::Playing => {}
            SourceState::Loaded | SourceState::Paused | SourceState::Ended => {
                // Transport stopped since the last tick: go idle and let the
                // pending schedule die.
                self.state = LoopState::Idle;
                self.scheduler.borrow_mut().cancel();
                return;
            }
        }

        let uploaded = {
            let mut source = self.source.borrow_mut();
            match source.pixels() {
                Some(pixels) => match pipeline.upload_frame(pixels) {
                    Ok(()) => true,
                    Err(error) => {
                        log::warn!("frame upload failed, skipping frame: {error:#}");
                        false
                    }
                },
                // Playing but not producing yet: no GPU work this tick.
                None => false,
            }
        };
        if !uploaded {
            self.scheduler.borrow_mut().request_tick();
            return;
        }

        let time = self
            .epoch
            .map(|epoch| tick_start.duration_since(epoch).as_secs_f32())
            .unwrap_or(0.0);
        let grid = pipeline.grid();
        if let Some((table, uniforms)) = pipeline.uniform_frame() {
            uniforms.set_f32(table.get(U_TIME), time);
            let mut ctx = EffectContext {
                table,
                uniforms,
                grid,
                time,
            };
            self.registry.run_frame(&mut ctx);
        }

        if let Err(error) = pipeline.draw() {
            log::warn!("draw failed, skipping frame: {error:#}");
        } else {
            self.stats.record(tick_start, Instant::now(), &mut self.on_stats);
        }

        self.scheduler.borrow_mut().request_tick();
    }

    /// Tear down GPU state and cancel any pending tick. Safe to call from
    /// any state, any number of times.
    pub fn destroy(&mut self) {
        self.scheduler.borrow_mut().cancel();
        if let Some(mut pipeline) = self.pipeline.take() {
            pipeline.destroy();
        }
        self.ready = false;
        self.state = LoopState::Destroyed;
    }

    fn report_fatal(&mut self, error: &anyhow::Error) {
        log::error!("fatal initialization error: {error:#}");
        if let Some(callback) = &mut self.on_error {
            callback(error);
        }
    }
}

impl AsciiPlayer<crate::renderer::Renderer> {
    /// Build the GPU pipeline against the source's current dimensions. Call
    /// once source metadata is known; call again after changing columns,
    /// charset or glyph size (the previous pipeline is torn down first).
    pub fn initialize_gpu(
        &mut self,
        config: &crate::schema::RendererConfig,
        font: &fontdue::Font,
    ) -> Result<()> {
        let dimensions = self.source.borrow().dimensions();
        self.initialize_with(|| crate::renderer::Renderer::new(config, dimensions, font))
    }
}

impl<P: TickPipeline> Drop for AsciiPlayer<P> {
    fn drop(&mut self) {
        self.destroy();
    }
}
