//! glyphstream: a headless GPU ASCII-art video renderer.
//!
//! A decoded video stream goes in one side ([`source::FrameSource`]), an
//! ASCII-art rendition comes out the other, drawn entirely on the GPU: per
//! frame the current source buffer is uploaded to a mipmapped texture, a
//! WGSL fragment stage maps each grid cell's sampled brightness to a glyph
//! from a pre-rasterized atlas strip, and interactive effects (cursor glow,
//! click ripples, audio-reactive brightness) inject their shader parameters
//! through a registry of per-frame callbacks without touching the core.
//!
//! The render loop is cooperatively scheduled: each tick requests the next
//! through the host's [`player::Scheduler`], so ticks chain instead of
//! overlapping. See [`player::AsciiPlayer`] for the host-facing surface.

pub mod atlas;
pub mod charset;
pub mod convert;
pub mod effects;
pub mod grid;
pub mod mipgen;
pub mod player;
pub mod program;
pub mod renderer;
pub mod schema;
pub mod source;
pub mod uniforms;

pub use charset::CharsetKey;
pub use grid::GridDimensions;
pub use player::{AsciiPlayer, LoopState, ManualScheduler, RenderStats, Scheduler, StateSnapshot};
pub use program::{ShaderError, ShaderStage};
pub use renderer::Renderer;
pub use schema::RendererConfig;
pub use source::{BufferSource, FrameSource, SourceState, TestPatternSource};
