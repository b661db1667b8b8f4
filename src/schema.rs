//! Renderer configuration surface.
//!
//! Loaded from YAML by the CLI or built directly by embedding hosts. Every
//! field has a default, so an empty document is a valid config; `validate`
//! rejects out-of-range values with messages that say what to change.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::charset::CharsetKey;

pub const DEFAULT_COLUMNS: u32 = 80;
pub const DEFAULT_GLYPH_PX: u32 = 16;
pub const DEFAULT_MAX_WIDTH: u32 = 1920;

pub const MIN_GLYPH_PX: u32 = 4;
pub const MAX_GLYPH_PX: u32 = 128;
pub const MAX_COLUMNS: u32 = 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RendererConfig {
    /// Grid width driver; rows follow from the source aspect ratio.
    pub columns: u32,
    /// Sample source color per cell (true) or fixed monochrome (false).
    pub color_mode: bool,
    /// Blend back toward the raw source, 0-100 (0 = pure ASCII).
    pub blend: u8,
    /// Background lift for glyph cells, 0-100.
    pub highlight: u8,
    /// Brightness multiplier, 0.0-2.0.
    pub brightness: f32,
    pub charset: CharsetKey,
    /// Atlas cell size in pixels.
    pub glyph_px: u32,
    /// Output width cap in pixels.
    pub max_width: u32,
    /// Font used to rasterize the atlas. Required to initialize a GPU
    /// pipeline; embedding hosts that pass font bytes directly may leave it
    /// unset.
    pub font_path: Option<PathBuf>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            columns: DEFAULT_COLUMNS,
            color_mode: true,
            blend: 0,
            highlight: 15,
            brightness: 1.0,
            charset: CharsetKey::Standard,
            glyph_px: DEFAULT_GLYPH_PX,
            max_width: DEFAULT_MAX_WIDTH,
            font_path: None,
        }
    }
}

impl RendererConfig {
    pub fn validate(&self) -> Result<()> {
        if self.columns == 0 || self.columns > MAX_COLUMNS {
            bail!(
                "columns must be in 1..={}, got {}",
                MAX_COLUMNS,
                self.columns
            );
        }
        if self.blend > 100 {
            bail!("blend must be in 0..=100, got {}", self.blend);
        }
        if self.highlight > 100 {
            bail!("highlight must be in 0..=100, got {}", self.highlight);
        }
        if !(0.0..=2.0).contains(&self.brightness) {
            bail!("brightness must be in 0.0..=2.0, got {}", self.brightness);
        }
        if self.glyph_px < MIN_GLYPH_PX || self.glyph_px > MAX_GLYPH_PX {
            bail!(
                "glyph_px must be in {}..={}, got {}",
                MIN_GLYPH_PX,
                MAX_GLYPH_PX,
                self.glyph_px
            );
        }
        if self.max_width == 0 {
            bail!("max_width must be non-zero");
        }
        Ok(())
    }

    /// Blend factor as the 0..1 uniform value.
    pub fn blend_factor(&self) -> f32 {
        f32::from(self.blend) / 100.0
    }

    /// Highlight intensity as the 0..1 uniform value.
    pub fn highlight_factor(&self) -> f32 {
        f32::from(self.highlight) / 100.0
    }
}

/// Load and validate a config document.
pub fn load_config(path: &Path) -> Result<RendererConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: RendererConfig = serde_yaml::from_str(&text)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(config)
}
