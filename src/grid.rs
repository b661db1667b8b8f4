//! Grid dimension math.
//!
//! The output grid is derived once from the source aspect ratio and the
//! requested column count. Character cells render roughly twice as tall as
//! they are wide, so a naive `rows = cols / aspect` would stretch the image
//! vertically; dividing by the character aspect correction compensates.

use anyhow::{bail, Result};

/// Character cells are ~2x taller than wide.
pub const CHAR_ASPECT_CORRECTION: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridDimensions {
    pub cols: u32,
    pub rows: u32,
}

impl GridDimensions {
    /// Derive grid dimensions from source pixel dimensions and a target
    /// column count. Both axes are clamped to at least 1, so a valid source
    /// can never produce a degenerate grid.
    pub fn derive(source_width: u32, source_height: u32, columns: u32) -> Result<Self> {
        if source_width == 0 || source_height == 0 {
            bail!(
                "source dimensions must be non-zero, got {}x{}",
                source_width,
                source_height
            );
        }

        let cols = columns.max(1);
        let aspect = source_width as f32 / source_height as f32;
        let rows = (cols as f32 / aspect / CHAR_ASPECT_CORRECTION).round() as u32;

        Ok(Self {
            cols,
            rows: rows.max(1),
        })
    }

    pub fn cell_count(&self) -> u32 {
        self.cols * self.rows
    }
}
