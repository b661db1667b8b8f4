//! Character atlas builder.
//!
//! Rasterizes a charset into a single horizontal strip: one square cell per
//! glyph, darkest glyph leftmost. The strip is a one-channel coverage mask
//! (background 0, glyph ink up to 255) so the fragment shader can composite
//! ink against background with a single texture read.
//!
//! Glyphs are laid out with fontdue's layout engine, so multi-codepoint
//! clusters (emoji with variation selectors, for instance) land in one cell.
//! A glyph the font cannot render simply leaves its cell blank; that
//! brightness level degrades to background instead of failing the build.

use anyhow::{bail, Result};
use fontdue::layout::{
    CoordinateSystem, HorizontalAlign, Layout, LayoutSettings, TextStyle, VerticalAlign, WrapStyle,
};
use fontdue::Font;

/// Fraction of the cell height given to the font size, leaving headroom for
/// ascenders/descenders so glyphs stay inside their cell.
const GLYPH_SIZE_FACTOR: f32 = 0.8;

/// CPU-side atlas strip. Consumed once by the GPU upload; single `R8`
/// coverage channel, row-major, `width * height` bytes.
#[derive(Debug, Clone)]
pub struct AtlasImage {
    pub glyph_px: u32,
    pub glyph_count: u32,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl AtlasImage {
    /// Total ink coverage of one glyph cell. Used by [`density_ramp`] and by
    /// tests asserting relative glyph darkness.
    pub fn cell_coverage(&self, index: u32) -> u64 {
        let mut total = 0_u64;
        let x0 = index * self.glyph_px;
        for y in 0..self.height {
            for x in x0..x0 + self.glyph_px {
                total += u64::from(self.pixels[(y * self.width + x) as usize]);
            }
        }
        total
    }
}

/// Rasterize `glyphs` into an atlas strip at `glyph_px` pixels per cell.
///
/// Pure function of its inputs: the same font, glyph sequence and cell size
/// always produce the same strip.
pub fn build_atlas(font: &Font, glyphs: &[&str], glyph_px: u32) -> Result<AtlasImage> {
    if glyphs.is_empty() {
        bail!("atlas requires at least one glyph");
    }
    if glyph_px == 0 {
        bail!("atlas glyph size must be non-zero");
    }

    let glyph_count = glyphs.len() as u32;
    let width = glyph_px * glyph_count;
    let height = glyph_px;
    let mut pixels = vec![0_u8; (width * height) as usize];

    let font_size = glyph_px as f32 * GLYPH_SIZE_FACTOR;
    let mut layout = Layout::new(CoordinateSystem::PositiveYDown);

    for (cell, glyph_text) in glyphs.iter().enumerate() {
        layout.reset(&LayoutSettings {
            x: 0.0,
            y: 0.0,
            max_width: Some(glyph_px as f32),
            max_height: Some(glyph_px as f32),
            horizontal_align: HorizontalAlign::Center,
            vertical_align: VerticalAlign::Middle,
            line_height: 1.0,
            wrap_style: WrapStyle::Letter,
            wrap_hard_breaks: false,
        });
        layout.append(&[font], &TextStyle::new(glyph_text, font_size, 0));

        let cell_x0 = cell as u32 * glyph_px;
        for glyph in layout.glyphs() {
            if glyph.width == 0 || glyph.height == 0 {
                continue;
            }
            let (_, bitmap) = font.rasterize_config(glyph.key);
            blit_coverage(
                &mut pixels,
                width,
                height,
                cell_x0,
                glyph_px,
                glyph.x.round() as i32,
                glyph.y.round() as i32,
                glyph.width,
                glyph.height,
                &bitmap,
            );
        }
    }

    Ok(AtlasImage {
        glyph_px,
        glyph_count,
        width,
        height,
        pixels,
    })
}

/// Copy one rasterized glyph into its cell, clipping against the cell bounds
/// so an oversized glyph never bleeds into a neighboring brightness level.
fn blit_coverage(
    pixels: &mut [u8],
    strip_width: u32,
    strip_height: u32,
    cell_x0: u32,
    cell_width: u32,
    glyph_x: i32,
    glyph_y: i32,
    glyph_width: usize,
    glyph_height: usize,
    bitmap: &[u8],
) {
    for row in 0..glyph_height {
        let py = glyph_y + row as i32;
        if py < 0 || py >= strip_height as i32 {
            continue;
        }
        for col in 0..glyph_width {
            let px = glyph_x + col as i32;
            if px < 0 || px >= cell_width as i32 {
                continue;
            }
            let coverage = bitmap[row * glyph_width + col];
            if coverage == 0 {
                continue;
            }
            let idx = (py as u32 * strip_width + cell_x0 + px as u32) as usize;
            pixels[idx] = pixels[idx].max(coverage);
        }
    }
}

/// Glyph indices ordered by ink coverage ascending, index as tie-breaker.
///
/// Useful to sanity-check that a charset really runs dark-to-bright under a
/// given font, or to auto-order a custom charset.
pub fn density_ramp(atlas: &AtlasImage) -> Vec<usize> {
    let mut ramp: Vec<(usize, u64)> = (0..atlas.glyph_count)
        .map(|index| (index as usize, atlas.cell_coverage(index)))
        .collect();
    ramp.sort_by_key(|&(index, coverage)| (coverage, index));
    ramp.into_iter().map(|(index, _)| index).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Locate any parseable TTF/OTF on the host. Tests that need real glyph
    /// rasterization skip when none is found, the same way GPU tests skip
    /// without an adapter.
    pub(crate) fn load_any_system_font() -> Option<Font> {
        let roots = [
            "/usr/share/fonts",
            "/usr/local/share/fonts",
            "/System/Library/Fonts",
            "C:\\Windows\\Fonts",
        ];
        for root in roots {
            let mut stack = vec![std::path::PathBuf::from(root)];
            while let Some(dir) = stack.pop() {
                let Ok(entries) = std::fs::read_dir(&dir) else {
                    continue;
                };
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.is_dir() {
                        stack.push(path);
                        continue;
                    }
                    let ext = path
                        .extension()
                        .and_then(|e| e.to_str())
                        .map(|e| e.to_ascii_lowercase());
                    if !matches!(ext.as_deref(), Some("ttf") | Some("otf")) {
                        continue;
                    }
                    if let Ok(bytes) = std::fs::read(&path) {
                        if let Ok(font) = Font::from_bytes(bytes, fontdue::FontSettings::default())
                        {
                            return Some(font);
                        }
                    }
                }
            }
        }
        None
    }

    #[test]
    fn empty_charset_and_zero_cell_size_are_rejected() {
        let Some(font) = load_any_system_font() else {
            eprintln!("Skipping test: no system font found");
            return;
        };
        assert!(build_atlas(&font, &[], 16).is_err());
        assert!(build_atlas(&font, &[" ", "@"], 0).is_err());
    }

    #[test]
    fn strip_geometry_matches_inputs() {
        let Some(font) = load_any_system_font() else {
            eprintln!("Skipping test: no system font found");
            return;
        };
        let glyphs = [" ", ".", ":", "#", "@"];
        let atlas = build_atlas(&font, &glyphs, 12).unwrap();
        assert_eq!(atlas.glyph_count, glyphs.len() as u32);
        assert_eq!(atlas.width, 12 * glyphs.len() as u32);
        assert_eq!(atlas.height, 12);
        assert_eq!(atlas.pixels.len(), (atlas.width * atlas.height) as usize);
    }

    #[test]
    fn atlas_build_is_deterministic() {
        let Some(font) = load_any_system_font() else {
            eprintln!("Skipping test: no system font found");
            return;
        };
        let glyphs = [" ", "-", "@"];
        let a = build_atlas(&font, &glyphs, 16).unwrap();
        let b = build_atlas(&font, &glyphs, 16).unwrap();
        assert_eq!(a.pixels, b.pixels);
    }

    #[test]
    fn space_cell_is_blank_and_at_sign_has_ink() {
        let Some(font) = load_any_system_font() else {
            eprintln!("Skipping test: no system font found");
            return;
        };
        let atlas = build_atlas(&font, &[" ", "@"], 16).unwrap();
        assert_eq!(atlas.cell_coverage(0), 0);
        assert!(atlas.cell_coverage(1) > 0);
    }

    #[test]
    fn unrenderable_glyph_degrades_to_blank_cell() {
        let Some(font) = load_any_system_font() else {
            eprintln!("Skipping test: no system font found");
            return;
        };
        // U+E000 is private-use; virtually no text font maps it.
        let atlas = build_atlas(&font, &["\u{e000}", "@"], 16).unwrap();
        assert_eq!(atlas.glyph_count, 2);
    }

    #[test]
    fn density_ramp_orders_by_coverage() {
        let Some(font) = load_any_system_font() else {
            eprintln!("Skipping test: no system font found");
            return;
        };
        let atlas = build_atlas(&font, &["@", " ", "."], 16).unwrap();
        let ramp = density_ramp(&atlas);
        assert_eq!(ramp.len(), 3);
        // Space is darkest, '@' brightest, regardless of input order.
        assert_eq!(ramp[0], 1);
        assert_eq!(ramp[2], 0);
        let coverages: Vec<u64> = ramp
            .iter()
            .map(|&i| atlas.cell_coverage(i as u32))
            .collect();
        assert!(coverages.windows(2).all(|w| w[0] <= w[1]));
    }
}
