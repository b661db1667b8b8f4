//! CPU mirrors of the fragment conversion math.
//!
//! The per-pixel conversion runs in WGSL (`shaders/wgsl/ascii_fragment.wgsl`);
//! these functions implement the same arithmetic on the CPU so the mapping
//! properties can be unit tested without a GPU. Any change here must be made
//! in the shader as well, and vice versa.

/// Brightness multiplier applied at audio level 0 (silence floor).
pub const AUDIO_FLOOR: f32 = 0.3;
/// Brightness multiplier applied at audio level 1.
pub const AUDIO_CEILING: f32 = 5.0;

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Perceptual luminance, Rec. 601 weights.
pub fn luminance(r: f32, g: f32, b: f32) -> f32 {
    0.299 * r + 0.587 * g + 0.114 * b
}

/// Audio brightness multiplier for a smoothed level in `[0, 1]`.
pub fn audio_multiplier(level: f32) -> f32 {
    lerp(AUDIO_FLOOR, AUDIO_CEILING, level.clamp(0.0, 1.0))
}

/// Blend raw vs. audio-modulated luminance by `reactivity` in `[0, 1]`.
pub fn modulate_luma(luma: f32, level: f32, reactivity: f32) -> f32 {
    let modulated = luma * audio_multiplier(level);
    lerp(luma, modulated, reactivity.clamp(0.0, 1.0))
}

/// User brightness multiplier, clamped into displayable range.
pub fn apply_brightness(luma: f32, brightness: f32) -> f32 {
    (luma * brightness).clamp(0.0, 1.0)
}

/// Map luminance in `[0, 1]` to a glyph index.
///
/// `floor(luma * count)` hits `count` exactly at `luma == 1.0`, so the result
/// is clamped into `[0, count - 1]` rather than tuned with an epsilon. The
/// clamp also absorbs float overshoot from upstream brightness math.
pub fn glyph_index(luma: f32, glyph_count: usize) -> usize {
    if glyph_count == 0 {
        return 0;
    }
    let raw = (luma * glyph_count as f32).floor();
    (raw.max(0.0) as usize).min(glyph_count - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f32 = 1e-5;

    #[test]
    fn luminance_weights_sum_to_one() {
        assert!((luminance(1.0, 1.0, 1.0) - 1.0).abs() < TOLERANCE);
        assert!(luminance(0.0, 0.0, 0.0).abs() < TOLERANCE);
    }

    #[test]
    fn silence_with_full_reactivity_hits_the_floor() {
        let base = 0.8;
        let out = modulate_luma(base, 0.0, 1.0);
        assert!((out - base * AUDIO_FLOOR).abs() < TOLERANCE);
    }

    #[test]
    fn zero_reactivity_leaves_luma_untouched() {
        let base = 0.42;
        assert!((modulate_luma(base, 1.0, 0.0) - base).abs() < TOLERANCE);
    }

    #[test]
    fn out_of_range_level_and_reactivity_are_clamped() {
        assert!((audio_multiplier(-3.0) - AUDIO_FLOOR).abs() < TOLERANCE);
        assert!((audio_multiplier(7.0) - AUDIO_CEILING).abs() < TOLERANCE);
        let base = 0.5;
        let clamped = modulate_luma(base, 1.0, 9.0);
        let full = modulate_luma(base, 1.0, 1.0);
        assert!((clamped - full).abs() < TOLERANCE);
    }

    #[test]
    fn glyph_index_is_monotonic_non_decreasing() {
        for count in [2, 4, 10, 70] {
            let mut previous = 0;
            for step in 0..=1000 {
                let luma = step as f32 / 1000.0;
                let index = glyph_index(luma, count);
                assert!(index >= previous, "count={count} luma={luma}");
                assert!(index < count);
                previous = index;
            }
        }
    }

    #[test]
    fn bright_luminance_maps_to_brightest_glyph() {
        // 10-glyph charset, luminance 0.95 selects the last glyph.
        assert_eq!(glyph_index(0.95, 10), 9);
    }

    #[test]
    fn extremes_stay_in_range() {
        assert_eq!(glyph_index(0.0, 10), 0);
        assert_eq!(glyph_index(1.0, 10), 9);
        // Float overshoot from brightness math must not escape the table.
        assert_eq!(glyph_index(1.0001, 10), 9);
        assert_eq!(glyph_index(-0.5, 10), 0);
    }

    #[test]
    fn brightness_multiplier_clamps_to_displayable_range() {
        assert!((apply_brightness(0.9, 2.0) - 1.0).abs() < TOLERANCE);
        assert!(apply_brightness(0.2, 0.0).abs() < TOLERANCE);
    }
}
