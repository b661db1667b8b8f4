//! Character set definitions for ASCII rendering.
//!
//! Every charset is an ordered sequence of glyphs, darkest first, brightest
//! last. The glyph's position in the sequence is the brightness-to-glyph
//! mapping key used by the fragment shader, so ordering is load-bearing:
//! reordering a charset changes the rendered image, not just its style.
//!
//! Glyphs are `&str`, not `char` — emoji and other multi-codepoint clusters
//! are first-class citizens and get one atlas cell each.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Standard ASCII density ramp (10 levels), space to `@`.
pub const STANDARD_GLYPHS: &[&str] = &[" ", ".", ":", "-", "=", "+", "*", "#", "%", "@"];

/// Unicode block elements (5 levels). Chunky, high-contrast look.
pub const BLOCKS_GLYPHS: &[&str] = &[" ", "░", "▒", "▓", "█"];

/// Minimal ramp (4 levels). Clean, less noisy.
pub const MINIMAL_GLYPHS: &[&str] = &[" ", ".", ":", "#"];

/// Long printable-ASCII ramp (70 levels) for maximum tonal depth.
pub const DENSE_GLYPHS: &[&str] = &[
    " ", ".", "'", "`", "^", "\"", ",", ":", ";", "I", "l", "!", "i", ">", "<", "~", "+", "_",
    "-", "?", "]", "[", "}", "{", "1", ")", "(", "|", "\\", "/", "t", "f", "j", "r", "x", "n",
    "u", "v", "c", "z", "X", "Y", "U", "J", "C", "L", "Q", "0", "O", "Z", "m", "w", "q", "p",
    "d", "b", "k", "h", "a", "o", "*", "#", "M", "W", "&", "8", "%", "B", "@", "$",
];

/// Emoji ramp (7 levels). `❤️` is a two-codepoint cluster (U+2764 U+FE0F),
/// which keeps the multi-codepoint path exercised by default.
pub const EMOJI_GLYPHS: &[&str] = &["　", "🖤", "💜", "❤️", "🧡", "💛", "🤍"];

/// Key into the fixed set of supported charsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharsetKey {
    #[default]
    Standard,
    Blocks,
    Minimal,
    Dense,
    Emoji,
}

impl CharsetKey {
    /// Glyphs for this charset, darkest to brightest.
    pub fn glyphs(self) -> &'static [&'static str] {
        match self {
            CharsetKey::Standard => STANDARD_GLYPHS,
            CharsetKey::Blocks => BLOCKS_GLYPHS,
            CharsetKey::Minimal => MINIMAL_GLYPHS,
            CharsetKey::Dense => DENSE_GLYPHS,
            CharsetKey::Emoji => EMOJI_GLYPHS,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CharsetKey::Standard => "standard",
            CharsetKey::Blocks => "blocks",
            CharsetKey::Minimal => "minimal",
            CharsetKey::Dense => "dense",
            CharsetKey::Emoji => "emoji",
        }
    }

    pub fn glyph_count(self) -> usize {
        self.glyphs().len()
    }
}

impl fmt::Display for CharsetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
