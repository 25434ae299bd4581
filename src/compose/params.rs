//! Parameter types for caption compositing.
//!
//! These structs describe *what* to draw, not *how*. The layout is computed
//! by [`operations::plan_caption`](super::operations::plan_caption) from pure
//! [`calculations`](super::calculations) and a measurement; the pixel work is
//! done by [`operations::burn_caption`](super::operations::burn_caption).
//!
//! ## Types
//!
//! - [`CaptionStyle`]: Fill and outline colors.
//! - [`CaptionLayout`]: Fitted font size, anchor and stroke width for one caption.

use image::Rgb;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("invalid color {0:?}: expected #rrggbb")]
pub struct ColorParseError(pub String);

/// Parse a `#rrggbb` hex color.
pub fn parse_hex_color(value: &str) -> Result<Rgb<u8>, ColorParseError> {
    let hex = value
        .strip_prefix('#')
        .filter(|h| h.len() == 6 && h.is_ascii())
        .ok_or_else(|| ColorParseError(value.to_string()))?;
    let channel = |i: usize| {
        u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| ColorParseError(value.to_string()))
    };
    Ok(Rgb([channel(0)?, channel(2)?, channel(4)?]))
}

/// Colors for meme text.
///
/// The outline is always drawn with round joins (a disk-shaped dilation of
/// the glyph coverage), which never produces miter spikes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptionStyle {
    pub fill: Rgb<u8>,
    pub stroke: Rgb<u8>,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            fill: Rgb([255, 255, 255]),
            stroke: Rgb([0, 0, 0]),
        }
    }
}

/// Fitted geometry for a single caption line.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionLayout {
    /// Font size before fitting (8% of height).
    pub baseline_px: u32,
    /// Font size actually drawn.
    pub font_px: u32,
    /// Advance width measured at `baseline_px`.
    pub measured_width: f64,
    /// Width budget (90% of image width).
    pub allowed_width: f64,
    /// Advance width at `font_px`.
    pub line_width: f64,
    /// Horizontal center of the line.
    pub anchor_x: f64,
    /// Bottom of the line box.
    pub anchor_y: f64,
    /// Outline width in pixels.
    pub stroke_width: f64,
}

impl CaptionLayout {
    /// Whether the caption had to be shrunk to fit.
    pub fn was_scaled(&self) -> bool {
        self.font_px < self.baseline_px
    }
}
