//! Pure layout math for meme captions.
//!
//! All functions here are pure and testable without fonts, images or I/O.
//! Measurement is passed in as a number; the [`Typesetter`](super::Typesetter)
//! that produced it lives elsewhere.

/// Baseline font size as a fraction of image height.
pub const BASELINE_HEIGHT_RATIO: f64 = 0.08;

/// Widest the caption may be, as a fraction of image width (5% margin per side).
pub const MAX_WIDTH_RATIO: f64 = 0.90;

/// Distance of the line box bottom from the image bottom, as a fraction of height.
pub const BOTTOM_MARGIN_RATIO: f64 = 0.05;

/// Extra shrink applied after scaling an overflowing caption down.
///
/// Absorbs the difference between measured advances and the drawn outline.
pub const SAFETY_FACTOR: f64 = 0.95;

/// Outline width as a fraction of the applied font size.
pub const STROKE_RATIO: f64 = 0.25;

/// Starting font size before fitting: 8% of the image height, floored.
///
/// ```
/// # use oogiri::compose::baseline_font_size;
/// assert_eq!(baseline_font_size(800), 64);
/// assert_eq!(baseline_font_size(500), 40);
/// ```
pub fn baseline_font_size(height: u32) -> u32 {
    (height as f64 * BASELINE_HEIGHT_RATIO).floor() as u32
}

/// Width budget for the caption line in pixels.
pub fn allowed_text_width(width: u32) -> f64 {
    width as f64 * MAX_WIDTH_RATIO
}

/// Font size that fits a caption into the width budget.
///
/// Captions that already fit keep the baseline size; there is no upward
/// scaling. Overflowing captions are scaled by `allowed / measured`, then by
/// [`SAFETY_FACTOR`], and floored.
///
/// # Arguments
/// * `baseline` - Font size the caption was measured at
/// * `measured` - Advance width of the caption at `baseline`
/// * `allowed` - Width budget from [`allowed_text_width`]
pub fn fitted_font_size(baseline: u32, measured: f64, allowed: f64) -> u32 {
    if measured <= allowed || measured <= 0.0 {
        return baseline;
    }
    let scale = allowed / measured;
    (baseline as f64 * scale * SAFETY_FACTOR).floor() as u32
}

/// Anchor point of the caption line: horizontal center, 5% above the bottom edge.
///
/// The returned `y` is where the bottom of the line box sits.
pub fn caption_anchor(width: u32, height: u32) -> (f64, f64) {
    let x = width as f64 / 2.0;
    let y = height as f64 - height as f64 * BOTTOM_MARGIN_RATIO;
    (x, y)
}

/// Outline width for a font size.
pub fn stroke_width(font_px: u32) -> f64 {
    font_px as f64 * STROKE_RATIO
}
