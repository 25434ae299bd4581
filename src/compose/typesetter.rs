//! Text measurement and rasterization capability.
//!
//! The [`Typesetter`] trait is everything the compositor needs from a font:
//! advance widths for fitting, vertical metrics for anchoring, and an
//! anti-aliased coverage mask for drawing. Keeping it behind a trait means the
//! fitting algorithm runs the same with a real font, with estimated metrics
//! in the last-resort case, or with a mock in tests.
//!
//! Implementations live in [`font`](super::font): [`GlyphTypesetter`] draws
//! real glyph outlines via `ab_glyph` from a chain of faces ending in the
//! bundled one, [`FallbackTypesetter`] only measures.
//!
//! [`GlyphTypesetter`]: super::font::GlyphTypesetter
//! [`FallbackTypesetter`]: super::font::FallbackTypesetter

use image::GrayImage;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TypesetError {
    #[error("IO error reading font {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid font data in {0}")]
    InvalidFont(String),
    #[error("No glyph outlines available for rasterizing text")]
    NoGlyphs,
}

/// Vertical metrics of a line at a given font size, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineMetrics {
    /// Distance from the baseline up to the top of the line box.
    pub ascent: f64,
    /// Distance from the baseline down to the bottom of the line box.
    pub descent: f64,
}

/// Anti-aliased coverage of a rendered line of text.
///
/// `coverage` is tight around the inked pixels. The pen origin (left end of
/// the baseline) sits at `(origin_x, baseline_y)` in mask coordinates, which
/// may lie outside the mask.
#[derive(Debug, Clone)]
pub struct TextMask {
    pub coverage: GrayImage,
    pub origin_x: i32,
    pub baseline_y: i32,
}

/// Font capability used by the compositor.
///
/// Measurement and rasterization must come from the same font and weight so
/// that the fitted size is the size that gets drawn.
pub trait Typesetter {
    /// Short description for logs and status output.
    fn name(&self) -> &str;

    /// Advance width of `text` set at `font_px` pixels per em.
    fn measure(&self, text: &str, font_px: u32) -> f64;

    /// Ascent and descent at `font_px` pixels per em.
    fn line_metrics(&self, font_px: u32) -> LineMetrics;

    /// Rasterize `text` at `font_px` pixels per em.
    fn rasterize(&self, text: &str, font_px: u32) -> Result<TextMask, TypesetError>;
}

impl<T: Typesetter + ?Sized> Typesetter for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn measure(&self, text: &str, font_px: u32) -> f64 {
        (**self).measure(text, font_px)
    }

    fn line_metrics(&self, font_px: u32) -> LineMetrics {
        (**self).line_metrics(font_px)
    }

    fn rasterize(&self, text: &str, font_px: u32) -> Result<TextMask, TypesetError> {
        (**self).rasterize(text, font_px)
    }
}
