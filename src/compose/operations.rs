//! High-level compositing operations.
//!
//! These functions combine the pure [`calculations`](super::calculations) with
//! a [`Typesetter`] to fit a caption, burn it into a copy of the image, and
//! package the result for export.

use super::calculations::{
    allowed_text_width, baseline_font_size, caption_anchor, fitted_font_size, stroke_width,
};
use super::params::{CaptionLayout, CaptionStyle};
use super::typesetter::Typesetter;
use base64::{Engine as _, engine::general_purpose};
use image::{DynamicImage, GrayImage, ImageFormat, Rgb, Rgba, RgbaImage, imageops};
use imageproc::morphology::{Mask, grayscale_dilate};
use imageproc::pixelops::interpolate;
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("Failed to encode PNG: {0}")]
    Encode(image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for compositing operations.
pub type Result<T> = std::result::Result<T, ComposeError>;

/// Fit a caption to an image of the given size without drawing anything.
///
/// Returns `None` for an empty caption. The measurement is always taken at
/// the baseline size with the same typesetter that will draw the text.
pub fn plan_caption(
    typesetter: &dyn Typesetter,
    width: u32,
    height: u32,
    caption: &str,
) -> Option<CaptionLayout> {
    if caption.is_empty() {
        return None;
    }

    let baseline_px = baseline_font_size(height);
    let measured_width = typesetter.measure(caption, baseline_px);
    let allowed_width = allowed_text_width(width);
    let font_px = fitted_font_size(baseline_px, measured_width, allowed_width);
    let line_width = if font_px == baseline_px {
        measured_width
    } else {
        typesetter.measure(caption, font_px)
    };
    let (anchor_x, anchor_y) = caption_anchor(width, height);

    Some(CaptionLayout {
        baseline_px,
        font_px,
        measured_width,
        allowed_width,
        line_width,
        anchor_x,
        anchor_y,
        stroke_width: stroke_width(font_px),
    })
}

/// Burn a caption into a copy of `image`.
///
/// Draw order is outline first, then fill on top. The output always has the
/// input's dimensions; an empty caption returns an untouched clone. Returns
/// the layout that was drawn, or `None` if nothing was drawn.
pub fn burn_caption(
    typesetter: &dyn Typesetter,
    image: &DynamicImage,
    caption: &str,
    style: &CaptionStyle,
) -> (DynamicImage, Option<CaptionLayout>) {
    let Some(layout) = plan_caption(typesetter, image.width(), image.height(), caption) else {
        return (image.clone(), None);
    };

    if layout.font_px == 0 {
        debug!(?layout, "caption font size rounds to zero; nothing drawn");
        return (image.clone(), None);
    }

    let mask = match typesetter.rasterize(caption, layout.font_px) {
        Ok(mask) => mask,
        Err(e) => {
            warn!("caption not drawn with {}: {e}", typesetter.name());
            return (image.clone(), None);
        }
    };

    debug!(
        font_px = layout.font_px,
        baseline_px = layout.baseline_px,
        measured = layout.measured_width,
        allowed = layout.allowed_width,
        "drawing caption"
    );

    let metrics = typesetter.line_metrics(layout.font_px);
    // Bottom-anchored: the descender line sits on anchor_y.
    let pen_x = layout.anchor_x - layout.line_width / 2.0;
    let baseline = layout.anchor_y - metrics.descent;
    let mask_left = (pen_x.round() as i64) - mask.origin_x as i64;
    let mask_top = (baseline.round() as i64) - mask.baseline_y as i64;

    let radius = stroke_radius(layout.stroke_width);
    let outline = outline_mask(&mask.coverage, radius);

    let mut canvas = image.to_rgba8();
    paint(
        &mut canvas,
        &outline,
        mask_left - radius as i64,
        mask_top - radius as i64,
        style.stroke,
    );
    paint(&mut canvas, &mask.coverage, mask_left, mask_top, style.fill);

    (DynamicImage::ImageRgba8(canvas), Some(layout))
}

/// Outline radius in whole pixels: half the stroke width, straddling the glyph edge.
fn stroke_radius(stroke_width: f64) -> u8 {
    (stroke_width / 2.0).round().clamp(0.0, u8::MAX as f64) as u8
}

/// Grow the coverage by `radius` pixels with a disk, giving round joins.
///
/// Each outline pixel takes the strongest coverage within the disk, so faint
/// anti-aliased fringes stay faint and the outline edge keeps its smoothing.
/// The result is padded by `radius` on every side so the outline is never clipped.
fn outline_mask(coverage: &GrayImage, radius: u8) -> GrayImage {
    let pad = radius as u32;
    let mut padded = GrayImage::new(coverage.width() + 2 * pad, coverage.height() + 2 * pad);
    imageops::replace(&mut padded, coverage, pad as i64, pad as i64);
    if radius == 0 {
        return padded;
    }
    grayscale_dilate(&padded, &Mask::disk(radius))
}

/// Blend `color` into `canvas` using `mask` as alpha, with the mask's top-left at (left, top).
fn paint(canvas: &mut RgbaImage, mask: &GrayImage, left: i64, top: i64, color: Rgb<u8>) {
    let (cw, ch) = (canvas.width() as i64, canvas.height() as i64);
    let paint = Rgba([color.0[0], color.0[1], color.0[2], 255]);

    for (x, y, coverage) in mask.enumerate_pixels() {
        let alpha = coverage.0[0];
        if alpha == 0 {
            continue;
        }
        let cx = left + x as i64;
        let cy = top + y as i64;
        if cx < 0 || cy < 0 || cx >= cw || cy >= ch {
            continue;
        }
        let dst = canvas.get_pixel_mut(cx as u32, cy as u32);
        *dst = if alpha == 255 {
            paint
        } else {
            interpolate(paint, *dst, alpha as f32 / 255.0)
        };
    }
}

/// A composited image and its PNG export.
///
/// Always a fresh derivation from a source image and a caption; re-render
/// rather than mutating.
#[derive(Debug, Clone)]
pub struct RenderedArtifact {
    pub image: DynamicImage,
    pub layout: Option<CaptionLayout>,
    png: Vec<u8>,
}

impl RenderedArtifact {
    /// Encoded PNG bytes.
    pub fn png_bytes(&self) -> &[u8] {
        &self.png
    }

    /// Shareable `data:image/png;base64,...` URI.
    pub fn data_uri(&self) -> String {
        format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode(&self.png)
        )
    }

    /// Write the PNG to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.png)?;
        Ok(())
    }
}

/// Render `caption` onto `source` and encode the result as PNG.
pub fn render_artifact(
    typesetter: &dyn Typesetter,
    source: &DynamicImage,
    caption: &str,
    style: &CaptionStyle,
) -> Result<RenderedArtifact> {
    let (image, layout) = burn_caption(typesetter, source, caption, style);
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(ComposeError::Encode)?;
    Ok(RenderedArtifact { image, layout, png })
}

/// Timestamped download name, e.g. `oogiri_meme_1700000000000.png`.
pub fn export_filename(prefix: &str, unix_millis: i64) -> String {
    format!("{prefix}_{unix_millis}.png")
}
