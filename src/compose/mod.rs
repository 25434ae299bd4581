//! Meme compositing: caption fitting and outlined text on a copy of the image.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Measure / rasterize** | `ab_glyph` via [`GlyphTypesetter`] (configured font + bundled face) |
//! | **Outline** | `imageproc::morphology::grayscale_dilate` (disk mask, round joins) |
//! | **Blend** | `imageproc::pixelops::interpolate` |
//! | **Export** | `image` PNG encoder + `base64` data URI |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for font-size fitting and anchoring (unit testable)
//! - **Parameters**: Data structures describing the caption to draw
//! - **Typesetter**: [`Typesetter`] trait + [`GlyphTypesetter`] / [`FallbackTypesetter`]
//! - **Operations**: High-level functions combining calculations + typesetter

mod calculations;
pub mod font;
pub mod operations;
mod params;
pub mod typesetter;

pub use calculations::{
    BASELINE_HEIGHT_RATIO, MAX_WIDTH_RATIO, allowed_text_width, baseline_font_size,
    caption_anchor, fitted_font_size, stroke_width,
};
pub use font::{FallbackTypesetter, GlyphTypesetter, load_typesetter};
pub use operations::{
    ComposeError, RenderedArtifact, burn_caption, export_filename, plan_caption, render_artifact,
};
pub use params::{CaptionLayout, CaptionStyle, ColorParseError, parse_hex_color};
pub use typesetter::{LineMetrics, TextMask, TypesetError, Typesetter};
