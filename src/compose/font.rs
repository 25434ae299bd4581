//! Font-backed typesetters.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Parse TTF/OTF/TTC | `ab_glyph::FontVec::try_from_vec_and_index` |
//! | Bundled face | `ab_glyph::FontArc::try_from_slice` over `include_bytes!` |
//! | Advances + kerning | `ab_glyph::ScaleFont::{h_advance, kern}` |
//! | Glyph coverage | `ab_glyph::OutlinedGlyph::draw` |
//!
//! Font sizes are CSS-style pixels per em. `ab_glyph` scales by line height
//! (ascent − descent), so [`GlyphTypesetter`] converts em size to a
//! [`PxScale`] through each face's units-per-em.
//!
//! A [`GlyphTypesetter`] holds a chain of faces. Each character is set in the
//! first face that has a glyph for it, so the bundled DejaVu Sans Bold fills
//! in whatever the configured font lacks, and stands alone when no configured
//! font can be read. [`FallbackTypesetter`] is only used if even the bundled
//! face fails to parse.

use super::typesetter::{LineMetrics, TextMask, Typesetter, TypesetError};
use ab_glyph::{Font, FontArc, FontVec, Glyph, GlyphId, PxScale, ScaleFont, point};
use image::GrayImage;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// DejaVu Sans Bold, compiled into the binary (Bitstream Vera license, see
/// `assets/fonts/DejaVu-LICENSE.txt`). Covers Latin, Greek and Cyrillic; CJK
/// characters fall back to its box glyph.
pub const BUNDLED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans-Bold.ttf");

const BUNDLED_FONT_NAME: &str = "DejaVu Sans Bold (bundled)";

/// Typesetter drawing real glyph outlines from one or more loaded faces.
pub struct GlyphTypesetter {
    /// Never empty; the first face is the primary one.
    faces: Vec<FontArc>,
    name: String,
}

impl GlyphTypesetter {
    /// Parse font bytes (first face of a collection).
    pub fn from_bytes(bytes: Vec<u8>, name: &str) -> Result<Self, TypesetError> {
        let font = FontVec::try_from_vec_and_index(bytes, 0)
            .map_err(|_| TypesetError::InvalidFont(name.to_string()))?;
        Ok(Self {
            faces: vec![FontArc::new(font)],
            name: name.to_string(),
        })
    }

    /// Read and parse a font file.
    pub fn open(path: &Path) -> Result<Self, TypesetError> {
        let bytes = std::fs::read(path).map_err(|source| TypesetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(bytes, &path.display().to_string())
    }

    /// The face shipped inside the binary.
    pub fn bundled() -> Result<Self, TypesetError> {
        let font = FontArc::try_from_slice(BUNDLED_FONT)
            .map_err(|_| TypesetError::InvalidFont(BUNDLED_FONT_NAME.to_string()))?;
        Ok(Self {
            faces: vec![font],
            name: BUNDLED_FONT_NAME.to_string(),
        })
    }

    /// Append `other`'s faces for characters this typesetter has no glyph for.
    pub fn with_fallback(mut self, other: GlyphTypesetter) -> Self {
        self.name = format!("{} + {}", self.name, other.name);
        self.faces.extend(other.faces);
        self
    }

    /// Index of the first face with a glyph for `c`; the primary face otherwise.
    fn face_for(&self, c: char) -> usize {
        self.faces
            .iter()
            .position(|face| face.glyph_id(c) != GlyphId(0))
            .unwrap_or(0)
    }

    /// Position each glyph along a baseline at y = 0, starting at x = 0.
    ///
    /// Returns each glyph with the index of its face, and the total advance width.
    fn layout(&self, text: &str, font_px: u32) -> (Vec<(usize, Glyph)>, f32) {
        let mut glyphs = Vec::with_capacity(text.len());
        let mut caret = 0.0f32;
        let mut previous: Option<(usize, GlyphId)> = None;

        for c in text.chars() {
            let index = self.face_for(c);
            let face = &self.faces[index];
            let scale = em_scale(face, font_px);
            let scaled = face.as_scaled(scale);
            let id = scaled.glyph_id(c);
            // Kerning pairs only exist within one face.
            if let Some((_, prev_id)) = previous.filter(|(prev_index, _)| *prev_index == index) {
                caret += scaled.kern(prev_id, id);
            }
            glyphs.push((index, id.with_scale_and_position(scale, point(caret, 0.0))));
            caret += scaled.h_advance(id);
            previous = Some((index, id));
        }

        (glyphs, caret)
    }
}

/// Convert pixels-per-em into the line-height scale `ab_glyph` expects.
fn em_scale(face: &FontArc, font_px: u32) -> PxScale {
    let em = font_px as f32;
    match face.units_per_em() {
        Some(units) if units > 0.0 => PxScale::from(em * face.height_unscaled() / units),
        _ => PxScale::from(em),
    }
}

impl Typesetter for GlyphTypesetter {
    fn name(&self) -> &str {
        &self.name
    }

    fn measure(&self, text: &str, font_px: u32) -> f64 {
        self.layout(text, font_px).1 as f64
    }

    /// Vertical metrics of the primary face.
    fn line_metrics(&self, font_px: u32) -> LineMetrics {
        let primary = &self.faces[0];
        let scaled = primary.as_scaled(em_scale(primary, font_px));
        LineMetrics {
            ascent: scaled.ascent() as f64,
            descent: -scaled.descent() as f64,
        }
    }

    fn rasterize(&self, text: &str, font_px: u32) -> Result<TextMask, TypesetError> {
        let (glyphs, _) = self.layout(text, font_px);
        let outlined: Vec<_> = glyphs
            .into_iter()
            .filter_map(|(index, g)| self.faces[index].outline_glyph(g))
            .collect();

        if outlined.is_empty() {
            // Whitespace-only text: nothing to ink.
            return Ok(TextMask {
                coverage: GrayImage::new(1, 1),
                origin_x: 0,
                baseline_y: 0,
            });
        }

        let min_x = outlined.iter().map(|g| g.px_bounds().min.x).fold(f32::MAX, f32::min);
        let min_y = outlined.iter().map(|g| g.px_bounds().min.y).fold(f32::MAX, f32::min);
        let max_x = outlined.iter().map(|g| g.px_bounds().max.x).fold(f32::MIN, f32::max);
        let max_y = outlined.iter().map(|g| g.px_bounds().max.y).fold(f32::MIN, f32::max);

        let left = min_x.floor() as i32;
        let top = min_y.floor() as i32;
        let width = (max_x.ceil() as i32 - left).max(1) as u32;
        let height = (max_y.ceil() as i32 - top).max(1) as u32;
        let mut coverage = GrayImage::new(width, height);

        for glyph in &outlined {
            let bounds = glyph.px_bounds();
            let gx = bounds.min.x as i32 - left;
            let gy = bounds.min.y as i32 - top;
            glyph.draw(|x, y, c| {
                let px = gx + x as i32;
                let py = gy + y as i32;
                if px < 0 || py < 0 || px as u32 >= width || py as u32 >= height {
                    return;
                }
                let value = (c.clamp(0.0, 1.0) * 255.0).round() as u8;
                let pixel = coverage.get_pixel_mut(px as u32, py as u32);
                // Overlapping glyphs (kerning, combining marks) keep the stronger coverage.
                pixel.0[0] = pixel.0[0].max(value);
            });
        }

        Ok(TextMask {
            coverage,
            origin_x: -left,
            baseline_y: -top,
        })
    }
}

/// Measurement-only typesetter, the last resort when not even the bundled
/// face can be parsed.
///
/// Advances are estimated per character class: full-width (CJK, kana,
/// hangul, full-width forms) one em, spaces 0.3 em, everything else 0.6 em.
#[derive(Debug, Default)]
pub struct FallbackTypesetter;

impl FallbackTypesetter {
    const ASCENT_EM: f64 = 0.88;
    const DESCENT_EM: f64 = 0.12;

    fn advance_em(c: char) -> f64 {
        if c.is_whitespace() {
            0.3
        } else if is_full_width(c) {
            1.0
        } else {
            0.6
        }
    }
}

fn is_full_width(c: char) -> bool {
    matches!(c as u32,
        0x1100..=0x115F      // Hangul Jamo
        | 0x2E80..=0x303E    // CJK radicals, punctuation
        | 0x3040..=0x33FF    // Kana, CJK compatibility
        | 0x3400..=0x4DBF    // CJK extension A
        | 0x4E00..=0x9FFF    // CJK unified ideographs
        | 0xAC00..=0xD7A3    // Hangul syllables
        | 0xF900..=0xFAFF    // CJK compatibility ideographs
        | 0xFE30..=0xFE4F    // CJK compatibility forms
        | 0xFF00..=0xFF60    // Full-width forms
        | 0xFFE0..=0xFFE6
        | 0x1F300..=0x1FAFF  // Emoji
        | 0x20000..=0x3FFFD) // CJK extensions B+
}

impl Typesetter for FallbackTypesetter {
    fn name(&self) -> &str {
        "estimated metrics (no font)"
    }

    fn measure(&self, text: &str, font_px: u32) -> f64 {
        text.chars().map(Self::advance_em).sum::<f64>() * font_px as f64
    }

    fn line_metrics(&self, font_px: u32) -> LineMetrics {
        LineMetrics {
            ascent: Self::ASCENT_EM * font_px as f64,
            descent: Self::DESCENT_EM * font_px as f64,
        }
    }

    fn rasterize(&self, _text: &str, _font_px: u32) -> Result<TextMask, TypesetError> {
        Err(TypesetError::NoGlyphs)
    }
}

/// Load the first usable font from a list of candidate files, backed by the
/// bundled face.
///
/// Candidates are tried in order; unreadable or invalid files are logged and
/// skipped. The bundled face covers characters the chosen font lacks, and is
/// used alone when no candidate loads. Only if it cannot be parsed either
/// does this return a [`FallbackTypesetter`].
pub fn load_typesetter(candidates: &[PathBuf]) -> Box<dyn Typesetter + Send + Sync> {
    let configured = candidates.iter().find_map(|path| {
        if !path.exists() {
            debug!(font = %path.display(), "font candidate not present");
            return None;
        }
        match GlyphTypesetter::open(path) {
            Ok(ts) => {
                debug!(font = %path.display(), "loaded caption font");
                Some(ts)
            }
            Err(e) => {
                warn!("skipping caption font: {e}");
                None
            }
        }
    });

    let bundled = match GlyphTypesetter::bundled() {
        Ok(ts) => Some(ts),
        Err(e) => {
            warn!("bundled caption font unusable: {e}");
            None
        }
    };

    match (configured, bundled) {
        (Some(primary), Some(bundled)) => Box::new(primary.with_fallback(bundled)),
        (Some(primary), None) => Box::new(primary),
        (None, Some(bundled)) => {
            warn!(
                "no usable caption font among {} candidates; using {BUNDLED_FONT_NAME}",
                candidates.len()
            );
            Box::new(bundled)
        }
        (None, None) => {
            warn!("no caption font at all; captions will be sized with estimated metrics and not drawn");
            Box::new(FallbackTypesetter)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::plan_caption;

    fn bundled() -> GlyphTypesetter {
        GlyphTypesetter::bundled().unwrap()
    }

    // =========================================================================
    // FallbackTypesetter tests
    // =========================================================================

    #[test]
    fn fallback_measures_cjk_as_full_em() {
        let ts = FallbackTypesetter;
        assert_eq!(ts.measure("今天天气不错", 64), 384.0);
    }

    #[test]
    fn fallback_measures_latin_narrower() {
        let ts = FallbackTypesetter;
        let latin = ts.measure("abc", 100);
        assert!((latin - 180.0).abs() < 1e-9);
    }

    #[test]
    fn fallback_measures_spaces() {
        let ts = FallbackTypesetter;
        assert!((ts.measure("a b", 10) - 15.0).abs() < 1e-9);
    }

    #[test]
    fn fallback_cannot_rasterize() {
        assert!(matches!(
            FallbackTypesetter.rasterize("x", 10),
            Err(TypesetError::NoGlyphs)
        ));
    }

    #[test]
    fn fallback_metrics_scale_with_size() {
        let m = FallbackTypesetter.line_metrics(100);
        assert!((m.ascent - 88.0).abs() < 1e-9);
        assert!((m.descent - 12.0).abs() < 1e-9);
    }

    // =========================================================================
    // Loading tests
    // =========================================================================

    #[test]
    fn invalid_font_bytes_rejected() {
        let result = GlyphTypesetter::from_bytes(b"not a font".to_vec(), "junk");
        assert!(matches!(result, Err(TypesetError::InvalidFont(name)) if name == "junk"));
    }

    #[test]
    fn open_missing_font_is_io_error() {
        let result = GlyphTypesetter::open(Path::new("/nonexistent/font.ttf"));
        assert!(matches!(result, Err(TypesetError::Io { .. })));
    }

    #[test]
    fn bundled_font_parses() {
        assert_eq!(bundled().name(), BUNDLED_FONT_NAME);
    }

    #[test]
    fn load_typesetter_uses_bundled_font_without_candidates() {
        let ts = load_typesetter(&[]);
        assert_eq!(ts.name(), BUNDLED_FONT_NAME);
    }

    #[test]
    fn load_typesetter_skips_unusable_candidates() {
        let tmp = tempfile::TempDir::new().unwrap();
        let junk = tmp.path().join("junk.ttf");
        std::fs::write(&junk, b"definitely not a font").unwrap();

        let ts = load_typesetter(&[PathBuf::from("/nonexistent/a.ttf"), junk]);
        assert_eq!(ts.name(), BUNDLED_FONT_NAME);
    }

    #[test]
    fn load_typesetter_puts_configured_font_first() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("caption.ttf");
        std::fs::write(&path, BUNDLED_FONT).unwrap();

        let ts = load_typesetter(&[PathBuf::from("/nonexistent/a.ttf"), path.clone()]);
        assert_eq!(
            ts.name(),
            format!("{} + {BUNDLED_FONT_NAME}", path.display())
        );
    }

    // =========================================================================
    // GlyphTypesetter tests (bundled face)
    // =========================================================================

    #[test]
    fn glyph_typesetter_measures_proportionally() {
        let ts = bundled();
        let small = ts.measure("Hello", 20);
        let large = ts.measure("Hello", 40);
        assert!(small > 0.0);
        assert!((large / small - 2.0).abs() < 0.05);
    }

    #[test]
    fn glyph_typesetter_uses_em_size() {
        // DejaVu's box glyph advances 1229/2048 em.
        let ts = bundled();
        let width = ts.measure("今", 2048);
        assert!((width - 1229.0).abs() < 1.0, "advance {width}");
    }

    #[test]
    fn glyph_typesetter_rasterizes_ink() {
        let ts = bundled();
        let mask = ts.rasterize("Hi", 48).unwrap();
        assert!(mask.coverage.pixels().any(|p| p.0[0] >= 250));
        // Baseline sits below the top of capital letters.
        assert!(mask.baseline_y > 0);
        assert!(mask.coverage.width() as f64 <= ts.measure("Hi", 48) + 4.0);
    }

    #[test]
    fn glyph_typesetter_rasterizes_missing_characters_as_boxes() {
        let mask = bundled().rasterize("今天", 64).unwrap();
        assert!(mask.coverage.pixels().any(|p| p.0[0] > 200));
    }

    #[test]
    fn glyph_typesetter_whitespace_has_no_ink() {
        let mask = bundled().rasterize("   ", 32).unwrap();
        assert!(mask.coverage.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn glyph_typesetter_metrics_positive() {
        let m = bundled().line_metrics(64);
        assert!(m.ascent > 0.0);
        assert!(m.descent > 0.0);
        // The line box of DejaVu is taller than one em.
        let line = m.ascent + m.descent;
        assert!(line > 64.0 && line < 80.0, "line height {line}");
    }

    #[test]
    fn fallback_chain_keeps_measurements_of_covered_text() {
        let chained = bundled().with_fallback(bundled());
        assert!(chained.name().contains(" + "));
        assert_eq!(chained.measure("Hello", 30), bundled().measure("Hello", 30));
    }

    #[test]
    fn real_font_fits_short_caption_at_baseline() {
        let ts = bundled();
        let layout = plan_caption(&ts, 1000, 800, "今天天气不错").unwrap();
        assert_eq!(layout.font_px, 64);
        assert!(layout.line_width <= 900.0);
        assert!(!layout.was_scaled());
    }

    #[test]
    fn real_font_scales_long_caption_within_budget() {
        let ts = bundled();
        let caption = "The office cat has filed for unemployment benefits again";
        let layout = plan_caption(&ts, 500, 500, caption).unwrap();
        assert!(layout.font_px < layout.baseline_px);
        assert!(layout.line_width <= 450.0);
    }
}
