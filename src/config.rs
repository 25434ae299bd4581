//! Configuration module.
//!
//! Handles loading, validating, and merging `oogiri.toml`. Stock defaults are
//! the base layer; a user file only overrides the keys it names.
//!
//! ## Config File Location
//!
//! `./oogiri.toml` by default, or any path passed with `--config`. A missing
//! file means stock defaults.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [caption]
//! model = "gemini-3-pro-preview"   # gemini-3-pro-preview | gemini-2.5-pro
//! language = "Chinese"             # Language of the generated line
//! api_key_env = "GEMINI_API_KEY"   # Environment variable holding the API key
//! endpoint = "https://generativelanguage.googleapis.com/v1beta"
//! temperature = 1.2                # 0.0 - 2.0
//! thinking_budget = 1024
//!
//! [render]
//! fonts = ["/usr/share/fonts/opentype/noto/NotoSansCJK-Black.ttc", ...]
//! fill = "#ffffff"                 # Text color
//! stroke = "#000000"               # Outline color
//!
//! [output]
//! dir = "."                        # Where exported PNGs go
//! prefix = "oogiri_meme"           # <prefix>_<unix-millis>.png
//! ```
//!
//! ## Partial Configuration
//!
//! ```toml
//! # Only switch the caption language
//! [caption]
//! language = "Japanese"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::caption::gemini::{DEFAULT_API_KEY_ENV, DEFAULT_ENDPOINT};
use crate::caption::{DEFAULT_MODEL, MODELS, find_model};
use crate::compose::{CaptionStyle, parse_hex_color};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "oogiri.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Application configuration loaded from `oogiri.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OogiriConfig {
    /// Caption generation (model, prompt language, credentials, sampling).
    pub caption: CaptionConfig,
    /// Meme text rendering (fonts, colors).
    pub render: RenderConfig,
    /// Export location and file naming.
    pub output: OutputConfig,
}

impl OogiriConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if find_model(&self.caption.model).is_none() {
            let known: Vec<&str> = MODELS.iter().map(|m| m.id).collect();
            return Err(ConfigError::Validation(format!(
                "caption.model must be one of: {}",
                known.join(", ")
            )));
        }
        if !(0.0..=2.0).contains(&self.caption.temperature) {
            return Err(ConfigError::Validation(
                "caption.temperature must be 0.0-2.0".into(),
            ));
        }
        if self.caption.language.trim().is_empty() {
            return Err(ConfigError::Validation(
                "caption.language must not be empty".into(),
            ));
        }
        if self.caption.api_key_env.trim().is_empty() {
            return Err(ConfigError::Validation(
                "caption.api_key_env must not be empty".into(),
            ));
        }
        if !(self.caption.endpoint.starts_with("https://")
            || self.caption.endpoint.starts_with("http://"))
        {
            return Err(ConfigError::Validation(
                "caption.endpoint must be an http(s) URL".into(),
            ));
        }
        self.render.caption_style()?;
        if self.output.prefix.is_empty() || self.output.prefix.contains(['/', '\\']) {
            return Err(ConfigError::Validation(
                "output.prefix must be a non-empty file name prefix".into(),
            ));
        }
        Ok(())
    }
}

/// Caption generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptionConfig {
    /// Default model identifier; must be on the allow-list.
    pub model: String,
    /// Language the caption is written in.
    pub language: String,
    /// Environment variable read for the API key at request time.
    pub api_key_env: String,
    /// Base URL of the generative language API.
    pub endpoint: String,
    pub temperature: f32,
    pub thinking_budget: u32,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            language: "Chinese".to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            temperature: 1.2,
            thinking_budget: 1024,
        }
    }
}

/// Meme text rendering settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Candidate font files, tried in order. The first one that loads is
    /// used for both measuring and drawing, backed by the bundled face for
    /// characters it lacks.
    pub fonts: Vec<String>,
    /// Text fill color (`#rrggbb`).
    pub fill: String,
    /// Outline color (`#rrggbb`).
    pub stroke: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            fonts: default_fonts(),
            fill: "#ffffff".to_string(),
            stroke: "#000000".to_string(),
        }
    }
}

/// Heavy CJK-capable faces first, then a common bold Latin face.
fn default_fonts() -> Vec<String> {
    [
        "/usr/share/fonts/opentype/noto/NotoSansCJK-Black.ttc",
        "/usr/share/fonts/opentype/noto/NotoSansCJK-Bold.ttc",
        "/usr/share/fonts/noto-cjk/NotoSansCJK-Black.ttc",
        "/usr/share/fonts/noto-cjk/NotoSansCJK-Bold.ttc",
        "/usr/share/fonts/google-noto-cjk/NotoSansCJK-Black.ttc",
        "/usr/share/fonts/truetype/wqy/wqy-zenhei.ttc",
        "/System/Library/Fonts/PingFang.ttc",
        "/System/Library/Fonts/Hiragino Sans GB.ttc",
        "C:\\Windows\\Fonts\\msyhbd.ttc",
        "/Library/Fonts/Arial Bold.ttf",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl RenderConfig {
    pub fn font_paths(&self) -> Vec<PathBuf> {
        self.fonts.iter().map(PathBuf::from).collect()
    }

    /// Parsed fill and outline colors.
    pub fn caption_style(&self) -> Result<CaptionStyle, ConfigError> {
        let parse = |key: &str, value: &str| {
            parse_hex_color(value).map_err(|e| ConfigError::Validation(format!("render.{key}: {e}")))
        };
        Ok(CaptionStyle {
            fill: parse("fill", &self.fill)?,
            stroke: parse("stroke", &self.stroke)?,
        })
    }
}

/// Export settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub dir: String,
    pub prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: ".".to_string(),
            prefix: "oogiri_meme".to_string(),
        }
    }
}

impl OutputConfig {
    /// Default export path for an artifact created at `unix_millis`.
    pub fn export_path(&self, unix_millis: i64) -> PathBuf {
        Path::new(&self.dir).join(crate::compose::export_filename(&self.prefix, unix_millis))
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(OogiriConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file; using stock defaults");
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<OogiriConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: OogiriConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given file.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(path: &Path) -> Result<OogiriConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `oogiri.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Oogiri Configuration
# ====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Only the keys you want to override are needed.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Caption generation
# ---------------------------------------------------------------------------
[caption]
# Default model. One of:
#   gemini-3-pro-preview  (Gemini 3.0 Pro)
#   gemini-2.5-pro        (Gemini 2.5 Pro)
model = "gemini-3-pro-preview"

# Language the boke line is written in.
language = "Chinese"

# Environment variable that holds the API key. Read on every request,
# so the key can be exported after the session has started.
api_key_env = "GEMINI_API_KEY"

# Base URL of the Generative Language API.
endpoint = "https://generativelanguage.googleapis.com/v1beta"

# Sampling temperature (0.0 - 2.0). Higher is more absurd.
temperature = 1.2

# Tokens the model may spend thinking before it answers.
thinking_budget = 1024

# ---------------------------------------------------------------------------
# Meme text rendering
# ---------------------------------------------------------------------------
[render]
# Font files tried in order; the first that loads wins. Use a heavy face
# with CJK coverage for Chinese or Japanese captions. The bundled DejaVu Sans
# Bold covers characters the chosen font lacks, and is used alone when none
# loads (CJK characters then show as boxes).
fonts = [
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Black.ttc",
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Bold.ttc",
    "/usr/share/fonts/noto-cjk/NotoSansCJK-Black.ttc",
    "/usr/share/fonts/noto-cjk/NotoSansCJK-Bold.ttc",
    "/usr/share/fonts/google-noto-cjk/NotoSansCJK-Black.ttc",
    "/usr/share/fonts/truetype/wqy/wqy-zenhei.ttc",
    "/System/Library/Fonts/PingFang.ttc",
    "/System/Library/Fonts/Hiragino Sans GB.ttc",
    'C:\Windows\Fonts\msyhbd.ttc',
    "/Library/Fonts/Arial Bold.ttf",
]

# Text fill and outline colors (#rrggbb).
fill = "#ffffff"
stroke = "#000000"

# ---------------------------------------------------------------------------
# Export
# ---------------------------------------------------------------------------
[output]
# Directory for exported PNGs.
dir = "."

# Files are named <prefix>_<unix-millis>.png
prefix = "oogiri_meme"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = OogiriConfig::default();
        assert_eq!(config.caption.model, "gemini-3-pro-preview");
        assert_eq!(config.caption.language, "Chinese");
        assert_eq!(config.caption.api_key_env, "GEMINI_API_KEY");
        assert_eq!(config.caption.temperature, 1.2);
        assert_eq!(config.caption.thinking_budget, 1024);
        assert_eq!(config.render.fill, "#ffffff");
        assert_eq!(config.render.stroke, "#000000");
        assert_eq!(config.output.prefix, "oogiri_meme");
    }

    #[test]
    fn default_config_is_valid() {
        OogiriConfig::default().validate().unwrap();
    }

    #[test]
    fn stock_toml_matches_defaults() {
        let parsed: OogiriConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(parsed, OogiriConfig::default());
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[caption]
language = "Japanese"
"#;
        let config: OogiriConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.caption.language, "Japanese");
        // Default values preserved
        assert_eq!(config.caption.model, "gemini-3-pro-preview");
        assert_eq!(config.render.fill, "#ffffff");
    }

    #[test]
    fn default_caption_style_is_white_on_black() {
        let style = RenderConfig::default().caption_style().unwrap();
        assert_eq!(style, CaptionStyle::default());
    }

    #[test]
    fn export_path_joins_dir_and_name() {
        let output = OutputConfig {
            dir: "memes".into(),
            prefix: "cat".into(),
        };
        assert_eq!(output.export_path(42), Path::new("memes").join("cat_42.png"));
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("oogiri.toml")).unwrap();
        assert_eq!(config, OogiriConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("oogiri.toml");
        fs::write(
            &path,
            r##"
[caption]
model = "gemini-2.5-pro"
temperature = 0.7

[render]
fonts = ["/opt/fonts/Impact.ttf"]
stroke = "#222222"
"##,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.caption.model, "gemini-2.5-pro");
        assert_eq!(config.caption.temperature, 0.7);
        assert_eq!(config.render.fonts, vec!["/opt/fonts/Impact.ttf"]);
        assert_eq!(config.render.stroke, "#222222");
        // Unspecified values should be defaults
        assert_eq!(config.render.fill, "#ffffff");
        assert_eq!(config.caption.thinking_budget, 1024);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("oogiri.toml");
        fs::write(&path, "this is not valid toml [[[").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str(r#"temperature = 1.2"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"temperature = 0.5"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("temperature").unwrap().as_float(), Some(0.5));
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[caption]
model = "gemini-3-pro-preview"
language = "Chinese"
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[caption]
language = "Korean"
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let caption = merged.get("caption").unwrap();
        assert_eq!(caption.get("language").unwrap().as_str(), Some("Korean"));
        assert_eq!(caption.get("model").unwrap().as_str(), Some("gemini-3-pro-preview"));
    }

    #[test]
    fn merge_toml_arrays_replace() {
        let base: toml::Value = toml::from_str(r#"fonts = ["a.ttf", "b.ttf"]"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"fonts = ["c.ttf"]"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("fonts").unwrap().as_array().unwrap().len(), 1);
    }

    // =========================================================================
    // Unknown key rejection tests
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let toml_str = r#"
[caption]
modle = "gemini-2.5-pro"
"#;
        let result: Result<OogiriConfig, _> = toml::from_str(toml_str);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<OogiriConfig, _> = toml::from_str("[captions]\nmodel = \"x\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_key_rejected_via_load_config() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("oogiri.toml");
        fs::write(&path, "[output]\nfolder = \"memes\"\n").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    fn validation_error(toml_str: &str) -> String {
        let overlay: toml::Value = toml::from_str(toml_str).unwrap();
        match resolve_config(stock_defaults_value(), Some(overlay)) {
            Err(ConfigError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_model_rejected() {
        let msg = validation_error("[caption]\nmodel = \"gpt-4o\"\n");
        assert!(msg.contains("gemini-3-pro-preview"));
        assert!(msg.contains("gemini-2.5-pro"));
    }

    #[test]
    fn temperature_bounds() {
        assert!(validation_error("[caption]\ntemperature = 2.5\n").contains("temperature"));
        assert!(validation_error("[caption]\ntemperature = -0.1\n").contains("temperature"));
        let ok: toml::Value = toml::from_str("[caption]\ntemperature = 2.0\n").unwrap();
        assert!(resolve_config(stock_defaults_value(), Some(ok)).is_ok());
    }

    #[test]
    fn bad_color_rejected() {
        assert!(validation_error("[render]\nfill = \"white\"\n").contains("render.fill"));
        assert!(validation_error("[render]\nstroke = \"#12345\"\n").contains("render.stroke"));
    }

    #[test]
    fn bad_prefix_rejected() {
        assert!(validation_error("[output]\nprefix = \"\"\n").contains("output.prefix"));
        assert!(validation_error("[output]\nprefix = \"a/b\"\n").contains("output.prefix"));
    }

    #[test]
    fn bad_endpoint_rejected() {
        assert!(validation_error("[caption]\nendpoint = \"ftp://x\"\n").contains("endpoint"));
    }

    #[test]
    fn empty_font_list_allowed() {
        let ov: toml::Value = toml::from_str("[render]\nfonts = []\n").unwrap();
        let config = resolve_config(stock_defaults_value(), Some(ov)).unwrap();
        assert!(config.render.font_paths().is_empty());
    }
}
