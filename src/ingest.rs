//! Image ingestion: files, stdin, dropped file lists and pasted data URIs.
//!
//! Everything ends up as a [`SourceImage`]: the untouched encoded bytes plus
//! a MIME type sniffed from the content (file extensions are not trusted).
//! The bytes are shared read-only, so handing the image to a background
//! generation task is a reference-count bump.

use base64::{Engine as _, engine::general_purpose};
use image::{DynamicImage, ImageFormat};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Not a supported image: {0}")]
    NotAnImage(String),
    #[error("Invalid data URI: expected data:image/<png|jpeg|jpg|webp>;base64,<payload>")]
    InvalidDataUri,
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
}

/// Data URI media types accepted on paste.
const DATA_URI_SUBTYPES: &[&str] = &["png", "jpeg", "jpg", "webp"];

/// A user-supplied raster image, still encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    bytes: Arc<[u8]>,
    mime_type: &'static str,
    /// Where the image came from, for display.
    label: String,
}

impl SourceImage {
    /// Wrap encoded bytes, sniffing the format from the content.
    pub fn from_bytes(bytes: Vec<u8>, label: &str) -> Result<Self, IngestError> {
        let format = image::guess_format(&bytes)
            .map_err(|_| IngestError::NotAnImage(label.to_string()))?;
        if !format.reading_enabled() {
            return Err(IngestError::NotAnImage(label.to_string()));
        }
        let mime_type = format.to_mime_type();
        debug!(source = label, mime_type, bytes = bytes.len(), "captured image");
        Ok(Self {
            bytes: bytes.into(),
            mime_type,
            label: label.to_string(),
        })
    }

    /// Read an image file.
    pub fn open(path: &Path) -> Result<Self, IngestError> {
        let bytes = std::fs::read(path).map_err(|source| IngestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(bytes, &path.display().to_string())
    }

    /// Read an image from a stream (stdin for `-`).
    pub fn from_reader(mut reader: impl Read, label: &str) -> Result<Self, IngestError> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|source| IngestError::Io {
                path: PathBuf::from(label),
                source,
            })?;
        Self::from_bytes(bytes, label)
    }

    /// Parse a pasted `data:image/...;base64,...` URI.
    ///
    /// The declared media type only gates acceptance; the stored MIME type is
    /// sniffed from the decoded bytes.
    pub fn from_data_uri(uri: &str) -> Result<Self, IngestError> {
        let payload = strip_data_uri_prefix(uri.trim()).ok_or(IngestError::InvalidDataUri)?;
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = general_purpose::STANDARD.decode(compact)?;
        Self::from_bytes(bytes, "pasted image")
    }

    /// Load the first path in a dropped list; the rest are ignored.
    pub fn first_of(paths: &[PathBuf]) -> Result<Option<Self>, IngestError> {
        let Some(first) = paths.first() else {
            return Ok(None);
        };
        if paths.len() > 1 {
            debug!(ignored = paths.len() - 1, "using first dropped file only");
        }
        if first.as_os_str() == "-" {
            return Self::from_reader(std::io::stdin().lock(), "stdin").map(Some);
        }
        Self::open(first).map(Some)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// `data:<mime>;base64,<payload>` for sharing or re-pasting.
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            general_purpose::STANDARD.encode(&self.bytes)
        )
    }

    /// Decode into pixels for compositing.
    pub fn decode(&self) -> Result<DynamicImage, IngestError> {
        let format = ImageFormat::from_mime_type(self.mime_type)
            .ok_or_else(|| IngestError::NotAnImage(self.label.clone()))?;
        Ok(image::load_from_memory_with_format(&self.bytes, format)?)
    }
}

/// Payload of an image data URI, or `None` if the prefix is not accepted.
fn strip_data_uri_prefix(uri: &str) -> Option<&str> {
    let rest = uri.strip_prefix("data:image/")?;
    let (subtype, payload) = rest.split_once(";base64,")?;
    DATA_URI_SUBTYPES
        .contains(&subtype.to_ascii_lowercase().as_str())
        .then_some(payload)
}
