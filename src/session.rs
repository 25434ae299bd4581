//! In-memory session: the current image, selected model, and caption state.
//!
//! ```text
//!            capture / reset
//!   ┌──────────────────────────────┐
//!   ▼                              │
//! Idle ──generate──▶ Generating ──resolve──▶ Success(caption)
//!                        ▲       └─resolve──▶ Error(message)
//!                        └──── regenerate / retry ───┘
//! ```
//!
//! The session never awaits on its own. A generation is split into
//! [`Session::begin_generation`], which hands out a [`GenerationTicket`], and
//! [`Session::resolve`], which applies the outcome. This lets the shell keep
//! taking commands while the caption request is in flight.
//!
//! Every capture, reset and new request advances an epoch counter. A
//! resolution carrying an older epoch is stale and dropped, so a slow
//! response can never land on a newer image.

use crate::caption::{CaptionError, CaptionSource, DEFAULT_MODEL, find_model};
use crate::ingest::SourceImage;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("No image loaded. Open or paste an image first.")]
    NoImage,
    #[error("A caption is already being generated.")]
    AlreadyGenerating,
    #[error("Unknown model: {0}")]
    UnknownModel(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Generating,
    Success {
        caption: String,
    },
    Error {
        message: String,
    },
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Generating => "generating",
            SessionState::Success { .. } => "success",
            SessionState::Error { .. } => "error",
        }
    }
}

/// User actions offered in a given state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Generate,
    Regenerate,
    Retry,
    Reset,
}

/// Everything a background generation needs, plus the epoch it belongs to.
#[derive(Debug, Clone)]
pub struct GenerationTicket {
    pub epoch: u64,
    pub image: SourceImage,
    pub model: String,
}

/// Outcome of handing a result back to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Applied,
    Stale,
}

#[derive(Debug)]
pub struct Session {
    image: Option<SourceImage>,
    state: SessionState,
    model: String,
    epoch: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            image: None,
            state: SessionState::Idle,
            model: DEFAULT_MODEL.to_string(),
            epoch: 0,
        }
    }
}

impl Session {
    /// Start an empty session with the given model.
    pub fn new(model: &str) -> Result<Self, SessionError> {
        let mut session = Self::default();
        session.select_model(model)?;
        Ok(session)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn image(&self) -> Option<&SourceImage> {
        self.image.as_ref()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Caption to burn in, if the last generation succeeded.
    pub fn caption(&self) -> Option<&str> {
        match &self.state {
            SessionState::Success { caption } => Some(caption),
            _ => None,
        }
    }

    pub fn is_generating(&self) -> bool {
        self.state == SessionState::Generating
    }

    /// Replace the image. Clears any caption or error and returns to Idle.
    pub fn capture(&mut self, image: SourceImage) {
        if self.is_generating() {
            debug!("new image captured while generating; pending result will be discarded");
        }
        self.image = Some(image);
        self.state = SessionState::Idle;
        self.epoch += 1;
    }

    /// Switch models. Only identifiers on the allow-list are accepted.
    pub fn select_model(&mut self, id: &str) -> Result<(), SessionError> {
        let model = find_model(id).ok_or_else(|| SessionError::UnknownModel(id.to_string()))?;
        self.model = model.id.to_string();
        Ok(())
    }

    /// Enter Generating and hand out a ticket for the request.
    ///
    /// Rejected without any state change when no image is loaded or a
    /// request is already in flight.
    pub fn begin_generation(&mut self) -> Result<GenerationTicket, SessionError> {
        if self.is_generating() {
            return Err(SessionError::AlreadyGenerating);
        }
        let image = self.image.clone().ok_or(SessionError::NoImage)?;
        self.epoch += 1;
        self.state = SessionState::Generating;
        Ok(GenerationTicket {
            epoch: self.epoch,
            image,
            model: self.model.clone(),
        })
    }

    /// Apply the outcome of the request started with epoch `epoch`.
    pub fn resolve(&mut self, epoch: u64, result: Result<String, CaptionError>) -> Resolution {
        if epoch != self.epoch || !self.is_generating() {
            warn!(
                epoch,
                current = self.epoch,
                "discarding stale caption result"
            );
            return Resolution::Stale;
        }
        self.state = match result {
            Ok(caption) => {
                info!(caption = %caption, "caption ready");
                SessionState::Success { caption }
            }
            Err(e) => SessionState::Error {
                message: e.to_string(),
            },
        };
        Resolution::Applied
    }

    /// Discard image, caption and error.
    pub fn reset(&mut self) {
        self.image = None;
        self.state = SessionState::Idle;
        self.epoch += 1;
    }

    /// Run one generation to completion against `source`.
    ///
    /// Convenience for callers with nothing else to do while waiting.
    pub async fn generate(&mut self, source: &dyn CaptionSource) -> Result<Resolution, SessionError> {
        let ticket = self.begin_generation()?;
        let result = source
            .generate_caption(ticket.image.bytes(), ticket.image.mime_type(), &ticket.model)
            .await;
        Ok(self.resolve(ticket.epoch, result))
    }

    /// Actions available in the current state.
    pub fn controls(&self) -> Vec<Control> {
        let primary = match (&self.state, self.image.is_some()) {
            (SessionState::Generating, _) | (_, false) => None,
            (SessionState::Idle, true) => Some(Control::Generate),
            (SessionState::Success { .. }, true) => Some(Control::Regenerate),
            (SessionState::Error { .. }, true) => Some(Control::Retry),
        };
        primary.into_iter().chain([Control::Reset]).collect()
    }
}
