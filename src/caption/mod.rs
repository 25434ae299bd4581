//! Caption generation via a remote multimodal model.
//!
//! [`CaptionSource`] is the seam between the session and the network: it
//! takes encoded image bytes and returns one short "boke" line. The only
//! concrete adapter is [`GeminiCaptionSource`]; tests use
//! [`tests::MockCaptionSource`].
//!
//! A call is a single attempt. There is no retry, backoff or timeout here;
//! retrying is a user action handled by the session.

pub mod gemini;
pub mod prompt;

pub use gemini::GeminiCaptionSource;
pub use prompt::{SamplingConfig, build_prompt};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptionError {
    /// Missing credential or unusable settings. Surfaced per request.
    #[error("{0}")]
    Configuration(String),
    #[error("Request to caption service failed: {0}")]
    Transport(String),
    #[error("Caption service returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("No text generated from {0}.")]
    NoText(String),
}

/// Produces a caption for an encoded image.
#[async_trait]
pub trait CaptionSource: Send + Sync {
    /// Generate one caption for `image` (encoded bytes of type `mime_type`)
    /// with the model `model_id`. The returned text is trimmed.
    async fn generate_caption(
        &self,
        image: &[u8],
        mime_type: &str,
        model_id: &str,
    ) -> Result<String, CaptionError>;
}

/// A selectable caption model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Model {
    pub id: &'static str,
    pub name: &'static str,
}

/// Models the user may choose from. The first entry is the default.
pub const MODELS: &[Model] = &[
    Model {
        id: "gemini-3-pro-preview",
        name: "Gemini 3.0 Pro",
    },
    Model {
        id: "gemini-2.5-pro",
        name: "Gemini 2.5 Pro",
    },
];

/// Identifier of the default model.
pub const DEFAULT_MODEL: &str = "gemini-3-pro-preview";

/// Look up a model on the allow-list.
pub fn find_model(id: &str) -> Option<&'static Model> {
    MODELS.iter().find(|m| m.id == id)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Recorded call to the mock caption source.
    #[derive(Debug, Clone, PartialEq)]
    pub struct RecordedCall {
        pub image_len: usize,
        pub mime_type: String,
        pub model_id: String,
    }

    /// Caption source that replays scripted responses in order.
    ///
    /// When the script runs out, every further call fails with `NoText`.
    pub struct MockCaptionSource {
        responses: Mutex<VecDeque<Result<String, CaptionError>>>,
        pub calls: Mutex<Vec<RecordedCall>>,
    }

    impl MockCaptionSource {
        pub fn new() -> Self {
            Self {
                responses: Mutex::new(VecDeque::new()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn with_captions(captions: &[&str]) -> Self {
            let mock = Self::new();
            for c in captions {
                mock.push(Ok(c.to_string()));
            }
            mock
        }

        pub fn failing(error: CaptionError) -> Self {
            let mock = Self::new();
            mock.push(Err(error));
            mock
        }

        pub fn push(&self, response: Result<String, CaptionError>) {
            self.responses.lock().unwrap().push_back(response);
        }

        pub fn get_calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CaptionSource for MockCaptionSource {
        async fn generate_caption(
            &self,
            image: &[u8],
            mime_type: &str,
            model_id: &str,
        ) -> Result<String, CaptionError> {
            self.calls.lock().unwrap().push(RecordedCall {
                image_len: image.len(),
                mime_type: mime_type.to_string(),
                model_id: model_id.to_string(),
            });
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(CaptionError::NoText("mock".to_string())))
        }
    }

    #[test]
    fn default_model_is_first_on_list() {
        assert_eq!(DEFAULT_MODEL, MODELS[0].id);
        assert_eq!(find_model(DEFAULT_MODEL).unwrap().name, "Gemini 3.0 Pro");
    }

    #[test]
    fn find_model_rejects_unknown() {
        assert!(find_model("gemini-2.5-pro").is_some());
        assert!(find_model("gpt-4o").is_none());
        assert!(find_model("").is_none());
    }

    #[test]
    fn no_text_error_message() {
        let err = CaptionError::NoText("Gemini".to_string());
        assert_eq!(err.to_string(), "No text generated from Gemini.");
    }

    #[tokio::test]
    async fn mock_replays_in_order_and_records_calls() {
        let mock = MockCaptionSource::with_captions(&["一", "二"]);
        assert_eq!(mock.generate_caption(b"abc", "image/png", "m").await.unwrap(), "一");
        assert_eq!(mock.generate_caption(b"abcd", "image/jpeg", "m").await.unwrap(), "二");
        assert!(mock.generate_caption(b"", "image/png", "m").await.is_err());

        let calls = mock.get_calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].image_len, 4);
        assert_eq!(calls[1].mime_type, "image/jpeg");
    }
}
