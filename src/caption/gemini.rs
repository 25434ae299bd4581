//! Google Gemini `generateContent` adapter.
//!
//! One REST call per caption:
//!
//! ```text
//! POST {endpoint}/models/{model}:generateContent
//! x-goog-api-key: $GEMINI_API_KEY
//!
//! { "contents": [{ "parts": [{ "inlineData": {...} }, { "text": prompt }] }],
//!   "generationConfig": { "temperature": 1.2, "thinkingConfig": { "thinkingBudget": 1024 } } }
//! ```
//!
//! The API key is read from the environment on every call, so a missing key
//! fails that request only and can be fixed without restarting.

use super::prompt::{SamplingConfig, build_prompt};
use super::{CaptionError, CaptionSource};
use crate::config::CaptionConfig;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Caption source backed by the Gemini REST API.
pub struct GeminiCaptionSource {
    client: reqwest::Client,
    endpoint: String,
    api_key_env: String,
    prompt: String,
    sampling: SamplingConfig,
}

impl GeminiCaptionSource {
    pub fn new(endpoint: &str, api_key_env: &str, language: &str, sampling: SamplingConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key_env: api_key_env.to_string(),
            prompt: build_prompt(language),
            sampling,
        }
    }

    pub fn from_config(config: &CaptionConfig) -> Self {
        Self::new(
            &config.endpoint,
            &config.api_key_env,
            &config.language,
            SamplingConfig {
                temperature: config.temperature,
                thinking_budget: config.thinking_budget,
            },
        )
    }

    fn api_key(&self) -> Result<String, CaptionError> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(CaptionError::Configuration(format!(
                "API Key is missing. Please set the {} environment variable.",
                self.api_key_env
            ))),
        }
    }

    fn url(&self, model_id: &str) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, model_id)
    }
}

#[async_trait]
impl CaptionSource for GeminiCaptionSource {
    async fn generate_caption(
        &self,
        image: &[u8],
        mime_type: &str,
        model_id: &str,
    ) -> Result<String, CaptionError> {
        let api_key = self.api_key()?;
        let body = build_request(image, mime_type, &self.prompt, self.sampling);

        debug!(model = model_id, mime_type, bytes = image.len(), "requesting caption");
        let response = self
            .client
            .post(self.url(model_id))
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CaptionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CaptionError::Api {
                status: status.as_u16(),
                message: api_error_message(&text),
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| CaptionError::Transport(e.to_string()))?;

        let caption =
            extract_caption(&parsed).ok_or_else(|| CaptionError::NoText("Gemini".to_string()))?;
        info!(model = model_id, caption = %caption, "caption generated");
        Ok(caption)
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum Part<'a> {
    InlineData(InlineData<'a>),
    Text(&'a str),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    thinking_config: ThinkingConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    /// Set on reasoning summaries, which are not part of the answer.
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Image first, then the instruction.
pub(crate) fn build_request<'a>(
    image: &[u8],
    mime_type: &'a str,
    prompt: &'a str,
    sampling: SamplingConfig,
) -> GenerateContentRequest<'a> {
    GenerateContentRequest {
        contents: vec![Content {
            parts: vec![
                Part::InlineData(InlineData {
                    mime_type,
                    data: general_purpose::STANDARD.encode(image),
                }),
                Part::Text(prompt),
            ],
        }],
        generation_config: GenerationConfig {
            temperature: sampling.temperature,
            thinking_config: ThinkingConfig {
                thinking_budget: sampling.thinking_budget,
            },
        },
    }
}

/// Answer text of the first candidate, thoughts excluded, trimmed.
///
/// `None` when there is no candidate or the answer is blank.
pub(crate) fn extract_caption(response: &GenerateContentResponse) -> Option<String> {
    let content = response.candidates.first()?.content.as_ref()?;
    let text: String = content
        .parts
        .iter()
        .filter(|p| !p.thought)
        .filter_map(|p| p.text.as_deref())
        .collect();
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Human-readable message from an error response body.
fn api_error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if body.trim().is_empty() => "empty response".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(value: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn request_body_matches_wire_format() {
        let body = build_request(b"\x89PNG", "image/png", "be funny", SamplingConfig::default());
        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(
            value,
            json!({
                "contents": [{
                    "parts": [
                        { "inlineData": { "mimeType": "image/png", "data": "iVBORw==" } },
                        { "text": "be funny" }
                    ]
                }],
                "generationConfig": {
                    "temperature": 1.2f32,
                    "thinkingConfig": { "thinkingBudget": 1024 }
                }
            })
        );
    }

    #[test]
    fn extract_trims_answer() {
        let r = response(json!({
            "candidates": [{ "content": { "parts": [{ "text": "  猫也想上班  \n" }] } }]
        }));
        assert_eq!(extract_caption(&r).as_deref(), Some("猫也想上班"));
    }

    #[test]
    fn extract_skips_thought_parts() {
        let r = response(json!({
            "candidates": [{ "content": { "parts": [
                { "text": "Let me think about this image...", "thought": true },
                { "text": "老板说今天" },
                { "text": "不用加班" }
            ] } }]
        }));
        assert_eq!(extract_caption(&r).as_deref(), Some("老板说今天不用加班"));
    }

    #[test]
    fn extract_uses_first_candidate_only() {
        let r = response(json!({
            "candidates": [
                { "content": { "parts": [{ "text": "first" }] } },
                { "content": { "parts": [{ "text": "second" }] } }
            ]
        }));
        assert_eq!(extract_caption(&r).as_deref(), Some("first"));
    }

    #[test]
    fn extract_none_without_text() {
        assert!(extract_caption(&response(json!({}))).is_none());
        assert!(extract_caption(&response(json!({ "candidates": [] }))).is_none());
        // Blocked prompts come back with a candidate but no content.
        assert!(
            extract_caption(&response(json!({ "candidates": [{ "finishReason": "SAFETY" }] })))
                .is_none()
        );
        assert!(
            extract_caption(&response(
                json!({ "candidates": [{ "content": { "parts": [{ "text": "   " }] } }] })
            ))
            .is_none()
        );
    }

    #[test]
    fn api_error_message_prefers_envelope() {
        let body = r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(api_error_message(body), "API key not valid.");
        assert_eq!(api_error_message("upstream timeout\n"), "upstream timeout");
        assert_eq!(api_error_message(""), "empty response");
    }

    #[test]
    fn url_joins_endpoint_and_model() {
        let source = GeminiCaptionSource::new(
            "https://example.test/v1beta/",
            DEFAULT_API_KEY_ENV,
            "Chinese",
            SamplingConfig::default(),
        );
        assert_eq!(
            source.url("gemini-2.5-pro"),
            "https://example.test/v1beta/models/gemini-2.5-pro:generateContent"
        );
    }

    #[tokio::test]
    async fn missing_key_is_configuration_error() {
        let source = GeminiCaptionSource::new(
            DEFAULT_ENDPOINT,
            "OOGIRI_TEST_KEY_THAT_IS_NEVER_SET",
            "Chinese",
            SamplingConfig::default(),
        );
        let err = source
            .generate_caption(b"bytes", "image/png", "gemini-2.5-pro")
            .await
            .unwrap_err();
        match err {
            CaptionError::Configuration(msg) => {
                assert!(msg.starts_with("API Key is missing"));
                assert!(msg.contains("OOGIRI_TEST_KEY_THAT_IS_NEVER_SET"));
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }
}
