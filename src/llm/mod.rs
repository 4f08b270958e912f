pub mod chat;
pub mod voice;

use crate::session::biases::Bias;
use crate::session::Role;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChatMode {
    DefineExperience,
    GenerateIdeas,
    ChallengeBiases,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub mode: ChatMode,
    pub experience: String,
    pub history: Vec<HistoryEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_summary: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_ideas: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_suggested_ideas: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idea_comments: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bias_comments: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bias_idea_comments: Option<BTreeMap<String, BTreeMap<String, String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_biases: Option<Vec<Bias>>,
}

impl ChatRequest {
    pub fn new(mode: ChatMode, experience: impl Into<String>, history: Vec<HistoryEntry>) -> Self {
        Self {
            mode,
            experience: experience.into(),
            history,
            force_summary: None,
            summary: None,
            my_ideas: None,
            all_suggested_ideas: None,
            idea_comments: None,
            bias_comments: None,
            bias_idea_comments: None,
            previous_biases: None,
        }
    }
}

/// Chat endpoint response. Older deployments answer with `assistantMessage`.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    #[serde(default)]
    pub raw_text: Option<String>,
    #[serde(default)]
    pub assistant_message: Option<String>,
}

impl ChatReply {
    pub fn into_text(self) -> Result<String, LlmError> {
        [self.raw_text, self.assistant_message]
            .into_iter()
            .flatten()
            .find(|text| !text.trim().is_empty())
            .ok_or_else(|| LlmError::Shape("Received empty response from API".to_string()))
    }
}

/// The chat collaborator the stage workflows talk to.
pub trait ChatBackend {
    fn chat(&self, request: &ChatRequest) -> impl Future<Output = Result<String, LlmError>> + Send;
}

/// Transcription and speech synthesis collaborators.
pub trait SpeechBackend {
    fn transcribe(&self, audio: &[u8]) -> impl Future<Output = Result<String, LlmError>> + Send;
    fn synthesize(&self, text: &str) -> impl Future<Output = Result<Vec<u8>, LlmError>> + Send;
}

/// HTTP client for the app's API routes (`/chat`, `/whisper`, `/tts`).
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Invalid response: {0}")]
    Shape(String),
}

impl Serialize for LlmError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

async fn api_error(resp: reqwest::Response) -> LlmError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    LlmError::Api {
        status: status.as_u16(),
        message: error_message(status, &body),
    }
}

/// Picks the most useful message out of an error body.
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    let from_body = serde_json::from_str::<serde_json::Value>(body).ok().and_then(|value| {
        ["message", "error", "details"]
            .iter()
            .find_map(|key| value.get(*key).and_then(|v| v.as_str()).map(str::to_string))
    });
    from_body
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_else(|| format!("Server error: {}", status.as_u16()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_prefers_raw_text() {
        let reply: ChatReply =
            serde_json::from_str(r#"{"rawText": "hi", "assistantMessage": "old"}"#).unwrap();
        assert_eq!(reply.into_text().unwrap(), "hi");

        let reply: ChatReply = serde_json::from_str(r#"{"rawText": " ", "assistantMessage": "old"}"#).unwrap();
        assert_eq!(reply.into_text().unwrap(), "old");
    }

    #[test]
    fn reply_without_text_is_a_shape_error() {
        let reply: ChatReply = serde_json::from_str(r#"{"usage": 12}"#).unwrap();
        assert!(matches!(reply.into_text(), Err(LlmError::Shape(_))));
    }

    #[test]
    fn request_omits_unset_fields() {
        let mut request = ChatRequest::new(ChatMode::DefineExperience, "exp", Vec::new());
        request.force_summary = Some(true);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["mode"], "define-experience");
        assert_eq!(value["forceSummary"], true);
        assert!(value.get("previousBiases").is_none());
    }

    #[test]
    fn error_message_from_body_or_status() {
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"error": "Text is required"}"#),
            "Text is required"
        );
        assert_eq!(
            error_message(StatusCode::INTERNAL_SERVER_ERROR, r#"{"error": "x", "message": "key missing"}"#),
            "key missing"
        );
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, "<html>"), "Bad Gateway");
    }

    #[test]
    fn base_url_is_normalised() {
        let client = ApiClient::new("http://localhost:3000/api/");
        assert_eq!(client.endpoint("chat"), "http://localhost:3000/api/chat");
    }
}
