//! Wire payloads for the Ollama HTTP API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `POST /api/generate` body.
#[derive(Debug, Serialize)]
pub struct GenerateRequest<'a> {
    /// Model name.
    pub model: &'a str,
    /// Prompt text.
    pub prompt: &'a str,
    /// Base64-encoded images for vision models.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<&'a str>>,
    /// Always `false`: replies are relayed in one piece.
    pub stream: bool,
}

/// One message of a `POST /api/chat` body.
#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    /// Author role.
    pub role: &'a str,
    /// Message text.
    pub content: &'a str,
    /// Base64-encoded images attached to the message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<&'a str>>,
}

/// `POST /api/chat` body.
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    /// Model name.
    pub model: &'a str,
    /// Conversation sent to the model.
    pub messages: Vec<ChatMessage<'a>>,
    /// Always `false`.
    pub stream: bool,
}

/// `POST /api/pull` body.
#[derive(Debug, Serialize)]
pub struct PullRequest<'a> {
    /// Model to download.
    pub name: &'a str,
}

/// `GET /api/tags` reply. Model entries are relayed untouched.
#[derive(Debug, Default, Deserialize)]
pub struct TagsResponse {
    /// Installed models.
    #[serde(default)]
    pub models: Vec<Value>,
}

impl TagsResponse {
    /// Read the model list out of any JSON reply.
    ///
    /// A missing, null or non-array `models` yields an empty list.
    #[must_use]
    pub fn from_value(mut value: Value) -> Self {
        let models = match value.get_mut("models").map(Value::take) {
            Some(Value::Array(models)) => models,
            _ => Vec::new(),
        };
        Self { models }
    }
}
