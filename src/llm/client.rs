//! Async client for the Ollama model runner.
//!
//! Every call is independent and bounded by the matching
//! [`UpstreamTimeouts`] entry. Nothing is streamed: `stream` is always sent
//! as `false` and replies are relayed in one piece.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::config::{GatewayConfig, UpstreamTimeouts};

use super::error::{UpstreamError, error_detail};
use super::extract::{GENERATE_PLAN, MULTIMODAL_PLAN};
use super::types::{ChatMessage, ChatRequest, GenerateRequest, PullRequest, TagsResponse};

/// Plain and multimodal generation.
const GENERATE_PATH: &str = "api/generate";
/// Chat-shaped generation, used as the multimodal fallback.
const CHAT_PATH: &str = "api/chat";
/// Installed models.
const TAGS_PATH: &str = "api/tags";
/// Model download.
const PULL_PATH: &str = "api/pull";

/// Stateless client for the model runner HTTP API.
#[derive(Clone, Debug)]
pub struct ModelRunnerClient {
    client: Client,
    base_url: Url,
    timeouts: UpstreamTimeouts,
}

impl ModelRunnerClient {
    /// Create a client for the model runner at `base_url`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(mut base_url: Url, timeouts: UpstreamTimeouts) -> Result<Self, UpstreamError> {
        // Endpoint paths are joined relative to the base.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .connect_timeout(timeouts.connect)
            .build()
            .map_err(UpstreamError::Transport)?;

        Ok(Self {
            client,
            base_url,
            timeouts,
        })
    }

    /// Create a client from the gateway configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, UpstreamError> {
        Self::new(config.upstream_url.clone(), config.timeouts)
    }

    /// Base URL every endpoint is resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Generate text for `prompt`.
    ///
    /// A reply without a `response` field yields empty text.
    ///
    /// # Errors
    /// Returns an error on transport failure, timeout, non-success status or
    /// a body that is not JSON.
    pub async fn generate_text(&self, model: &str, prompt: &str) -> Result<String, UpstreamError> {
        let request = GenerateRequest {
            model,
            prompt,
            images: None,
            stream: false,
        };

        let body = self
            .post_json(GENERATE_PATH, &request, self.timeouts.generate)
            .await?;
        let value: Value =
            serde_json::from_str(&body).map_err(|e| UpstreamError::Decode(e.to_string()))?;

        Ok(GENERATE_PLAN.extract(&value))
    }

    /// Generate text for `prompt` conditioned on an image.
    ///
    /// The generate-shaped request is tried first. Only an HTTP 400 reply
    /// triggers a single chat-shaped retry; any other failure is returned as
    /// is. Whatever succeeds is run through [`MULTIMODAL_PLAN`], so an
    /// unexpected reply shape comes back as raw text rather than an error.
    ///
    /// # Errors
    /// Returns an error on transport failure, timeout or non-success status
    /// of the attempt that decides the outcome.
    pub async fn generate_multimodal(
        &self,
        model: &str,
        prompt: &str,
        image: &[u8],
    ) -> Result<String, UpstreamError> {
        let encoded = BASE64_STANDARD.encode(image);

        let primary = GenerateRequest {
            model,
            prompt,
            images: Some(vec![encoded.as_str()]),
            stream: false,
        };

        let body = match self
            .post_json(GENERATE_PATH, &primary, self.timeouts.generate)
            .await
        {
            Ok(body) => body,
            Err(err) if err.is_bad_request() => {
                tracing::info!(model, "generate endpoint rejected image payload, retrying via chat: {err}");
                let fallback = ChatRequest {
                    model,
                    messages: vec![ChatMessage {
                        role: "user",
                        content: prompt,
                        images: Some(vec![encoded.as_str()]),
                    }],
                    stream: false,
                };
                self.post_json(CHAT_PATH, &fallback, self.timeouts.generate)
                    .await?
            }
            Err(err) => return Err(err),
        };

        let parsed = serde_json::from_str::<Value>(&body);
        Ok(match parsed {
            Ok(value) => MULTIMODAL_PLAN.extract(&value),
            Err(_) => body,
        })
    }

    /// List the models installed on the model runner.
    ///
    /// Entries are passed through untouched; a reply whose `models` is
    /// missing, null or not a list yields an empty list.
    ///
    /// # Errors
    /// Returns an error on transport failure, timeout, non-success status or
    /// a body that is not JSON.
    pub async fn list_models(&self) -> Result<Vec<Value>, UpstreamError> {
        let url = self.endpoint(TAGS_PATH)?;
        tracing::debug!(%url, "listing models");

        let response = self
            .client
            .get(url)
            .timeout(self.timeouts.list_models)
            .send()
            .await
            .map_err(UpstreamError::Transport)?;
        let body = read_body(ensure_success(response).await?).await?;

        let value: Value =
            serde_json::from_str(&body).map_err(|e| UpstreamError::Decode(e.to_string()))?;
        Ok(TagsResponse::from_value(value).models)
    }

    /// Ask the model runner to download `name`.
    ///
    /// Returns once the request is accepted; the download itself may still
    /// be running on the model runner.
    ///
    /// # Errors
    /// Returns an error on transport failure, timeout or non-success status.
    pub async fn pull_model(&self, name: &str) -> Result<(), UpstreamError> {
        let url = self.endpoint(PULL_PATH)?;
        tracing::debug!(%url, name, "requesting model pull");

        let response = self
            .client
            .post(url)
            .json(&PullRequest { name })
            .timeout(self.timeouts.pull)
            .send()
            .await
            .map_err(UpstreamError::Transport)?;
        // Progress keeps streaming on the model runner; only acceptance matters here.
        let _accepted = ensure_success(response).await?;
        Ok(())
    }

    fn endpoint(&self, path: &str) -> Result<Url, UpstreamError> {
        self.base_url
            .join(path)
            .map_err(|e| UpstreamError::Decode(format!("invalid endpoint {path}: {e}")))
    }

    async fn post_json<B>(&self, path: &str, body: &B, timeout: Duration) -> Result<String, UpstreamError>
    where
        B: Serialize + Sync,
    {
        let url = self.endpoint(path)?;
        tracing::debug!(%url, "posting to model runner");

        let response = self
            .client
            .post(url)
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(UpstreamError::Transport)?;
        read_body(ensure_success(response).await?).await
    }
}

/// Turn a non-success response into [`UpstreamError::Status`].
async fn ensure_success(response: Response) -> Result<Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = error_detail(status, &body);
    tracing::warn!(%status, "model runner error: {detail}");
    Err(UpstreamError::Status { status, detail })
}

async fn read_body(response: Response) -> Result<String, UpstreamError> {
    response.text().await.map_err(|err| {
        if err.is_timeout() || err.is_connect() {
            UpstreamError::Transport(err)
        } else {
            UpstreamError::Decode(err.to_string())
        }
    })
}
