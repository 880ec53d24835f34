//! HTTP route handlers for the gateway API.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::services::{ServeDir, ServeFile};

use crate::conversation::{Conversation, ConversationId, Message};
use crate::error::GatewayError;

use super::state::AppState;
use super::upload::{self, MAX_UPLOAD_BYTES, TempUpload};

const GENERATE_ERROR: &str = "Error communicating with Ollama";
const MULTIMODAL_ERROR: &str = "Error processing multimodal request";
const MODELS_ERROR: &str = "Error fetching models";
const DOWNLOAD_ERROR: &str = "Error downloading model";

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    let static_dir = state.config.static_dir.clone();
    let index = static_dir.join("index.html");

    Router::new()
        .route_service("/", ServeFile::new(index))
        .route("/health", get(health_check))
        .route("/generate", post(generate))
        .route("/generate-debug", post(generate_debug))
        .route(
            "/generate-multimodal",
            post(generate_multimodal).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/models", get(list_models))
        .route("/models/download", post(download_model))
        .route("/conversation/start", post(start_conversation))
        .route("/conversation/{conv_id}", get(get_conversation))
        .route("/conversation/{conv_id}/message", post(add_message))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "ollama-gateway",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Prompt request used by the text endpoints.
#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    /// Prompt text.
    pub prompt: String,
    /// Model name; the configured default when absent.
    #[serde(default)]
    pub model: Option<String>,
}

/// Generated text response.
#[derive(Debug, Serialize, Deserialize)]
pub struct GeneratedText {
    /// Model output.
    pub generated_text: String,
}

/// Model list response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelsResponse {
    /// Models reported by the model runner.
    pub models: Vec<Value>,
}

/// Plain message response.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Human-readable outcome.
    pub message: String,
}

/// Model download request.
#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    /// Model to pull.
    pub model_name: String,
}

/// Conversation creation request.
#[derive(Debug, Deserialize)]
pub struct StartConversationRequest {
    /// Identifier chosen by the caller.
    pub conv_id: String,
}

async fn generate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PromptRequest>,
) -> Result<Json<GeneratedText>, GatewayError> {
    run_generate(&state, &request).await
}

/// Same as `/generate`, but logs and parses the raw body itself.
async fn generate_debug(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<GeneratedText>, GatewayError> {
    tracing::debug!("raw request body: {}", String::from_utf8_lossy(&body));

    let request: PromptRequest = serde_json::from_slice(&body)
        .map_err(|e| GatewayError::BadRequest(format!("Request parsing error: {e}")))?;
    tracing::debug!(?request, "parsed request");

    run_generate(&state, &request).await
}

async fn run_generate(
    state: &AppState,
    request: &PromptRequest,
) -> Result<Json<GeneratedText>, GatewayError> {
    let model = state.text_model(request.model.as_deref());
    tracing::info!(model, "generate request");

    let generated_text = state
        .llm
        .generate_text(model, &request.prompt)
        .await
        .map_err(GatewayError::upstream(GENERATE_ERROR))?;

    Ok(Json(GeneratedText { generated_text }))
}

async fn generate_multimodal(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<GeneratedText>, GatewayError> {
    let form = upload::read_form(&mut multipart).await?;
    if !form.file.looks_like_image() {
        tracing::warn!(
            file_name = ?form.file.file_name,
            "uploaded file does not look like an image, forwarding anyway"
        );
    }

    // Removed when `staged` goes out of scope, whatever the outcome below.
    let staged = TempUpload::stage(
        &state.config.upload_dir,
        form.file.file_name.as_deref(),
        &form.file.bytes,
    )
    .await?;
    let image = staged.read().await?;

    let model = state.vision_model(form.model.as_deref());
    tracing::info!(model, size = image.len(), "multimodal request");

    let generated_text = state
        .llm
        .generate_multimodal(model, &form.prompt, &image)
        .await
        .map_err(GatewayError::upstream(MULTIMODAL_ERROR))?;

    Ok(Json(GeneratedText { generated_text }))
}

async fn list_models(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ModelsResponse>, GatewayError> {
    let models = state
        .llm
        .list_models()
        .await
        .map_err(GatewayError::upstream(MODELS_ERROR))?;

    Ok(Json(ModelsResponse { models }))
}

async fn download_model(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DownloadRequest>,
) -> Result<Json<MessageResponse>, GatewayError> {
    tracing::info!(model = %request.model_name, "model download requested");

    state
        .llm
        .pull_model(&request.model_name)
        .await
        .map_err(GatewayError::upstream(DOWNLOAD_ERROR))?;

    Ok(Json(MessageResponse {
        message: format!("Model '{}' downloaded successfully", request.model_name),
    }))
}

async fn start_conversation(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartConversationRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), GatewayError> {
    let id = ConversationId::from(request.conv_id);
    if id.is_blank() {
        return Err(GatewayError::BadRequest(
            "conv_id must not be empty".to_string(),
        ));
    }

    let conversation = state.store.create(id).await?;
    tracing::info!(conv_id = %conversation.id, "conversation started");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: format!("Conversation '{}' started", conversation.id),
        }),
    ))
}

async fn add_message(
    State(state): State<Arc<AppState>>,
    Path(conv_id): Path<String>,
    Json(request): Json<PromptRequest>,
) -> Result<Json<GeneratedText>, GatewayError> {
    let id = ConversationId::from(conv_id);
    // Fail before calling the model runner.
    if !state.store.exists(&id).await? {
        return Err(GatewayError::NotFound);
    }

    let model = state.text_model(request.model.as_deref());
    let generated_text = state
        .llm
        .generate_text(model, &request.prompt)
        .await
        .map_err(GatewayError::upstream(GENERATE_ERROR))?;

    state
        .store
        .append_exchange(
            &id,
            Message::user(request.prompt),
            Message::assistant(generated_text.clone()),
        )
        .await?;

    Ok(Json(GeneratedText { generated_text }))
}

async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(conv_id): Path<String>,
) -> Result<Json<Conversation>, GatewayError> {
    let conversation = state.store.get(&ConversationId::from(conv_id)).await?;
    Ok(Json(conversation))
}
