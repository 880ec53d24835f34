//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::conversation::{ConversationStore, InMemoryConversationStore};
use crate::llm::{ModelRunnerClient, UpstreamError};

/// Shared application state.
pub struct AppState {
    /// Conversation histories.
    pub store: Arc<dyn ConversationStore>,
    /// Model runner client.
    pub llm: ModelRunnerClient,
    /// Gateway settings.
    pub config: GatewayConfig,
}

impl AppState {
    /// Create state with an empty in-memory conversation store.
    ///
    /// # Errors
    /// Returns an error if the model runner client cannot be created.
    pub fn new(config: GatewayConfig) -> Result<Arc<Self>, UpstreamError> {
        Self::with_store(config, Arc::new(InMemoryConversationStore::new()))
    }

    /// Create state around an existing conversation store.
    ///
    /// # Errors
    /// Returns an error if the model runner client cannot be created.
    pub fn with_store(
        config: GatewayConfig,
        store: Arc<dyn ConversationStore>,
    ) -> Result<Arc<Self>, UpstreamError> {
        let llm = ModelRunnerClient::from_config(&config)?;
        Ok(Arc::new(Self { store, llm, config }))
    }

    /// Model to use for text generation.
    #[must_use]
    pub fn text_model<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(&self.config.default_model)
    }

    /// Model to use for multimodal generation.
    #[must_use]
    pub fn vision_model<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(&self.config.vision_model)
    }
}
