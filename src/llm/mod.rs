//! Model runner (Ollama) integration.
//!
//! - `client`: generate, multimodal generate, list and pull calls
//! - `extract`: lenient generated-text extraction
//! - `types`: request/response payloads

pub mod client;
pub mod error;
pub mod extract;
pub mod types;

pub use client::ModelRunnerClient;
pub use error::UpstreamError;
pub use extract::{ExtractionPlan, GENERATE_PLAN, MULTIMODAL_PLAN, Strategy, Terminal};
