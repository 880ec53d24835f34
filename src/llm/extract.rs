//! Generated-text extraction from model runner replies.
//!
//! Ollama versions disagree on where the text lives: `/api/generate`
//! answers with a top-level `response`, `/api/chat` with `message.content`.
//! An [`ExtractionPlan`] tries an ordered list of [`Strategy`] values and,
//! when none matches, applies an explicit [`Terminal`] policy instead of
//! failing.

use serde_json::Value;

/// One place the generated text may live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// String at a JSON pointer, e.g. `/message/content`.
    Pointer(&'static str),
}

impl Strategy {
    /// Try this strategy against `body`.
    #[must_use]
    pub fn apply(self, body: &Value) -> Option<String> {
        match self {
            Self::Pointer(pointer) => body
                .pointer(pointer)
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}

/// What to return when no strategy matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    /// Empty text.
    Empty,
    /// The whole reply, serialized back to JSON.
    Stringify,
}

impl Terminal {
    fn apply(self, body: &Value) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Stringify => body.to_string(),
        }
    }
}

/// Ordered strategies plus a terminal policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionPlan {
    strategies: &'static [Strategy],
    terminal: Terminal,
}

/// Plain `/api/generate` replies: `response`, or nothing.
pub const GENERATE_PLAN: ExtractionPlan = ExtractionPlan::new(
    &[Strategy::Pointer("/response")],
    Terminal::Empty,
);

/// Multimodal replies from either endpoint: `response`, then
/// `message.content`, then the raw body.
pub const MULTIMODAL_PLAN: ExtractionPlan = ExtractionPlan::new(
    &[
        Strategy::Pointer("/response"),
        Strategy::Pointer("/message/content"),
    ],
    Terminal::Stringify,
);

impl ExtractionPlan {
    /// Build a plan.
    #[must_use]
    pub const fn new(strategies: &'static [Strategy], terminal: Terminal) -> Self {
        Self {
            strategies,
            terminal,
        }
    }

    /// Run the plan. Never fails.
    #[must_use]
    pub fn extract(&self, body: &Value) -> String {
        self.strategies
            .iter()
            .find_map(|strategy| strategy.apply(body))
            .unwrap_or_else(|| self.terminal.apply(body))
    }
}
