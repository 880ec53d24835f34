//! Conversation state.
//!
//! A conversation is a caller-named, append-only list of user/assistant
//! turns. State lives in memory for the lifetime of the process.

pub mod store;
pub mod types;

pub use store::{ConversationError, ConversationStore, InMemoryConversationStore, StoreFuture};
pub use types::{Conversation, ConversationId, Message, Role};
