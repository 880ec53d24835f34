//! In-memory conversation store.

use std::future::Future;
use std::pin::Pin;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use thiserror::Error;

use super::types::{Conversation, ConversationId, Message};

/// Boxed future type for store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors returned by conversation stores.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversationError {
    /// No conversation is registered under the identifier.
    #[error("conversation {0} not found")]
    NotFound(ConversationId),
    /// A conversation is already registered under the identifier.
    #[error("conversation {0} already exists")]
    AlreadyExists(ConversationId),
}

/// Result type for conversation store operations.
pub type StoreResult<T> = Result<T, ConversationError>;

/// Storage for conversation histories.
///
/// Histories are append-only: no operation removes or reorders messages.
pub trait ConversationStore: Send + Sync {
    /// Register an empty conversation under `id`.
    fn create(&self, id: ConversationId) -> StoreFuture<'_, StoreResult<Conversation>>;

    /// Snapshot of the conversation registered under `id`.
    fn get(&self, id: &ConversationId) -> StoreFuture<'_, StoreResult<Conversation>>;

    /// Check if a conversation is registered under `id`.
    fn exists(&self, id: &ConversationId) -> StoreFuture<'_, StoreResult<bool>>;

    /// Append a single message.
    fn append(&self, id: &ConversationId, message: Message) -> StoreFuture<'_, StoreResult<()>>;

    /// Append a user prompt and the model reply as one step.
    ///
    /// No other message can land between the two.
    fn append_exchange(
        &self,
        id: &ConversationId,
        user: Message,
        assistant: Message,
    ) -> StoreFuture<'_, StoreResult<()>>;
}

/// Process-local store backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    conversations: DashMap<ConversationId, Vec<Message>>,
}

impl InMemoryConversationStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of conversations held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    /// True if no conversation has been created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    fn push_all<I>(&self, id: &ConversationId, messages: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = Message>,
    {
        // The entry guard is held for the whole push.
        let mut history = self
            .conversations
            .get_mut(id)
            .ok_or_else(|| ConversationError::NotFound(id.clone()))?;
        history.extend(messages);
        Ok(())
    }
}

impl ConversationStore for InMemoryConversationStore {
    fn create(&self, id: ConversationId) -> StoreFuture<'_, StoreResult<Conversation>> {
        Box::pin(async move {
            match self.conversations.entry(id) {
                Entry::Occupied(entry) => Err(ConversationError::AlreadyExists(entry.key().clone())),
                Entry::Vacant(entry) => {
                    let conversation = Conversation::new(entry.key().clone());
                    entry.insert(Vec::new());
                    Ok(conversation)
                }
            }
        })
    }

    fn get(&self, id: &ConversationId) -> StoreFuture<'_, StoreResult<Conversation>> {
        let id = id.clone();
        Box::pin(async move {
            let messages = self
                .conversations
                .get(&id)
                .map(|history| history.value().clone())
                .ok_or_else(|| ConversationError::NotFound(id.clone()))?;
            Ok(Conversation { id, messages })
        })
    }

    fn exists(&self, id: &ConversationId) -> StoreFuture<'_, StoreResult<bool>> {
        let id = id.clone();
        Box::pin(async move { Ok(self.conversations.contains_key(&id)) })
    }

    fn append(&self, id: &ConversationId, message: Message) -> StoreFuture<'_, StoreResult<()>> {
        let id = id.clone();
        Box::pin(async move { self.push_all(&id, [message]) })
    }

    fn append_exchange(
        &self,
        id: &ConversationId,
        user: Message,
        assistant: Message,
    ) -> StoreFuture<'_, StoreResult<()>> {
        let id = id.clone();
        Box::pin(async move { self.push_all(&id, [user, assistant]) })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::conversation::types::Role;

    fn id(raw: &str) -> ConversationId {
        ConversationId::from(raw)
    }

    #[tokio::test]
    async fn test_create_yields_empty_conversation() {
        let store = InMemoryConversationStore::new();
        let created = store.create(id("abc")).await;
        assert_eq!(created, Ok(Conversation::new(id("abc"))));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_create_twice_fails() {
        let store = InMemoryConversationStore::new();
        assert!(store.create(id("abc")).await.is_ok());
        assert_eq!(
            store.create(id("abc")).await,
            Err(ConversationError::AlreadyExists(id("abc")))
        );
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_exists_tracks_created_ids() {
        let store = InMemoryConversationStore::new();
        assert_eq!(store.exists(&id("abc")).await, Ok(false));
        assert!(store.create(id("abc")).await.is_ok());
        assert_eq!(store.exists(&id("abc")).await, Ok(true));
        assert_eq!(store.exists(&id("other")).await, Ok(false));
    }

    #[tokio::test]
    async fn test_missing_conversation() {
        let store = InMemoryConversationStore::new();
        assert_eq!(
            store.get(&id("nope")).await,
            Err(ConversationError::NotFound(id("nope")))
        );
        assert_eq!(
            store.append(&id("nope"), Message::user("hi")).await,
            Err(ConversationError::NotFound(id("nope")))
        );
        assert_eq!(
            store
                .append_exchange(&id("nope"), Message::user("hi"), Message::assistant("hello"))
                .await,
            Err(ConversationError::NotFound(id("nope")))
        );
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_append_preserves_order() {
        let store = InMemoryConversationStore::new();
        assert!(store.create(id("abc")).await.is_ok());
        assert!(store.append(&id("abc"), Message::user("one")).await.is_ok());
        assert!(
            store
                .append_exchange(&id("abc"), Message::user("hi"), Message::assistant("hello"))
                .await
                .is_ok()
        );

        let conv = store.get(&id("abc")).await.unwrap();
        assert_eq!(conv.id, id("abc"));
        assert_eq!(
            conv.messages,
            vec![
                Message::user("one"),
                Message::user("hi"),
                Message::assistant("hello"),
            ]
        );
    }

    #[tokio::test]
    async fn test_get_returns_detached_snapshot() {
        let store = InMemoryConversationStore::new();
        assert!(store.create(id("abc")).await.is_ok());
        let before = store.get(&id("abc")).await.unwrap();
        assert!(store.append(&id("abc"), Message::user("later")).await.is_ok());
        assert!(before.messages.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_exchanges_stay_paired() {
        let store = Arc::new(InMemoryConversationStore::new());
        assert!(store.create(id("shared")).await.is_ok());

        let mut handles = Vec::new();
        for n in 0..32 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .append_exchange(
                        &id("shared"),
                        Message::user(format!("q{n}")),
                        Message::assistant(format!("a{n}")),
                    )
                    .await
            }));
        }
        for handle in handles {
            assert!(matches!(handle.await, Ok(Ok(()))));
        }

        let conv = store.get(&id("shared")).await.unwrap();
        assert_eq!(conv.messages.len(), 64);
        for pair in conv.messages.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
            assert_eq!(pair[0].content[1..], pair[1].content[1..]);
        }
    }
}
