//! Trait abstractions for runtime I/O
//!
//! The language model and upstream API seams live with their clients
//! ([`crate::llm::LlmService`], [`crate::services::TuitionClient`],
//! [`crate::services::AddressClient`]); this module adds the transcript store.

use crate::db::{Database, NewMessage, StoredMessage};
use async_trait::async_trait;
use std::sync::Arc;

/// Durable transcript of every chat
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append one message
    async fn add_message(&self, message: &NewMessage<'_>) -> Result<StoredMessage, String>;

    /// All messages of a chat, oldest first
    async fn get_messages(&self, chat_id: &str) -> Result<Vec<StoredMessage>, String>;
}

#[async_trait]
impl<T: MessageStore + ?Sized> MessageStore for Arc<T> {
    async fn add_message(&self, message: &NewMessage<'_>) -> Result<StoredMessage, String> {
        (**self).add_message(message).await
    }

    async fn get_messages(&self, chat_id: &str) -> Result<Vec<StoredMessage>, String> {
        (**self).get_messages(chat_id).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use Database as a MessageStore
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MessageStore for DatabaseStorage {
    async fn add_message(&self, message: &NewMessage<'_>) -> Result<StoredMessage, String> {
        self.db.add_message(message).map_err(|e| e.to_string())
    }

    async fn get_messages(&self, chat_id: &str) -> Result<Vec<StoredMessage>, String> {
        self.db.get_messages(chat_id).map_err(|e| e.to_string())
    }
}
