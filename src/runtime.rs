//! Chat runtime
//!
//! Owns the per-connection sessions, the orchestrator and the transcript
//! store, and turns one inbound utterance into one outbound message.
//! Sessions are keyed by a server-generated connection id; the client's
//! chat id only names the stored transcript, so two sockets sharing a chat
//! id never see each other's history. Callers must not run two
//! `handle_message` calls on the same connection concurrently; the
//! WebSocket loop processes frames strictly in order.

pub mod traits;

#[cfg(test)]
pub mod testing;

pub use traits::*;

use crate::agent::{Orchestrator, Reply};
use crate::db::{NewMessage, StoredMessage};
use crate::llm::{LlmService, LoggingService};
use crate::services::{AddressClient, AddressService, TuitionClient, TuitionService};
use crate::session::{ConversationTurn, MessageType, Role, SessionRegistry};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use std::panic::AssertUnwindSafe;

/// Type alias for production runtime with concrete implementations
pub type ProductionRuntime =
    ChatRuntime<DatabaseStorage, LoggingService, TuitionService, AddressService>;

pub const APOLOGY_TEXT: &str = "Sorry, I encountered an error. Please try again.";

/// Server-to-client frame
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    pub role: Role,
    pub content: String,
    pub message_type: MessageType,
    pub metadata: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl OutboundMessage {
    fn assistant(reply: Reply) -> Self {
        Self {
            role: Role::Assistant,
            content: reply.text,
            message_type: reply.message_type,
            metadata: reply.metadata,
            timestamp: Utc::now(),
        }
    }

    /// Error-typed reply that is never stored in history
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            message_type: MessageType::Error,
            metadata: None,
            timestamp: Utc::now(),
        }
    }
}

/// Handle for one open connection
#[derive(Debug, Clone)]
pub struct Connection {
    session_id: String,
    chat_id: String,
}

impl Connection {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }
}

pub struct ChatRuntime<S, L, T, A> {
    sessions: SessionRegistry,
    orchestrator: Orchestrator<L, T, A>,
    store: S,
}

impl<S, L, T, A> ChatRuntime<S, L, T, A>
where
    S: MessageStore,
    L: LlmService,
    T: TuitionClient,
    A: AddressClient,
{
    pub fn new(store: S, orchestrator: Orchestrator<L, T, A>) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            orchestrator,
            store,
        }
    }

    /// Start a fresh session for a new connection
    pub async fn open_session(&self, chat_id: &str) -> Connection {
        let connection = Connection {
            session_id: uuid::Uuid::new_v4().to_string(),
            chat_id: chat_id.to_string(),
        };
        self.sessions.open(&connection.session_id).await;

        let open_sessions = self.sessions.len().await;
        tracing::info!(
            chat_id,
            session_id = %connection.session_id,
            open_sessions,
            "Session opened"
        );
        connection
    }

    /// Drop a connection's history; the stored transcript is kept
    pub async fn close_session(&self, connection: &Connection) {
        if self.sessions.close(&connection.session_id).await {
            let open_sessions = self.sessions.len().await;
            tracing::info!(
                chat_id = %connection.chat_id,
                session_id = %connection.session_id,
                open_sessions,
                "Session closed"
            );
        }
    }

    /// Answer one utterance. Never fails: anything unexpected becomes an
    /// error-typed apology.
    pub async fn handle_message(&self, connection: &Connection, content: &str) -> OutboundMessage {
        let chat_id = connection.chat_id();
        tracing::info!(chat_id, content, "User message");

        match AssertUnwindSafe(self.process(connection, content))
            .catch_unwind()
            .await
        {
            Ok(outbound) => outbound,
            Err(_) => {
                tracing::error!(chat_id, "Message handling panicked");
                OutboundMessage::error(APOLOGY_TEXT)
            }
        }
    }

    /// Stored transcript of a chat
    pub async fn transcript(&self, chat_id: &str) -> Result<Vec<StoredMessage>, String> {
        self.store.get_messages(chat_id).await
    }

    async fn process(&self, connection: &Connection, content: &str) -> OutboundMessage {
        let chat_id = connection.chat_id();
        let session_id = connection.session_id();
        self.persist(&NewMessage {
            chat_id,
            role: Role::User,
            content,
            message_type: MessageType::Text,
            metadata: None,
        })
        .await;

        let history = self.sessions.recent(session_id).await;
        let reply = self.orchestrator.handle(content, &history).await;

        self.sessions
            .append(session_id, ConversationTurn::user(content))
            .await;
        self.sessions
            .append(
                session_id,
                ConversationTurn::assistant(
                    reply.text.clone(),
                    reply.message_type,
                    reply.metadata.clone(),
                ),
            )
            .await;

        self.persist(&NewMessage {
            chat_id,
            role: Role::Assistant,
            content: &reply.text,
            message_type: reply.message_type,
            metadata: reply.metadata.as_ref(),
        })
        .await;

        tracing::info!(
            chat_id,
            message_type = reply.message_type.as_str(),
            "Assistant reply"
        );
        OutboundMessage::assistant(reply)
    }

    /// Store failures are logged and never reach the user
    async fn persist(&self, message: &NewMessage<'_>) {
        if let Err(e) = self.store.add_message(message).await {
            tracing::warn!(
                chat_id = message.chat_id,
                role = message.role.as_str(),
                error = %e,
                "Failed to persist message"
            );
        }
    }
}
