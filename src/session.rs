//! Per-connection conversation history
//!
//! Each open connection owns one [`Session`] holding the most recent
//! [`HISTORY_LIMIT`] turns. Sessions live only as long as the connection;
//! the durable transcript is written separately through the message store.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

/// Maximum number of turns kept per session
pub const HISTORY_LIMIT: usize = 20;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// How the client should render a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    Text,
    TuitionCard,
    PaymentSuccess,
    AddressList,
    UnpaidList,
    Error,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::TuitionCard => "tuition_card",
            MessageType::PaymentSuccess => "payment_success",
            MessageType::AddressList => "address_list",
            MessageType::UnpaidList => "unpaid_list",
            MessageType::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(MessageType::Text),
            "tuition_card" => Some(MessageType::TuitionCard),
            "payment_success" => Some(MessageType::PaymentSuccess),
            "address_list" => Some(MessageType::AddressList),
            "unpaid_list" => Some(MessageType::UnpaidList),
            "error" => Some(MessageType::Error),
            _ => None,
        }
    }
}

/// One message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub message_type: MessageType,
    pub metadata: Option<Value>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            message_type: MessageType::Text,
            metadata: None,
        }
    }

    pub fn assistant(
        content: impl Into<String>,
        message_type: MessageType,
        metadata: Option<Value>,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            message_type,
            metadata,
        }
    }
}

/// Bounded history for one connection
#[derive(Debug, Default)]
pub struct Session {
    turns: VecDeque<ConversationTurn>,
}

impl Session {
    pub fn push(&mut self, turn: ConversationTurn) {
        if self.turns.len() == HISTORY_LIMIT {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    /// Turns oldest-first
    pub fn turns(&self) -> Vec<ConversationTurn> {
        self.turns.iter().cloned().collect()
    }
}

/// All open sessions, keyed by connection id
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty session; reopening an id resets its history
    pub async fn open(&self, session_id: &str) {
        self.sessions
            .write()
            .await
            .insert(session_id.to_string(), Session::default());
    }

    /// Append a turn, evicting the oldest when full.
    ///
    /// Appending to an unknown id opens it, so a message racing a reconnect
    /// is not lost.
    pub async fn append(&self, session_id: &str, turn: ConversationTurn) {
        self.sessions
            .write()
            .await
            .entry(session_id.to_string())
            .or_default()
            .push(turn);
    }

    /// Last [`HISTORY_LIMIT`] turns, oldest first; empty for unknown ids
    pub async fn recent(&self, session_id: &str) -> Vec<ConversationTurn> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(Session::turns)
            .unwrap_or_default()
    }

    /// Remove a session; returns whether it existed
    pub async fn close(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    /// Number of open sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
