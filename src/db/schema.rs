//! Database schema and types

use crate::session::{MessageType, Role};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// SQL schema for initialization
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    chat_id TEXT NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    message_type TEXT NOT NULL DEFAULT 'text',
    metadata TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_chat ON messages(chat_id, created_at);
"#;

/// A persisted chat message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: String,
    pub chat_id: String,
    pub role: Role,
    pub content: String,
    pub message_type: MessageType,
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied by the caller when persisting a message
#[derive(Debug, Clone, Copy)]
pub struct NewMessage<'a> {
    pub chat_id: &'a str,
    pub role: Role,
    pub content: &'a str,
    pub message_type: MessageType,
    pub metadata: Option<&'a Value>,
}
