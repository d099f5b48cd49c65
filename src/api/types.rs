//! Request and response types for the HTTP and WebSocket API

use crate::db::StoredMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Client-to-server chat frame
#[derive(Debug, Deserialize)]
pub struct ClientMessage {
    pub content: String,
}

/// Query parameters accepted on `/ws`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsQuery {
    /// Reuse a transcript id instead of generating one
    pub chat_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok",
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessagesResponse {
    pub chat_id: String,
    pub messages: Vec<StoredMessage>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
