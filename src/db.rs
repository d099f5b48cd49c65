//! Message transcript persistence
//!
//! Every user and assistant turn is written here, independent of the
//! bounded in-memory session history.

mod schema;

pub use schema::*;

use crate::session::{MessageType, Role};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid metadata: {0}")]
    Metadata(#[from] serde_json::Error),
    #[error("Database connection lock poisoned")]
    Poisoned,
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    fn run_migrations(&self) -> DbResult<()> {
        self.conn()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Append a message to a chat transcript
    pub fn add_message(&self, message: &NewMessage<'_>) -> DbResult<StoredMessage> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let metadata = message.metadata.map(serde_json::to_string).transpose()?;

        self.conn()?.execute(
            "INSERT INTO messages (id, chat_id, role, content, message_type, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                message.chat_id,
                message.role.as_str(),
                message.content,
                message.message_type.as_str(),
                metadata,
                now.to_rfc3339(),
            ],
        )?;

        Ok(StoredMessage {
            id,
            chat_id: message.chat_id.to_string(),
            role: message.role,
            content: message.content.to_string(),
            message_type: message.message_type,
            metadata: message.metadata.cloned(),
            created_at: now,
        })
    }

    /// Full transcript of a chat, oldest first
    pub fn get_messages(&self, chat_id: &str) -> DbResult<Vec<StoredMessage>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, chat_id, role, content, message_type, metadata, created_at
             FROM messages WHERE chat_id = ?1 ORDER BY created_at, rowid",
        )?;

        let messages = stmt
            .query_map(params![chat_id], parse_message_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(messages)
    }
}

fn parse_message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredMessage> {
    let role: String = row.get(2)?;
    let message_type: String = row.get(4)?;
    let metadata: Option<String> = row.get(5)?;

    Ok(StoredMessage {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        role: if role == Role::User.as_str() {
            Role::User
        } else {
            Role::Assistant
        },
        content: row.get(3)?,
        message_type: MessageType::parse(&message_type).unwrap_or_default(),
        metadata: metadata.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
