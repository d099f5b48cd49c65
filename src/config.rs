//! Process configuration read from the environment

use crate::llm::LlmConfig;

const DEFAULT_PORT: u16 = 3001;

/// Credentials for the tuition API login call
#[derive(Debug, Clone, Default)]
pub struct TuitionCredentials {
    pub username: String,
    pub password: String,
}

/// Upstream endpoints and credentials
#[derive(Debug, Clone, Default)]
pub struct UpstreamConfig {
    pub tuition_base_url: Option<String>,
    pub address_base_url: Option<String>,
    pub credentials: TuitionCredentials,
}

/// Top-level server configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub db_path: String,
    pub upstream: UpstreamConfig,
    pub llm: LlmConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let db_path = std::env::var("CHAT_DB_PATH").unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            format!("{home}/.tuition-chat/chat.db")
        });

        Self {
            port,
            db_path,
            upstream: UpstreamConfig {
                tuition_base_url: base_url_var("TUITION_API_BASE_URL"),
                address_base_url: base_url_var("ADDRESS_API_BASE_URL"),
                credentials: TuitionCredentials {
                    username: std::env::var("TUITION_API_USERNAME").unwrap_or_default(),
                    password: std::env::var("TUITION_API_PASSWORD").unwrap_or_default(),
                },
            },
            llm: LlmConfig::from_env(),
        }
    }
}

fn base_url_var(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|v| normalize_base_url(&v))
}

/// Trim trailing slashes; blank values count as unset
pub fn normalize_base_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
