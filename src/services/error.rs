//! Upstream service error types

use reqwest::StatusCode;
use thiserror::Error;

const QUOTA_MARKER: &str = "quota exceeded";

/// Failure of a tuition or address API call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// Upstream daily quota exhausted (429 or a quota-exceeded body)
    #[error("RATE_LIMIT: Daily request limit exceeded.")]
    RateLimited,
    /// Upstream answered 404
    #[error("STUDENT_NOT_FOUND: Student not found.")]
    NotFound,
    /// Anything else; the message is surfaced to the user as-is
    #[error("{0}")]
    Upstream(String),
}

impl ServiceError {
    pub fn not_configured(service: &str) -> Self {
        Self::Upstream(format!("{service} API base URL is not configured"))
    }

    /// Map a transport-level reqwest failure
    pub fn transport(err: &reqwest::Error) -> Self {
        if err.status() == Some(StatusCode::TOO_MANY_REQUESTS) {
            return Self::RateLimited;
        }
        Self::Upstream(err.to_string())
    }

    /// Classify a non-2xx response by status and body
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        if status == StatusCode::TOO_MANY_REQUESTS || is_quota_exceeded(body) {
            Self::RateLimited
        } else if status == StatusCode::NOT_FOUND {
            Self::NotFound
        } else {
            Self::upstream(status, body)
        }
    }

    /// Generic failure carrying the upstream payload verbatim when there is one
    pub fn upstream(status: StatusCode, body: &str) -> Self {
        let body = body.trim();
        if body.is_empty() {
            Self::Upstream(format!(
                "Request failed with status code {}",
                status.as_u16()
            ))
        } else {
            Self::Upstream(body.to_string())
        }
    }
}

/// The tuition API reports quota exhaustion in the body, sometimes with a 200
pub fn is_quota_exceeded(body: &str) -> bool {
    body.to_ascii_lowercase().contains(QUOTA_MARKER)
}
