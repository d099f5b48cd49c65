//! Bearer token holder for the tuition API
//!
//! The token is acquired lazily on first use and kept for the process
//! lifetime. There is no refresh; an expired token surfaces as an upstream
//! error on the call that used it.

use super::ServiceError;
use std::future::Future;
use tokio::sync::OnceCell;

/// Lazily initialised, process-wide credential
#[derive(Debug, Default)]
pub struct TokenCache {
    token: OnceCell<String>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached token, running `login` only if none is cached yet.
    ///
    /// Concurrent callers wait on the same login; a failed login leaves the
    /// cache empty so the next call retries.
    pub async fn get_or_login<F, Fut>(&self, login: F) -> Result<&str, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, ServiceError>>,
    {
        self.token.get_or_try_init(login).await.map(String::as_str)
    }

    #[cfg(test)]
    pub fn cached(&self) -> Option<&str> {
        self.token.get().map(String::as_str)
    }
}
