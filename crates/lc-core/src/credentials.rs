//! Bearer token storage
//!
//! Socket URLs carry the operator's bearer token as a `token` query
//! parameter. The token is looked up on every connect, so a token that was
//! refreshed while a socket was down is used by the next reconnect.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Source of the bearer token
pub trait CredentialStore: Send + Sync {
    /// Current token, `None` when the operator is not logged in
    fn token(&self) -> Option<String>;
}

/// In-memory token, settable at runtime
#[derive(Debug, Default)]
pub struct StaticCredentials {
    token: RwLock<Option<String>>,
}

impl StaticCredentials {
    /// Create a store holding `token`
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(token),
        }
    }

    /// Replace the stored token
    pub fn set(&self, token: Option<String>) {
        if let Ok(mut guard) = self.token.write() {
            *guard = token;
        }
    }
}

impl CredentialStore for StaticCredentials {
    fn token(&self) -> Option<String> {
        self.token
            .read()
            .ok()
            .and_then(|guard| normalize(guard.as_deref()))
    }
}

/// Token persisted in a file at a well-known path
#[derive(Debug, Clone)]
pub struct FileCredentials {
    path: PathBuf,
}

impl FileCredentials {
    /// Read tokens from `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the token file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentials {
    fn token(&self) -> Option<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => normalize(Some(&content)),
            Err(e) => {
                tracing::trace!("No token at {:?}: {}", self.path, e);
                None
            }
        }
    }
}

/// Blank tokens count as absent
fn normalize(token: Option<&str>) -> Option<String> {
    token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
