//! Persisted token store
//!
//! This module provides:
//! - `TokenStore` trait for abstracting where credentials live between runs
//! - `MemoryTokenStore` for tests and short-lived processes
//! - `FileTokenStore` for a JSON file that survives process restarts

mod file;
mod memory;

pub use file::FileTokenStore;
pub use memory::MemoryTokenStore;

use std::fmt;
use thiserror::Error;

/// Errors raised by token store backends
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt token file: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// The two credentials the session persists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKey {
    Access,
    Refresh,
}

impl TokenKey {
    /// Storage name, shared with the browser build of the site
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKey::Access => "accessToken",
            TokenKey::Refresh => "refreshToken",
        }
    }
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key-value store for session credentials.
///
/// Access is synchronous and assumed uncontended (single process). The
/// pair helpers keep both tokens in step: callers never persist or clear
/// only one of them.
pub trait TokenStore: Send + Sync {
    /// Read a token, `None` when absent
    fn get(&self, key: TokenKey) -> Result<Option<String>, StoreError>;

    /// Write a token
    fn set(&self, key: TokenKey, value: &str) -> Result<(), StoreError>;

    /// Delete a token; removing an absent key is not an error
    fn remove(&self, key: TokenKey) -> Result<(), StoreError>;

    /// Persist both tokens. If the second write fails the first is rolled back.
    fn set_tokens(&self, access: &str, refresh: &str) -> Result<(), StoreError> {
        self.set(TokenKey::Access, access)?;
        if let Err(e) = self.set(TokenKey::Refresh, refresh) {
            let _ = self.remove(TokenKey::Access);
            return Err(e);
        }
        Ok(())
    }

    /// Remove both tokens
    fn clear_tokens(&self) -> Result<(), StoreError> {
        let access = self.remove(TokenKey::Access);
        let refresh = self.remove(TokenKey::Refresh);
        access.and(refresh)
    }
}
