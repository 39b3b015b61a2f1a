//! In-memory token store

use dashmap::DashMap;

use super::{StoreError, TokenKey, TokenStore};

/// Token store backed by a concurrent map. Contents are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: DashMap<TokenKey, String>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with the given tokens
    pub fn with_tokens(access: Option<&str>, refresh: Option<&str>) -> Self {
        let store = Self::new();
        if let Some(access) = access {
            store.tokens.insert(TokenKey::Access, access.to_string());
        }
        if let Some(refresh) = refresh {
            store.tokens.insert(TokenKey::Refresh, refresh.to_string());
        }
        store
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: TokenKey) -> Result<Option<String>, StoreError> {
        Ok(self.tokens.get(&key).map(|v| v.value().clone()))
    }

    fn set(&self, key: TokenKey, value: &str) -> Result<(), StoreError> {
        self.tokens.insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: TokenKey) -> Result<(), StoreError> {
        self.tokens.remove(&key);
        Ok(())
    }
}
