//! Token store persisted as a small JSON file

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use super::{StoreError, TokenKey, TokenStore};

type TokenMap = BTreeMap<String, String>;

/// Token store that keeps credentials in a JSON object on disk.
///
/// Every write replaces the file through a temp file + rename so a crash
/// never leaves a half-written token file behind. A missing file reads as
/// an empty store.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<TokenMap, StoreError> {
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(TokenMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(TokenMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_map(&self, map: &TokenMap) -> Result<(), StoreError> {
        if map.is_empty() {
            return match std::fs::remove_file(&self.path) {
                Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            };
        }

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(map)?)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!("Wrote token file {:?}", self.path);
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut TokenMap)) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut map = self.read_map()?;
        f(&mut map);
        self.write_map(&map)
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: TokenKey) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.read_map()?.remove(key.as_str()))
    }

    fn set(&self, key: TokenKey, value: &str) -> Result<(), StoreError> {
        self.update(|map| {
            map.insert(key.as_str().to_string(), value.to_string());
        })
    }

    fn remove(&self, key: TokenKey) -> Result<(), StoreError> {
        self.update(|map| {
            map.remove(key.as_str());
        })
    }

    // Single write so the pair can never be observed half-updated on disk
    fn set_tokens(&self, access: &str, refresh: &str) -> Result<(), StoreError> {
        self.update(|map| {
            map.insert(TokenKey::Access.as_str().to_string(), access.to_string());
            map.insert(TokenKey::Refresh.as_str().to_string(), refresh.to_string());
        })
    }

    fn clear_tokens(&self) -> Result<(), StoreError> {
        self.update(|map| {
            map.remove(TokenKey::Access.as_str());
            map.remove(TokenKey::Refresh.as_str());
        })
    }
}
