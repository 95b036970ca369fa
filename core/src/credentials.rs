//! Stored session credentials.
//!
//! # Design
//! The token and role list live in a host-provided key/value store, the
//! equivalent of a browser's persistent storage. The store is read on every
//! authenticated request and only mutated by login/logout and by the
//! unauthorized-redirect path.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing::warn;

use crate::config::ClientConfig;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("credential store I/O failed for {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("credential store encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("credential store lock poisoned")]
    Poisoned,
}

/// Persistent string key/value storage.
///
/// Methods take `&self`; implementations use interior mutability so one
/// store can be shared between the dispatcher and the failure router.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-process store. Contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// Store persisted as a flat JSON object in a single file.
///
/// Every mutation rewrites the whole file. A missing file reads as empty.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn read(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn write(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let raw = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, raw).map_err(|e| self.io_error(e))
    }

    fn update<F>(&self, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut entries = self.read()?;
        f(&mut entries);
        self.write(&entries)
    }
}

impl CredentialStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let _guard = self.lock.lock().ok()?;
        match self.read() {
            Ok(mut entries) => entries.remove(key),
            Err(e) => {
                warn!(path = %self.path.display(), "unreadable credential store: {e}");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.remove(key);
        })
    }
}

/// A bearer token and the roles granted with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub roles: Vec<String>,
}

impl Credentials {
    pub fn new(token: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            token: token.into(),
            roles,
        }
    }

    /// Stored token, treating an empty value as absent.
    pub fn token(store: &dyn CredentialStore, config: &ClientConfig) -> Option<String> {
        store.get(&config.token_key).filter(|t| !t.is_empty())
    }

    /// Load the stored session. Malformed role lists read as no roles.
    pub fn load(store: &dyn CredentialStore, config: &ClientConfig) -> Option<Self> {
        let token = Self::token(store, config)?;
        let roles = store
            .get(&config.roles_key)
            .and_then(|raw| serde_json::from_str::<Vec<String>>(&raw).ok())
            .unwrap_or_default();
        Some(Self { token, roles })
    }

    pub fn save(
        &self,
        store: &dyn CredentialStore,
        config: &ClientConfig,
    ) -> Result<(), StoreError> {
        store.set(&config.token_key, &self.token)?;
        store.set(&config.roles_key, &serde_json::to_string(&self.roles)?)
    }

    /// Remove the token and roles. Both removals are attempted; the first
    /// failure is returned.
    pub fn clear(store: &dyn CredentialStore, config: &ClientConfig) -> Result<(), StoreError> {
        let token = store.remove(&config.token_key);
        let roles = store.remove(&config.roles_key);
        token.and(roles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Refuses to remove one key and delegates everything else.
    struct StuckKey {
        inner: MemoryStore,
        stuck: &'static str,
    }

    impl CredentialStore for StuckKey {
        fn get(&self, key: &str) -> Option<String> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StoreError> {
            if key == self.stuck {
                return Err(StoreError::Poisoned);
            }
            self.inner.remove(key)
        }
    }

    #[test]
    fn clear_removes_roles_when_token_removal_fails() {
        let config = ClientConfig::default();
        let store = StuckKey {
            inner: MemoryStore::new(),
            stuck: "jwt_token",
        };
        Credentials::new("abc", vec!["admin".to_string()])
            .save(&store, &config)
            .unwrap();

        let err = Credentials::clear(&store, &config).unwrap_err();
        assert!(matches!(err, StoreError::Poisoned));
        assert!(store.get("user_roles").is_none());
        assert_eq!(store.get("jwt_token").as_deref(), Some("abc"));
    }

    #[test]
    fn memory_store_round_trips_credentials() {
        let store = MemoryStore::new();
        let config = ClientConfig::default();
        assert!(Credentials::load(&store, &config).is_none());

        let creds = Credentials::new("abc", vec!["admin".to_string(), "cliente".to_string()]);
        creds.save(&store, &config).unwrap();
        assert_eq!(store.get("jwt_token").as_deref(), Some("abc"));
        assert_eq!(store.get("user_roles").as_deref(), Some(r#"["admin","cliente"]"#));

        let loaded = Credentials::load(&store, &config).unwrap();
        assert_eq!(loaded, creds);

        Credentials::clear(&store, &config).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn empty_token_counts_as_absent() {
        let store = MemoryStore::new();
        store.set("jwt_token", "").unwrap();
        assert!(Credentials::token(&store, &ClientConfig::default()).is_none());
    }

    #[test]
    fn malformed_roles_read_as_empty() {
        let store = MemoryStore::new();
        store.set("jwt_token", "abc").unwrap();
        store.set("user_roles", "admin").unwrap();
        let loaded = Credentials::load(&store, &ClientConfig::default()).unwrap();
        assert!(loaded.roles.is_empty());
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let store = FileStore::new(&path);
        assert!(store.get("jwt_token").is_none());
        store.set("jwt_token", "persisted").unwrap();
        store.set("other", "kept").unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.get("jwt_token").as_deref(), Some("persisted"));

        reopened.remove("jwt_token").unwrap();
        assert!(store.get("jwt_token").is_none());
        assert_eq!(store.get("other").as_deref(), Some("kept"));
    }

    #[test]
    fn corrupt_file_reads_as_missing_but_refuses_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileStore::new(&path);
        assert!(store.get("jwt_token").is_none());
        assert!(matches!(store.set("jwt_token", "x"), Err(StoreError::Encode(_))));
    }
}
