//! Process-local secret store.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::{BackendInfo, SecretError, SecretResult, SecretStore, entry_key};

const BACKEND_NAME: &str = "in-memory store";

/// Secret store that keeps entries in a map for the lifetime of the process.
///
/// Useful for tests and for embedding callers that supply passwords some
/// other way. Never chosen by [`select_backend`](super::select_backend).
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the store's lock was poisoned.
    pub fn len(&self) -> SecretResult<usize> {
        Ok(self.lock()?.len())
    }

    /// Whether the store holds no entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the store's lock was poisoned.
    pub fn is_empty(&self) -> SecretResult<bool> {
        Ok(self.lock()?.is_empty())
    }

    /// Whether an entry exists under the given full key (see
    /// [`entry_key`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the store's lock was poisoned.
    pub fn contains_key(&self, key: &str) -> SecretResult<bool> {
        Ok(self.lock()?.contains_key(key))
    }

    fn lock(&self) -> SecretResult<MutexGuard<'_, BTreeMap<String, String>>> {
        self.entries.lock().map_err(|_| SecretError::Backend {
            backend: BACKEND_NAME,
            reason: "lock poisoned".to_string(),
        })
    }
}

impl SecretStore for MemoryStore {
    fn set(&self, account: &str, secret: &str) -> SecretResult<()> {
        self.lock()?.insert(entry_key(account), secret.to_string());
        Ok(())
    }

    fn get(&self, account: &str) -> SecretResult<Option<String>> {
        Ok(self.lock()?.get(&entry_key(account)).cloned())
    }

    fn delete(&self, account: &str) -> SecretResult<()> {
        self.lock()?.remove(&entry_key(account));
        Ok(())
    }

    fn describe(&self) -> BackendInfo {
        BackendInfo {
            id: "memory",
            name: BACKEND_NAME,
            priority: 0,
            persistent: false,
            available: Some(true),
            detail: None,
        }
    }
}
