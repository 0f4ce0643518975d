//! Secret storage backends.
//!
//! Passwords never touch the accounts document once migrated; they live in a
//! [`SecretStore`]. Every entry is keyed by [`entry_key`], which scopes the
//! account name under the fixed [`SERVICE_NAME`] namespace.
//!
//! Backends:
//! - [`KeyringStore`]: the platform's native credential storage
//!   (Secret Service on Linux, Keychain on macOS, Credential Manager on
//!   Windows). Selected at startup by [`select_backend`].
//! - [`MemoryStore`]: process-local map, never selected automatically.

mod memory;
mod native;

use serde::Serialize;
use thiserror::Error;

pub use self::memory::MemoryStore;
pub use self::native::KeyringStore;

/// Service namespace for every secret this application stores.
pub const SERVICE_NAME: &str = "mailkeep";

/// Builds the secret key for an account: `mailkeep:<account>`.
#[must_use]
pub fn entry_key(account: &str) -> String {
    format!("{SERVICE_NAME}:{account}")
}

/// Failure reported by a secret backend.
///
/// A missing entry is not an error: [`SecretStore::get`] returns `Ok(None)`
/// and [`SecretStore::delete`] succeeds.
#[derive(Debug, Error)]
pub enum SecretError {
    /// The backend is not running, locked, or refused access.
    #[error("{backend} is unavailable: {reason}")]
    Unavailable {
        /// Backend display name.
        backend: &'static str,
        /// What the platform reported.
        reason: String,
    },

    /// Any other failure reported by the backend.
    #[error("{backend} error: {reason}")]
    Backend {
        /// Backend display name.
        backend: &'static str,
        /// What the platform reported.
        reason: String,
    },
}

/// Result type for secret backend operations.
pub type SecretResult<T> = std::result::Result<T, SecretError>;

/// Diagnostic identification of a secret backend.
///
/// Contains nothing read from the store itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendInfo {
    /// Stable backend identifier (e.g. `secret-service`).
    pub id: &'static str,
    /// Human-readable backend name.
    pub name: &'static str,
    /// Position in the startup selection order; `0` means never auto-selected.
    pub priority: u8,
    /// Whether entries outlive the process.
    pub persistent: bool,
    /// Result of the startup probe, if one ran.
    pub available: Option<bool>,
    /// Why the probe failed, if it did.
    pub detail: Option<String>,
}

/// Key/value storage for account passwords.
///
/// Implementations derive the storage key from the account name with
/// [`entry_key`].
pub trait SecretStore {
    /// Stores `secret` for `account`, overwriting any existing value.
    ///
    /// # Errors
    ///
    /// Returns `SecretError` if the backend rejects the write.
    fn set(&self, account: &str, secret: &str) -> SecretResult<()>;

    /// Fetches the secret for `account`.
    ///
    /// # Returns
    /// `Some(secret)` if found, `None` if no entry exists
    ///
    /// # Errors
    ///
    /// Returns `SecretError` if the backend fails to answer.
    fn get(&self, account: &str) -> SecretResult<Option<String>>;

    /// Deletes the secret for `account`. Deleting a missing entry succeeds.
    ///
    /// # Errors
    ///
    /// Returns `SecretError` if the backend fails for any other reason.
    fn delete(&self, account: &str) -> SecretResult<()>;

    /// Identifies the backend for diagnostics.
    fn describe(&self) -> BackendInfo;
}

impl<T: SecretStore + ?Sized> SecretStore for &T {
    fn set(&self, account: &str, secret: &str) -> SecretResult<()> {
        (**self).set(account, secret)
    }

    fn get(&self, account: &str) -> SecretResult<Option<String>> {
        (**self).get(account)
    }

    fn delete(&self, account: &str) -> SecretResult<()> {
        (**self).delete(account)
    }

    fn describe(&self) -> BackendInfo {
        (**self).describe()
    }
}

impl<T: SecretStore + ?Sized> SecretStore for Box<T> {
    fn set(&self, account: &str, secret: &str) -> SecretResult<()> {
        (**self).set(account, secret)
    }

    fn get(&self, account: &str) -> SecretResult<Option<String>> {
        (**self).get(account)
    }

    fn delete(&self, account: &str) -> SecretResult<()> {
        (**self).delete(account)
    }

    fn describe(&self) -> BackendInfo {
        (**self).describe()
    }
}

/// Picks the secret backend for this process.
///
/// The platform keyring is the only automatic candidate. It is probed with a
/// write/read/delete round trip, and a backend that fails the probe is
/// reported rather than used.
///
/// # Errors
///
/// Returns `SecretError::Unavailable` if no functional backend exists.
pub fn select_backend() -> SecretResult<KeyringStore> {
    let store = KeyringStore::probe();
    let info = store.describe();
    if info.available == Some(true) {
        tracing::debug!(backend = info.id, "selected secret backend");
        Ok(store)
    } else {
        Err(SecretError::Unavailable {
            backend: info.name,
            reason: info
                .detail
                .unwrap_or_else(|| "probe round trip failed".to_string()),
        })
    }
}
