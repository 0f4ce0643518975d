//! Platform credential storage via the `keyring` crate:
//! - Linux: Secret Service (GNOME Keyring, `KWallet`)
//! - macOS: Keychain
//! - Windows: Credential Manager

use keyring::Entry;
use tracing::{debug, warn};

use super::{BackendInfo, SERVICE_NAME, SecretError, SecretResult, SecretStore, entry_key};

/// Keyring user for the startup probe. Lies outside the `mailkeep:` account
/// namespace, so no account name can collide with it.
const PROBE_USER: &str = "mailkeep-probe";

#[cfg(target_os = "macos")]
const PLATFORM: (&str, &str) = ("apple-keychain", "macOS Keychain");

#[cfg(target_os = "windows")]
const PLATFORM: (&str, &str) = ("windows-credential-manager", "Windows Credential Manager");

#[cfg(all(unix, not(target_os = "macos")))]
const PLATFORM: (&str, &str) = ("secret-service", "Secret Service");

#[cfg(not(any(unix, target_os = "windows")))]
const PLATFORM: (&str, &str) = ("keyring-mock", "keyring mock store");

/// Secret store backed by the OS keyring.
#[derive(Debug, Clone, Default)]
pub struct KeyringStore {
    probe: Option<Result<(), String>>,
}

impl KeyringStore {
    /// Creates a store without probing the backend.
    #[must_use]
    pub const fn new() -> Self {
        Self { probe: None }
    }

    /// Creates a store and checks that the backend actually works.
    ///
    /// Performs a real round trip: writes a probe value, reads it back, and
    /// deletes it. This catches platforms where `keyring` silently falls back
    /// to a non-persistent mock store, as well as locked or absent services.
    #[must_use]
    pub fn probe() -> Self {
        let result = round_trip();
        if let Err(reason) = &result {
            warn!(backend = PLATFORM.0, "secret backend probe failed: {reason}");
        }
        Self {
            probe: Some(result),
        }
    }

    fn entry(account: &str) -> SecretResult<Entry> {
        Entry::new(SERVICE_NAME, &entry_key(account)).map_err(map_error)
    }
}

fn round_trip() -> Result<(), String> {
    let entry = Entry::new(SERVICE_NAME, PROBE_USER).map_err(|e| e.to_string())?;
    let probe_value = "mailkeep-probe-value";

    entry.set_password(probe_value).map_err(|e| e.to_string())?;
    let read = entry.get_password();

    // Always clean up the probe entry
    let _ = entry.delete_credential();

    match read {
        Ok(value) if value == probe_value => Ok(()),
        Ok(_) => Err("probe value did not round-trip".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

/// Splits keyring failures into "backend unavailable" and everything else.
fn map_error(e: keyring::Error) -> SecretError {
    match e {
        keyring::Error::NoStorageAccess(_) => SecretError::Unavailable {
            backend: PLATFORM.1,
            reason: e.to_string(),
        },
        other => SecretError::Backend {
            backend: PLATFORM.1,
            reason: other.to_string(),
        },
    }
}

impl SecretStore for KeyringStore {
    fn set(&self, account: &str, secret: &str) -> SecretResult<()> {
        Self::entry(account)?
            .set_password(secret)
            .map_err(map_error)?;
        debug!("Stored password for account {account}");
        Ok(())
    }

    fn get(&self, account: &str) -> SecretResult<Option<String>> {
        match Self::entry(account)?.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => {
                debug!("No password found for account {account}");
                Ok(None)
            }
            Err(e) => Err(map_error(e)),
        }
    }

    fn delete(&self, account: &str) -> SecretResult<()> {
        match Self::entry(account)?.delete_credential() {
            Ok(()) => debug!("Deleted password for account {account}"),
            Err(keyring::Error::NoEntry) => {
                debug!("No password to delete for account {account}");
            }
            Err(e) => {
                warn!("Failed to delete password for account {account}: {e}");
                return Err(map_error(e));
            }
        }
        Ok(())
    }

    fn describe(&self) -> BackendInfo {
        let (available, detail) = match &self.probe {
            None => (None, None),
            Some(Ok(())) => (Some(true), None),
            Some(Err(reason)) => (Some(false), Some(reason.clone())),
        };
        BackendInfo {
            id: PLATFORM.0,
            name: PLATFORM.1,
            priority: 1,
            persistent: PLATFORM.0 != "keyring-mock",
            available,
            detail,
        }
    }
}
