//! Account metadata document.
//!
//! Non-secret account data lives in a TOML document with a single top-level
//! `accounts` table keyed by account name:
//!
//! ```toml
//! [accounts.work]
//! username = "alice"
//! server = "imap.example.com"
//! ```
//!
//! The document is the authoritative index of which accounts exist. It is
//! re-read on every operation and replaced wholesale on every write; there is
//! no locking, so concurrent writers race and the last one wins.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::account::AccountRecord;

/// Directory name under the platform config dir.
pub const CONFIG_DIR_NAME: &str = "mailkeep";

/// File name of the accounts document.
pub const ACCOUNTS_FILE: &str = "accounts.toml";

/// Environment variable overriding the accounts document path.
pub const CONFIG_PATH_ENV: &str = "MAILKEEP_CONFIG";

/// Account records keyed by account name, in name order.
pub type Accounts = BTreeMap<String, AccountRecord>;

/// Errors related to the accounts document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// Document path.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The document is not valid TOML or does not match the expected shape.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        /// Document path.
        path: PathBuf,
        /// Underlying parse error.
        source: toml::de::Error,
    },

    /// The accounts could not be serialized.
    #[error("failed to serialize accounts: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The document (or its directory) could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The platform has no user configuration directory.
    #[error("could not determine the user configuration directory")]
    NoConfigDir,
}

/// Result type alias for accounts document operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// On-disk shape of the accounts document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct AccountsFile {
    #[serde(default)]
    accounts: Accounts,
}

/// Reads and writes the accounts document.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Creates a store backed by the given document path.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Creates a store at the default location.
    ///
    /// See [`default_path`](Self::default_path).
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration directory cannot be determined.
    pub fn open_default() -> ConfigResult<Self> {
        Ok(Self::new(Self::default_path()?))
    }

    /// Resolves the default document path.
    ///
    /// `$MAILKEEP_CONFIG` wins if set and non-empty, otherwise the document
    /// lives at `<config dir>/mailkeep/accounts.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration directory cannot be determined.
    pub fn default_path() -> ConfigResult<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
            return Ok(PathBuf::from(path));
        }
        let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(dir.join(CONFIG_DIR_NAME).join(ACCOUNTS_FILE))
    }

    /// Returns the document path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every account record.
    ///
    /// A missing document is an empty account set. A document that exists but
    /// does not parse is an error; it is never partially loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be read or parsed.
    pub fn read(&self) -> ConfigResult<Accounts> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no accounts document yet");
                return Ok(Accounts::new());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let file: AccountsFile = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;
        Ok(file.accounts)
    }

    /// Replaces the document with the given account records.
    ///
    /// Records are written exactly as given: a record only carries a
    /// `password` key if it is still an unmigrated legacy record. The new
    /// content is written to a sibling file and renamed into place, and the
    /// parent directory is created if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any filesystem step fails.
    pub fn write(&self, accounts: &Accounts) -> ConfigResult<()> {
        let file = AccountsFile {
            accounts: accounts.clone(),
        };
        let content = toml::to_string_pretty(&file)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let tmp = self.temp_path();
        let result = fs::write(&tmp, content)
            .and_then(|()| restrict_permissions(&tmp))
            .and_then(|()| fs::rename(&tmp, &self.path));
        if let Err(source) = result {
            let _ = fs::remove_file(&tmp);
            return Err(ConfigError::Write {
                path: self.path.clone(),
                source,
            });
        }

        debug!(path = %self.path.display(), accounts = accounts.len(), "wrote accounts document");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Owner-only read/write on Unix; a no-op elsewhere.
fn restrict_permissions(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    #[cfg(not(unix))]
    {
        let _ = path;
    }

    Ok(())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> ConfigStore {
        ConfigStore::new(dir.path().join("nested").join(ACCOUNTS_FILE))
    }

    #[test]
    fn missing_document_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(store.read().unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn write_creates_parent_and_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let mut accounts = Accounts::new();
        accounts.insert("work".into(), AccountRecord::new("alice", "imap.example.com"));
        store.write(&accounts).unwrap();

        assert!(store.path().exists());
        assert_eq!(store.read().unwrap(), accounts);
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn empty_accounts_are_well_formed() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.write(&Accounts::new()).unwrap();

        let content = fs::read_to_string(store.path()).unwrap();
        assert!(content.contains("[accounts]"));
        assert!(store.read().unwrap().is_empty());
    }

    #[test]
    fn migrated_records_have_no_password_key() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let mut accounts = Accounts::new();
        accounts.insert("work".into(), AccountRecord::new("alice", "imap.example.com"));
        accounts.insert("old".into(), AccountRecord::legacy("bob", "imap.x.com", "plain"));
        store.write(&accounts).unwrap();

        let content = fs::read_to_string(store.path()).unwrap();
        let doc: toml::Table = toml::from_str(&content).unwrap();
        let table = doc["accounts"].as_table().unwrap();
        assert!(!table["work"].as_table().unwrap().contains_key("password"));
        assert_eq!(table["old"]["password"].as_str(), Some("plain"));
    }

    #[test]
    fn document_without_accounts_table_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "# nothing here\n").unwrap();
        assert!(store.read().unwrap().is_empty());
    }

    #[test]
    fn corrupt_document_fails_explicitly() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "[accounts.work\nusername = ").unwrap();

        let err = store.read().unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(ACCOUNTS_FILE));
    }

    #[test]
    fn record_missing_fields_fails_explicitly() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "[accounts.work]\nusername = \"alice\"\n").unwrap();
        assert!(matches!(store.read(), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn write_failure_surfaces_as_write_error() {
        let dir = TempDir::new().unwrap();
        // The parent "directory" is a regular file, so nothing can be created under it.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let store = ConfigStore::new(blocker.join(ACCOUNTS_FILE));

        let err = store.write(&Accounts::new()).unwrap_err();
        assert!(matches!(err, ConfigError::Write { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn document_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.write(&Accounts::new()).unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
