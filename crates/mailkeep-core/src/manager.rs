//! Credential manager.
//!
//! Reconciles the accounts document ([`ConfigStore`]) with the secret store
//! ([`SecretStore`]). The document is the authoritative index of accounts;
//! the secret store holds passwords keyed by account name. Callers only ever
//! talk to [`CredentialManager`].
//!
//! Per account, the combination of the two stores is in one of these states:
//!
//! | State             | Document record       | Secret  |
//! |-------------------|-----------------------|---------|
//! | unknown           | absent                | ignored |
//! | legacy plaintext  | with inline password  | ignored |
//! | secret present    | without password      | present |
//! | metadata only     | without password      | missing |
//!
//! Legacy records are migrated the first time they are read.
//!
//! Nothing here locks: two processes modifying accounts at the same time
//! race, and the last document write wins.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::account::{AccountRecord, AccountStatus, AccountSummary, Credentials, validate_account};
use crate::config::{Accounts, ConfigStore};
use crate::error::{Error, Operation, Result};
use crate::secret::{BackendInfo, KeyringStore, SecretStore, select_backend};

/// What `remove` does when the secret cannot be deleted.
///
/// A missing secret is never a problem; this only governs backend failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemovalPolicy {
    /// Log a warning and remove the account anyway, possibly leaving an
    /// orphaned secret behind.
    #[default]
    Lenient,
    /// Fail with [`Error::SecretStorage`] and keep the account.
    Strict,
}

/// Optional field changes for [`CredentialManager::update`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountChanges {
    /// New username.
    pub username: Option<String>,
    /// New password.
    pub password: Option<String>,
    /// New server descriptor.
    pub server: Option<String>,
}

impl AccountChanges {
    /// Whether no field would change.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.username.is_none() && self.password.is_none() && self.server.is_none()
    }
}

/// Outcome of migrating one legacy account.
#[derive(Debug)]
pub struct MigrationOutcome {
    /// Account name.
    pub account: String,
    /// `Ok` if the password now lives in the secret store.
    pub result: Result<()>,
}

/// Per-account results of [`CredentialManager::migrate_all`].
#[derive(Debug, Default)]
pub struct MigrationReport {
    /// One entry per legacy account found, in name order.
    pub outcomes: Vec<MigrationOutcome>,
}

impl MigrationReport {
    /// Names of accounts that were migrated.
    pub fn migrated(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_ok())
            .map(|o| o.account.as_str())
    }

    /// Accounts that failed, with their errors.
    pub fn failed(&self) -> impl Iterator<Item = (&str, &Error)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.account.as_str(), e)))
    }

    /// Whether every legacy account was migrated.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }
}

/// Account CRUD over the accounts document and a secret store.
///
/// Construct one per process and pass it to whatever needs credentials.
#[derive(Debug)]
pub struct CredentialManager<S> {
    config: ConfigStore,
    secrets: S,
    removal_policy: RemovalPolicy,
}

impl CredentialManager<KeyringStore> {
    /// Opens the manager with the platform keyring.
    ///
    /// Uses `config_path` if given, otherwise the default document location.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoBackend`] if the keyring fails its probe, or
    /// [`Error::Config`] if no document path can be determined.
    pub fn open(config_path: Option<PathBuf>) -> Result<Self> {
        let config = match config_path {
            Some(path) => ConfigStore::new(path),
            None => ConfigStore::open_default().map_err(|source| Error::Config {
                operation: Operation::List,
                account: None,
                source,
            })?,
        };
        let secrets = select_backend().map_err(Error::NoBackend)?;
        Ok(Self::new(config, secrets))
    }
}

impl<S: SecretStore> CredentialManager<S> {
    /// Creates a manager over the given stores.
    #[must_use]
    pub const fn new(config: ConfigStore, secrets: S) -> Self {
        Self {
            config,
            secrets,
            removal_policy: RemovalPolicy::Lenient,
        }
    }

    /// Sets how `remove` treats secret deletion failures.
    #[must_use]
    pub const fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = policy;
        self
    }

    /// The accounts document store.
    #[must_use]
    pub const fn config(&self) -> &ConfigStore {
        &self.config
    }

    /// The secret store.
    #[must_use]
    pub const fn secrets(&self) -> &S {
        &self.secrets
    }

    /// Current removal policy.
    #[must_use]
    pub const fn removal_policy(&self) -> RemovalPolicy {
        self.removal_policy
    }

    /// Adds an account, or overwrites one with the same name.
    ///
    /// The password goes to the secret store first; the document is only
    /// written once that succeeded. If the document write then fails, the
    /// secret is rolled back (restored for an overwrite, deleted otherwise)
    /// before the error is returned. A failed rollback is logged and leaves
    /// an orphaned secret, never metadata pointing at the wrong password.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`], [`Error::SecretStorage`],
    /// [`Error::Config`], or [`Error::SecretRetrieval`] if the secret being
    /// overwritten cannot be read.
    pub fn add(&self, name: &str, username: &str, password: &str, server: &str) -> Result<()> {
        validate_account(name, username, server).map_err(|errors| {
            Error::Validation {
                account: name.to_string(),
                errors,
            }
        })?;
        self.store(Operation::Add, name, username, password, server)
    }

    /// Fetches credentials for an account.
    ///
    /// Returns `Ok(None)` if the account does not exist. A legacy record is
    /// migrated before returning: its password is written to the secret
    /// store and the record is rewritten without it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PasswordNotFound`] if the account exists but has no
    /// secret, [`Error::SecretRetrieval`] if the backend fails, and
    /// [`Error::SecretStorage`] or [`Error::Config`] if a migration fails.
    pub fn get(&self, name: &str) -> Result<Option<Credentials>> {
        let mut accounts = self.read(Operation::Get, Some(name))?;
        let Some(record) = accounts.get_mut(name) else {
            return Ok(None);
        };
        let Some(password) = record.password.take() else {
            return self.fetch(name, record).map(Some);
        };

        let credentials =
            Credentials::new(record.username.clone(), password, record.server.clone());
        self.secrets
            .set(name, &credentials.password)
            .map_err(|source| Error::SecretStorage {
                operation: Operation::Migrate,
                account: name.to_string(),
                source,
            })?;
        // If this write fails the plaintext stays in the document and the
        // next read migrates again, overwriting the same secret.
        self.write(Operation::Migrate, Some(name), &accounts)?;

        info!(account = name, "migrated plaintext password into secret store");
        Ok(Some(credentials))
    }

    /// Account names, in name order. Only the document is consulted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the document cannot be read.
    pub fn list(&self) -> Result<Vec<String>> {
        Ok(self
            .read(Operation::List, None)?
            .into_keys()
            .collect())
    }

    /// Removes an account and its secret.
    ///
    /// Returns `Ok(false)` if the account does not exist. A missing secret is
    /// ignored; any other secret deletion failure is handled per the
    /// [`RemovalPolicy`]. A legacy account has no secret of its own, so a
    /// deletion failure never blocks its removal.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the document cannot be read or written,
    /// or [`Error::SecretStorage`] under [`RemovalPolicy::Strict`] for an
    /// account that is not legacy.
    pub fn remove(&self, name: &str) -> Result<bool> {
        let mut accounts = self.read(Operation::Remove, Some(name))?;
        let Some(record) = accounts.get(name) else {
            return Ok(false);
        };
        let legacy = record.is_legacy();

        if let Err(source) = self.secrets.delete(name) {
            if self.removal_policy == RemovalPolicy::Strict && !legacy {
                return Err(Error::SecretStorage {
                    operation: Operation::Remove,
                    account: name.to_string(),
                    source,
                });
            }
            warn!(account = name, "failed to delete secret, removing account anyway: {source}");
        }

        accounts.remove(name);
        self.write(Operation::Remove, Some(name), &accounts)?;
        debug!(account = name, "removed account");
        Ok(true)
    }

    /// Changes fields of an existing account.
    ///
    /// Unchanged fields keep their current values; a legacy record is
    /// migrated on the way. An account whose secret is missing can be
    /// repaired by supplying a new password. Returns the updated credentials,
    /// or `Ok(None)` if the account does not exist.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get) and [`add`](Self::add).
    pub fn update(&self, name: &str, changes: AccountChanges) -> Result<Option<Credentials>> {
        let current = match self.get(name) {
            Ok(Some(current)) => current,
            Ok(None) => return Ok(None),
            Err(Error::PasswordNotFound { .. }) if changes.password.is_some() => {
                let accounts = self.read(Operation::Update, Some(name))?;
                let Some(record) = accounts.get(name) else {
                    return Ok(None);
                };
                Credentials::new(record.username.clone(), String::new(), record.server.clone())
            }
            Err(e) => return Err(e),
        };

        let updated = Credentials {
            username: changes.username.unwrap_or(current.username),
            password: changes.password.unwrap_or(current.password),
            server: changes.server.unwrap_or(current.server),
        };
        validate_account(name, &updated.username, &updated.server).map_err(|errors| {
            Error::Validation {
                account: name.to_string(),
                errors,
            }
        })?;

        self.store(
            Operation::Update,
            name,
            &updated.username,
            &updated.password,
            &updated.server,
        )?;
        Ok(Some(updated))
    }

    /// Names of accounts that still carry an inline plaintext password.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the document cannot be read.
    pub fn legacy_accounts(&self) -> Result<Vec<String>> {
        Ok(self
            .read(Operation::Migrate, None)?
            .into_iter()
            .filter(|(_, record)| record.is_legacy())
            .map(|(name, _)| name)
            .collect())
    }

    /// Migrates every legacy account, continuing past failures.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] only if the document cannot be read up
    /// front; per-account failures are collected in the report.
    pub fn migrate_all(&self) -> Result<MigrationReport> {
        let outcomes = self
            .legacy_accounts()?
            .into_iter()
            .map(|account| {
                let result = self.get(&account).map(|_| ());
                if let Err(e) = &result {
                    warn!(account = %account, "migration failed: {e}");
                }
                MigrationOutcome { account, result }
            })
            .collect();
        Ok(MigrationReport { outcomes })
    }

    /// Metadata and password state of every account, in name order.
    ///
    /// Secret store problems are reported per account in
    /// [`AccountSummary::status`] rather than failing the listing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the document cannot be read.
    pub fn summaries(&self) -> Result<Vec<AccountSummary>> {
        let accounts = self.read(Operation::List, None)?;
        Ok(accounts
            .into_iter()
            .map(|(name, record)| {
                let status = self.status_of(&name, &record);
                AccountSummary {
                    name,
                    username: record.username,
                    server: record.server,
                    status,
                }
            })
            .collect())
    }

    /// Secret backend identification, for diagnostics.
    #[must_use]
    pub fn backend_info(&self) -> BackendInfo {
        self.secrets.describe()
    }

    fn status_of(&self, name: &str, record: &AccountRecord) -> AccountStatus {
        if record.is_legacy() {
            return AccountStatus::LegacyPlaintext;
        }
        match self.secrets.get(name) {
            Ok(Some(_)) => AccountStatus::SecretPresent,
            Ok(None) => AccountStatus::MetadataOnly,
            Err(e) => {
                debug!(account = name, "secret lookup failed: {e}");
                AccountStatus::Unreadable
            }
        }
    }

    fn fetch(&self, name: &str, record: &AccountRecord) -> Result<Credentials> {
        match self.secrets.get(name) {
            Ok(Some(password)) => Ok(Credentials::new(
                record.username.clone(),
                password,
                record.server.clone(),
            )),
            Ok(None) => Err(Error::PasswordNotFound {
                account: name.to_string(),
            }),
            Err(source) => Err(Error::SecretRetrieval {
                account: name.to_string(),
                source,
            }),
        }
    }

    fn store(
        &self,
        operation: Operation,
        name: &str,
        username: &str,
        password: &str,
        server: &str,
    ) -> Result<()> {
        let mut accounts = self.read(operation, Some(name))?;

        // Remember the secret being overwritten so a failed document write
        // can put it back. If it cannot be read, nothing is touched.
        let previous = match accounts.get(name) {
            Some(record) if !record.is_legacy() => {
                self.secrets
                    .get(name)
                    .map_err(|source| Error::SecretRetrieval {
                        account: name.to_string(),
                        source,
                    })?
            }
            _ => None,
        };

        self.secrets
            .set(name, password)
            .map_err(|source| Error::SecretStorage {
                operation,
                account: name.to_string(),
                source,
            })?;

        accounts.insert(name.to_string(), AccountRecord::new(username, server));
        if let Err(e) = self.write(operation, Some(name), &accounts) {
            self.roll_back(name, previous.as_deref());
            return Err(e);
        }

        debug!(account = name, "{operation} stored account");
        Ok(())
    }

    fn roll_back(&self, name: &str, previous: Option<&str>) {
        let result = match previous {
            Some(secret) => self.secrets.set(name, secret),
            None => self.secrets.delete(name),
        };
        match result {
            Ok(()) => debug!(account = name, "rolled back secret after document write failure"),
            Err(e) => warn!(account = name, "failed to roll back secret, it may be orphaned: {e}"),
        }
    }

    fn read(&self, operation: Operation, account: Option<&str>) -> Result<Accounts> {
        self.config.read().map_err(|source| Error::Config {
            operation,
            account: account.map(str::to_string),
            source,
        })
    }

    fn write(
        &self,
        operation: Operation,
        account: Option<&str>,
        accounts: &Accounts,
    ) -> Result<()> {
        self.config.write(accounts).map_err(|source| Error::Config {
            operation,
            account: account.map(str::to_string),
            source,
        })
    }
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
    use crate::config::ACCOUNTS_FILE;
    use crate::error::ErrorKind;
    use crate::secret::MemoryStore;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> CredentialManager<MemoryStore> {
        CredentialManager::new(
            ConfigStore::new(dir.path().join(ACCOUNTS_FILE)),
            MemoryStore::new(),
        )
    }

    #[test]
    fn add_get_list_remove() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        manager.add("work", "alice", "s3cr3t", "imap.example.com").unwrap();
        assert_eq!(
            manager.get("work").unwrap(),
            Some(Credentials::new("alice", "s3cr3t", "imap.example.com"))
        );
        assert_eq!(manager.list().unwrap(), vec!["work".to_string()]);

        assert!(manager.remove("work").unwrap());
        assert!(manager.list().unwrap().is_empty());
        assert_eq!(manager.get("work").unwrap(), None);
        assert!(manager.secrets().is_empty().unwrap());
    }

    #[test]
    fn add_overwrites_same_name() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        manager.add("work", "alice", "one", "imap.example.com").unwrap();
        manager.add("work", "alice2", "two", "imap2.example.com").unwrap();

        assert_eq!(manager.list().unwrap().len(), 1);
        assert_eq!(
            manager.get("work").unwrap(),
            Some(Credentials::new("alice2", "two", "imap2.example.com"))
        );
    }

    #[test]
    fn add_rejects_invalid_fields_before_storing() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        let err = manager.add("work", "", "pw", "imap.example.com").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(manager.secrets().is_empty().unwrap());
        assert!(!manager.config().path().exists());
    }

    #[test]
    fn unknown_account_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        assert_eq!(manager.get("nobody").unwrap(), None);
        assert!(!manager.remove("nobody").unwrap());
        assert!(manager.update("nobody", AccountChanges::default()).unwrap().is_none());
    }

    #[test]
    fn missing_secret_is_password_not_found() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        manager.add("work", "alice", "pw", "imap.example.com").unwrap();
        manager.secrets().delete("work").unwrap();

        let err = manager.get("work").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PasswordNotFound);
        assert_eq!(err.account(), Some("work"));
    }

    #[test]
    fn remove_metadata_only_account() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        manager.add("work", "alice", "pw", "imap.example.com").unwrap();
        manager.secrets().delete("work").unwrap();

        assert!(manager.remove("work").unwrap());
        assert!(manager.list().unwrap().is_empty());
    }

    #[test]
    fn update_changes_only_given_fields() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        manager.add("work", "alice", "pw", "imap.example.com").unwrap();
        let updated = manager
            .update(
                "work",
                AccountChanges {
                    password: Some("new-pw".into()),
                    ..AccountChanges::default()
                },
            )
            .unwrap()
            .unwrap();

        assert_eq!(updated, Credentials::new("alice", "new-pw", "imap.example.com"));
        assert_eq!(manager.get("work").unwrap(), Some(updated));
    }

    #[test]
    fn update_repairs_missing_secret_with_new_password() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        manager.add("work", "alice", "pw", "imap.example.com").unwrap();
        manager.secrets().delete("work").unwrap();

        let err = manager
            .update(
                "work",
                AccountChanges {
                    server: Some("imap2.example.com".into()),
                    ..AccountChanges::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PasswordNotFound);

        manager
            .update(
                "work",
                AccountChanges {
                    password: Some("fresh".into()),
                    ..AccountChanges::default()
                },
            )
            .unwrap();
        assert_eq!(
            manager.get("work").unwrap(),
            Some(Credentials::new("alice", "fresh", "imap.example.com"))
        );
    }

    #[test]
    fn summaries_report_state_per_account() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        manager.add("a-ok", "alice", "pw", "imap.example.com").unwrap();
        manager.add("b-missing", "bob", "pw", "imap.example.com").unwrap();
        manager.secrets().delete("b-missing").unwrap();

        let mut accounts = manager.config().read().unwrap();
        accounts.insert(
            "c-legacy".into(),
            AccountRecord::legacy("carol", "imap.example.com", "plain"),
        );
        manager.config().write(&accounts).unwrap();

        let statuses: Vec<_> = manager
            .summaries()
            .unwrap()
            .into_iter()
            .map(|s| (s.name, s.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("a-ok".to_string(), AccountStatus::SecretPresent),
                ("b-missing".to_string(), AccountStatus::MetadataOnly),
                ("c-legacy".to_string(), AccountStatus::LegacyPlaintext),
            ]
        );
        assert_eq!(manager.legacy_accounts().unwrap(), vec!["c-legacy".to_string()]);
    }

    #[test]
    fn backend_info_passes_through() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        assert_eq!(manager.backend_info(), MemoryStore::new().describe());
    }

    #[test]
    fn removal_policy_defaults_to_lenient() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        assert_eq!(manager.removal_policy(), RemovalPolicy::Lenient);
        let manager = manager.with_removal_policy(RemovalPolicy::Strict);
        assert_eq!(manager.removal_policy(), RemovalPolicy::Strict);
    }

    #[test]
    fn account_changes_is_empty() {
        assert!(AccountChanges::default().is_empty());
        assert!(!AccountChanges {
            username: Some("x".into()),
            ..AccountChanges::default()
        }
        .is_empty());
    }
}
