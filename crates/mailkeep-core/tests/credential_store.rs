//! Integration tests for the credential manager.
//!
//! These tests run against a temporary accounts document and in-memory secret
//! stores, so they never touch the system keyring.

#![allow(clippy::unwrap_used)]

use std::cell::Cell;
use std::fs;
use std::path::PathBuf;

use mailkeep_core::config::ACCOUNTS_FILE;
use mailkeep_core::secret::entry_key;
use mailkeep_core::{
    AccountRecord, AccountStatus, BackendInfo, ConfigStore, CredentialManager, Credentials,
    ErrorKind, MemoryStore, RemovalPolicy, SecretError, SecretResult, SecretStore,
};
use tempfile::TempDir;

/// Secret store that fails selected operations on demand.
#[derive(Default)]
struct FaultyStore {
    inner: MemoryStore,
    fail_set: Cell<bool>,
    fail_get: Cell<bool>,
    fail_delete: Cell<bool>,
    fail_set_for: Option<String>,
}

impl FaultyStore {
    fn failure() -> SecretError {
        SecretError::Unavailable {
            backend: "faulty store",
            reason: "injected failure".to_string(),
        }
    }
}

impl SecretStore for FaultyStore {
    fn set(&self, account: &str, secret: &str) -> SecretResult<()> {
        if self.fail_set.get() || self.fail_set_for.as_deref() == Some(account) {
            return Err(Self::failure());
        }
        self.inner.set(account, secret)
    }

    fn get(&self, account: &str) -> SecretResult<Option<String>> {
        if self.fail_get.get() {
            return Err(Self::failure());
        }
        self.inner.get(account)
    }

    fn delete(&self, account: &str) -> SecretResult<()> {
        if self.fail_delete.get() {
            return Err(Self::failure());
        }
        self.inner.delete(account)
    }

    fn describe(&self) -> BackendInfo {
        self.inner.describe()
    }
}

fn document_path(dir: &TempDir) -> PathBuf {
    dir.path().join(ACCOUNTS_FILE)
}

fn manager_with<S: SecretStore>(dir: &TempDir, secrets: S) -> CredentialManager<S> {
    CredentialManager::new(ConfigStore::new(document_path(dir)), secrets)
}

/// Makes every following document write fail while reads keep working.
fn block_document_writes(dir: &TempDir) {
    let tmp = dir.path().join(format!("{ACCOUNTS_FILE}.tmp"));
    fs::create_dir(tmp).unwrap();
}

fn seed_document(dir: &TempDir, content: &str) {
    fs::write(document_path(dir), content).unwrap();
}

fn document_table(dir: &TempDir) -> toml::Table {
    toml::from_str(&fs::read_to_string(document_path(dir)).unwrap()).unwrap()
}

#[test]
fn full_lifecycle_scenario() {
    let dir = TempDir::new().unwrap();
    let manager = manager_with(&dir, MemoryStore::new());

    manager
        .add("work", "alice", "s3cr3t", "imap.example.com")
        .unwrap();
    assert_eq!(
        manager.get("work").unwrap(),
        Some(Credentials::new("alice", "s3cr3t", "imap.example.com"))
    );
    assert_eq!(manager.list().unwrap(), vec!["work"]);
    assert!(manager.remove("work").unwrap());
    assert!(manager.list().unwrap().is_empty());
    assert_eq!(manager.get("work").unwrap(), None);

    // The document is still well-formed with no accounts left.
    let table = document_table(&dir);
    assert!(table["accounts"].as_table().unwrap().is_empty());
}

#[test]
fn password_never_written_to_document() {
    let dir = TempDir::new().unwrap();
    let manager = manager_with(&dir, MemoryStore::new());

    manager
        .add("work", "alice", "s3cr3t", "imap.example.com")
        .unwrap();

    let content = fs::read_to_string(document_path(&dir)).unwrap();
    assert!(!content.contains("s3cr3t"));
    assert!(!content.contains("password"));
    assert!(manager.secrets().contains_key(&entry_key("work")).unwrap());
}

#[test]
fn legacy_record_is_migrated_on_first_get() {
    let dir = TempDir::new().unwrap();
    seed_document(
        &dir,
        "[accounts.old]\nusername = \"bob\"\nserver = \"imap.x.com\"\npassword = \"plain\"\n",
    );
    let manager = manager_with(&dir, MemoryStore::new());

    assert_eq!(
        manager.get("old").unwrap(),
        Some(Credentials::new("bob", "plain", "imap.x.com"))
    );

    let table = document_table(&dir);
    let old = table["accounts"]["old"].as_table().unwrap();
    assert!(!old.contains_key("password"));
    assert_eq!(old["username"].as_str(), Some("bob"));
    assert_eq!(
        manager.secrets().get("old").unwrap().as_deref(),
        Some("plain")
    );
    assert!(manager.secrets().contains_key(&entry_key("old")).unwrap());
}

#[test]
fn second_get_does_not_touch_document() {
    let dir = TempDir::new().unwrap();
    seed_document(
        &dir,
        "[accounts.old]\nusername = \"bob\"\nserver = \"imap.x.com\"\npassword = \"plain\"\n",
    );
    let manager = manager_with(&dir, MemoryStore::new());
    let first = manager.get("old").unwrap();

    // Any further document write would now fail.
    block_document_writes(&dir);
    let before = fs::read_to_string(document_path(&dir)).unwrap();

    assert_eq!(manager.get("old").unwrap(), first);
    assert_eq!(fs::read_to_string(document_path(&dir)).unwrap(), before);
}

#[test]
fn migrating_one_account_keeps_other_legacy_passwords() {
    let dir = TempDir::new().unwrap();
    seed_document(
        &dir,
        "[accounts.a]\nusername = \"a\"\nserver = \"imap.a.com\"\npassword = \"pa\"\n\n\
         [accounts.b]\nusername = \"b\"\nserver = \"imap.b.com\"\npassword = \"pb\"\n",
    );
    let manager = manager_with(&dir, MemoryStore::new());

    manager.get("a").unwrap();
    assert_eq!(manager.legacy_accounts().unwrap(), vec!["b"]);
    assert_eq!(
        manager.get("b").unwrap(),
        Some(Credentials::new("b", "pb", "imap.b.com"))
    );
    assert!(manager.legacy_accounts().unwrap().is_empty());
}

#[test]
fn failed_migration_leaves_plaintext_for_retry() {
    let dir = TempDir::new().unwrap();
    seed_document(
        &dir,
        "[accounts.old]\nusername = \"bob\"\nserver = \"imap.x.com\"\npassword = \"plain\"\n",
    );
    let store = FaultyStore::default();
    store.fail_set.set(true);
    let manager = manager_with(&dir, store);

    let err = manager.get("old").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SecretStorage);
    assert_eq!(manager.legacy_accounts().unwrap(), vec!["old"]);

    manager.secrets().fail_set.set(false);
    assert_eq!(
        manager.get("old").unwrap(),
        Some(Credentials::new("bob", "plain", "imap.x.com"))
    );
}

#[test]
fn migration_with_failed_document_write_stays_legacy() {
    let dir = TempDir::new().unwrap();
    seed_document(
        &dir,
        "[accounts.old]\nusername = \"bob\"\nserver = \"imap.x.com\"\npassword = \"plain\"\n",
    );
    let manager = manager_with(&dir, MemoryStore::new());
    let before = fs::read_to_string(document_path(&dir)).unwrap();

    block_document_writes(&dir);
    let err = manager.get("old").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    assert_eq!(err.account(), Some("old"));

    assert_eq!(fs::read_to_string(document_path(&dir)).unwrap(), before);
    assert_eq!(manager.legacy_accounts().unwrap(), vec!["old"]);
    let summaries = manager.summaries().unwrap();
    assert_eq!(summaries[0].status, AccountStatus::LegacyPlaintext);

    // Once writes work again the next read finishes the migration.
    fs::remove_dir(dir.path().join(format!("{ACCOUNTS_FILE}.tmp"))).unwrap();
    assert_eq!(
        manager.get("old").unwrap(),
        Some(Credentials::new("bob", "plain", "imap.x.com"))
    );
    assert!(manager.legacy_accounts().unwrap().is_empty());
}

#[test]
fn migrate_all_continues_past_failures() {
    let dir = TempDir::new().unwrap();
    seed_document(
        &dir,
        "[accounts.bad]\nusername = \"x\"\nserver = \"imap.x.com\"\npassword = \"px\"\n\n\
         [accounts.good]\nusername = \"y\"\nserver = \"imap.y.com\"\npassword = \"py\"\n\n\
         [accounts.modern]\nusername = \"z\"\nserver = \"imap.z.com\"\n",
    );
    let store = FaultyStore {
        fail_set_for: Some("bad".to_string()),
        ..FaultyStore::default()
    };
    let manager = manager_with(&dir, store);

    let report = manager.migrate_all().unwrap();
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.migrated().collect::<Vec<_>>(), vec!["good"]);

    let failed: Vec<_> = report.failed().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, "bad");
    assert_eq!(failed[0].1.kind(), ErrorKind::SecretStorage);
    assert!(!report.is_complete());

    assert_eq!(manager.legacy_accounts().unwrap(), vec!["bad"]);
}

#[test]
fn migrate_all_with_nothing_to_do() {
    let dir = TempDir::new().unwrap();
    let manager = manager_with(&dir, MemoryStore::new());
    manager.add("work", "alice", "pw", "imap.example.com").unwrap();

    let report = manager.migrate_all().unwrap();
    assert!(report.outcomes.is_empty());
    assert!(report.is_complete());
}

#[test]
fn add_rolls_back_secret_when_document_write_fails() {
    let dir = TempDir::new().unwrap();
    let manager = manager_with(&dir, MemoryStore::new());
    manager.add("work", "alice", "pw", "imap.example.com").unwrap();

    block_document_writes(&dir);
    let err = manager
        .add("new", "carol", "fresh", "imap.example.com")
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Config);
    assert_eq!(err.account(), Some("new"));
    assert_eq!(manager.list().unwrap(), vec!["work"]);
    assert_eq!(manager.secrets().get("new").unwrap(), None);
    assert_eq!(manager.get("new").unwrap(), None);
}

#[test]
fn failed_overwrite_restores_previous_secret() {
    let dir = TempDir::new().unwrap();
    let manager = manager_with(&dir, MemoryStore::new());
    manager.add("work", "alice", "old-pw", "imap.example.com").unwrap();

    block_document_writes(&dir);
    let err = manager
        .add("work", "alice", "new-pw", "imap.example.com")
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Config);
    assert_eq!(
        manager.get("work").unwrap(),
        Some(Credentials::new("alice", "old-pw", "imap.example.com"))
    );
}

#[test]
fn overwrite_with_unreadable_previous_secret_keeps_it() {
    let dir = TempDir::new().unwrap();
    let manager = manager_with(&dir, FaultyStore::default());
    manager.add("work", "alice", "old-pw", "imap.example.com").unwrap();

    manager.secrets().fail_get.set(true);
    block_document_writes(&dir);
    let err = manager
        .add("work", "alice", "new-pw", "imap.example.com")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SecretRetrieval);
    assert_eq!(err.account(), Some("work"));

    manager.secrets().fail_get.set(false);
    assert_eq!(manager.list().unwrap(), vec!["work"]);
    assert_eq!(
        manager.get("work").unwrap(),
        Some(Credentials::new("alice", "old-pw", "imap.example.com"))
    );
}

#[test]
fn failed_rollback_still_reports_document_failure() {
    let dir = TempDir::new().unwrap();
    let store = FaultyStore::default();
    store.fail_delete.set(true);
    let manager = manager_with(&dir, store);

    block_document_writes(&dir);
    let err = manager
        .add("new", "carol", "fresh", "imap.example.com")
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(manager.list().unwrap().is_empty());
    // The orphaned secret is the accepted leftover.
    assert_eq!(
        manager.secrets().inner.get("new").unwrap().as_deref(),
        Some("fresh")
    );
}

#[test]
fn add_does_not_write_document_when_secret_fails() {
    let dir = TempDir::new().unwrap();
    let store = FaultyStore::default();
    store.fail_set.set(true);
    let manager = manager_with(&dir, store);

    let err = manager
        .add("work", "alice", "pw", "imap.example.com")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SecretStorage);
    assert!(manager.list().unwrap().is_empty());
    assert!(!document_path(&dir).exists());
}

#[test]
fn backend_failure_on_get_is_retrieval_error() {
    let dir = TempDir::new().unwrap();
    let manager = manager_with(&dir, FaultyStore::default());
    manager.add("work", "alice", "pw", "imap.example.com").unwrap();

    manager.secrets().fail_get.set(true);
    let err = manager.get("work").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SecretRetrieval);

    let summaries = manager.summaries().unwrap();
    assert_eq!(summaries[0].status, AccountStatus::Unreadable);
}

#[test]
fn lenient_remove_ignores_secret_failure() {
    let dir = TempDir::new().unwrap();
    let manager = manager_with(&dir, FaultyStore::default());
    manager.add("work", "alice", "pw", "imap.example.com").unwrap();

    manager.secrets().fail_delete.set(true);
    assert!(manager.remove("work").unwrap());
    assert!(manager.list().unwrap().is_empty());
}

#[test]
fn strict_remove_keeps_account_on_secret_failure() {
    let dir = TempDir::new().unwrap();
    let manager = manager_with(&dir, FaultyStore::default())
        .with_removal_policy(RemovalPolicy::Strict);
    manager.add("work", "alice", "pw", "imap.example.com").unwrap();

    manager.secrets().fail_delete.set(true);
    let err = manager.remove("work").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SecretStorage);
    assert_eq!(manager.list().unwrap(), vec!["work"]);
}

#[test]
fn strict_remove_of_legacy_account_ignores_secret_failure() {
    let dir = TempDir::new().unwrap();
    let manager = manager_with(&dir, FaultyStore::default())
        .with_removal_policy(RemovalPolicy::Strict);
    let mut accounts = manager.config().read().unwrap();
    accounts.insert(
        "old".to_string(),
        AccountRecord::legacy("bob", "imap.x.com", "plain"),
    );
    manager.config().write(&accounts).unwrap();

    manager.secrets().fail_delete.set(true);
    assert!(manager.remove("old").unwrap());
    assert!(manager.list().unwrap().is_empty());
}

#[test]
fn remove_of_legacy_account_without_secret() {
    let dir = TempDir::new().unwrap();
    let manager = manager_with(&dir, MemoryStore::new());
    let mut accounts = manager.config().read().unwrap();
    accounts.insert(
        "old".to_string(),
        AccountRecord::legacy("bob", "imap.x.com", "plain"),
    );
    manager.config().write(&accounts).unwrap();

    assert!(manager.remove("old").unwrap());
    assert!(!manager.remove("old").unwrap());
}

#[test]
fn corrupt_document_is_an_error_not_absence() {
    let dir = TempDir::new().unwrap();
    seed_document(&dir, "accounts = [this is not toml");
    let manager = manager_with(&dir, MemoryStore::new());

    assert_eq!(manager.get("work").unwrap_err().kind(), ErrorKind::Config);
    assert_eq!(manager.list().unwrap_err().kind(), ErrorKind::Config);
    assert_eq!(manager.remove("work").unwrap_err().kind(), ErrorKind::Config);
    assert_eq!(
        manager
            .add("work", "alice", "pw", "imap.example.com")
            .unwrap_err()
            .kind(),
        ErrorKind::Config
    );
    // Nothing was stored for the rejected add.
    assert!(manager.secrets().is_empty().unwrap());
}

#[test]
fn list_is_sorted_by_name() {
    let dir = TempDir::new().unwrap();
    let manager = manager_with(&dir, MemoryStore::new());
    for name in ["zeta", "alpha", "mid"] {
        manager.add(name, "u", "p", "imap.example.com").unwrap();
    }
    assert_eq!(manager.list().unwrap(), vec!["alpha", "mid", "zeta"]);
}

#[test]
fn names_with_special_characters_round_trip() {
    let dir = TempDir::new().unwrap();
    let manager = manager_with(&dir, MemoryStore::new());
    let name = "alice@example.com work.inbox";
    manager.add(name, "alice", "pw", "imap.example.com:993:True").unwrap();

    assert_eq!(manager.list().unwrap(), vec![name]);
    assert_eq!(
        manager.get(name).unwrap(),
        Some(Credentials::new("alice", "pw", "imap.example.com:993:True"))
    );
}

#[test]
fn server_descriptors_and_passwords_are_stored_verbatim() {
    let dir = TempDir::new().unwrap();
    let manager = manager_with(&dir, MemoryStore::new());
    let cases = [
        ("v6", "[::1]:993"),
        ("url", "imaps://imap.example.com"),
        ("flag", "host:993:ssl"),
    ];

    for (name, server) in cases {
        manager.add(name, "alice", "", server).unwrap();
    }
    for (name, server) in cases {
        assert_eq!(
            manager.get(name).unwrap(),
            Some(Credentials::new("alice", "", server))
        );
    }
}
