//! # mailkeep-core
//!
//! Credential store for IMAP accounts.
//!
//! Account metadata (username, server) lives in a TOML document; passwords
//! live in the operating system's secret store. This crate provides:
//! - [`ConfigStore`]: reads and writes the accounts document
//! - [`SecretStore`]: the secret backend seam, with [`KeyringStore`] and
//!   [`MemoryStore`] implementations
//! - [`CredentialManager`]: CRUD over both stores, including migration of
//!   legacy plaintext passwords into the secret store
//!
//! ```no_run
//! use mailkeep_core::CredentialManager;
//!
//! # fn main() -> mailkeep_core::Result<()> {
//! let manager = CredentialManager::open(None)?;
//! manager.add("work", "alice", "s3cr3t", "imap.example.com")?;
//! if let Some(creds) = manager.get("work")? {
//!     println!("{} @ {}", creds.username, creds.server);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod account;
pub mod config;
mod error;
mod manager;
pub mod secret;

pub use account::{
    AccountRecord, AccountStatus, AccountSummary, Credentials, Security, ServerAddress,
    ValidationError, ValidationResult, validate_account,
};
pub use config::{Accounts, ConfigError, ConfigResult, ConfigStore};
pub use error::{Error, ErrorKind, Operation, Result};
pub use manager::{
    AccountChanges, CredentialManager, MigrationOutcome, MigrationReport, RemovalPolicy,
};
pub use secret::{
    BackendInfo, KeyringStore, MemoryStore, SecretError, SecretResult, SecretStore,
    select_backend,
};
