//! Error types for credential operations.
//!
//! Every variant names the operation and, where there is one, the account, so
//! callers can render an actionable message without matching on strings. A
//! missing account is not an error: `get` returns `None` and `remove`
//! returns `false`.

use std::fmt;

use thiserror::Error;

use crate::account::ValidationError;
use crate::config::ConfigError;
use crate::secret::SecretError;

/// Credential manager operation, carried in errors for context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Adding or overwriting an account.
    Add,
    /// Fetching credentials.
    Get,
    /// Changing fields of an existing account.
    Update,
    /// Removing an account.
    Remove,
    /// Listing accounts.
    List,
    /// Moving a plaintext password into the secret store.
    Migrate,
}

impl Operation {
    /// Lowercase name of the operation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Get => "get",
            Self::Update => "update",
            Self::Remove => "remove",
            Self::List => "list",
            Self::Migrate => "migrate",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur in credential manager operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Writing or deleting a secret failed.
    #[error("{operation} '{account}': failed to update secret store: {source}")]
    SecretStorage {
        /// Operation that failed.
        operation: Operation,
        /// Account name.
        account: String,
        /// Backend failure.
        source: SecretError,
    },

    /// Reading a secret failed for a backend reason.
    #[error("get '{account}': failed to retrieve password: {source}")]
    SecretRetrieval {
        /// Account name.
        account: String,
        /// Backend failure.
        source: SecretError,
    },

    /// The account exists but its secret is missing.
    #[error("password not found in secret store for account '{account}'; re-add the account")]
    PasswordNotFound {
        /// Account name.
        account: String,
    },

    /// Reading or writing the accounts document failed.
    #[error("{operation}{}: {source}", for_account(.account.as_deref()))]
    Config {
        /// Operation that failed.
        operation: Operation,
        /// Account name, if the operation targets one.
        account: Option<String>,
        /// Document failure.
        source: ConfigError,
    },

    /// The account fields were rejected before anything was stored.
    #[error("invalid account '{account}': {}", join_messages(.errors))]
    Validation {
        /// Account name.
        account: String,
        /// Every problem found.
        errors: Vec<ValidationError>,
    },

    /// No functional secret backend could be selected.
    #[error("no usable secret backend: {0}")]
    NoBackend(#[source] SecretError),
}

/// Fieldless category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// See [`Error::SecretStorage`].
    SecretStorage,
    /// See [`Error::SecretRetrieval`].
    SecretRetrieval,
    /// See [`Error::PasswordNotFound`].
    PasswordNotFound,
    /// See [`Error::Config`].
    Config,
    /// See [`Error::Validation`].
    Validation,
    /// See [`Error::NoBackend`].
    NoBackend,
}

impl Error {
    /// Category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::SecretStorage { .. } => ErrorKind::SecretStorage,
            Self::SecretRetrieval { .. } => ErrorKind::SecretRetrieval,
            Self::PasswordNotFound { .. } => ErrorKind::PasswordNotFound,
            Self::Config { .. } => ErrorKind::Config,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::NoBackend(_) => ErrorKind::NoBackend,
        }
    }

    /// Account the error refers to, if any.
    #[must_use]
    pub fn account(&self) -> Option<&str> {
        match self {
            Self::SecretStorage { account, .. }
            | Self::SecretRetrieval { account, .. }
            | Self::PasswordNotFound { account }
            | Self::Validation { account, .. } => Some(account),
            Self::Config { account, .. } => account.as_deref(),
            Self::NoBackend(_) => None,
        }
    }
}

fn for_account(account: Option<&str>) -> String {
    account.map(|a| format!(" '{a}'")).unwrap_or_default()
}

fn join_messages(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ValidationError::message)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn config_error_names_operation_and_account() {
        let err = Error::Config {
            operation: Operation::Add,
            account: Some("work".into()),
            source: ConfigError::NoConfigDir,
        };
        assert_eq!(
            err.to_string(),
            "add 'work': could not determine the user configuration directory"
        );
        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(err.account(), Some("work"));
    }

    #[test]
    fn config_error_without_account() {
        let err = Error::Config {
            operation: Operation::List,
            account: None,
            source: ConfigError::NoConfigDir,
        };
        assert!(err.to_string().starts_with("list: "));
        assert_eq!(err.account(), None);
    }

    #[test]
    fn validation_lists_every_problem() {
        let err = Error::Validation {
            account: "work".into(),
            errors: vec![ValidationError::EmptyUsername, ValidationError::EmptyServer],
        };
        assert_eq!(
            err.to_string(),
            "invalid account 'work': Username is required; IMAP server is required"
        );
    }

    #[test]
    fn secret_errors_keep_their_source() {
        use std::error::Error as _;

        let err = Error::SecretRetrieval {
            account: "work".into(),
            source: SecretError::Backend {
                backend: "test",
                reason: "boom".into(),
            },
        };
        assert_eq!(err.kind(), ErrorKind::SecretRetrieval);
        assert!(err.source().is_some());
    }
}
