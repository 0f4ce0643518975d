//! Account model types.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::validation::ValidationError;

/// Credentials handed to the mailbox client for one account.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Login name on the IMAP server.
    pub username: String,
    /// Plaintext password, as fetched from the secret store.
    pub password: String,
    /// Opaque server descriptor (see [`ServerAddress`]).
    pub server: String,
}

impl Credentials {
    /// Creates a new set of credentials.
    #[must_use]
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        server: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            server: server.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("server", &self.server)
            .finish()
    }
}

/// Per-account entry of the accounts document.
///
/// `password` is only ever present on records written by older releases that
/// kept the password inline. Such records are migrated into the secret store
/// the first time they are read.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    /// Login name on the IMAP server.
    pub username: String,
    /// Opaque server descriptor.
    pub server: String,
    /// Inline plaintext password of a legacy record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl AccountRecord {
    /// Creates a migrated record (no inline password).
    #[must_use]
    pub fn new(username: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            server: server.into(),
            password: None,
        }
    }

    /// Creates a legacy record carrying its password inline.
    #[must_use]
    pub fn legacy(
        username: impl Into<String>,
        server: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            server: server.into(),
            password: Some(password.into()),
        }
    }

    /// Whether the record still holds a plaintext password.
    #[must_use]
    pub const fn is_legacy(&self) -> bool {
        self.password.is_some()
    }
}

impl fmt::Debug for AccountRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountRecord")
            .field("username", &self.username)
            .field("server", &self.server)
            .field("legacy", &self.is_legacy())
            .finish()
    }
}

/// Where an account's password currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    /// Metadata and a matching secret are both present.
    SecretPresent,
    /// The record still carries an inline plaintext password.
    LegacyPlaintext,
    /// Metadata exists but the secret store has no entry for it.
    MetadataOnly,
    /// Metadata exists but the secret store failed to answer.
    Unreadable,
}

impl AccountStatus {
    /// Short label for terminal output.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::SecretPresent => "secure",
            Self::LegacyPlaintext => "plaintext (needs migration)",
            Self::MetadataOnly => "password missing",
            Self::Unreadable => "error",
        }
    }

    /// Whether `get` would succeed for an account in this state.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        matches!(self, Self::SecretPresent | Self::LegacyPlaintext)
    }
}

/// Non-secret view of one account, used for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSummary {
    /// Account name.
    pub name: String,
    /// Login name on the IMAP server.
    pub username: String,
    /// Opaque server descriptor.
    pub server: String,
    /// Where the password lives.
    pub status: AccountStatus,
}

/// Transport security of an IMAP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Security {
    /// No encryption (not recommended).
    None,
    /// Implicit TLS (connect directly with TLS).
    #[default]
    Tls,
}

impl Security {
    /// Get display name for the security mode.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::None => "None (insecure)",
            Self::Tls => "SSL/TLS",
        }
    }

    /// Default IMAP port for the security mode.
    #[must_use]
    pub const fn default_port(&self) -> u16 {
        match self {
            Self::None => 143,
            Self::Tls => 993,
        }
    }
}

/// Parsed form of a server descriptor.
///
/// Descriptors look like `host`, `host:port` or `host:port:ssl`, where `ssl`
/// is `true` or `false` in any case. The credential store never interprets
/// the descriptor; this type only exists for validation and display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerAddress {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
}

impl ServerAddress {
    /// Parses a server descriptor.
    ///
    /// # Errors
    ///
    /// Returns the first problem found in the descriptor.
    pub fn parse(descriptor: &str) -> Result<Self, ValidationError> {
        let mut parts = descriptor.trim().split(':');

        let host = parts.next().unwrap_or_default().trim();
        if host.is_empty() {
            return Err(ValidationError::EmptyServer);
        }

        let port = parts
            .next()
            .map(|p| p.trim().parse::<u16>().map_err(|_| ValidationError::InvalidPort))
            .transpose()?;
        if port == Some(0) {
            return Err(ValidationError::InvalidPort);
        }

        let security = match parts.next().map(|s| s.trim().to_ascii_lowercase()) {
            None => Security::Tls,
            Some(flag) if flag == "true" => Security::Tls,
            Some(flag) if flag == "false" => Security::None,
            Some(_) => return Err(ValidationError::InvalidSecurity),
        };

        if parts.next().is_some() {
            return Err(ValidationError::InvalidServer);
        }

        Ok(Self {
            host: host.to_string(),
            port: port.unwrap_or_else(|| security.default_port()),
            security,
        })
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ssl = match self.security {
            Security::Tls => "True",
            Security::None => "False",
        };
        write!(f, "{}:{}:{ssl}", self.host, self.port)
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

    mod credentials_tests {
        use super::*;

        #[test]
        fn debug_redacts_password() {
            let creds = Credentials::new("alice", "s3cr3t", "imap.example.com");
            let rendered = format!("{creds:?}");
            assert!(rendered.contains("alice"));
            assert!(!rendered.contains("s3cr3t"));
        }

        #[test]
        fn equality() {
            let a = Credentials::new("alice", "pw", "imap.example.com");
            let b = Credentials::new("alice", "pw", "imap.example.com");
            let c = Credentials::new("alice", "other", "imap.example.com");
            assert_eq!(a, b);
            assert_ne!(a, c);
        }
    }

    mod record_tests {
        use super::*;

        #[test]
        fn new_record_is_not_legacy() {
            assert!(!AccountRecord::new("bob", "imap.x.com").is_legacy());
        }

        #[test]
        fn legacy_record() {
            let record = AccountRecord::legacy("bob", "imap.x.com", "plain");
            assert!(record.is_legacy());
            assert!(!format!("{record:?}").contains("plain"));
        }

        #[test]
        fn password_is_not_serialized_when_absent() {
            let toml = toml::to_string(&AccountRecord::new("bob", "imap.x.com")).unwrap();
            assert!(!toml.contains("password"));
        }

        #[test]
        fn legacy_password_is_read() {
            let record: AccountRecord =
                toml::from_str("username = \"bob\"\nserver = \"imap.x.com\"\npassword = \"plain\"\n")
                    .unwrap();
            assert_eq!(record.password.as_deref(), Some("plain"));
        }
    }

    mod status_tests {
        use super::*;

        #[test]
        fn usable_states() {
            assert!(AccountStatus::SecretPresent.is_usable());
            assert!(AccountStatus::LegacyPlaintext.is_usable());
            assert!(!AccountStatus::MetadataOnly.is_usable());
            assert!(!AccountStatus::Unreadable.is_usable());
        }

        #[test]
        fn serializes_snake_case() {
            let json = serde_json::to_string(&AccountStatus::MetadataOnly).unwrap();
            assert_eq!(json, "\"metadata_only\"");
        }
    }

    mod server_address_tests {
        use super::*;

        #[test]
        fn host_only_defaults_to_tls() {
            let addr = ServerAddress::parse("imap.example.com").unwrap();
            assert_eq!(addr.host, "imap.example.com");
            assert_eq!(addr.port, 993);
            assert_eq!(addr.security, Security::Tls);
        }

        #[test]
        fn full_descriptor() {
            let addr = ServerAddress::parse("mail.example.org:143:False").unwrap();
            assert_eq!(addr.port, 143);
            assert_eq!(addr.security, Security::None);
            assert_eq!(addr.to_string(), "mail.example.org:143:False");
        }

        #[test]
        fn plaintext_without_port_uses_143() {
            let addr = ServerAddress::parse("mail.example.org::FALSE");
            assert_eq!(addr, Err(ValidationError::InvalidPort));

            let addr = ServerAddress::parse("mail.example.org:143:false").unwrap();
            assert_eq!(addr.port, Security::None.default_port());
            assert_eq!(addr.security.display_name(), "None (insecure)");
        }

        #[test]
        fn rejects_bad_descriptors() {
            assert_eq!(ServerAddress::parse(""), Err(ValidationError::EmptyServer));
            assert_eq!(ServerAddress::parse(":993"), Err(ValidationError::EmptyServer));
            assert_eq!(ServerAddress::parse("host:0"), Err(ValidationError::InvalidPort));
            assert_eq!(ServerAddress::parse("host:abc"), Err(ValidationError::InvalidPort));
            assert_eq!(
                ServerAddress::parse("host:993:maybe"),
                Err(ValidationError::InvalidSecurity)
            );
            assert_eq!(
                ServerAddress::parse("host:993:true:extra"),
                Err(ValidationError::InvalidServer)
            );
        }
    }
}
