//! Account validation.

/// Validation error for account input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Account name is empty.
    EmptyName,
    /// Account name contains control characters.
    InvalidName,
    /// Username is empty.
    EmptyUsername,
    /// Server descriptor is empty.
    EmptyServer,
    /// Server descriptor has too many `:`-separated parts.
    InvalidServer,
    /// Server port is not a number in 1-65535.
    InvalidPort,
    /// SSL flag is neither `true` nor `false`.
    InvalidSecurity,
}

impl ValidationError {
    /// Get human-readable error message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::EmptyName => "Account name is required",
            Self::InvalidName => "Account name must not contain control characters",
            Self::EmptyUsername => "Username is required",
            Self::EmptyServer => "IMAP server is required",
            Self::InvalidServer => "Server must look like host[:port[:ssl]]",
            Self::InvalidPort => "IMAP port must be 1-65535",
            Self::InvalidSecurity => "SSL flag must be true or false",
        }
    }

    /// Get the field name this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyName | Self::InvalidName => "name",
            Self::EmptyUsername => "username",
            Self::EmptyServer | Self::InvalidServer | Self::InvalidPort | Self::InvalidSecurity => {
                "server"
            }
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ValidationError {}

/// Result of validating an account.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Validate the fields of an account before it is stored.
///
/// The server descriptor is opaque here: it only has to be present.
/// [`ServerAddress::parse`](super::ServerAddress::parse) is for display.
/// Any password is accepted, including an empty one.
///
/// Returns `Ok(())` if valid, or `Err(Vec<ValidationError>)` with all errors.
///
/// # Errors
///
/// Returns a vector of `ValidationError` if any fields are invalid.
pub fn validate_account(name: &str, username: &str, server: &str) -> ValidationResult {
    let mut errors = Vec::new();

    if name.trim().is_empty() {
        errors.push(ValidationError::EmptyName);
    } else if name.chars().any(char::is_control) {
        errors.push(ValidationError::InvalidName);
    }

    if username.trim().is_empty() {
        errors.push(ValidationError::EmptyUsername);
    }

    if server.trim().is_empty() {
        errors.push(ValidationError::EmptyServer);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
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

    #[test]
    fn test_validate_empty_account() {
        let errors = validate_account("", "", "").unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::EmptyName,
                ValidationError::EmptyUsername,
                ValidationError::EmptyServer,
            ]
        );
    }

    #[test]
    fn test_validate_complete_account() {
        assert!(validate_account("work", "alice", "imap.example.com").is_ok());
        assert!(validate_account("work", "alice", "imap.example.com:993:True").is_ok());
    }

    #[test]
    fn test_control_characters_in_name() {
        let errors = validate_account("wo\nrk", "alice", "imap.example.com").unwrap_err();
        assert_eq!(errors, vec![ValidationError::InvalidName]);
    }

    #[test]
    fn test_server_descriptor_is_opaque() {
        for server in ["[::1]:993", "imaps://imap.example.com", "host:993:ssl", "host:0"] {
            assert!(validate_account("work", "alice", server).is_ok(), "{server}");
        }
    }

    #[test]
    fn test_blank_server_is_reported_on_server_field() {
        let errors = validate_account("work", "alice", "   ").unwrap_err();
        assert_eq!(errors, vec![ValidationError::EmptyServer]);
        assert_eq!(errors[0].field(), "server");
    }
}
