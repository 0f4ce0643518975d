//! Account model and validation.

mod model;
mod validation;

pub use model::{
    AccountRecord, AccountStatus, AccountSummary, Credentials, Security, ServerAddress,
};
pub use validation::{ValidationError, ValidationResult, validate_account};
