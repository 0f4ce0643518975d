//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mailkeep_core::config::CONFIG_PATH_ENV;

/// Manage IMAP account credentials stored in the system keyring
#[derive(Parser)]
#[command(name = "mailkeep")]
#[command(author, version, about = "Manage IMAP account credentials stored in the system keyring")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the accounts document
    #[arg(short, long, global = true, env = CONFIG_PATH_ENV)]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// List all stored accounts
    #[command(about = "List all stored accounts and where their passwords live")]
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show one account
    #[command(about = "Show an account's username and server")]
    Show {
        /// Account name
        name: String,
    },

    /// Add an account
    #[command(about = "Add an account, or replace one with the same name")]
    Add {
        /// Account name (e.g. 'work', 'personal')
        name: String,

        /// IMAP username
        #[arg(short, long)]
        username: String,

        /// IMAP server, as host[:port[:ssl]]
        #[arg(short, long)]
        server: String,

        /// IMAP password (prompted without echo if omitted)
        #[arg(short, long)]
        password: Option<String>,

        /// Replace an existing account without asking
        #[arg(short, long)]
        force: bool,
    },

    /// Update an account
    #[command(about = "Change fields of an existing account")]
    Update {
        /// Account name
        name: String,

        /// New IMAP username
        #[arg(short, long)]
        username: Option<String>,

        /// New IMAP server, as host[:port[:ssl]]
        #[arg(short, long)]
        server: Option<String>,

        /// New IMAP password (pass the flag without a value to be prompted)
        #[arg(short, long, num_args = 0..=1, default_missing_value = "")]
        password: Option<String>,
    },

    /// Remove an account
    #[command(about = "Remove an account and its stored password")]
    Remove {
        /// Account name
        name: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,

        /// Fail instead of warning if the password cannot be deleted
        #[arg(long)]
        strict: bool,
    },

    /// Migrate plaintext passwords
    #[command(about = "Move plaintext passwords from the accounts document into the keyring")]
    Migrate {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show backend information
    #[command(about = "Show the accounts document location and keyring backend")]
    Info {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn update_password_flag_without_value_requests_prompt() {
        let cli = Cli::try_parse_from(["mailkeep", "update", "work", "-p"]).unwrap();
        match cli.command {
            Commands::Update { password, .. } => assert_eq!(password.as_deref(), Some("")),
            _ => panic!("expected update"),
        }
    }

    #[test]
    fn add_requires_username_and_server() {
        assert!(Cli::try_parse_from(["mailkeep", "add", "work"]).is_err());
        let cli = Cli::try_parse_from([
            "mailkeep", "add", "work", "-u", "alice", "-s", "imap.example.com",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Add { password: None, .. }));
    }
}
