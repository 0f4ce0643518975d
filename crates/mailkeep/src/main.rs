//! `mailkeep` - IMAP account credential manager
//!
//! Stores account metadata in a TOML document and passwords in the system keyring.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;
use mailkeep_core::ErrorKind;
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Commands};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let default_filter = if cli.verbose {
        "mailkeep=debug,mailkeep_core=debug"
    } else {
        "mailkeep=info,mailkeep_core=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    debug!(config = ?cli.config, "starting mailkeep");

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            if let Some(hint) = hint_for(&e) {
                eprintln!("Hint: {hint}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.config;
    match cli.command {
        Commands::List { json } => commands::cmd_list(config, json),
        Commands::Show { name } => commands::cmd_show(config, &name),
        Commands::Add {
            name,
            username,
            server,
            password,
            force,
        } => commands::cmd_add(config, &name, &username, &server, password, force),
        Commands::Update {
            name,
            username,
            server,
            password,
        } => commands::cmd_update(config, &name, username, server, password),
        Commands::Remove {
            name,
            force,
            strict,
        } => commands::cmd_remove(config, &name, force, strict),
        Commands::Migrate { yes } => commands::cmd_migrate(config, yes),
        Commands::Info { json } => commands::cmd_info(config, json),
    }
}

fn hint_for(error: &anyhow::Error) -> Option<&'static str> {
    let kind = error.downcast_ref::<mailkeep_core::Error>()?.kind();
    match kind {
        ErrorKind::NoBackend => Some("run `mailkeep info` to see why the keyring is unavailable"),
        ErrorKind::Config => Some("check the accounts document for syntax errors"),
        _ => None,
    }
}
