//! Command handlers.

use std::io::{self, Write as _};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use mailkeep_core::{
    AccountChanges, AccountStatus, AccountSummary, ConfigStore, CredentialManager, ErrorKind,
    KeyringStore, RemovalPolicy, ServerAddress,
};
use tracing::debug;

type Manager = CredentialManager<KeyringStore>;

/// Opens the manager with a probed keyring backend.
fn open(config: Option<PathBuf>) -> Result<Manager> {
    CredentialManager::open(config).context(
        "cannot open the credential store; make sure you are logged into a desktop session \
         and the system keyring is unlocked",
    )
}

/// y/N confirmation prompt.
fn confirm(message: &str) -> Result<bool> {
    print!("{message} [y/N]: ");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn prompt_password(prompt: &str) -> Result<String> {
    rpassword::prompt_password(prompt).context("failed to read password")
}

/// List command handler
pub fn cmd_list(config: Option<PathBuf>, json: bool) -> Result<()> {
    let manager = open(config)?;
    let summaries = manager.summaries()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        println!("No accounts stored.");
        return Ok(());
    }

    print_table(&summaries);

    let count = |status| summaries.iter().filter(|s| s.status == status).count();
    println!();
    println!(
        "Summary: {} working, {} plaintext, {} missing passwords, {} errors",
        count(AccountStatus::SecretPresent),
        count(AccountStatus::LegacyPlaintext),
        count(AccountStatus::MetadataOnly),
        count(AccountStatus::Unreadable),
    );
    Ok(())
}

fn print_table(summaries: &[AccountSummary]) {
    let width = |f: fn(&AccountSummary) -> &str, header: &str| {
        summaries
            .iter()
            .map(|s| f(s).chars().count())
            .chain([header.len()])
            .max()
            .unwrap_or_default()
    };
    let name_w = width(|s| &s.name, "ACCOUNT");
    let user_w = width(|s| &s.username, "USERNAME");
    let server_w = width(|s| &s.server, "SERVER");

    println!(
        "{:<name_w$}  {:<user_w$}  {:<server_w$}  PASSWORD",
        "ACCOUNT", "USERNAME", "SERVER"
    );
    for s in summaries {
        println!(
            "{:<name_w$}  {:<user_w$}  {:<server_w$}  {}",
            s.name,
            s.username,
            s.server,
            s.status.label()
        );
    }
}

/// Show command handler
pub fn cmd_show(config: Option<PathBuf>, name: &str) -> Result<()> {
    let manager = open(config)?;
    let Some(summary) = manager.summaries()?.into_iter().find(|s| s.name == name) else {
        bail!("account '{name}' not found");
    };

    println!("Account:  {}", summary.name);
    println!("Username: {}", summary.username);
    match ServerAddress::parse(&summary.server) {
        Ok(addr) => {
            println!("Server:   {}", addr.host);
            println!("Port:     {}", addr.port);
            println!("Security: {}", addr.security.display_name());
        }
        Err(e) => {
            debug!("unparsed server descriptor: {e}");
            println!("Server:   {}", summary.server);
        }
    }
    println!("Password: {}", summary.status.label());
    Ok(())
}

/// Add command handler
pub fn cmd_add(
    config: Option<PathBuf>,
    name: &str,
    username: &str,
    server: &str,
    password: Option<String>,
    force: bool,
) -> Result<()> {
    let manager = open(config)?;

    if !force
        && manager.list()?.iter().any(|n| n == name)
        && !confirm(&format!("Account '{name}' already exists. Overwrite?"))?
    {
        println!("Operation cancelled.");
        return Ok(());
    }

    let password = match password {
        Some(p) => p,
        None => prompt_password("Password: ")?,
    };

    manager.add(name, username, &password, server)?;
    println!("Account '{name}' added.");
    println!("Password stored in {}.", manager.backend_info().name);
    Ok(())
}

/// Update command handler
pub fn cmd_update(
    config: Option<PathBuf>,
    name: &str,
    username: Option<String>,
    server: Option<String>,
    password: Option<String>,
) -> Result<()> {
    let password = match password.as_deref() {
        Some("") => Some(prompt_password("New password: ")?),
        _ => password,
    };
    let changes = AccountChanges {
        username,
        password,
        server,
    };
    if changes.is_empty() {
        println!("No changes specified.");
        return Ok(());
    }

    let manager = open(config)?;
    match manager.update(name, changes) {
        Ok(Some(updated)) => {
            println!("Account '{name}' updated.");
            println!("  Username: {}", updated.username);
            println!("  Server:   {}", updated.server);
            Ok(())
        }
        Ok(None) => bail!("account '{name}' not found"),
        Err(e) if e.kind() == ErrorKind::PasswordNotFound => Err(anyhow::Error::new(e)
            .context(format!("supply a new password with: mailkeep update {name} --password"))),
        Err(e) => Err(e.into()),
    }
}

/// Remove command handler
pub fn cmd_remove(config: Option<PathBuf>, name: &str, force: bool, strict: bool) -> Result<()> {
    let policy = if strict {
        RemovalPolicy::Strict
    } else {
        RemovalPolicy::Lenient
    };
    let manager = open(config)?.with_removal_policy(policy);

    if !manager.list()?.iter().any(|n| n == name) {
        bail!("account '{name}' not found");
    }
    if !force && !confirm(&format!("Remove account '{name}'?"))? {
        println!("Operation cancelled.");
        return Ok(());
    }

    if manager.remove(name)? {
        println!("Account '{name}' removed.");
        Ok(())
    } else {
        bail!("account '{name}' not found")
    }
}

/// Migrate command handler
pub fn cmd_migrate(config: Option<PathBuf>, yes: bool) -> Result<()> {
    let manager = open(config)?;
    let pending = manager.legacy_accounts()?;

    if pending.is_empty() {
        println!("All accounts already use secure storage.");
        return Ok(());
    }

    println!("Found {} account(s) with plaintext passwords:", pending.len());
    for name in &pending {
        println!("  - {name}");
    }
    if !yes && !confirm("Move these passwords into the keyring?")? {
        println!("Migration cancelled.");
        return Ok(());
    }

    let report = manager.migrate_all()?;
    for name in report.migrated() {
        println!("Migrated: {name}");
    }
    for (name, e) in report.failed() {
        eprintln!("Failed to migrate {name}: {e}");
    }

    let migrated = report.migrated().count();
    println!("{migrated}/{} account(s) migrated.", report.outcomes.len());
    if report.is_complete() {
        Ok(())
    } else {
        bail!("{} account(s) could not be migrated", report.failed().count())
    }
}

/// Info command handler
///
/// Works even when the keyring is unusable, so the probe failure can be shown.
pub fn cmd_info(config: Option<PathBuf>, json: bool) -> Result<()> {
    let store = match config {
        Some(path) => ConfigStore::new(path),
        None => ConfigStore::open_default()?,
    };
    let manager = CredentialManager::new(store, KeyringStore::probe());
    let backend = manager.backend_info();
    let summaries = manager.summaries()?;

    if json {
        let info = serde_json::json!({
            "config_file": manager.config().path(),
            "backend": backend,
            "accounts": summaries,
        });
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("Config file: {}", manager.config().path().display());
    println!();
    println!("Keyring backend:");
    println!("  Backend:    {}", backend.id);
    println!("  Name:       {}", backend.name);
    println!("  Priority:   {}", backend.priority);
    println!("  Persistent: {}", if backend.persistent { "yes" } else { "no" });
    match (backend.available, &backend.detail) {
        (Some(true), _) => println!("  Status:     available"),
        (_, Some(detail)) => println!("  Status:     unavailable ({detail})"),
        _ => println!("  Status:     unknown"),
    }

    println!();
    println!("Accounts: {} stored", summaries.len());
    for s in &summaries {
        let mark = if s.status.is_usable() { "ok" } else { "!!" };
        println!("  [{mark}] {} ({})", s.name, s.status.label());
    }
    Ok(())
}
