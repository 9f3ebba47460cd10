//! Show configuration and wallet info

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use super::{wallet_source, WalletSource};
use crate::config::{default_config_path, CliConfig};
use crate::secure_storage::SecureKeyStorage;

pub fn run(settings: &CliConfig, config_path: Option<&Path>, save: bool) -> Result<()> {
    let config_path = match config_path {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };
    let responder = &settings.responder;

    println!();
    println!("{}", "tcwallet Configuration".yellow().bold());
    println!();

    println!("{}:", "Bridge".cyan());
    println!("  {}", responder.bridge_url);
    println!(
        "  timeouts: connect {}s, request {}s, {} attempt(s)",
        responder.connect_timeout_secs, responder.request_timeout_secs, responder.retry.max_attempts
    );
    println!();

    println!("{}:", "Allowed Domains".cyan());
    match responder.allowlist() {
        Some(set) => {
            for domain in set.iter() {
                println!("  {}", domain);
            }
        }
        None => println!("  {}", "any (no allow-list)".dimmed()),
    }
    println!();

    println!("{}:", "Wallet".cyan());
    let storage = SecureKeyStorage::new(settings.keystore_path()?);
    match wallet_source(settings) {
        Ok(WalletSource::Environment) => {
            println!("  {}", "mnemonic from environment".green());
            println!("  Address: {}", settings.address.as_deref().unwrap_or("(missing)"));
        }
        Ok(WalletSource::Keystore) => {
            println!("  {}", "encrypted keystore".green());
            if let Ok((address, created_at)) = storage.summary() {
                println!("  Address: {}", address);
                println!("  Created: {}", created_at);
            }
        }
        Err(_) => {
            println!("  {}", "NOT CONFIGURED".red());
            println!("  Run 'tcwallet import' to store a wallet");
        }
    }
    println!();

    println!("{}:", "File Locations".cyan());
    println!("  Config:   {}", config_path.display());
    println!("  Keystore: {}", storage.path().display());

    if save {
        settings.write(&config_path)?;
        println!();
        println!("{}", format!("Configuration written to {}", config_path.display()).green());
    }
    Ok(())
}
