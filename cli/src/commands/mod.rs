//! CLI commands

pub mod connect;
pub mod import;
pub mod info;
pub mod inspect;
pub mod interactive;

use std::env;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use tonconnect_responder::{ConnectResult, KeyMaterial, KeyedAccount, Outcome, Responder};
use zeroize::Zeroizing;

use crate::config::{CliConfig, MNEMONIC_ENV};
use crate::secure_storage::{prompt_secret, SecureKeyStorage};

/// Where the wallet secret will come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletSource {
    Environment,
    Keystore,
}

/// Environment mnemonic wins over the keystore
pub fn wallet_source(settings: &CliConfig) -> Result<WalletSource> {
    if env_mnemonic().is_some() {
        return Ok(WalletSource::Environment);
    }
    if SecureKeyStorage::new(settings.keystore_path()?).exists() {
        return Ok(WalletSource::Keystore);
    }
    bail!(
        "No wallet configured. Set {} (with --address and --state-init) or run 'tcwallet import'.",
        MNEMONIC_ENV
    )
}

fn env_mnemonic() -> Option<Zeroizing<String>> {
    env::var(MNEMONIC_ENV)
        .ok()
        .map(Zeroizing::new)
        .filter(|phrase| !phrase.trim().is_empty())
}

/// Build the account from the environment or the keystore
pub fn load_account(settings: &CliConfig) -> Result<KeyedAccount> {
    match wallet_source(settings)? {
        WalletSource::Environment => {
            let phrase = env_mnemonic().context("mnemonic disappeared from the environment")?;
            let address = settings
                .address
                .as_deref()
                .with_context(|| format!("{} is set but no --address was given", MNEMONIC_ENV))?;
            let state_init = settings
                .state_init
                .as_deref()
                .with_context(|| format!("{} is set but no --state-init was given", MNEMONIC_ENV))?;
            let material = KeyMaterial::mnemonic(&phrase).context("Invalid mnemonic")?;
            KeyedAccount::new(material, address, state_init).context("Invalid wallet settings")
        }
        WalletSource::Keystore => {
            let storage = SecureKeyStorage::new(settings.keystore_path()?);
            let password = prompt_secret("Keystore password: ")?;
            storage.load(&password)?.to_account()
        }
    }
}

pub fn build_responder(settings: &CliConfig) -> Result<Responder> {
    let account = load_account(settings)?;
    tracing::debug!(
        bridge = %settings.responder.bridge_url,
        address = %account.account_address().to_raw(),
        "starting responder"
    );
    Responder::new(settings.responder.clone(), Box::new(account))
        .context("Failed to start responder")
}

/// One-line colored summary of a result
pub fn summarize(result: &ConnectResult) -> String {
    match result.outcome {
        Outcome::Connected => {
            let detail = result
                .data
                .as_ref()
                .map(|data| format!(" (event {} in {} ms)", data.id, data.elapsed_ms))
                .unwrap_or_default();
            format!("{}{}", "CONNECTED".green().bold(), detail)
        }
        Outcome::Forbidden => format!("{} domain is not allowed", "FORBIDDEN".yellow().bold()),
        Outcome::ConnectFailed => format!(
            "{} {}",
            "CONNECT_FAILED".red().bold(),
            result.error_message.as_deref().unwrap_or("unknown error")
        ),
    }
}

pub fn print_result_json(result: &ConnectResult) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}
