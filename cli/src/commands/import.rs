//! Import a wallet secret into the encrypted keystore

use anyhow::{bail, Context, Result};
use colored::Colorize;
use tonconnect_responder::AccountAddress;

use crate::config::CliConfig;
use crate::secure_storage::{
    prompt_new_password, prompt_secret, SecretKind, SecureKeyStorage, WalletSecret,
};

/// Options for import
pub struct ImportOptions {
    /// Secret is a hex seed rather than a mnemonic
    pub seed_hex: bool,
    /// Overwrite an existing keystore
    pub force: bool,
}

/// Assemble and check the keystore plaintext
pub fn prepare_secret(
    kind: SecretKind,
    secret: &str,
    address: Option<&str>,
    state_init: Option<&str>,
) -> Result<WalletSecret> {
    let address = address.context("--address is required for import")?;
    let state_init = state_init.context("--state-init is required for import")?;

    let secret = match kind {
        SecretKind::Mnemonic => secret.split_whitespace().collect::<Vec<_>>().join(" "),
        SecretKind::SeedHex => secret.trim().to_string(),
    };
    let wallet = WalletSecret {
        kind,
        secret,
        address: address.trim().to_string(),
        state_init: state_init.trim().to_string(),
    };
    wallet.validate()?;
    Ok(wallet)
}

pub fn run(settings: &CliConfig, options: ImportOptions) -> Result<()> {
    let storage = SecureKeyStorage::new(settings.keystore_path()?);
    if storage.exists() && !options.force {
        bail!(
            "A keystore already exists at {}. Use --force to overwrite.",
            storage.path().display()
        );
    }

    println!("{}", "=== tcwallet Import ===".cyan().bold());
    println!();

    let (kind, prompt) = if options.seed_hex {
        (SecretKind::SeedHex, "Seed (64 hex chars, hidden): ")
    } else {
        (SecretKind::Mnemonic, "Mnemonic (24 words, hidden): ")
    };
    let secret = prompt_secret(prompt)?;
    let wallet = prepare_secret(
        kind,
        &secret,
        settings.address.as_deref(),
        settings.state_init.as_deref(),
    )?;

    println!();
    println!("{}", "Choose a strong password to encrypt the keystore.".cyan());
    println!("{}", "Requirements: 8+ chars, uppercase, lowercase, and numbers".dimmed());
    println!();
    let password = prompt_new_password("Enter password: ")?;

    storage.save(&wallet, &password)?;

    let address: AccountAddress = wallet.address.parse()?;
    println!();
    println!("{}", "Wallet imported and encrypted successfully!".green().bold());
    println!();
    println!("{}:", "Address".yellow());
    println!("  raw:            {}", address.to_raw());
    println!("  bounceable:     {}", address.to_friendly(true, false));
    println!("  non-bounceable: {}", address.to_friendly(false, false));
    println!();
    println!(
        "{}",
        format!("Keystore saved to: {}", storage.path().display()).dimmed()
    );
    Ok(())
}
