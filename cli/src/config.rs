//! Configuration for the tcwallet CLI
//!
//! Settings come from `~/.tcwallet/config.json` (or `--config`), then
//! command-line flags on top. The file holds the responder settings plus
//! the wallet identity used when the mnemonic comes from the environment.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tonconnect_responder::ResponderConfig;

/// Directory under the home directory holding config and keystore
const APP_DIR: &str = ".tcwallet";
const CONFIG_FILE: &str = "config.json";
const KEYSTORE_FILE: &str = "keystore.enc";

/// Environment variable carrying the mnemonic, bypassing the keystore
pub const MNEMONIC_ENV: &str = "TON_WALLET_MNEMONIC";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    #[serde(flatten)]
    pub responder: ResponderConfig,
    /// Keystore location; defaults to `~/.tcwallet/keystore.enc`
    pub keystore: Option<PathBuf>,
    /// Wallet address (raw or user-friendly) for mnemonic-from-env mode
    pub address: Option<String>,
    /// Base64 wallet state init for mnemonic-from-env mode
    pub state_init: Option<String>,
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub bridge_url: Option<String>,
    pub allow_domains: Vec<String>,
    pub connect_timeout: Option<u64>,
    pub request_timeout: Option<u64>,
    pub keystore: Option<PathBuf>,
    pub address: Option<String>,
    pub state_init: Option<String>,
}

/// `~/.tcwallet`
pub fn app_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(APP_DIR))
        .context("Could not find home directory")
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(app_dir()?.join(CONFIG_FILE))
}

pub fn default_keystore_path() -> Result<PathBuf> {
    Ok(app_dir()?.join(KEYSTORE_FILE))
}

impl CliConfig {
    /// Load the config file
    ///
    /// A missing default file yields defaults; a missing file named with
    /// `--config` is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    bail!("Config file not found: {}", path.display());
                }
                path.to_path_buf()
            }
            None => {
                let path = default_config_path()?;
                if !path.exists() {
                    return Ok(Self::default());
                }
                path
            }
        };
        Self::read(&path)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Write the config as pretty JSON, creating the parent directory
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Layer command-line values over the file
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(url) = overrides.bridge_url {
            self.responder.bridge_url = url;
        }
        if !overrides.allow_domains.is_empty() {
            self.responder.allowed_domains = Some(overrides.allow_domains);
        }
        if let Some(secs) = overrides.connect_timeout {
            self.responder.connect_timeout_secs = secs;
        }
        if let Some(secs) = overrides.request_timeout {
            self.responder.request_timeout_secs = secs;
        }
        if overrides.keystore.is_some() {
            self.keystore = overrides.keystore;
        }
        if overrides.address.is_some() {
            self.address = overrides.address;
        }
        if overrides.state_init.is_some() {
            self.state_init = overrides.state_init;
        }
    }

    pub fn keystore_path(&self) -> Result<PathBuf> {
        match &self.keystore {
            Some(path) => Ok(path.clone()),
            None => default_keystore_path(),
        }
    }
}
