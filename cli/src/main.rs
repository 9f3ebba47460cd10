//! tcwallet - headless TON Connect wallet for the command line

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod secure_storage;




use commands::*;
use config::{CliConfig, Overrides};

#[derive(Parser)]
#[command(name = "tcwallet")]
#[command(version = "0.1.0")]
#[command(about = "Headless TON Connect wallet - answer tc:// connection requests")]
#[command(long_about = r#"
tcwallet answers TON Connect `tc://` links on behalf of a TON wallet.
It opens an encrypted channel to the dApp through the bridge and replies
with the wallet address and, when requested, a signed ton_proof.

Quick Start:
  1. tcwallet import --address <ADDR> --state-init <B64>
  2. tcwallet connect 'tc://?v=2&id=...&r=...'
  3. tcwallet interactive          Paste links one per line

The mnemonic can also be supplied through TON_WALLET_MNEMONIC together
with --address and --state-init, bypassing the keystore.
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ~/.tcwallet/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Bridge base URL
    #[arg(long, global = true)]
    bridge_url: Option<String>,

    /// Only answer dApps from this domain (repeatable)
    #[arg(long = "allow-domain", global = true)]
    allow_domains: Vec<String>,

    /// Account init timeout in seconds
    #[arg(long, global = true)]
    connect_timeout: Option<u64>,

    /// Manifest fetch and bridge request timeout in seconds
    #[arg(long, global = true)]
    request_timeout: Option<u64>,

    /// Keystore file (default: ~/.tcwallet/keystore.enc)
    #[arg(long, global = true)]
    keystore: Option<PathBuf>,

    /// Wallet address used with TON_WALLET_MNEMONIC
    #[arg(long, global = true, env = "TON_WALLET_ADDRESS")]
    address: Option<String>,

    /// Base64 wallet state init used with TON_WALLET_MNEMONIC
    #[arg(long, global = true, env = "TON_WALLET_STATE_INIT")]
    state_init: Option<String>,

    /// More log output on stderr (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a mnemonic (or seed) in the encrypted keystore
    Import {
        /// Secret is a 32-byte hex seed instead of a mnemonic
        #[arg(long)]
        seed_hex: bool,

        /// Overwrite an existing keystore
        #[arg(short, long)]
        force: bool,
    },

    /// Answer a single tc:// link
    Connect {
        /// The tc:// deep link
        link: String,
    },

    /// Read tc:// links from stdin and answer each one
    Interactive,

    /// Decode a tc:// link without contacting anyone
    Inspect {
        /// The tc:// deep link
        link: String,
    },

    /// Show effective configuration and keystore status
    Info {
        /// Write the effective configuration to the config file
        #[arg(long)]
        save: bool,
    },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut settings = CliConfig::load(cli.config.as_deref())?;
    settings.apply(Overrides {
        bridge_url: cli.bridge_url,
        allow_domains: cli.allow_domains,
        connect_timeout: cli.connect_timeout,
        request_timeout: cli.request_timeout,
        keystore: cli.keystore,
        address: cli.address,
        state_init: cli.state_init,
    });

    match cli.command {
        Commands::Import { seed_hex, force } => {
            import::run(&settings, import::ImportOptions { seed_hex, force })?;
        }
        Commands::Connect { link } => {
            connect::run(&settings, &link).await?;
        }
        Commands::Interactive => {
            interactive::run(&settings).await?;
        }
        Commands::Inspect { link } => {
            inspect::run(&settings, &link)?;
        }
        Commands::Info { save } => {
            info::run(&settings, cli.config.as_deref(), save)?;
        }
    }

    Ok(())
}
