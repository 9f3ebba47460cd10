//! Answer one tc:// link

use anyhow::{bail, Result};

use super::{build_responder, print_result_json, summarize};
use crate::config::CliConfig;

/// Prints the result as JSON on stdout; fails unless the dApp was connected
pub async fn run(settings: &CliConfig, link: &str) -> Result<()> {
    let responder = build_responder(settings)?;
    let result = responder.connect(link).await;
    responder.close().await;

    eprintln!("{}", summarize(&result));
    print_result_json(&result)?;

    if !result.is_connected() {
        bail!("Handshake did not complete");
    }
    Ok(())
}
