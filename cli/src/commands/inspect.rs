//! Decode a tc:// link offline

use anyhow::{Context, Result};
use colored::Colorize;
use tonconnect_responder::allowlist::is_allowed;
use tonconnect_responder::link::{self, ConnectRequest};
use tonconnect_responder::session::decode_peer_id;

use crate::config::CliConfig;

/// Everything `inspect` reports about a link
#[derive(Debug)]
pub struct LinkReport {
    pub request: ConnectRequest,
    pub manifest_domain: String,
    pub peer_key_valid: bool,
    /// `None` when no allow-list is configured
    pub allowed: Option<bool>,
}

pub fn analyze(settings: &CliConfig, link_text: &str) -> Result<LinkReport> {
    let request = link::parse(link_text).context("Not a valid tc:// link")?;
    let manifest_domain = link::resolve_app_domain(&request);
    let peer_key_valid = decode_peer_id(&request.session_id).is_ok();
    let allowed = settings.responder.allowlist().map(|set| {
        !manifest_domain.is_empty() && is_allowed(Some(&set), &manifest_domain)
    });

    Ok(LinkReport {
        request,
        manifest_domain,
        peer_key_valid,
        allowed,
    })
}

pub fn run(settings: &CliConfig, link_text: &str) -> Result<()> {
    let report = analyze(settings, link_text)?;
    let request = &report.request;

    println!();
    println!("{}", "TON Connect Request".yellow().bold());
    println!();
    println!("{}:", "Protocol Version".cyan());
    println!("  {}", request.version);
    println!("{}:", "Initiator Id".cyan());
    let key_state = if report.peer_key_valid {
        "valid key".green()
    } else {
        "not a 32-byte key".red()
    };
    println!("  {} ({})", request.session_id, key_state);
    if let Some(ret) = &request.return_url {
        println!("{}:", "Return Url".cyan());
        println!("  {}", ret);
    }
    println!("{}:", "Manifest".cyan());
    println!("  {}", request.manifest_url().unwrap_or("(none)"));
    let domain = match report.manifest_domain.as_str() {
        "" => "(none)",
        domain => domain,
    };
    println!("  domain: {}", domain);
    println!();

    println!("{}:", "Requested Items".cyan());
    if request.items.is_empty() {
        println!("  {}", "(none - a connect would fail)".red());
    }
    for item in &request.items {
        match &item.payload {
            Some(payload) => println!("  - {} (payload: {})", item.name, payload),
            None => println!("  - {}", item.name),
        }
    }
    println!();

    println!("{}:", "Allow-list".cyan());
    match report.allowed {
        None => println!("  {}", "unrestricted".dimmed()),
        Some(true) => println!("  {}", "ALLOWED".green()),
        Some(false) => println!("  {}", "FORBIDDEN".red()),
    }
    println!();
    Ok(())
}
