//! Read links from stdin until `exit`, `quit` or EOF
//!
//! One responder serves the whole session, so the wallet key is derived
//! once and the bridge client id stays the same between links.

use anyhow::{Context, Result};
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use super::{build_responder, print_result_json, summarize};
use crate::config::CliConfig;

/// What to do with one line of input
#[derive(Debug, PartialEq, Eq)]
pub enum LineAction<'a> {
    Skip,
    Quit,
    Connect(&'a str),
}

pub fn classify(line: &str) -> LineAction<'_> {
    let line = line.trim();
    match line {
        "" => LineAction::Skip,
        _ if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") => {
            LineAction::Quit
        }
        _ => LineAction::Connect(line),
    }
}

pub async fn run(settings: &CliConfig) -> Result<()> {
    let responder = build_responder(settings)?;

    println!("{}", "=== tcwallet interactive ===".cyan().bold());
    println!("Client id: {}", responder.client_id().dimmed());
    println!("{}", "Paste a tc:// link per line; 'exit' to quit.".dimmed());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut handled = 0usize;
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        match classify(&line) {
            LineAction::Skip => continue,
            LineAction::Quit => break,
            LineAction::Connect(link) => {
                let result = responder.connect(link).await;
                handled += 1;
                println!("{}", summarize(&result));
                print_result_json(&result)?;
            }
        }
    }

    responder.close().await;
    println!("{}", format!("Handled {} link(s)", handled).dimmed());
    Ok(())
}
