//! panelink - terminal control bridge CLI
//!
//! Drive an interactive agent CLI running in a tmux pane from the command
//! line: list candidate panes, send a message and print the extracted
//! answer, or watch a pane for selection prompts.
//!
//! Usage:
//!   panelink panes
//!   panelink send main:0.0 "summarize the diff"
//!   panelink watch main:0.0 --interval-ms 500

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use panelink_core::semantic::{detect_prompt, PromptDeduplicator, PromptType};
use panelink_core::tmux::{PaneTarget, TmuxClient};
use panelink_core::{BridgeConfig, TmuxBridge};

#[derive(Parser, Debug)]
#[command(name = "panelink")]
#[command(about = "Bridge chat-style messages into a tmux pane running an agent CLI")]
#[command(version)]
struct Args {
    /// Path to a YAML config file (defaults apply when missing)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List panes across all tmux sessions
    Panes,

    /// Send a message to a pane and print the extracted response
    Send {
        /// Pane address (session:window.pane)
        target: String,
        /// Message text
        text: String,
        /// Override the completion timeout
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Poll a pane and print each newly detected selection prompt
    Watch {
        /// Pane address (session:window.pane)
        target: String,
        /// Poll interval
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => BridgeConfig::load(path),
        None => BridgeConfig::default(),
    };

    match args.command {
        Command::Panes => list_panes(&config).await,
        Command::Send {
            target,
            text,
            timeout_secs,
        } => send(&config, &target, &text, timeout_secs).await,
        Command::Watch {
            target,
            interval_ms,
        } => watch(&config, &target, interval_ms).await,
    }
}

async fn list_panes(config: &BridgeConfig) -> Result<()> {
    let tmux = TmuxClient::new(config.tmux_bin.clone(), config.send_settle());
    let panes = tmux.list_panes().await.context("Failed to list panes")?;

    if panes.is_empty() {
        eprintln!("No tmux panes found (is a server running?)");
        return Ok(());
    }
    for pane in panes {
        let marker = if pane.command == config.program {
            " *"
        } else {
            ""
        };
        println!("{}\t{}{}", pane.target, pane.command, marker);
    }
    Ok(())
}

async fn send(
    config: &BridgeConfig,
    target: &str,
    text: &str,
    timeout_secs: Option<u64>,
) -> Result<()> {
    let bridge = TmuxBridge::new(config.clone());
    bridge
        .attach(target)
        .await
        .with_context(|| format!("Failed to attach to {}", target))?;

    let timeout = timeout_secs.map(Duration::from_secs);
    let response = bridge
        .send_message(text, "cli", "cli-1", timeout)
        .await
        .context("Message exchange failed")?;

    println!("{}", response);
    Ok(())
}

async fn watch(config: &BridgeConfig, target: &str, interval_ms: u64) -> Result<()> {
    let target = PaneTarget::parse(target)?;
    let tmux = TmuxClient::new(config.tmux_bin.clone(), config.send_settle());
    let mut dedup = PromptDeduplicator::new();
    let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));

    eprintln!("Watching {} for selection prompts (Ctrl+C to stop)", target);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("Stopped watching {}", target);
                return Ok(());
            }
            _ = ticker.tick() => {}
        }
        let capture = tmux
            .capture_pane(&target, config.capture_lines, None)
            .await
            .with_context(|| format!("Failed to capture {}", target))?;

        let prompt = detect_prompt(&capture);
        if !dedup.should_handle(prompt.as_ref()) {
            continue;
        }
        let prompt = prompt.unwrap();

        let kind = match prompt.prompt_type {
            PromptType::Single => "single",
            PromptType::Multi => "multi",
        };
        println!("[{}] {}", kind, prompt.question);
        for option in &prompt.options {
            let mark = if option.selected { "x" } else { " " };
            println!("  [{}] {}. {}", mark, option.index, option.label);
        }
        if prompt.has_other {
            println!("  (free-text option available)");
        }
    }
}
