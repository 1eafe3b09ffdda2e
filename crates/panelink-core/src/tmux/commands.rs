//! tmux command primitives.
//!
//! Every invocation passes target and payload as discrete argv elements via
//! `tokio::process::Command` — nothing is ever routed through a shell, so
//! shell metacharacters in message text cannot become command injection.
//! Literal-mode key injection still escapes the characters the tmux client
//! itself interprets inside an argument (backslash, quotes, and `;`, which
//! tmux treats as a command separator even in argv).

use std::process::Output;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::sleep;
use tracing::debug;

use super::target::PaneTarget;
use crate::error::{BridgeError, Result};

/// One pane as reported by `list-panes -a`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneInfo {
    /// Canonical `session:window.pane` address.
    pub target: String,
    /// Command currently running in the pane (e.g. `claude`, `zsh`).
    pub command: String,
    /// Whether this is the active pane of its window.
    pub active: bool,
}

/// Thin async client around the tmux binary.
#[derive(Debug, Clone)]
pub struct TmuxClient {
    bin: String,
    send_settle: Duration,
}

impl Default for TmuxClient {
    fn default() -> Self {
        Self::new("tmux", Duration::from_millis(50))
    }
}

impl TmuxClient {
    pub fn new(bin: impl Into<String>, send_settle: Duration) -> Self {
        Self {
            bin: bin.into(),
            send_settle,
        }
    }

    /// Run one tmux command, mapping spawn and exit failures to typed errors.
    async fn run(&self, op: &'static str, target: &str, args: &[&str]) -> Result<Output> {
        let output = Command::new(&self.bin)
            .args(args)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    BridgeError::TmuxMissing(self.bin.clone())
                } else {
                    BridgeError::Io(e)
                }
            })?;

        if output.status.success() {
            return Ok(output);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.contains("can't find pane")
            || stderr.contains("can't find window")
            || stderr.contains("can't find session")
        {
            return Err(BridgeError::PaneNotFound(target.to_string()));
        }
        Err(BridgeError::CommandFailed {
            op,
            target: target.to_string(),
            stderr,
        })
    }

    /// Send literal text followed by a separate Enter keystroke.
    ///
    /// The payload goes out in literal mode (`-l`) so arrow-key names and the
    /// like are not interpreted. Enter is sent separately after a short
    /// settle delay: some agent CLIs drop the newline when it arrives in the
    /// same write as a large paste.
    pub async fn send_text(&self, target: &PaneTarget, text: &str) -> Result<()> {
        let escaped = escape_literal(text);
        self.run(
            "send-keys",
            target.as_str(),
            &["send-keys", "-t", target.as_str(), "-l", "--", &escaped],
        )
        .await?;

        sleep(self.send_settle).await;
        self.send_key(target, "Enter").await?;

        debug!(target = %target, len = text.len(), "Sent literal text + Enter");
        Ok(())
    }

    /// Send one named key (`Enter`, `Up`, `Down`, `Space`, `Escape`, ...).
    pub async fn send_key(&self, target: &PaneTarget, key: &str) -> Result<()> {
        self.run(
            "send-keys",
            target.as_str(),
            &["send-keys", "-t", target.as_str(), key],
        )
        .await?;
        Ok(())
    }

    /// Capture pane text including `lines` of scrollback.
    ///
    /// `start_line` overrides the scrollback start (tmux semantics: negative
    /// values reach into history).
    pub async fn capture_pane(
        &self,
        target: &PaneTarget,
        lines: u32,
        start_line: Option<i64>,
    ) -> Result<String> {
        let start = start_line.unwrap_or(-(lines as i64)).to_string();
        let output = self
            .run(
                "capture-pane",
                target.as_str(),
                &["capture-pane", "-p", "-t", target.as_str(), "-S", &start],
            )
            .await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// List every pane across all sessions.
    ///
    /// A tmux server that is not running is a legitimate empty result, not an
    /// error — this is the one place "no server" is swallowed.
    pub async fn list_panes(&self) -> Result<Vec<PaneInfo>> {
        const FORMAT: &str =
            "#{session_name}:#{window_index}.#{pane_index}\t#{pane_current_command}\t#{pane_active}";

        let result = self
            .run("list-panes", "-", &["list-panes", "-a", "-F", FORMAT])
            .await;

        let output = match result {
            Ok(output) => output,
            Err(BridgeError::CommandFailed { ref stderr, .. })
                if stderr.contains("no server running") || stderr.contains("error connecting") =>
            {
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().filter_map(parse_pane_line).collect())
    }

    /// Check whether a pane exists. tmux "can't find" is `false`; every other
    /// failure (missing binary, I/O) propagates.
    pub async fn pane_exists(&self, target: &PaneTarget) -> Result<bool> {
        let result = self
            .run(
                "display-message",
                target.as_str(),
                &[
                    "display-message",
                    "-p",
                    "-t",
                    target.as_str(),
                    "#{pane_id}",
                ],
            )
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(BridgeError::PaneNotFound(_)) => Ok(false),
            // A stopped server also means the pane is gone.
            Err(BridgeError::CommandFailed { ref stderr, .. })
                if stderr.contains("no server running") || stderr.contains("error connecting") =>
            {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Running command of one pane, if it exists.
    pub async fn pane_command(&self, target: &PaneTarget) -> Result<Option<String>> {
        let panes = self.list_panes().await?;
        Ok(panes
            .into_iter()
            .find(|p| p.target == target.as_str())
            .map(|p| p.command))
    }
}

fn parse_pane_line(line: &str) -> Option<PaneInfo> {
    let mut parts = line.split('\t');
    let target = parts.next()?.to_string();
    let command = parts.next()?.to_string();
    let active = parts.next()? == "1";
    Some(PaneInfo {
        target,
        command,
        active,
    })
}

/// Escape the characters tmux's client interprets inside a literal argument.
fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            '"' => out.push_str("\\\""),
            '\'' => out.push_str("\\'"),
            _ => out.push(c),
        }
    }
    out
}
