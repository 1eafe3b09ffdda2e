//! Message bridge: inject a chat message into an attached pane and wait for
//! the agent's answer.
//!
//! Completion is detected two ways, whichever fires first:
//!   - a marker file written by the agent's stop hook (the reliable path)
//!   - output quiescence: the capture stops changing for a run of polls
//!
//! One in-flight message per bridge. The pending slot is cleared on every
//! exit path, success or failure, so a crash mid-exchange cannot wedge the
//! bridge.

mod extract;

pub use extract::extract_response;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::tmux::{strip_ansi, PaneInfo, PaneTarget, TmuxClient};

/// The one message currently being exchanged through the bridge.
#[derive(Debug, Clone)]
pub struct PendingMessageRequest {
    pub chat_id: String,
    pub message_id: String,
    pub text: String,
    pub created_at: chrono::DateTime<Utc>,
}

/// Drives one tmux pane running an interactive agent CLI.
pub struct TmuxBridge {
    tmux: TmuxClient,
    config: BridgeConfig,
    attached: RwLock<Option<PaneTarget>>,
    pending: Mutex<Option<PendingMessageRequest>>,
}

impl TmuxBridge {
    pub fn new(config: BridgeConfig) -> Self {
        let tmux = TmuxClient::new(config.tmux_bin.clone(), config.send_settle());
        Self {
            tmux,
            config,
            attached: RwLock::new(None),
            pending: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn tmux(&self) -> &TmuxClient {
        &self.tmux
    }

    /// List candidate panes for attachment.
    pub async fn list_panes(&self) -> Result<Vec<PaneInfo>> {
        self.tmux.list_panes().await
    }

    /// Attach the bridge to a pane. Validates the address shape and that the
    /// pane exists; a pane running something other than the expected program
    /// only produces a warning, since a wrapper script can rename the
    /// reported command.
    pub async fn attach(&self, target: &str) -> Result<()> {
        let target = PaneTarget::parse(target)?;

        if !self.tmux.pane_exists(&target).await? {
            return Err(BridgeError::PaneNotFound(target.as_str().to_string()));
        }

        match self.tmux.pane_command(&target).await {
            Ok(Some(cmd)) if cmd != self.config.program => {
                warn!(
                    target = %target,
                    running = %cmd,
                    expected = %self.config.program,
                    "Pane is running an unexpected command"
                );
            }
            Ok(_) => {}
            Err(e) => debug!(error = %e, "Could not read pane command during attach"),
        }

        self.clear_marker(&target).await;
        *self.attached.write().await = Some(target.clone());
        info!(target = %target, "Attached to pane");
        Ok(())
    }

    /// Detach from the current pane, dropping any pending request.
    pub async fn detach(&self) {
        let previous = self.attached.write().await.take();
        if let Some(target) = &previous {
            self.clear_marker(target).await;
            info!(target = %target, "Detached from pane");
        }
        if self.pending.lock().await.take().is_some() {
            warn!("Detached with a message still in flight");
        }
    }

    pub async fn is_attached(&self) -> bool {
        self.attached.read().await.is_some()
    }

    pub async fn attached_target(&self) -> Option<PaneTarget> {
        self.attached.read().await.clone()
    }

    pub async fn has_pending_request(&self) -> bool {
        self.pending.lock().await.is_some()
    }

    /// Capture the attached pane's current content, ANSI-stripped.
    pub async fn capture(&self) -> Result<String> {
        let target = self
            .attached
            .read()
            .await
            .clone()
            .ok_or(BridgeError::NotAttached)?;
        let raw = self
            .tmux
            .capture_pane(&target, self.config.capture_lines, None)
            .await?;
        Ok(strip_ansi(&raw))
    }

    /// Send one chat message to the attached pane and wait for the response.
    ///
    /// Fails fast with [`BridgeError::Busy`] when another message is already
    /// in flight, and with [`BridgeError::PaneNotFound`] (also detaching)
    /// when the pane has died. On timeout, any partial text extracted so far
    /// is returned annotated; if nothing was produced the timeout is an
    /// error.
    pub async fn send_message(
        &self,
        text: &str,
        chat_id: &str,
        message_id: &str,
        timeout: Option<Duration>,
    ) -> Result<String> {
        let target = self
            .attached
            .read()
            .await
            .clone()
            .ok_or(BridgeError::NotAttached)?;

        {
            let mut pending = self.pending.lock().await;
            if pending.is_some() {
                return Err(BridgeError::Busy);
            }
            *pending = Some(PendingMessageRequest {
                chat_id: chat_id.to_string(),
                message_id: message_id.to_string(),
                text: text.to_string(),
                created_at: Utc::now(),
            });
        }

        let result = self.exchange(&target, text, timeout).await;

        // Always release the slot and remove the marker, even on error.
        self.pending.lock().await.take();
        self.clear_marker(&target).await;

        if matches!(result, Err(BridgeError::PaneNotFound(_))) {
            warn!(target = %target, "Pane disappeared mid-exchange, detaching");
            self.attached.write().await.take();
        }
        result
    }

    async fn exchange(
        &self,
        target: &PaneTarget,
        text: &str,
        timeout: Option<Duration>,
    ) -> Result<String> {
        if !self.tmux.pane_exists(target).await? {
            return Err(BridgeError::PaneNotFound(target.as_str().to_string()));
        }
        self.clear_marker(target).await;

        let timeout = timeout.unwrap_or_else(|| self.config.message_timeout());
        let capture_lines = self.config.capture_lines;

        let baseline_raw = self.tmux.capture_pane(target, capture_lines, None).await?;
        let baseline = strip_ansi(&baseline_raw);
        let baseline_lines = baseline.trim_end().lines().count();
        let anchor = text.lines().find(|l| !l.trim().is_empty()).map(str::trim);

        self.tmux.send_text(target, text).await?;
        info!(
            target = %target,
            len = text.len(),
            timeout_secs = timeout.as_secs(),
            "Message sent, waiting for completion"
        );

        let started = Instant::now();
        let marker = self.marker_path(target);
        let mut last_capture = baseline.clone();
        let mut changed_since_send = false;
        let mut stable_polls: u32 = 0;

        loop {
            sleep(self.config.poll_interval()).await;

            if tokio::fs::try_exists(&marker).await.unwrap_or(false) {
                debug!(target = %target, marker = ?marker, "Completion marker found");
                sleep(self.config.completion_settle()).await;
                let final_raw = self.tmux.capture_pane(target, capture_lines, None).await?;
                let text = extract_response(&final_raw, anchor, baseline_lines)
                    .unwrap_or_default();
                info!(
                    target = %target,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    response_len = text.len(),
                    "Message completed (marker)"
                );
                return Ok(text);
            }

            let current = strip_ansi(&self.tmux.capture_pane(target, capture_lines, None).await?);
            if current == last_capture {
                stable_polls += 1;
            } else {
                stable_polls = 0;
                changed_since_send = true;
                last_capture = current;
            }

            // Quiescence only counts after the pane visibly reacted; an
            // agent that has not started yet is idle, not done.
            if changed_since_send && stable_polls >= self.config.quiescence_polls {
                let text = extract_response(&last_capture, anchor, baseline_lines)
                    .unwrap_or_default();
                info!(
                    target = %target,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    response_len = text.len(),
                    "Message completed (quiescence)"
                );
                return Ok(text);
            }

            if started.elapsed() >= timeout {
                warn!(target = %target, timeout_secs = timeout.as_secs(), "Message timed out");
                return match extract_response(&last_capture, anchor, baseline_lines) {
                    Some(partial) => {
                        Ok(format!("{partial}\n\n[response may be incomplete: timed out]"))
                    }
                    None => Err(BridgeError::Timeout(timeout)),
                };
            }
        }
    }

    /// Marker file path for one pane. The agent's stop hook is configured to
    /// touch this file when a turn finishes.
    pub fn marker_path(&self, target: &PaneTarget) -> PathBuf {
        let flat = target.as_str().replace([':', '.'], "-");
        self.config
            .marker_dir
            .join(format!("{}-{}", self.config.marker_prefix, flat))
    }

    async fn clear_marker(&self, target: &PaneTarget) {
        let path = self.marker_path(target);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(path = ?path, "Cleared stale completion marker"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(error = %e, path = ?path, "Failed to clear completion marker"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_bridge() -> TmuxBridge {
        TmuxBridge::new(BridgeConfig::default())
    }

    #[tokio::test]
    async fn test_send_requires_attachment() {
        let bridge = make_bridge();
        let err = bridge
            .send_message("hello", "chat-1", "msg-1", None)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::NotAttached));
    }

    #[tokio::test]
    async fn test_busy_rejects_second_message() {
        let bridge = make_bridge();
        *bridge.attached.write().await = Some(PaneTarget::parse("main:0.0").unwrap());
        *bridge.pending.lock().await = Some(PendingMessageRequest {
            chat_id: "chat-1".to_string(),
            message_id: "msg-1".to_string(),
            text: "first".to_string(),
            created_at: Utc::now(),
        });

        let err = bridge
            .send_message("second", "chat-2", "msg-2", None)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Busy));
        // The original request is untouched.
        let pending = bridge.pending.lock().await;
        assert_eq!(pending.as_ref().unwrap().message_id, "msg-1");
    }

    #[tokio::test]
    async fn test_detach_clears_pending() {
        let bridge = make_bridge();
        *bridge.attached.write().await = Some(PaneTarget::parse("main:0.0").unwrap());
        *bridge.pending.lock().await = Some(PendingMessageRequest {
            chat_id: "chat-1".to_string(),
            message_id: "msg-1".to_string(),
            text: "stuck".to_string(),
            created_at: Utc::now(),
        });

        bridge.detach().await;
        assert!(!bridge.is_attached().await);
        assert!(!bridge.has_pending_request().await);
    }

    #[test]
    fn test_marker_path_is_per_pane() {
        let bridge = make_bridge();
        let a = bridge.marker_path(&PaneTarget::parse("main:0.0").unwrap());
        let b = bridge.marker_path(&PaneTarget::parse("main:0.1").unwrap());
        assert_ne!(a, b);
        assert!(a
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("panelink-done-main-0-0"));
    }
}
