//! Bridge configuration.
//!
//! Loaded from YAML when a config file exists; every field has a default so
//! an empty or missing file yields a working configuration. A broken file is
//! logged and replaced by defaults rather than aborting startup.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Timing and environment knobs for the bridge and controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BridgeConfig {
    /// tmux binary name or path.
    pub tmux_bin: String,
    /// Command name the controlled agent is expected to run as inside the
    /// pane. Attach only warns on mismatch.
    pub program: String,
    /// Directory for completion marker files.
    pub marker_dir: PathBuf,
    /// Filename prefix for completion markers.
    pub marker_prefix: String,
    /// Delay between literal payload and the Enter keystroke, in ms.
    pub send_settle_ms: u64,
    /// Completion poll interval, in ms.
    pub poll_interval_ms: u64,
    /// Delay after marker detection before the final capture, in ms.
    pub completion_settle_ms: u64,
    /// Consecutive unchanged polls that count as output quiescence.
    pub quiescence_polls: u32,
    /// Default send_message timeout, in seconds.
    pub message_timeout_secs: u64,
    /// Interactive prompt timeout, in seconds.
    pub prompt_timeout_secs: u64,
    /// Scrollback lines captured for response extraction.
    pub capture_lines: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            tmux_bin: "tmux".to_string(),
            program: "claude".to_string(),
            marker_dir: std::env::temp_dir(),
            marker_prefix: "panelink-done".to_string(),
            send_settle_ms: 50,
            poll_interval_ms: 500,
            completion_settle_ms: 500,
            quiescence_polls: 6,
            message_timeout_secs: 300,
            prompt_timeout_secs: 300,
            capture_lines: 1000,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a YAML file, falling back to defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = ?path, "No bridge config found, using defaults");
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match serde_yaml::from_str(&content) {
                Ok(config) => {
                    info!(path = ?path, "Bridge config loaded");
                    config
                }
                Err(e) => {
                    error!(error = %e, path = ?path, "Failed to parse bridge config");
                    Self::default()
                }
            },
            Err(e) => {
                error!(error = %e, path = ?path, "Failed to read bridge config");
                Self::default()
            }
        }
    }

    pub fn send_settle(&self) -> Duration {
        Duration::from_millis(self.send_settle_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn completion_settle(&self) -> Duration {
        Duration::from_millis(self.completion_settle_ms)
    }

    pub fn message_timeout(&self) -> Duration {
        Duration::from_secs(self.message_timeout_secs)
    }

    pub fn prompt_timeout(&self) -> Duration {
        Duration::from_secs(self.prompt_timeout_secs)
    }
}
