//! panelink-core: drive an interactive agent CLI running in a tmux pane.
//!
//! The crate has four layers:
//! - [`tmux`]: validated pane addressing, keystroke injection, capture
//! - [`semantic`]: heuristic detection of selection prompts in pane text
//! - [`bridge`]: one-message-at-a-time exchange with completion detection
//!   and response extraction
//! - [`controller`]: maps remote UI actions (select, toggle, submit,
//!   free text, cancel) onto keystroke sequences for a pending prompt
//!
//! A platform layer supplies the [`controller::PromptUi`] capability and a
//! poller feeding captures through [`semantic::detect_prompt`] and
//! [`semantic::PromptDeduplicator`].

pub mod bridge;
pub mod config;
pub mod controller;
pub mod error;
pub mod semantic;
pub mod tmux;

pub use bridge::TmuxBridge;
pub use config::BridgeConfig;
pub use controller::{PromptController, PromptResponse, PromptUi};
pub use error::{BridgeError, Result};
