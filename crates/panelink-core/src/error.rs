//! Error taxonomy for the terminal control bridge.
//!
//! Parse ambiguity is deliberately *not* an error: the semantic parsers
//! return `Option` and callers fall back (keep polling, track toggles
//! optimistically). Everything that reaches a caller as `Err` is one of the
//! variants below.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the tmux primitives, bridge, and prompt controller.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Target string does not match `session:window.pane`.
    #[error("invalid pane target: {0:?} (expected session:window.pane)")]
    InvalidTarget(String),

    /// The addressed pane does not exist (anymore).
    #[error("pane not found: {0}")]
    PaneNotFound(String),

    /// The tmux binary could not be spawned at all.
    #[error("tmux binary not found: {0}")]
    TmuxMissing(String),

    /// tmux ran but reported failure.
    #[error("tmux {op} failed for {target}: {stderr}")]
    CommandFailed {
        op: &'static str,
        target: String,
        stderr: String,
    },

    /// Bridge operation requires an attached pane.
    #[error("not attached to a pane")]
    NotAttached,

    /// Another message exchange is already in flight on this bridge.
    #[error("a message is already pending on this bridge")]
    Busy,

    /// No response appeared within the allotted window.
    #[error("timed out after {0:?} waiting for a response")]
    Timeout(Duration),

    /// Prompt action for a user with no pending prompt (or not the owner).
    #[error("no pending prompt for user {0}")]
    NoPendingPrompt(String),

    /// Prompt action referenced an option index outside the menu.
    #[error("option index {index} out of bounds (menu has {len} options)")]
    IndexOutOfBounds { index: usize, len: usize },

    /// Free-text flow requested on a prompt without an "Other" option.
    #[error("pending prompt for user {0} has no free-text option")]
    NoOtherOption(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
