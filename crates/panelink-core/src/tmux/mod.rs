//! Terminal primitives — validated pane addressing, keystroke injection, and
//! scrollback capture against a tmux server.
//!
//! # Components
//! - `PaneTarget`: validated `session:window.pane` address
//! - `TmuxClient`: argv-vector tmux invocations (send-keys / capture-pane /
//!   list-panes)
//! - `strip_ansi`: CSI/OSC stripping for captured text

mod ansi;
mod commands;
mod target;

pub use ansi::strip_ansi;
pub use commands::{PaneInfo, TmuxClient};
pub use target::PaneTarget;
