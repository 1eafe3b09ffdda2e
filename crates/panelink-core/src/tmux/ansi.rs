//! ANSI escape stripping.
//!
//! `capture-pane -p` already renders plain text, but captures taken with
//! escape passthrough (and some agent CLIs' raw echoes) still carry CSI and
//! OSC sequences. Everything downstream parses cleaned text only.

use once_cell::sync::Lazy;
use regex::Regex;

/// CSI (`ESC [ ... cmd`) and OSC (`ESC ] ... BEL/ST`) sequences.
static ANSI_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)").unwrap()
});

/// Remove CSI and OSC escape sequences from captured text.
pub fn strip_ansi(text: &str) -> String {
    ANSI_PATTERN.replace_all(text, "").into_owned()
}
