//! Pane addressing.
//!
//! A target is the canonical tmux `session:window.pane` address. Callers
//! never pass raw strings to the primitives; every address goes through
//! `PaneTarget::parse` first so malformed input is caught before tmux is
//! spawned.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

static TARGET_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w-]+:\d+\.\d+$").unwrap());

/// Validated address of one tmux pane.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PaneTarget(String);

impl PaneTarget {
    /// Parse and validate a `session:window.pane` address.
    pub fn parse(s: &str) -> Result<Self> {
        if Self::is_valid(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(BridgeError::InvalidTarget(s.to_string()))
        }
    }

    /// Check whether a string is a well-formed pane address.
    pub fn is_valid(s: &str) -> bool {
        TARGET_PATTERN.is_match(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Session part of the address.
    pub fn session(&self) -> &str {
        self.0.split(':').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for PaneTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PaneTarget {
    type Error = BridgeError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<PaneTarget> for String {
    fn from(t: PaneTarget) -> String {
        t.0
    }
}
