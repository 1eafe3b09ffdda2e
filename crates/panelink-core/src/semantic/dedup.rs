//! Prompt deduplication.
//!
//! Pollers re-capture the pane on an interval, so the same menu is detected
//! over and over while it sits on screen. The deduplicator stores one
//! structural fingerprint — question, ordered labels, type, free-text flag —
//! and admits a prompt only when that fingerprint changes. Selection state is
//! deliberately excluded: toggling a checkbox must not re-render the UI as a
//! "new" prompt.

use tracing::debug;

use super::types::DetectedPrompt;

/// Suppresses repeated handling of a structurally identical prompt.
#[derive(Debug, Default)]
pub struct PromptDeduplicator {
    last_fingerprint: Option<String>,
}

impl PromptDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Structural fingerprint: everything that identifies the prompt, minus
    /// transient selection state.
    fn fingerprint(prompt: &DetectedPrompt) -> String {
        let mut fp = format!("{:?}\x1f{}\x1f{}", prompt.prompt_type, prompt.question, prompt.has_other);
        for option in &prompt.options {
            fp.push('\x1f');
            fp.push_str(&option.label);
        }
        fp
    }

    /// True exactly when this prompt should be handled: nothing stored yet,
    /// or the structure differs from the last handled prompt.
    pub fn should_handle(&mut self, prompt: Option<&DetectedPrompt>) -> bool {
        let Some(prompt) = prompt else {
            return false;
        };

        let fp = Self::fingerprint(prompt);
        if self.last_fingerprint.as_deref() == Some(fp.as_str()) {
            return false;
        }

        debug!(question = %prompt.question, "New prompt fingerprint");
        self.last_fingerprint = Some(fp);
        true
    }

    /// Forget the stored fingerprint. Called once the shown prompt is
    /// resolved, so the next structurally identical prompt is eligible again.
    pub fn clear(&mut self) {
        self.last_fingerprint = None;
    }
}
