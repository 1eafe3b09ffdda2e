//! Types shared by the semantic parsers.

use serde::{Deserialize, Serialize};

/// Kind of selection menu rendered by the agent CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptType {
    /// Radio menu: pick exactly one option.
    Single,
    /// Checkbox menu: toggle any number, confirm with Enter.
    Multi,
}

/// One menu option as currently rendered in the terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptOption {
    /// Zero-based index, stable across re-parses (assigned in parse order).
    pub index: usize,
    /// Display label.
    pub label: String,
    /// Whether the option is selected/checked on screen right now.
    pub selected: bool,
}

/// Immutable snapshot of an interactive selection prompt read from the
/// terminal. A changed prompt is a new `DetectedPrompt`, never a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedPrompt {
    pub prompt_type: PromptType,
    pub question: String,
    pub options: Vec<PromptOption>,
    /// Whether a free-text escape option ("Other ...") is present.
    pub has_other: bool,
    /// Cleaned capture the prompt was parsed from, kept for diagnostics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl DetectedPrompt {
    /// Index of the "Other" free-text option, if any.
    pub fn other_index(&self) -> Option<usize> {
        if !self.has_other {
            return None;
        }
        self.options
            .iter()
            .find(|o| super::select::is_other_label(&o.label))
            .map(|o| o.index)
    }

    /// Indices of currently selected options.
    pub fn selected_indices(&self) -> Vec<usize> {
        self.options
            .iter()
            .filter(|o| o.selected)
            .map(|o| o.index)
            .collect()
    }
}
