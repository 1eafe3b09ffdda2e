//! Semantic terminal parsing.
//!
//! Heuristic, tolerant detection of interactive selection prompts in
//! captured pane text, plus the deduplicator that keeps pollers from
//! re-handling the same prompt every tick.

mod dedup;
mod select;
mod types;

pub use dedup::PromptDeduplicator;
pub use select::{
    current_cursor_position, current_selections, detect_prompt, is_waiting_for_input,
};
pub use types::{DetectedPrompt, PromptOption, PromptType};
