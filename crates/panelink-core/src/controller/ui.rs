//! Presentation capability consumed by the prompt controller.
//!
//! The controller never renders anything itself; a platform layer (chat
//! bot, web UI, TUI) implements this trait and decides what buttons and
//! messages look like.

use async_trait::async_trait;

use crate::semantic::DetectedPrompt;

/// Outcome delivered to the UI when a pending prompt is settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOutcome {
    /// The chosen option labels.
    Submitted(Vec<String>),
    Cancelled,
    TimedOut,
}

/// Final answer delivered to whoever awaited `show_prompt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptResponse {
    pub selected_indices: Vec<usize>,
    /// Whether the free-text escape option was used.
    pub is_other: bool,
    pub custom_text: Option<String>,
}

/// Rendering hooks the platform layer provides.
#[async_trait]
pub trait PromptUi: Send + Sync {
    /// Render a freshly detected prompt and return a handle for later
    /// updates (e.g. a chat message id).
    async fn show_prompt(
        &self,
        user_id: &str,
        chat_id: &str,
        prompt: &DetectedPrompt,
    ) -> anyhow::Result<String>;

    /// Reflect new multi-select toggle state on an already-rendered prompt.
    async fn update_toggles(
        &self,
        user_id: &str,
        ui_message_id: &str,
        prompt: &DetectedPrompt,
        toggled: &[usize],
    ) -> anyhow::Result<()>;

    /// Replace the interactive UI with its final outcome.
    async fn mark_resolved(
        &self,
        user_id: &str,
        ui_message_id: &str,
        outcome: PromptOutcome,
    ) -> anyhow::Result<()>;

    /// Deliver a free-form notice (errors, "reply with your text" requests).
    async fn notify(&self, user_id: &str, text: &str) -> anyhow::Result<()>;
}
