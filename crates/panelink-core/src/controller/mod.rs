//! Interactive prompt controller.
//!
//! Holds one pending prompt per (user, pane) pair and maps remote UI
//! actions onto keystroke sequences. Navigation is relative: the menu only
//! moves stepwise on arrow keys, so every move is computed from the tracked
//! cursor position, not an absolute jump. Toggle state is resynchronized
//! from a fresh capture after every action; the tracked state is only a
//! fallback for unparseable frames.
//!
//! Every removal path (select, submit, cancel, timeout, supersede,
//! cleanup) funnels through [`PromptController::resolve_and_remove`], which
//! settles the caller's channel and cancels the entry's timer exactly once.

mod ui;

pub use ui::{PromptOutcome, PromptResponse, PromptUi};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::semantic::{current_cursor_position, current_selections, DetectedPrompt};
use crate::tmux::{strip_ansi, PaneTarget, TmuxClient};

/// How long to wait for the free-text sub-prompt after selecting "Other".
const TEXT_MODE_WAIT: Duration = Duration::from_secs(2);
const TEXT_MODE_POLL: Duration = Duration::from_millis(100);

/// Menu marker glyphs; their disappearance signals free-text mode.
const MENU_GLYPHS: [char; 4] = ['○', '●', '☐', '☑'];

type PromptKey = (String, String);

/// One prompt currently shown to a user, awaiting an action.
struct PendingPrompt {
    prompt: DetectedPrompt,
    target: PaneTarget,
    chat_id: String,
    ui_message_id: String,
    created_at: DateTime<Utc>,
    /// Last known highlighted option index.
    cursor: usize,
    /// Optimistic multi-select state, replaced by ground truth when a
    /// post-action capture parses.
    toggled: Vec<usize>,
    awaiting_text: bool,
    resolver: Option<oneshot::Sender<Option<PromptResponse>>>,
    timeout_handle: Option<JoinHandle<()>>,
}

/// Stateful mapper from remote UI actions to pane keystrokes.
#[derive(Clone)]
pub struct PromptController {
    tmux: TmuxClient,
    config: BridgeConfig,
    ui: Arc<dyn PromptUi>,
    pending: Arc<Mutex<HashMap<PromptKey, PendingPrompt>>>,
}

impl PromptController {
    pub fn new(config: BridgeConfig, ui: Arc<dyn PromptUi>) -> Self {
        let tmux = TmuxClient::new(config.tmux_bin.clone(), config.send_settle());
        Self {
            tmux,
            config,
            ui,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Show a detected prompt to a user and return a channel that settles
    /// with the eventual [`PromptResponse`], or `None` on cancel/timeout.
    ///
    /// An existing pending prompt for the same (user, pane) is superseded:
    /// its channel settles with `None` before the new UI is rendered.
    pub async fn show_prompt(
        &self,
        prompt: DetectedPrompt,
        user_id: &str,
        pane_id: &str,
        target: PaneTarget,
        chat_id: &str,
    ) -> anyhow::Result<oneshot::Receiver<Option<PromptResponse>>> {
        let key: PromptKey = (user_id.to_string(), pane_id.to_string());

        if let Some(old) = self.resolve_and_remove(&key, None, true).await {
            debug!(user_id, pane_id, "Superseding existing pending prompt");
            let _ = self
                .ui
                .mark_resolved(user_id, &old.ui_message_id, PromptOutcome::Cancelled)
                .await;
        }

        let ui_message_id = self.ui.show_prompt(user_id, chat_id, &prompt).await?;

        let cursor = prompt
            .raw
            .as_deref()
            .map(current_cursor_position)
            .unwrap_or(0);
        let toggled = prompt.selected_indices();
        let (tx, rx) = oneshot::channel();

        let timeout_handle = self.spawn_timeout(key.clone(), self.config.prompt_timeout());

        let entry = PendingPrompt {
            prompt,
            target,
            chat_id: chat_id.to_string(),
            ui_message_id,
            created_at: Utc::now(),
            cursor,
            toggled,
            awaiting_text: false,
            resolver: Some(tx),
            timeout_handle: Some(timeout_handle),
        };
        info!(
            user_id,
            pane_id,
            chat_id = %entry.chat_id,
            question = %entry.prompt.question,
            "Prompt shown"
        );
        self.pending.lock().await.insert(key, entry);
        Ok(rx)
    }

    /// Choose one option on a single-select prompt and confirm it.
    pub async fn select(&self, user_id: &str, index: usize) -> anyhow::Result<()> {
        let (key, target, cursor, is_other, label) = {
            let pending = self.pending.lock().await;
            let key = key_for_user(&pending, user_id)
                .ok_or_else(|| BridgeError::NoPendingPrompt(user_id.to_string()))?;
            let entry = pending.get(&key).unwrap();
            let len = entry.prompt.options.len();
            if index >= len {
                return Err(BridgeError::IndexOutOfBounds { index, len }.into());
            }
            (
                key,
                entry.target.clone(),
                entry.cursor,
                entry.prompt.other_index() == Some(index),
                entry.prompt.options[index].label.clone(),
            )
        };

        // The map lock is released before any tmux call; a slow pane must
        // not stall prompt actions for other users.
        let mut pos = cursor;
        if let Err(e) = self.navigate(&target, &mut pos, index).await {
            self.write_back_cursor(&key, pos).await;
            return Err(e.into());
        }
        if let Err(e) = self.tmux.send_key(&target, "Enter").await {
            self.write_back_cursor(&key, pos).await;
            return Err(e.into());
        }

        let response = PromptResponse {
            selected_indices: vec![index],
            is_other,
            custom_text: None,
        };
        if let Some(entry) = self.resolve_and_remove(&key, Some(response), true).await {
            let _ = self
                .ui
                .mark_resolved(user_id, &entry.ui_message_id, PromptOutcome::Submitted(vec![label]))
                .await;
        }
        info!(user_id, index, "Option selected");
        Ok(())
    }

    /// Flip one option on a multi-select prompt, then resync toggle state
    /// from a fresh capture. Ground truth wins; the optimistic flip is only
    /// used when the post-action frame does not parse.
    pub async fn toggle(&self, user_id: &str, index: usize) -> anyhow::Result<()> {
        let (key, target, cursor) = {
            let pending = self.pending.lock().await;
            let key = key_for_user(&pending, user_id)
                .ok_or_else(|| BridgeError::NoPendingPrompt(user_id.to_string()))?;
            let entry = pending.get(&key).unwrap();
            let len = entry.prompt.options.len();
            if index >= len {
                return Err(BridgeError::IndexOutOfBounds { index, len }.into());
            }
            (key, entry.target.clone(), entry.cursor)
        };

        let mut pos = cursor;
        if let Err(e) = self.navigate(&target, &mut pos, index).await {
            self.write_back_cursor(&key, pos).await;
            return Err(e.into());
        }
        if let Err(e) = self.tmux.send_key(&target, "Space").await {
            self.write_back_cursor(&key, pos).await;
            return Err(e.into());
        }
        let ground_truth = match self
            .tmux
            .capture_pane(&target, self.config.capture_lines, None)
            .await
        {
            Ok(capture) => current_selections(&capture),
            Err(e) => {
                self.write_back_cursor(&key, pos).await;
                return Err(e.into());
            }
        };

        let (ui_message_id, prompt, toggled) = {
            let mut pending = self.pending.lock().await;
            let Some(entry) = pending.get_mut(&key) else {
                // Settled concurrently (timeout, cancel) while keys were in
                // flight; nothing left to update.
                return Ok(());
            };
            entry.cursor = pos;
            match ground_truth {
                Some(set) => entry.toggled = set,
                None => {
                    warn!(user_id, index, "Post-toggle frame did not parse, flipping optimistically");
                    if let Some(p) = entry.toggled.iter().position(|&i| i == index) {
                        entry.toggled.remove(p);
                    } else {
                        entry.toggled.push(index);
                        entry.toggled.sort_unstable();
                    }
                }
            }
            (
                entry.ui_message_id.clone(),
                entry.prompt.clone(),
                entry.toggled.clone(),
            )
        };

        let _ = self
            .ui
            .update_toggles(user_id, &ui_message_id, &prompt, &toggled)
            .await;
        debug!(user_id, index, toggled = ?toggled, "Option toggled");
        Ok(())
    }

    /// Confirm a multi-select prompt with the accumulated toggle set.
    pub async fn submit(&self, user_id: &str) -> anyhow::Result<()> {
        let (key, target, indices, labels) = {
            let pending = self.pending.lock().await;
            let key = key_for_user(&pending, user_id)
                .ok_or_else(|| BridgeError::NoPendingPrompt(user_id.to_string()))?;
            let entry = pending.get(&key).unwrap();
            let indices = entry.toggled.clone();
            let labels: Vec<String> = indices
                .iter()
                .filter_map(|&i| entry.prompt.options.get(i))
                .map(|o| o.label.clone())
                .collect();
            (key, entry.target.clone(), indices, labels)
        };

        self.tmux.send_key(&target, "Enter").await?;

        let response = PromptResponse {
            selected_indices: indices,
            is_other: false,
            custom_text: None,
        };
        if let Some(entry) = self.resolve_and_remove(&key, Some(response), true).await {
            let _ = self
                .ui
                .mark_resolved(user_id, &entry.ui_message_id, PromptOutcome::Submitted(labels))
                .await;
        }
        info!(user_id, "Prompt submitted");
        Ok(())
    }

    /// Enter free-text mode: the next [`Self::handle_text_input`] call from
    /// this user carries the answer. Nothing is injected yet.
    pub async fn choose_other(&self, user_id: &str) -> anyhow::Result<()> {
        let mut pending = self.pending.lock().await;
        let key = key_for_user(&pending, user_id)
            .ok_or_else(|| BridgeError::NoPendingPrompt(user_id.to_string()))?;
        let entry = pending.get_mut(&key).unwrap();

        if entry.prompt.other_index().is_none() {
            return Err(BridgeError::NoOtherOption(user_id.to_string()).into());
        }
        entry.awaiting_text = true;
        drop(pending);

        let _ = self
            .ui
            .notify(user_id, "Reply with the text for the \"Other\" option.")
            .await;
        Ok(())
    }

    /// Deliver free text for a prompt in text mode. Returns `false` when no
    /// prompt is awaiting text, or when injection fails (the awaiting flag
    /// is reset so the user can retry).
    pub async fn handle_text_input(&self, user_id: &str, text: &str) -> bool {
        let mut pending = self.pending.lock().await;
        let Some(key) = key_for_user(&pending, user_id) else {
            return false;
        };
        let entry = pending.get_mut(&key).unwrap();
        if !entry.awaiting_text {
            return false;
        }
        let Some(other_index) = entry.prompt.other_index() else {
            entry.awaiting_text = false;
            return false;
        };
        let target = entry.target.clone();
        let mut pos = entry.cursor;
        drop(pending);

        match self
            .enter_text_mode(&target, &mut pos, other_index, text)
            .await
        {
            Ok(()) => {}
            Err(e) => {
                warn!(user_id, error = %e, "Free-text injection failed");
                // `pos` reflects only keystrokes that were actually
                // delivered, so a retry navigates from the true highlight.
                if let Some(entry) = self.pending.lock().await.get_mut(&key) {
                    entry.awaiting_text = false;
                    entry.cursor = pos;
                }
                let _ = self
                    .ui
                    .notify(user_id, "Could not enter the text, please try again.")
                    .await;
                return false;
            }
        }

        let response = PromptResponse {
            selected_indices: vec![other_index],
            is_other: true,
            custom_text: Some(text.to_string()),
        };
        if let Some(entry) = self.resolve_and_remove(&key, Some(response), true).await {
            let _ = self
                .ui
                .mark_resolved(
                    user_id,
                    &entry.ui_message_id,
                    PromptOutcome::Submitted(vec![text.to_string()]),
                )
                .await;
        }
        info!(user_id, "Free-text answer delivered");
        true
    }

    /// Select "Other", wait for the menu to give way to a text sub-prompt,
    /// then inject the literal text.
    async fn enter_text_mode(
        &self,
        target: &PaneTarget,
        cursor: &mut usize,
        other_index: usize,
        text: &str,
    ) -> crate::error::Result<()> {
        self.navigate(target, cursor, other_index).await?;
        self.tmux.send_key(target, "Enter").await?;

        let deadline = tokio::time::Instant::now() + TEXT_MODE_WAIT;
        loop {
            sleep(TEXT_MODE_POLL).await;
            let capture = strip_ansi(&self.tmux.capture_pane(target, 50, None).await?);
            if !capture.chars().any(|c| MENU_GLYPHS.contains(&c)) {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BridgeError::Timeout(TEXT_MODE_WAIT));
            }
        }

        self.tmux.send_text(target, text).await
    }

    /// Owner-only cancel. The terminal is left untouched.
    pub async fn cancel(&self, user_id: &str) -> anyhow::Result<()> {
        let pending = self.pending.lock().await;
        let key = key_for_user(&pending, user_id)
            .ok_or_else(|| BridgeError::NoPendingPrompt(user_id.to_string()))?;
        drop(pending);

        if let Some(entry) = self.resolve_and_remove(&key, None, true).await {
            let _ = self
                .ui
                .mark_resolved(user_id, &entry.ui_message_id, PromptOutcome::Cancelled)
                .await;
        }
        info!(user_id, "Prompt cancelled");
        Ok(())
    }

    /// Shutdown: settle every pending prompt with `None`. A UI notification
    /// failure on one entry never stops cleanup of the rest.
    pub async fn cleanup(&self) {
        let keys: Vec<PromptKey> = self.pending.lock().await.keys().cloned().collect();
        for key in keys {
            if let Some(entry) = self.resolve_and_remove(&key, None, true).await {
                if let Err(e) = self
                    .ui
                    .mark_resolved(&key.0, &entry.ui_message_id, PromptOutcome::Cancelled)
                    .await
                {
                    warn!(user_id = %key.0, error = %e, "UI cleanup notification failed");
                }
            }
        }
        info!("Prompt controller cleaned up");
    }

    pub async fn is_awaiting_text_input(&self, user_id: &str) -> bool {
        let pending = self.pending.lock().await;
        key_for_user(&pending, user_id)
            .and_then(|key| pending.get(&key))
            .is_some_and(|e| e.awaiting_text)
    }

    pub async fn has_pending_prompt(&self, user_id: &str) -> bool {
        key_for_user(&*self.pending.lock().await, user_id).is_some()
    }

    /// Step the highlight toward `to`, advancing `cursor` only for
    /// keystrokes that were actually delivered. A mid-sequence failure thus
    /// leaves `cursor` at the real highlight position.
    async fn navigate(
        &self,
        target: &PaneTarget,
        cursor: &mut usize,
        to: usize,
    ) -> crate::error::Result<()> {
        for key_name in navigation_sequence(*cursor, to) {
            self.tmux.send_key(target, key_name).await?;
            *cursor = if *cursor < to { *cursor + 1 } else { *cursor - 1 };
        }
        Ok(())
    }

    /// Record the true highlight position after a failed injection, if the
    /// entry is still pending.
    async fn write_back_cursor(&self, key: &PromptKey, pos: usize) {
        if let Some(entry) = self.pending.lock().await.get_mut(key) {
            entry.cursor = pos;
        }
    }

    #[cfg(test)]
    async fn cursor_of(&self, user_id: &str) -> Option<usize> {
        let pending = self.pending.lock().await;
        key_for_user(&pending, user_id).and_then(|key| pending.get(&key).map(|e| e.cursor))
    }

    /// The single removal path: takes the entry out of the map, cancels its
    /// timer, settles its channel. Returns the entry for UI follow-up, or
    /// `None` when another path already settled it.
    async fn resolve_and_remove(
        &self,
        key: &PromptKey,
        response: Option<PromptResponse>,
        abort_timer: bool,
    ) -> Option<PendingPrompt> {
        let mut entry = self.pending.lock().await.remove(key)?;
        if let Some(handle) = entry.timeout_handle.take() {
            if abort_timer {
                handle.abort();
            }
        }
        if let Some(tx) = entry.resolver.take() {
            let _ = tx.send(response);
        }
        Some(entry)
    }

    fn spawn_timeout(&self, key: PromptKey, after: Duration) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            sleep(after).await;
            // Entry may already be gone; resolve_and_remove guards that.
            let Some(entry) = controller.resolve_and_remove(&key, None, false).await else {
                return;
            };
            warn!(user_id = %key.0, pane_id = %key.1, "Prompt timed out");
            if let Err(e) = controller.tmux.send_key(&entry.target, "Escape").await {
                warn!(error = %e, "Best-effort cancel keystroke failed");
            }
            let _ = controller
                .ui
                .mark_resolved(&key.0, &entry.ui_message_id, PromptOutcome::TimedOut)
                .await;
        })
    }
}

/// Key of this user's pending prompt; newest wins when a user somehow has
/// prompts on several panes.
fn key_for_user(pending: &HashMap<PromptKey, PendingPrompt>, user_id: &str) -> Option<PromptKey> {
    pending
        .iter()
        .filter(|(key, _)| key.0 == user_id)
        .max_by_key(|(_, entry)| entry.created_at)
        .map(|(key, _)| key.clone())
}

/// Arrow-key names to move the highlight from `from` to `to`.
fn navigation_sequence(from: usize, to: usize) -> Vec<&'static str> {
    if to >= from {
        vec!["Down"; to - from]
    } else {
        vec!["Up"; from - to]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::{PromptOption, PromptType};
    use std::sync::Mutex as StdMutex;
    use tokio::time::timeout;

    /// UI double that records every call.
    #[derive(Default)]
    struct RecordingUi {
        events: StdMutex<Vec<String>>,
    }

    impl RecordingUi {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[async_trait::async_trait]
    impl PromptUi for RecordingUi {
        async fn show_prompt(
            &self,
            user_id: &str,
            _chat_id: &str,
            prompt: &DetectedPrompt,
        ) -> anyhow::Result<String> {
            self.push(format!("show:{}:{}", user_id, prompt.question));
            Ok(format!("msg-{}", self.events.lock().unwrap().len()))
        }

        async fn update_toggles(
            &self,
            user_id: &str,
            _ui_message_id: &str,
            _prompt: &DetectedPrompt,
            toggled: &[usize],
        ) -> anyhow::Result<()> {
            self.push(format!("toggles:{}:{:?}", user_id, toggled));
            Ok(())
        }

        async fn mark_resolved(
            &self,
            user_id: &str,
            _ui_message_id: &str,
            outcome: PromptOutcome,
        ) -> anyhow::Result<()> {
            self.push(format!("resolved:{}:{:?}", user_id, outcome));
            Ok(())
        }

        async fn notify(&self, user_id: &str, text: &str) -> anyhow::Result<()> {
            self.push(format!("notify:{}:{}", user_id, text));
            Ok(())
        }
    }

    fn make_prompt() -> DetectedPrompt {
        DetectedPrompt {
            prompt_type: PromptType::Single,
            question: "Which library?".to_string(),
            options: vec![
                PromptOption {
                    index: 0,
                    label: "React".to_string(),
                    selected: true,
                },
                PromptOption {
                    index: 1,
                    label: "Vue".to_string(),
                    selected: false,
                },
                PromptOption {
                    index: 2,
                    label: "Other (custom)".to_string(),
                    selected: false,
                },
            ],
            has_other: true,
            raw: None,
        }
    }

    fn make_plain_prompt() -> DetectedPrompt {
        DetectedPrompt {
            prompt_type: PromptType::Single,
            question: "Deploy now?".to_string(),
            options: vec![
                PromptOption {
                    index: 0,
                    label: "Yes".to_string(),
                    selected: true,
                },
                PromptOption {
                    index: 1,
                    label: "No".to_string(),
                    selected: false,
                },
            ],
            has_other: false,
            raw: None,
        }
    }

    fn make_controller(ui: Arc<RecordingUi>) -> PromptController {
        // A bogus binary keeps any accidental tmux call from touching a
        // real server.
        let config = BridgeConfig {
            tmux_bin: "/nonexistent/tmux".to_string(),
            ..BridgeConfig::default()
        };
        PromptController::new(config, ui)
    }

    fn pane() -> PaneTarget {
        PaneTarget::parse("main:0.0").unwrap()
    }

    #[tokio::test]
    async fn test_show_prompt_supersedes_previous() {
        let ui = Arc::new(RecordingUi::default());
        let controller = make_controller(ui.clone());

        let first = controller
            .show_prompt(make_prompt(), "alice", "p0", pane(), "chat")
            .await
            .unwrap();
        let _second = controller
            .show_prompt(make_prompt(), "alice", "p0", pane(), "chat")
            .await
            .unwrap();

        // The first channel settles with None before the second UI shows.
        let settled = timeout(Duration::from_secs(1), first).await.unwrap().unwrap();
        assert!(settled.is_none());

        let events = ui.events();
        let cancel_pos = events
            .iter()
            .position(|e| e.starts_with("resolved:alice:Cancelled"))
            .unwrap();
        let second_show = events.iter().rposition(|e| e.starts_with("show:")).unwrap();
        assert!(cancel_pos < second_show);
    }

    #[tokio::test]
    async fn test_cancel_resolves_none_without_keystrokes() {
        let ui = Arc::new(RecordingUi::default());
        let controller = make_controller(ui.clone());

        let rx = controller
            .show_prompt(make_prompt(), "alice", "p0", pane(), "chat")
            .await
            .unwrap();
        controller.cancel("alice").await.unwrap();

        assert!(rx.await.unwrap().is_none());
        assert!(!controller.has_pending_prompt("alice").await);
        assert!(ui
            .events()
            .iter()
            .any(|e| e.starts_with("resolved:alice:Cancelled")));
    }

    #[tokio::test]
    async fn test_non_owner_is_rejected_without_side_effects() {
        let ui = Arc::new(RecordingUi::default());
        let controller = make_controller(ui.clone());

        let rx = controller
            .show_prompt(make_prompt(), "alice", "p0", pane(), "chat")
            .await
            .unwrap();

        assert!(controller.cancel("mallory").await.is_err());
        assert!(controller.select("mallory", 1).await.is_err());
        assert!(controller.submit("mallory").await.is_err());
        assert!(!controller.handle_text_input("mallory", "hi").await);

        // Alice's prompt is untouched and still unsettled.
        assert!(controller.has_pending_prompt("alice").await);
        let mut rx = rx;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_select_out_of_bounds() {
        let ui = Arc::new(RecordingUi::default());
        let controller = make_controller(ui);

        let _rx = controller
            .show_prompt(make_prompt(), "alice", "p0", pane(), "chat")
            .await
            .unwrap();
        let err = controller.select("alice", 99).await.unwrap_err();
        assert!(err.to_string().contains("out of bounds"));
        assert!(controller.has_pending_prompt("alice").await);
    }

    #[tokio::test]
    async fn test_choose_other_sets_awaiting_flag() {
        let ui = Arc::new(RecordingUi::default());
        let controller = make_controller(ui.clone());

        let _rx = controller
            .show_prompt(make_prompt(), "alice", "p0", pane(), "chat")
            .await
            .unwrap();

        assert!(!controller.is_awaiting_text_input("alice").await);
        controller.choose_other("alice").await.unwrap();
        assert!(controller.is_awaiting_text_input("alice").await);
        assert!(ui.events().iter().any(|e| e.starts_with("notify:alice:")));
    }

    #[tokio::test]
    async fn test_choose_other_requires_other_option() {
        let ui = Arc::new(RecordingUi::default());
        let controller = make_controller(ui.clone());

        let _rx = controller
            .show_prompt(make_plain_prompt(), "alice", "p0", pane(), "chat")
            .await
            .unwrap();

        let err = controller.choose_other("alice").await.unwrap_err();
        assert!(err.to_string().contains("no free-text option"));
        // The prompt itself stays pending and never enters text mode.
        assert!(controller.has_pending_prompt("alice").await);
        assert!(!controller.is_awaiting_text_input("alice").await);
    }

    #[tokio::test]
    async fn test_failed_injection_preserves_cursor() {
        let ui = Arc::new(RecordingUi::default());
        let controller = make_controller(ui.clone());

        let _rx = controller
            .show_prompt(make_prompt(), "alice", "p0", pane(), "chat")
            .await
            .unwrap();
        controller.choose_other("alice").await.unwrap();

        // The first navigation keystroke already fails (bogus binary), so
        // the highlight never moved; the tracked cursor must not jump to
        // the Other option's index.
        assert!(!controller.handle_text_input("alice", "my answer").await);
        assert_eq!(controller.cursor_of("alice").await, Some(0));

        // Same for a failed select: cursor untouched, prompt still pending.
        assert!(controller.select("alice", 2).await.is_err());
        assert_eq!(controller.cursor_of("alice").await, Some(0));
        assert!(controller.has_pending_prompt("alice").await);
    }

    #[tokio::test]
    async fn test_failed_action_does_not_block_other_users() {
        let ui = Arc::new(RecordingUi::default());
        let controller = make_controller(ui.clone());

        let _rx_a = controller
            .show_prompt(make_prompt(), "alice", "p0", pane(), "chat")
            .await
            .unwrap();
        let rx_b = controller
            .show_prompt(make_prompt(), "bob", "p1", pane(), "chat")
            .await
            .unwrap();

        // Alice's injection fails against the bogus binary; Bob's prompt
        // must remain fully actionable afterwards.
        assert!(controller.select("alice", 1).await.is_err());
        controller.cancel("bob").await.unwrap();
        assert!(rx_b.await.unwrap().is_none());
        assert!(controller.has_pending_prompt("alice").await);
    }

    #[tokio::test]
    async fn test_text_input_without_prompt_is_noop() {
        let ui = Arc::new(RecordingUi::default());
        let controller = make_controller(ui.clone());

        assert!(!controller.handle_text_input("alice", "anything").await);
        assert!(ui.events().is_empty());
    }

    #[tokio::test]
    async fn test_text_input_failure_resets_awaiting_flag() {
        let ui = Arc::new(RecordingUi::default());
        let controller = make_controller(ui.clone());

        let _rx = controller
            .show_prompt(make_prompt(), "alice", "p0", pane(), "chat")
            .await
            .unwrap();
        controller.choose_other("alice").await.unwrap();

        // tmux binary does not exist, so injection fails.
        assert!(!controller.handle_text_input("alice", "my answer").await);
        assert!(!controller.is_awaiting_text_input("alice").await);
        assert!(ui
            .events()
            .iter()
            .any(|e| e.starts_with("notify:alice:Could not enter")));
        // Retry is possible: the prompt is still pending.
        assert!(controller.has_pending_prompt("alice").await);
    }

    #[tokio::test]
    async fn test_cleanup_resolves_everything() {
        let ui = Arc::new(RecordingUi::default());
        let controller = make_controller(ui.clone());

        let rx_a = controller
            .show_prompt(make_prompt(), "alice", "p0", pane(), "chat")
            .await
            .unwrap();
        let rx_b = controller
            .show_prompt(make_prompt(), "bob", "p1", pane(), "chat")
            .await
            .unwrap();

        controller.cleanup().await;
        assert!(rx_a.await.unwrap().is_none());
        assert!(rx_b.await.unwrap().is_none());
        assert!(!controller.has_pending_prompt("alice").await);
        assert!(!controller.has_pending_prompt("bob").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_resolves_none_and_marks_ui() {
        let ui = Arc::new(RecordingUi::default());
        let controller = make_controller(ui.clone());

        let rx = controller
            .show_prompt(make_prompt(), "alice", "p0", pane(), "chat")
            .await
            .unwrap();

        // Let the timer task register its sleep, then jump past the prompt
        // timeout. The Escape keystroke fails (bogus binary) but that is
        // best-effort.
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_secs(301)).await;
        let settled = timeout(Duration::from_secs(5), rx).await.unwrap().unwrap();
        assert!(settled.is_none());
        assert!(!controller.has_pending_prompt("alice").await);
        assert!(ui
            .events()
            .iter()
            .any(|e| e.starts_with("resolved:alice:TimedOut")));
    }

    #[test]
    fn test_navigation_sequence() {
        assert!(navigation_sequence(2, 2).is_empty());
        assert_eq!(navigation_sequence(0, 3), vec!["Down", "Down", "Down"]);
        assert_eq!(navigation_sequence(3, 1), vec!["Up", "Up"]);
    }
}
