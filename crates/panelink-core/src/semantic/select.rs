//! Selection-menu detection.
//!
//! Detects interactive single/multi-select prompts from cleaned pane text.
//!
//! ## Rendered layout
//!
//! ```text
//! ? Which library?  (Use arrow keys)
//! ❯ ● React
//!   ○ Vue
//!   ○ Angular
//! ```
//!
//! ## Detection strategy
//!
//! - A **navigation-hint line** ("arrow keys" / "Space to select" /
//!   "Enter to ...") is a hard precondition. Marker glyphs alone are not
//!   enough — stale scrollback often still contains them.
//! - Radio glyphs `○`/`●` classify the menu as single-select, checkbox
//!   glyphs `☐`/`☑` as multi-select.
//! - Menus are anchored bottom-up: the lowest option block in the capture
//!   wins, since answered menus linger higher in the scrollback while the
//!   live prompt renders at the bottom.
//! - The option scan stops at a blank line, another hint line, or a bare
//!   prompt-cursor line; at least two options are required.
//!
//! All functions are pure and return `Option` — "no prompt detected" is a
//! normal outcome, never an error.

use once_cell::sync::Lazy;
use regex::Regex;

use super::types::{DetectedPrompt, PromptOption, PromptType};
use crate::tmux::strip_ansi;

/// Radio markers: unselected / selected.
pub const RADIO_UNSELECTED: char = '○';
pub const RADIO_SELECTED: char = '●';

/// Checkbox markers: unchecked / checked.
pub const CHECKBOX_UNCHECKED: char = '☐';
pub const CHECKBOX_CHECKED: char = '☑';

/// Highlight cursor the menu places in front of the current option.
const CURSOR: char = '❯';

/// Window for the cheap waiting-for-input check.
const IDLE_CHECK_LINES: usize = 20;

/// Bare prompt-cursor line (e.g. `❯ ` or `> `).
static PROMPT_ONLY_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[❯>]\s*$").unwrap());

/// "Other" free-text option label, with optional parenthetical.
static OTHER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^other\s*(\(.*\))?\s*$").unwrap());

/// Navigation hint fragments, checked case-insensitively.
const NAV_HINTS: &[&str] = &["arrow keys", "space to select", "enter to"];

/// One parsed option line.
#[derive(Debug, Clone, PartialEq, Eq)]
struct OptionLine {
    prompt_type: PromptType,
    selected: bool,
    label: String,
}

/// Check whether a line is a navigation hint.
fn is_nav_hint(line: &str) -> bool {
    let lower = line.to_lowercase();
    NAV_HINTS.iter().any(|hint| lower.contains(hint))
}

/// Check whether a line is only a prompt cursor.
fn is_bare_prompt(line: &str) -> bool {
    PROMPT_ONLY_PATTERN.is_match(line.trim())
}

/// Whether a label is the free-text escape option.
pub(crate) fn is_other_label(label: &str) -> bool {
    OTHER_PATTERN.is_match(label.trim())
}

/// Parse one line as a menu option: optional highlight cursor, then a marker
/// glyph, then the label.
fn parse_option_line(line: &str) -> Option<OptionLine> {
    let mut rest = line.trim_start();
    if let Some(stripped) = rest.strip_prefix(CURSOR) {
        rest = stripped.trim_start();
    }

    let marker = rest.chars().next()?;
    let (prompt_type, selected) = match marker {
        RADIO_UNSELECTED => (PromptType::Single, false),
        RADIO_SELECTED => (PromptType::Single, true),
        CHECKBOX_UNCHECKED => (PromptType::Multi, false),
        CHECKBOX_CHECKED => (PromptType::Multi, true),
        _ => return None,
    };

    let label = rest[marker.len_utf8()..].trim().to_string();
    if label.is_empty() {
        return None;
    }

    Some(OptionLine {
        prompt_type,
        selected,
        label,
    })
}

/// Detect an interactive selection prompt in raw pane text.
pub fn detect_prompt(raw: &str) -> Option<DetectedPrompt> {
    let clean = strip_ansi(raw);
    let lines: Vec<&str> = clean.lines().collect();

    // Precondition: a navigation hint must be on screen.
    if !lines.iter().any(|l| is_nav_hint(l)) {
        return None;
    }

    // Menus are anchored bottom-up: the live prompt sits at the end of the
    // capture, while answered menus linger higher in the scrollback. Each
    // candidate option block is tried in turn; fragments with fewer than two
    // options are skipped in favor of earlier blocks.
    let mut search_end = lines.len();
    while let Some(last_option) = lines[..search_end]
        .iter()
        .rposition(|l| parse_option_line(l).is_some())
    {
        let first_option = block_start(&lines, last_option);
        if let Some(prompt) = parse_menu(&lines, first_option, &clean) {
            return Some(prompt);
        }
        search_end = first_option;
    }
    None
}

/// Walk from the last option line of a block up to its first, bounded by a
/// blank line, a hint line, or a bare prompt cursor.
fn block_start(lines: &[&str], last_option: usize) -> usize {
    let mut first = last_option;
    let mut i = last_option;
    while i > 0 {
        let line = lines[i - 1];
        if line.trim().is_empty() || is_nav_hint(line) || is_bare_prompt(line) {
            break;
        }
        i -= 1;
        if parse_option_line(line).is_some() {
            first = i;
        }
    }
    first
}

/// Parse the menu whose first option line sits at `first_option`.
fn parse_menu(lines: &[&str], first_option: usize, clean: &str) -> Option<DetectedPrompt> {
    // Question: nearest `? `-prefixed line above the menu, else the line
    // immediately above the first option.
    let question = lines[..first_option]
        .iter()
        .rev()
        .find_map(|l| l.trim().strip_prefix("? ").map(|q| q.trim().to_string()))
        .or_else(|| {
            lines[..first_option]
                .iter()
                .rev()
                .find(|l| !l.trim().is_empty())
                .map(|l| l.trim().to_string())
        })?;
    // A hint appended to the question line is not part of the question.
    let question = match question.find('(') {
        Some(pos) if is_nav_hint(&question[pos..]) => question[..pos].trim().to_string(),
        _ => question,
    };

    let mut prompt_type = None;
    let mut options = Vec::new();

    for line in &lines[first_option..] {
        if line.trim().is_empty() || is_nav_hint(line) || is_bare_prompt(line) {
            break;
        }
        let Some(opt) = parse_option_line(line) else {
            // Wrapped labels and stray content inside the menu are skipped.
            continue;
        };
        let ty = *prompt_type.get_or_insert(opt.prompt_type);
        if opt.prompt_type != ty {
            // Mixed glyph families mean we are looking at stale fragments.
            continue;
        }
        options.push(PromptOption {
            index: options.len(),
            label: opt.label,
            selected: opt.selected,
        });
    }

    if options.len() < 2 {
        return None;
    }

    let has_other = options.iter().any(|o| is_other_label(&o.label));

    Some(DetectedPrompt {
        prompt_type: prompt_type?,
        question,
        options,
        has_other,
        raw: Some(clean.to_string()),
    })
}

/// Indices of the currently selected options, re-read from the terminal.
/// Used to resynchronize toggle state with ground truth after an action.
pub fn current_selections(raw: &str) -> Option<Vec<usize>> {
    detect_prompt(raw).map(|p| p.selected_indices())
}

/// Best-effort highlighted-option index.
///
/// Single-select menus render the selection as the highlight, so the
/// selected index is the cursor. A multi-select cursor is not recoverable
/// from static text; callers track it optimistically and get 0 here.
pub fn current_cursor_position(raw: &str) -> usize {
    match detect_prompt(raw) {
        Some(p) if p.prompt_type == PromptType::Single => p
            .options
            .iter()
            .find(|o| o.selected)
            .map(|o| o.index)
            .unwrap_or(0),
        _ => 0,
    }
}

/// Cheap idle/busy check: is the pane currently waiting for interactive
/// input? Checks only the last few lines for a hint line or marker glyph —
/// no full parse.
pub fn is_waiting_for_input(raw: &str) -> bool {
    let clean = strip_ansi(raw);
    let lines: Vec<&str> = clean.lines().collect();
    let tail = &lines[lines.len().saturating_sub(IDLE_CHECK_LINES)..];

    tail.iter().any(|line| {
        is_nav_hint(line)
            || line.chars().any(|c| {
                matches!(
                    c,
                    RADIO_UNSELECTED | RADIO_SELECTED | CHECKBOX_UNCHECKED | CHECKBOX_CHECKED
                )
            })
    })
}
