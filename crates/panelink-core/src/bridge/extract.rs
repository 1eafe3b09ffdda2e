//! Response extraction from pane scrollback.
//!
//! After a message completes, the pane holds the echoed user message, the
//! agent's prose answer, and a lot of chrome: spinner status lines,
//! separators, tool-invocation banners (`⏺ Bash(...)`), tool-result
//! summaries (`⎿ ...`), and the idle prompt. Extraction slices the capture
//! starting after the sent message and keeps only the prose.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::tmux::strip_ansi;

/// Spinner-only line (e.g. "· · ·").
static SPINNER_ONLY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[·✻✽✶✳✢⠐⠂⠈⠁⠉⠃⠋⠓⠒⠖⠦⠤\s]+$").unwrap());

/// Spinner status line (e.g. "✳ Determining… (4s · thinking)").
static SPINNER_LINE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[·✻✽✶✳✢]\s+\S").unwrap());

/// Horizontal rule.
static SEPARATOR_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*[─━═]+\s*$").unwrap());

/// Bare prompt-cursor line.
static PROMPT_ONLY_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[❯>]\s*$").unwrap());

/// Tool name following a `⏺` banner. A `⏺` line that does *not* match is
/// assistant prose rendered as a bullet.
static TOOL_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(Bash|Read|Edit|Write|Glob|Grep|Task|WebFetch|WebSearch|LSP|NotebookEdit)\s*\(",
    )
    .unwrap()
});

/// Permanent bottom-bar / status chrome.
fn is_status_bar(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.contains("esc to interrupt") || line.trim_start().starts_with("⏵⏵")
}

/// Tool-result summary lines under a banner.
fn is_tool_result(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with('⎿') || trimmed.starts_with('│')
}

/// Extract the newly produced answer from a post-completion capture.
///
/// `anchor` is the echoed user message (its first line); the slice starts
/// after its *last* occurrence. When the echo is not found — the program may
/// reflow or truncate it — `baseline_lines` (the pre-send line count) is the
/// fallback start.
pub fn extract_response(capture: &str, anchor: Option<&str>, baseline_lines: usize) -> Option<String> {
    let clean = strip_ansi(capture);
    let lines: Vec<&str> = clean.lines().collect();

    let start = anchor
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .and_then(|a| {
            lines
                .iter()
                .rposition(|l| l.contains(a))
                .map(|idx| idx + 1)
        })
        .unwrap_or_else(|| baseline_lines.min(lines.len()));

    let mut collected: Vec<String> = Vec::new();
    let mut capturing = true;

    for line in &lines[start..] {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            if capturing && !collected.is_empty() {
                collected.push(String::new());
            }
            continue;
        }
        if SPINNER_ONLY_PATTERN.is_match(trimmed)
            || SPINNER_LINE_PATTERN.is_match(line)
            || SEPARATOR_PATTERN.is_match(trimmed)
            || is_status_bar(line)
            || is_tool_result(line)
        {
            continue;
        }
        if PROMPT_ONLY_PATTERN.is_match(trimmed) {
            // Idle prompt after captured text means the answer is complete.
            if collected.iter().any(|l| !l.is_empty()) {
                break;
            }
            continue;
        }
        if let Some(after) = trimmed.strip_prefix('⏺') {
            let after = after.trim_start();
            if TOOL_NAME_PATTERN.is_match(after) || after.contains("(MCP)") {
                // Tool banner: suppress until the next prose block.
                capturing = false;
            } else {
                capturing = true;
                if !after.is_empty() {
                    collected.push(after.to_string());
                }
            }
            continue;
        }
        if capturing {
            collected.push(trimmed.to_string());
        }
    }

    // Drop trailing blank padding and collapse runs of blanks.
    while collected.last().is_some_and(|l| l.is_empty()) {
        collected.pop();
    }
    let mut text = String::new();
    let mut last_blank = false;
    for line in collected {
        if line.is_empty() {
            if last_blank {
                continue;
            }
            last_blank = true;
        } else {
            last_blank = false;
        }
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(&line);
    }

    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen(lines: &[&str]) -> String {
        lines.join("\n")
    }

    #[test]
    fn test_extract_after_anchor() {
        let capture = screen(&[
            "old scrollback answer",
            "❯ fix the bug",
            "⏺ The bug was a missing null check.",
            "I added the check in parse().",
            "❯ ",
        ]);
        let text = extract_response(&capture, Some("fix the bug"), 0).unwrap();
        assert_eq!(
            text,
            "The bug was a missing null check.\nI added the check in parse()."
        );
    }

    #[test]
    fn test_last_anchor_occurrence_wins() {
        // The same message was sent earlier in the session.
        let capture = screen(&[
            "❯ run tests",
            "old answer",
            "❯ run tests",
            "new answer",
            "❯ ",
        ]);
        let text = extract_response(&capture, Some("run tests"), 0).unwrap();
        assert_eq!(text, "new answer");
    }

    #[test]
    fn test_baseline_fallback_without_anchor() {
        let capture = screen(&["line 0", "line 1", "fresh answer", "❯ "]);
        let text = extract_response(&capture, None, 2).unwrap();
        assert_eq!(text, "fresh answer");

        // Anchor not present in the capture falls back too.
        let text = extract_response(&capture, Some("never echoed"), 2).unwrap();
        assert_eq!(text, "fresh answer");
    }

    #[test]
    fn test_skips_chrome() {
        let capture = screen(&[
            "❯ what is 2+2",
            "✳ Determining… (2s · thinking)",
            "────────────────────",
            "⏺ 2+2 is 4.",
            "  ⏵⏵ bypass permissions on (shift+tab to cycle) · esc to interrupt",
            "❯ ",
        ]);
        assert_eq!(
            extract_response(&capture, Some("what is 2+2"), 0).unwrap(),
            "2+2 is 4."
        );
    }

    #[test]
    fn test_tool_banner_toggles_capture() {
        let capture = screen(&[
            "❯ list the files",
            "⏺ Bash(ls -la)",
            "  ⎿ total 42",
            "  │ src  tests  Cargo.toml",
            "noise emitted while the tool ran",
            "⏺ The project has src, tests, and a manifest.",
            "And nothing else of note.",
            "❯ ",
        ]);
        let text = extract_response(&capture, Some("list the files"), 0).unwrap();
        assert_eq!(
            text,
            "The project has src, tests, and a manifest.\nAnd nothing else of note."
        );
    }

    #[test]
    fn test_stops_at_idle_prompt() {
        let capture = screen(&[
            "❯ hello",
            "⏺ Hi there.",
            "❯ ",
            "stale text typed after",
        ]);
        assert_eq!(extract_response(&capture, Some("hello"), 0).unwrap(), "Hi there.");
    }

    #[test]
    fn test_empty_when_no_answer() {
        let capture = screen(&["❯ hello", "✳ Thinking…", "❯ "]);
        assert!(extract_response(&capture, Some("hello"), 0).is_none());
        assert!(extract_response("", None, 0).is_none());
    }

    #[test]
    fn test_blank_runs_collapsed() {
        let capture = screen(&[
            "❯ summarize",
            "⏺ First paragraph.",
            "",
            "",
            "Second paragraph.",
            "",
            "❯ ",
        ]);
        assert_eq!(
            extract_response(&capture, Some("summarize"), 0).unwrap(),
            "First paragraph.\n\nSecond paragraph."
        );
    }

    #[test]
    fn test_mcp_tool_banner_suppressed() {
        let capture = screen(&[
            "❯ search the kb",
            "⏺ panelink - kb_search (MCP)",
            "  ⎿ Found 3 results",
            "⏺ Here is what I found.",
            "❯ ",
        ]);
        assert_eq!(
            extract_response(&capture, Some("search the kb"), 0).unwrap(),
            "Here is what I found."
        );
    }
}
