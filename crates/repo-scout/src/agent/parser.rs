//! Deterministic extraction of a structured action from free-form oracle text.
//!
//! The oracle is asked for exactly `{"tool": ..., "parameters": {...}}` after
//! an `Action:` marker, but real responses bury the JSON in prose, fence it,
//! or emit several brace-delimited fragments. The parser runs an ordered
//! fallback chain and accepts the first candidate that is valid JSON carrying
//! both a `tool` string and a `parameters` object:
//!
//! 1. brace-depth scan from the first `{` after a line-level `Action:` marker
//!    (naive first-`{`-to-last-`}` slicing breaks on nested fragments);
//! 2. the span from the first `{` to the last `}`;
//! 3. a regex sweep over brace fragments (one nesting level deep).
//!
//! Steps 2 and 3 only search text before the terminal-answer marker, so
//! example JSON quoted inside a final answer is never mistaken for an action.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::agent::answer::FINAL_ANSWER_MARKER;

/// Marker preceding the structured action in the response protocol.
pub const ACTION_MARKER: &str = "Action:";

/// Brace fragments with at most one level of nesting.
static BRACE_FRAGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^{}]*\{[^{}]*\}[^{}]*\}|\{[^{}]*\}").unwrap());

/// A structured action extracted from oracle text.
///
/// The tool name is kept as text: the parser checks structure, the executor
/// checks vocabulary (an unknown tool becomes an error observation, which
/// the oracle can correct — a parse failure cannot carry that feedback).
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub tool: String,
    pub parameters: Map<String, Value>,
}

/// Extract an action from `text`, or `None` when no structurally valid
/// candidate exists.
pub fn parse_action(text: &str) -> Option<Action> {
    // Step 1: brace scan after a line-level `Action:` marker.
    if let Some(rest) = text_after_action_marker(text) {
        if let Some(candidate) = balanced_braces(rest) {
            if let Some(action) = accept(candidate) {
                return Some(action);
            }
        }
    }

    // Fallbacks never look at or past the terminal-answer marker.
    let searchable = before_final_answer(text);

    // Step 2: widest span.
    let start = searchable.find('{');
    let end = searchable.rfind('}');
    if let (Some(start), Some(end)) = (start, end) {
        if start < end {
            if let Some(action) = accept(&searchable[start..=end]) {
                return Some(action);
            }
        }
    }

    // Step 3: regex sweep, first fragment with both keys wins.
    for fragment in BRACE_FRAGMENT.find_iter(searchable) {
        if let Some(action) = accept(fragment.as_str()) {
            return Some(action);
        }
    }

    None
}

/// Text following the first `Action:` that starts a line (after indentation).
fn text_after_action_marker(text: &str) -> Option<&str> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with(ACTION_MARKER) {
            let indent = line.len() - trimmed.len();
            let marker_end = offset + indent + ACTION_MARKER.len();
            return Some(&text[marker_end..]);
        }
        offset += line.len();
    }
    None
}

/// The slice of `text` before the first terminal-answer marker, if any.
fn before_final_answer(text: &str) -> &str {
    match find_marker_ignore_case(text, FINAL_ANSWER_MARKER) {
        Some(idx) => &text[..idx],
        None => text,
    }
}

/// Byte offset of the first case-insensitive occurrence of an ASCII marker.
pub(crate) fn find_marker_ignore_case(text: &str, marker: &str) -> Option<usize> {
    let text = text.as_bytes();
    let marker = marker.as_bytes();
    if marker.is_empty() || text.len() < marker.len() {
        return None;
    }
    (0..=text.len() - marker.len()).find(|&i| text[i..i + marker.len()].eq_ignore_ascii_case(marker))
}

/// The span from the first `{` to the brace that returns the nesting depth to
/// zero. Depth counting is oblivious to string literals, which matches the
/// tolerant-scan contract: a miscount falls through to the next fallback.
fn balanced_braces(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    for (i, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse a candidate and accept it only with both required keys present and
/// well-typed. Malformed JSON is not an error — the caller tries the next
/// fallback.
fn accept(candidate: &str) -> Option<Action> {
    let value: Value = serde_json::from_str(candidate.trim()).ok()?;
    let obj = value.as_object()?;
    let tool = obj.get("tool")?.as_str()?.to_string();
    let parameters = obj.get("parameters")?.as_object()?.clone();
    Some(Action { tool, parameters })
}
