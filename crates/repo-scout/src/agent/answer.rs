//! Terminal-answer detection with hallucination rejection.
//!
//! A cooperative but unreliable oracle will sometimes emit an entire
//! imagined session in one response — "Step 1 ... Observation: ... Step 2 ...
//! Final Answer: ..." — and such a transcript must never be accepted as a
//! genuine conclusion: its "observations" were invented, not executed.
//!
//! The rejection rules are marker-counting heuristics, not a sound parser of
//! oracle intent. The thresholds live in `AnswerPolicy` so callers can tune
//! them; a rejected response simply costs one more loop iteration with
//! corrective guidance, so the cheap heuristic is acceptable.

use std::sync::LazyLock;

use regex::Regex;

use crate::agent::parser::{find_marker_ignore_case, ACTION_MARKER};

/// Marker that opens a genuine terminal answer.
pub const FINAL_ANSWER_MARKER: &str = "Final Answer:";
/// Marker reserved for system-injected tool results. The oracle never
/// legitimately authors it.
pub const OBSERVATION_MARKER: &str = "Observation:";
/// Marker opening the reasoning line of a single step.
pub const THOUGHT_MARKER: &str = "Thought:";

/// `Step 1:` / `step 2:` anywhere, which also covers heading-style markers
/// such as `## Step 3:`.
static STEP_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bstep\s+\d+\s*:").unwrap());

/// Rejection thresholds for multi-step self-simulation.
///
/// A genuine single step carries at most one reasoning marker and one action
/// marker; anything beyond that reads as an imagined transcript.
#[derive(Debug, Clone)]
pub struct AnswerPolicy {
    pub max_reasoning_markers: usize,
    pub max_action_markers: usize,
}

impl Default for AnswerPolicy {
    fn default() -> Self {
        Self {
            max_reasoning_markers: 1,
            max_action_markers: 1,
        }
    }
}

/// Extract a genuine terminal answer, or `None` when the response must be
/// rejected and the loop re-prompted.
pub fn extract_answer(text: &str, policy: &AnswerPolicy) -> Option<String> {
    if STEP_MARKER.is_match(text) {
        return None;
    }
    if text.contains(OBSERVATION_MARKER) {
        return None;
    }
    if count_occurrences(text, THOUGHT_MARKER) > policy.max_reasoning_markers {
        return None;
    }
    if count_occurrences(text, ACTION_MARKER) > policy.max_action_markers {
        return None;
    }

    let terminal = find_marker_ignore_case(text, FINAL_ANSWER_MARKER)?;
    // An action marker after the terminal marker means the oracle is still
    // acting, not concluding.
    if let Some(action_at) = rfind_occurrence(text, ACTION_MARKER) {
        if action_at > terminal {
            return None;
        }
    }

    answer_from_marker_line(text)
}

/// Everything after the first line-leading terminal marker, trimmed.
/// `None` when the marker only appears mid-line or with empty content.
fn answer_from_marker_line(text: &str) -> Option<String> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        let indent = line.len() - trimmed.len();
        if starts_with_ignore_case(trimmed, FINAL_ANSWER_MARKER) {
            let answer = text[offset + indent + FINAL_ANSWER_MARKER.len()..].trim();
            if answer.is_empty() {
                return None;
            }
            return Some(answer.to_string());
        }
        offset += line.len();
    }
    None
}

fn starts_with_ignore_case(text: &str, marker: &str) -> bool {
    text.as_bytes()
        .get(..marker.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(marker.as_bytes()))
}

fn count_occurrences(text: &str, marker: &str) -> usize {
    text.matches(marker).count()
}

fn rfind_occurrence(text: &str, marker: &str) -> Option<usize> {
    text.rfind(marker)
}
