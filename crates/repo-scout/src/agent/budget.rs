//! Observation compression under a fixed character budget.
//!
//! Naive truncation of a JSON payload produces an unparsable fragment that
//! teaches the oracle nothing, so list-bearing results are compressed
//! structurally: keep the first few items, say how many were dropped. Only
//! payloads with no list to trim fall back to hard truncation, and those get
//! an explicit marker naming the original length.
//!
//! `compress_observation` is idempotent: feeding its output back through
//! yields the same text.

use serde_json::Value;

/// Items retained from a list-bearing result.
const KEEP_ITEMS: usize = 3;
const TRUNCATION_MARKER: &str = "... [truncated, originally ";

/// Compress `serialized` to roughly `max_len` characters.
pub fn compress_observation(serialized: &str, max_len: usize) -> String {
    if serialized.len() <= max_len {
        return serialized.to_string();
    }

    // Structured path: a JSON object with an `items` array.
    if let Ok(Value::Object(mut obj)) = serde_json::from_str::<Value>(serialized) {
        if let Some(Value::Array(items)) = obj.get_mut("items") {
            let original_count = items.len();
            items.truncate(KEEP_ITEMS);
            if original_count > KEEP_ITEMS {
                obj.insert(
                    "note".to_string(),
                    Value::String(format!(
                        "Showing {KEEP_ITEMS} of {original_count} total items to save context"
                    )),
                );
            }
            return serde_json::to_string_pretty(&Value::Object(obj))
                .unwrap_or_else(|_| serialized.to_string());
        }
    }

    // Already-truncated text passes through unchanged.
    if serialized.ends_with(" chars]") && serialized.contains(TRUNCATION_MARKER) {
        return serialized.to_string();
    }

    let mut cut = max_len;
    while !serialized.is_char_boundary(cut) {
        cut -= 1;
    }
    format!(
        "{}\n{}{} chars]",
        &serialized[..cut],
        TRUNCATION_MARKER,
        serialized.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn long_items(n: usize) -> String {
        let items: Vec<Value> = (0..n)
            .map(|i| json!({"path": format!("src/some/deep/path/File{i}.java"), "score": i}))
            .collect();
        serde_json::to_string(&json!({"total_count": n, "items": items})).unwrap()
    }

    #[test]
    fn short_payloads_pass_through() {
        let payload = r#"{"total_count": 0, "items": []}"#;
        assert_eq!(compress_observation(payload, 1500), payload);
    }

    #[test]
    fn oversized_list_keeps_three_items_and_notes_the_rest() {
        let payload = long_items(12);
        let out = compress_observation(&payload, 100);
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["items"].as_array().unwrap().len(), 3);
        assert_eq!(
            parsed["note"],
            "Showing 3 of 12 total items to save context"
        );
        // Structure is preserved, not chopped mid-token.
        assert_eq!(parsed["total_count"], 12);
    }

    #[test]
    fn exactly_three_items_never_annotated() {
        let payload = long_items(3);
        let out = compress_observation(&payload, 50);
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert!(parsed.get("note").is_none());
        assert_eq!(parsed["items"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn four_items_always_annotated() {
        let payload = long_items(4);
        let out = compress_observation(&payload, 50);
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["note"], "Showing 3 of 4 total items to save context");
    }

    #[test]
    fn list_compression_is_idempotent() {
        let payload = long_items(12);
        let once = compress_observation(&payload, 100);
        let twice = compress_observation(&once, 100);
        assert_eq!(once, twice);
    }

    #[test]
    fn plain_text_falls_back_to_marked_truncation() {
        let payload = "x".repeat(500);
        let out = compress_observation(&payload, 100);
        assert!(out.starts_with(&"x".repeat(100)));
        assert!(out.ends_with("[truncated, originally 500 chars]"));
    }

    #[test]
    fn truncation_is_idempotent() {
        let payload = "y".repeat(500);
        let once = compress_observation(&payload, 100);
        let twice = compress_observation(&once, 100);
        assert_eq!(once, twice);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        // Multi-byte characters around the cut point must not split.
        let payload = "é".repeat(300);
        let out = compress_observation(&payload, 101);
        assert!(out.contains("[truncated, originally 600 chars]"));
    }

    #[test]
    fn json_without_items_uses_fallback() {
        let payload =
            serde_json::to_string(&json!({"content": "z".repeat(400)})).unwrap();
        let out = compress_observation(&payload, 100);
        assert!(out.contains("[truncated, originally"));
    }
}
