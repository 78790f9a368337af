//! Tolerant JSON repair pipeline for LLM score replies.
//!
//! Model output is almost always syntactically valid JSON, but a small set
//! of malformations recurs: markdown fences the model adds despite
//! instructions, a trailing comma, a stray quote after a number, and
//! arrays or nested objects truncated near the token limit. The pipeline
//! runs increasingly aggressive passes and short-circuits at the first one
//! whose output parses:
//!
//! 1. strict parse of the raw reply;
//! 2. ordered syntactic cleanup ([`cleanup`]), then strict parse again;
//! 3. lenient parse of the cleaned text ([`lenient`]);
//! 4. give up with a diagnostic and a bounded excerpt of the cleaned text.
//!
//! The whole pipeline is pure and deterministic: no I/O, no panics, every
//! input yields a typed outcome. Schema conformance of the parsed tree is
//! the caller's concern.

pub mod cleanup;
mod lenient;

use serde_json::Value;

/// Cap on the raw-text excerpt carried by an unrecoverable outcome, so a
/// runaway reply cannot bloat the failure record.
pub const MAX_RAW_EXCERPT_CHARS: usize = 3000;

/// Result of one repair attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RepairOutcome {
    /// Some pass produced a well-formed tree.
    Parsed(Value),
    /// Every pass failed. Carries the last parser's error message and the
    /// cleaned text, truncated, for later inspection or manual repair.
    Unrecoverable {
        diagnostic: String,
        truncated_raw: String,
    },
}

/// Repairs one raw LLM reply into a structured document, or reports why it
/// could not be done.
pub fn repair(raw: &str) -> RepairOutcome {
    if raw.trim().is_empty() {
        return RepairOutcome::Unrecoverable {
            diagnostic: "empty LLM response".to_string(),
            truncated_raw: String::new(),
        };
    }

    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        return RepairOutcome::Parsed(value);
    }

    let cleaned = cleanup::clean(raw);
    if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
        return RepairOutcome::Parsed(value);
    }

    match lenient::parse_lenient(&cleaned) {
        Ok(value) => RepairOutcome::Parsed(value),
        Err(err) => RepairOutcome::Unrecoverable {
            diagnostic: err.to_string(),
            truncated_raw: cleaned.chars().take(MAX_RAW_EXCERPT_CHARS).collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parsed(outcome: RepairOutcome) -> Value {
        match outcome {
            RepairOutcome::Parsed(value) => value,
            RepairOutcome::Unrecoverable { diagnostic, .. } => {
                panic!("expected Parsed, got Unrecoverable: {diagnostic}")
            }
        }
    }

    #[test]
    fn test_valid_json_equals_direct_parse() {
        let raw = "{\"score\": {\"value\": 73.5, \"components\": {}}, \"analysis\": {\"strengths\": [\"a\"]}}";
        let direct: Value = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed(repair(raw)), direct);
    }

    #[test]
    fn test_repair_is_idempotent_over_cleanup() {
        let samples = [
            "```json\n{\"score\": 87\", \"name\": \"A B\",}\n```",
            "{\"a\": [1, 2, \"b\": 3}",
            "{\"a\": {\"b\": 1",
            "{\"a\": 1,}",
            "definitely not json",
        ];
        for raw in samples {
            let via_raw = repair(raw);
            let via_cleaned = repair(&cleanup::clean(raw));
            assert_eq!(via_raw, via_cleaned, "diverged on {raw:?}");
        }
    }

    #[test]
    fn test_fenced_valid_json_is_recovered() {
        let raw = "```json\n{\"name\": \"A B\", \"score\": 91}\n```";
        assert_eq!(parsed(repair(raw)), json!({"name": "A B", "score": 91}));
    }

    #[test]
    fn test_trailing_comma_leaves_no_spurious_element() {
        let raw = "{\"items\": [1, 2, 3,], \"n\": 1,}";
        let value = parsed(repair(raw));
        assert_eq!(value["items"], json!([1, 2, 3]));
        assert_eq!(value.as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_unterminated_array_keeps_siblings_out() {
        let raw = "{\"matched\": [\"rust\", \"sql\", \"missing\": [\"go\"], \"score\": 40}";
        let value = parsed(repair(raw));
        assert_eq!(value["matched"], json!(["rust", "sql"]));
        assert_eq!(value["missing"], json!(["go"]));
        assert_eq!(value["score"], json!(40));
    }

    #[test]
    fn test_empty_input_is_unrecoverable_with_diagnostic() {
        for raw in ["", "   \n\t  "] {
            match repair(raw) {
                RepairOutcome::Unrecoverable {
                    diagnostic,
                    truncated_raw,
                } => {
                    assert!(!diagnostic.is_empty());
                    assert!(truncated_raw.is_empty());
                }
                RepairOutcome::Parsed(value) => panic!("parsed nothing into {value}"),
            }
        }
    }

    #[test]
    fn test_end_to_end_fenced_stray_quote_trailing_comma() {
        let raw = "```json\n{\"score\": 87\", \"name\": \"A B\",}\n```";
        assert_eq!(parsed(repair(raw)), json!({"score": 87, "name": "A B"}));
    }

    #[test]
    fn test_end_to_end_ambiguous_bracket_yields_typed_outcome() {
        // Either the bracket heuristic finds a plausible structure or the
        // pipeline reports failure; it must never panic.
        let raw = "{\"a\": [1,2, \"missing\": []}";
        match repair(raw) {
            RepairOutcome::Parsed(value) => {
                assert_eq!(value["a"], json!([1, 2]));
                assert_eq!(value["missing"], json!([]));
            }
            RepairOutcome::Unrecoverable { diagnostic, .. } => {
                assert!(!diagnostic.is_empty());
            }
        }
    }

    #[test]
    fn test_duplicate_keys_resolve_last_wins() {
        let raw = "{\"score\": 10, \"score\": 20}";
        assert_eq!(parsed(repair(raw)), json!({"score": 20}));
    }

    #[test]
    fn test_concatenated_objects_are_not_split() {
        // Two top-level objects never become valid JSON; no multi-document
        // splitting is attempted.
        let raw = "{\"a\": 1} {\"b\": 2}";
        assert!(matches!(repair(raw), RepairOutcome::Unrecoverable { .. }));
    }

    #[test]
    fn test_excerpt_is_bounded() {
        let mut raw = String::from("{\"a\": [");
        raw.push_str(&": ,".repeat(4000));
        match repair(&raw) {
            RepairOutcome::Unrecoverable { truncated_raw, .. } => {
                assert!(truncated_raw.chars().count() <= MAX_RAW_EXCERPT_CHARS);
            }
            RepairOutcome::Parsed(value) => panic!("unexpected parse: {value}"),
        }
    }

    #[test]
    fn test_truncated_nested_object_is_closed() {
        let raw = "{\"score\": {\"value\": 55, \"components\": {\"education\": {\"score\": 8";
        let value = parsed(repair(raw));
        assert_eq!(value["score"]["value"], json!(55));
    }
}
