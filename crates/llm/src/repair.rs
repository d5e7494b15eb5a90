//! Best-effort JSON recovery from model output.
//!
//! Models wrap JSON in control tokens, markdown fences, prose, and the
//! occasional trailing ellipsis. The parser tries progressively smaller
//! candidates and, when everything fails, returns a sentinel instead of an
//! error so a single bad response never kills a pipeline stage.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Matches model control tokens like `<|channel|>final <|message|>`.
static CONTROL_TOKENS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<\|[^|]+\|>\w*\s*").expect("control token pattern"));

/// Result of model-output JSON parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum Repaired {
    Parsed(Value),
    /// Nothing parseable; carries the parser error and the cleaned raw text.
    Sentinel {
        parse_error: String,
        raw_content: String,
    },
}

impl Repaired {
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Repaired::Sentinel { .. })
    }
}

/// Extract the largest `{...}` span (first `{` through last `}`).
fn largest_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

/// Parse JSON out of raw model output.
pub fn parse_model_json(content: &str) -> Repaired {
    let stripped = CONTROL_TOKENS.replace_all(content, "").into_owned();

    // Anchor on the outermost object when prose surrounds it.
    let mut working = stripped.clone();
    if !working.trim_start().starts_with('{') {
        if let Some(obj) = largest_object(&working) {
            working = obj.to_string();
        }
    }

    // Unwrap markdown code fences.
    let mut json_content = working.clone();
    if let Some(after) = working.split_once("```json") {
        if let Some((inner, _)) = after.1.split_once("```") {
            json_content = inner.to_string();
        } else {
            json_content = after.1.to_string();
        }
    } else if working.contains("```") {
        let parts: Vec<&str> = working.split("```").collect();
        if parts.len() >= 2 {
            json_content = parts[1].to_string();
        }
    }

    let mut candidates: Vec<String> = vec![json_content.trim().to_string()];
    if let Some(obj) = largest_object(&json_content) {
        candidates.push(obj.trim().to_string());
    }
    if json_content.trim().ends_with("...") {
        candidates.push(json_content.trim().trim_end_matches('.').to_string());
    }

    let mut last_error = String::from("no JSON object found");
    for candidate in &candidates {
        if candidate.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(candidate) {
            Ok(value) => return Repaired::Parsed(value),
            Err(e) => last_error = e.to_string(),
        }
    }

    Repaired::Sentinel {
        parse_error: last_error,
        raw_content: working,
    }
}

/// Clean an LLM answer that should have been plain text.
///
/// Some models return JSON in markdown fences even when asked for prose; the
/// executive summary path unwraps that and pulls out the `summary` field
/// (with up to five action items) when it finds one.
pub fn clean_summary_response(text: &str) -> String {
    static FENCE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?is)^```(?:json)?\s*\n?(.*?)\n?```$").expect("fence pattern")
    });

    let mut cleaned = text.trim().to_string();
    if let Some(captures) = FENCE.captures(&cleaned) {
        cleaned = captures[1].trim().to_string();
    }

    if cleaned.starts_with('{') {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&cleaned) {
            let mut parts: Vec<String> = Vec::new();
            if let Some(summary) = map.get("summary").and_then(Value::as_str) {
                if !summary.is_empty() {
                    parts.push(summary.to_string());
                }
            }
            if let Some(items) = map.get("action_items").and_then(Value::as_array) {
                if !items.is_empty() {
                    parts.push("\nPriorytetowe akcje:".to_string());
                    for item in items.iter().take(5) {
                        if let Some(s) = item.as_str() {
                            parts.push(format!("• {s}"));
                        }
                    }
                }
            }
            if !parts.is_empty() {
                return parts.join("\n");
            }
        }
    }

    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_json_parses() {
        let result = parse_model_json(r#"{"is_issue": true, "severity": "high"}"#);
        assert_eq!(
            result,
            Repaired::Parsed(json!({"is_issue": true, "severity": "high"}))
        );
    }

    #[test]
    fn test_strips_control_tokens() {
        let raw = r#"<|channel|>final <|constrain|>JSON<|message|>{"ok": 1}"#;
        assert_eq!(parse_model_json(raw), Repaired::Parsed(json!({"ok": 1})));
    }

    #[test]
    fn test_unwraps_json_fence() {
        let raw = "```json\n{\"severity\": \"low\"}\n```";
        assert_eq!(parse_model_json(raw), Repaired::Parsed(json!({"severity": "low"})));
    }

    #[test]
    fn test_unwraps_bare_fence() {
        let raw = "```\n{\"a\": 2}\n```";
        assert_eq!(parse_model_json(raw), Repaired::Parsed(json!({"a": 2})));
    }

    #[test]
    fn test_extracts_object_from_prose() {
        let raw = "Sure! Here is the analysis: {\"is_issue\": false} hope that helps";
        assert_eq!(parse_model_json(raw), Repaired::Parsed(json!({"is_issue": false})));
    }

    #[test]
    fn test_sentinel_on_no_json() {
        let result = parse_model_json("the answer is ...");
        match result {
            Repaired::Sentinel { parse_error, raw_content } => {
                assert!(!parse_error.is_empty());
                assert!(raw_content.contains("the answer is"));
            }
            Repaired::Parsed(_) => panic!("expected sentinel"),
        }
    }

    #[test]
    fn test_sentinel_on_truncated_json() {
        let result = parse_model_json(r#"{"summary": "cut off here"#);
        assert!(result.is_sentinel());
    }

    #[test]
    fn test_clean_summary_passthrough() {
        assert_eq!(clean_summary_response("  All good.  "), "All good.");
    }

    #[test]
    fn test_clean_summary_unwraps_fenced_json() {
        let raw = "```json\n{\"summary\": \"Two critical bugs.\", \"action_items\": [\"fix save\"]}\n```";
        let cleaned = clean_summary_response(raw);
        assert!(cleaned.contains("Two critical bugs."));
        assert!(cleaned.contains("• fix save"));
    }

    #[test]
    fn test_clean_summary_extracts_summary_key() {
        let raw = r#"{"summary": "Only this."}"#;
        assert_eq!(clean_summary_response(raw), "Only this.");
    }
}
