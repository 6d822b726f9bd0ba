//! Response normalisation: fenced code blocks and best-effort JSON parsing.
//!
//! Models are told to return bare JSON, and sometimes wrap it in
//! ` ```json ... ``` ` fences anyway. Normalisation is deliberately a
//! strict two-stage rule rather than a pile of heuristics:
//!
//! 1. If the entire response is one fenced code block, unwrap the body.
//! 2. If the (unwrapped) text parses as a JSON object or array, return it
//!    structured; otherwise return the raw text unchanged.
//!
//! A parse failure is not an error. Extraction success does not depend on
//! the model producing valid JSON.

use crate::output::Extraction;
use once_cell::sync::Lazy;
use regex::Regex;

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_+-]*[ \t]*\n(.*?)\n?```\s*$").unwrap());

/// Normalise raw provider content into an [`Extraction`].
pub fn normalize(content: &str) -> Extraction {
    let trimmed = content.trim();
    let candidate = unwrap_fence(trimmed).unwrap_or(trimmed);

    match serde_json::from_str::<serde_json::Value>(candidate) {
        Ok(value) if value.is_object() || value.is_array() => Extraction::Structured(value),
        _ => Extraction::Raw(content.to_string()),
    }
}

/// The fenced body, when the whole input is a single fenced block.
fn unwrap_fence(input: &str) -> Option<&str> {
    RE_OUTER_FENCE
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fenced_json_parses() {
        let result = normalize("```json\n{\"a\":1}\n```");
        assert_eq!(result, Extraction::Structured(json!({"a": 1})));
    }

    #[test]
    fn fence_without_language_tag_parses() {
        let result = normalize("```\n{\"distance\": \"5 km\"}\n```");
        assert_eq!(result, Extraction::Structured(json!({"distance": "5 km"})));
    }

    #[test]
    fn bare_json_object_parses() {
        let result = normalize("  {\"pace\": \"5:30 /km\"}  ");
        assert_eq!(result, Extraction::Structured(json!({"pace": "5:30 /km"})));
    }

    #[test]
    fn json_array_is_structured() {
        let result = normalize("[1, 2, 3]");
        assert_eq!(result, Extraction::Structured(json!([1, 2, 3])));
    }

    #[test]
    fn non_json_passes_through_unchanged() {
        let result = normalize("not json");
        assert_eq!(result, Extraction::Raw("not json".to_string()));
    }

    #[test]
    fn json_scalar_is_not_structured() {
        // the schema asks for an object; a bare number is model noise
        let result = normalize("42");
        assert_eq!(result, Extraction::Raw("42".to_string()));
    }

    #[test]
    fn fenced_non_json_passes_through_unchanged() {
        let input = "```\nno data visible\n```";
        let result = normalize(input);
        assert_eq!(result, Extraction::Raw(input.to_string()));
    }

    #[test]
    fn fence_must_wrap_entire_input() {
        // fences mid-text are content, not wrapping
        let input = "prefix\n```json\n{\"a\":1}\n```";
        let result = normalize(input);
        assert_eq!(result, Extraction::Raw(input.to_string()));
    }

    #[test]
    fn fenced_body_without_trailing_newline_unwraps() {
        assert_eq!(unwrap_fence("```json\n{\"a\":1}```"), Some("{\"a\":1}"));
    }

    #[test]
    fn nested_objects_survive() {
        let result = normalize(r#"{"activity_name":"Morning Run","splits":{"1":"5:10"}}"#);
        let value = result.as_structured().expect("structured");
        assert_eq!(value["splits"]["1"], "5:10");
    }
}
