//! Best-effort JSON extraction from LLM replies.
//!
//! Models asked for "JSON only" still wrap replies in code fences or prose.
//! Fallback tiers, in order: direct parse, fence-stripped parse, outermost
//! `{...}` span, outermost `[...]` span. Returns `None` rather than erroring
//! so callers decide whether an unparsable reply is fatal.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static OBJECT_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());
static ARRAY_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\[.*\]").unwrap());

/// Extract a JSON value from free text.
pub fn extract_json(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }

    let cleaned = text.replace("```json", "").replace("```", "");
    if let Ok(value) = serde_json::from_str(cleaned.trim()) {
        return Some(value);
    }

    // Regex matching is greedy, so these capture the outermost bracket pair.
    if let Some(m) = OBJECT_SPAN.find(text)
        && let Ok(value) = serde_json::from_str(m.as_str())
    {
        return Some(value);
    }
    if let Some(m) = ARRAY_SPAN.find(text)
        && let Ok(value) = serde_json::from_str(m.as_str())
    {
        return Some(value);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_parse() {
        let v = extract_json(r#"{"a.pdf": "citation"}"#).unwrap();
        assert_eq!(v["a.pdf"], "citation");
    }

    #[test]
    fn fenced_block() {
        let v = extract_json("```json\n{\"a.pdf\": null}\n```").unwrap();
        assert!(v["a.pdf"].is_null());
    }

    #[test]
    fn object_embedded_in_prose() {
        let v = extract_json("Here is the mapping you asked for:\n{\"a.pdf\": \"cite\"}\nLet me know!")
            .unwrap();
        assert_eq!(v["a.pdf"], "cite");
    }

    #[test]
    fn array_embedded_in_prose() {
        let v = extract_json("Results: [1, 2, 3] (three items)").unwrap();
        assert_eq!(v.as_array().unwrap().len(), 3);
    }

    #[test]
    fn multiline_object_with_fences_and_prose() {
        let text = "Sure!\n```json\n{\n  \"x.pdf\": \"A, B. Title[J]. 2020.\"\n}\n```\nDone.";
        let v = extract_json(text).unwrap();
        assert_eq!(v["x.pdf"], "A, B. Title[J]. 2020.");
    }

    #[test]
    fn unparsable_is_none() {
        assert!(extract_json("").is_none());
        assert!(extract_json("no json here").is_none());
        assert!(extract_json("{broken: ").is_none());
    }
}
