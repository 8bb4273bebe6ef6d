//! Response extraction: recovers a competency list (or a JSON object) from
//! free-form text returned by a generation backend.
//!
//! Recovery is an ordered list of strategies, each a pure `&str -> Option<Value>`.
//! The first strategy that yields a value wins; when none does, the caller
//! still gets a well-formed result (an empty list or a `{"summary": raw}` wrapper).

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Value};

type Strategy = fn(&str) -> Option<Value>;

/// Flat `[ ... ]` spans. Competency arrays are never nested, so no bracket
/// balancing is attempted.
static ARRAY_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]").expect("array span pattern is valid"));

const LIST_STRATEGIES: &[(&str, Strategy)] = &[
    ("strict", parse_whole_array),
    ("scan", scan_string_arrays),
];

const OBJECT_STRATEGIES: &[(&str, Strategy)] = &[
    ("strict", parse_whole_object),
    ("scan_object", scan_objects),
    ("scan_array", scan_any_array),
];

/// Extracts a competency list from a raw backend response. Never fails:
/// unrecoverable text yields an empty list.
pub fn extract(raw: &str) -> Vec<String> {
    let text = raw.trim();
    match run_strategies(LIST_STRATEGIES, text) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        _ => {
            tracing::debug!(len = text.len(), "no competency array recovered from response");
            Vec::new()
        }
    }
}

/// Extracts a JSON object (or, failing that, an array) from a raw response.
/// Falls back to `{"summary": <trimmed raw>}` so callers always get JSON.
pub fn extract_object(raw: &str) -> Value {
    let text = raw.trim();
    run_strategies(OBJECT_STRATEGIES, text).unwrap_or_else(|| json!({ "summary": text }))
}

fn run_strategies(strategies: &[(&str, Strategy)], text: &str) -> Option<Value> {
    strategies.iter().find_map(|(name, strategy)| {
        let value = strategy(text)?;
        tracing::trace!(strategy = name, "response recovered");
        Some(value)
    })
}

fn parse_whole(text: &str) -> Option<Value> {
    serde_json::from_str(text)
        .or_else(|_| serde_json::from_str(strip_json_fences(text)))
        .ok()
}

fn parse_whole_array(text: &str) -> Option<Value> {
    parse_whole(text).filter(Value::is_array)
}

fn parse_whole_object(text: &str) -> Option<Value> {
    parse_whole(text).filter(Value::is_object)
}

/// First bracketed span that parses as an array whose items are all strings.
fn scan_string_arrays(text: &str) -> Option<Value> {
    ARRAY_SPAN
        .find_iter(text)
        .filter_map(|m| serde_json::from_str::<Value>(m.as_str()).ok())
        .find(|v| v.as_array().is_some_and(|items| items.iter().all(Value::is_string)))
}

fn scan_any_array(text: &str) -> Option<Value> {
    ARRAY_SPAN
        .find_iter(text)
        .filter_map(|m| serde_json::from_str::<Value>(m.as_str()).ok())
        .find(Value::is_array)
}

/// First balanced `{ ... }` span that parses as a JSON object.
fn scan_objects(text: &str) -> Option<Value> {
    let mut offset = 0;
    while let Some(rel) = text[offset..].find('{') {
        let start = offset + rel;
        match balanced_end(&text[start..]) {
            Some(len) => {
                let span = &text[start..start + len];
                if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(span) {
                    return Some(value);
                }
                offset = start + len;
            }
            None => offset = start + 1,
        }
    }
    None
}

/// Byte length of the span starting at an opening brace up to its matching
/// closing brace, if the braces balance. Braces inside JSON string literals
/// (escapes included) do not count.
fn balanced_end(span: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in span.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + ch.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

/// Strips ```json ... ``` or ``` ... ``` code fences from backend output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(stripped) = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
    else {
        return text;
    };
    let stripped = stripped.trim_start();
    stripped
        .strip_suffix("```")
        .map(str::trim)
        .unwrap_or(stripped)
}
