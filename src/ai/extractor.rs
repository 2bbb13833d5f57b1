//! Structured extraction: pulls the first JSON value out of free-form text.
//!
//! Models wrap JSON in prose, markdown fences, or both. The extractor does a
//! balanced bracket scan instead of running a full tokenizer:
//!
//! 1. If the trimmed input is itself bracket-delimited, parse it directly.
//! 2. Otherwise scan left to right tracking `{`/`[` against `}`/`]`. Every
//!    time the depth returns to zero, the balanced span is a candidate.
//! 3. The first candidate that parses wins.
//!
//! Bracket characters inside string literals are NOT special-cased, so a
//! value like `"note": "see [1"` can mis-delimit a span. Such spans simply
//! fail to parse and the scan moves on.

use serde_json::Value;

/// Extract the first JSON object or array embedded in `text`.
///
/// Never fails: returns `None` when no balanced span parses.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if is_bracket_delimited(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            return Some(value);
        }
    }

    balanced_spans(trimmed).find_map(|span| serde_json::from_str::<Value>(span).ok())
}

fn is_bracket_delimited(text: &str) -> bool {
    (text.starts_with('{') && text.ends_with('}')) || (text.starts_with('[') && text.ends_with(']'))
}

/// Iterate over every top-level balanced bracket span, left to right.
///
/// Closing brackets seen at depth zero are ignored; an unterminated trailing
/// span yields nothing.
fn balanced_spans(text: &str) -> impl Iterator<Item = &str> {
    let mut depth: usize = 0;
    let mut start: Option<usize> = None;
    let mut spans = Vec::new();

    for (idx, byte) in text.bytes().enumerate() {
        match byte {
            b'{' | b'[' => {
                if depth == 0 {
                    start = Some(idx);
                }
                depth += 1;
            }
            b'}' | b']' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(open) = start.take() {
                        spans.push(&text[open..=idx]);
                    }
                }
            }
            _ => {}
        }
    }

    spans.into_iter()
}

/// Coerce `value` to a finite number, or return `fallback`.
///
/// Numeric strings (surrounding whitespace allowed) and booleans are accepted.
pub fn safe_number(value: &Value, fallback: f64) -> f64 {
    let candidate = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    candidate.filter(|n| n.is_finite()).unwrap_or(fallback)
}

/// Normalize a field that may arrive as a scalar or a list.
///
/// Missing and `null` become an empty list; a non-array value is wrapped.
pub fn coerce_array(value: Option<&Value>) -> Vec<Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(other) => vec![other.clone()],
    }
}

/// `coerce_array` followed by a string view of each element.
///
/// Strings are kept as-is, other scalars are rendered, `null` entries dropped.
pub fn coerce_string_list(value: Option<&Value>) -> Vec<String> {
    coerce_array(value)
        .into_iter()
        .filter_map(|item| match item {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
        .collect()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
