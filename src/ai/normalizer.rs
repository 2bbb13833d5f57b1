//! Response normalizer: turns whatever the chat SDK returned into plain text.
//!
//! The SDK's reply shape is not stable. Resolution order, first match wins:
//!
//! 1. a bare JSON string
//! 2. `choices[0].message.content`
//! 3. `message.content`
//! 4. `content`
//! 5. `text`
//!
//! Content arrays keep only `{"type": "text"}` parts, joined with single
//! spaces. Nothing here ever fails: unknown shapes become apology strings.

use serde_json::Value;

/// Returned when the SDK produced nothing at all.
pub const NO_RESPONSE_TEXT: &str =
    "I'm sorry, I did not receive a response from the AI service. Please try again.";

/// Returned when the reply has none of the known shapes.
pub const UNRECOGNIZED_TEXT: &str =
    "I apologize, but I could not process the response from the AI service.";

/// Returned when reading the reply failed part-way.
pub const NORMALIZE_FAILURE_TEXT: &str =
    "Sorry, something went wrong while reading the AI service reply. Please try again.";

/// Convert an arbitrary SDK reply into plain text.
pub fn extract_text(reply: Option<&Value>) -> String {
    let reply = match reply {
        None | Some(Value::Null) => return NO_RESPONSE_TEXT.to_string(),
        Some(reply) => reply,
    };

    match resolve(reply) {
        Ok(Some(text)) => text,
        Ok(None) => {
            tracing::debug!(shape = %shape_of(reply), "unrecognized AI reply shape");
            UNRECOGNIZED_TEXT.to_string()
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to normalize AI reply");
            NORMALIZE_FAILURE_TEXT.to_string()
        }
    }
}

fn resolve(reply: &Value) -> Result<Option<String>, serde_json::Error> {
    if let Value::String(text) = reply {
        return Ok(Some(text.clone()));
    }

    let choice_content = reply
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"));
    if let Some(text) = choice_content.and_then(message_content) {
        return Ok(Some(text));
    }

    let message_content_field = reply.get("message").and_then(|m| m.get("content"));
    if let Some(text) = message_content_field.and_then(message_content) {
        return Ok(Some(text));
    }

    for field in ["content", "text"] {
        if let Some(value) = reply.get(field).filter(|v| is_present(v)) {
            return stringify(value).map(Some);
        }
    }

    Ok(None)
}

/// `message.content` handling: strings as-is, arrays reduced to their text parts.
fn message_content(content: &Value) -> Option<String> {
    match content {
        Value::String(text) => Some(text.clone()),
        Value::Array(parts) => {
            let joined = parts
                .iter()
                .filter(|part| part.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(" ");
            Some(joined.trim().to_string())
        }
        _ => None,
    }
}

/// Mirrors a loose truthiness check: empty strings, `false`, `0` and `null` do not count.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn stringify(value: &Value) -> Result<String, serde_json::Error> {
    match value {
        Value::String(text) => Ok(text.clone()),
        other => serde_json::to_string(other),
    }
}

fn shape_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_reply() {
        assert!(extract_text(None).contains("did not receive a response"));
        assert!(extract_text(Some(&Value::Null)).contains("did not receive a response"));
    }

    #[test]
    fn test_plain_string() {
        assert_eq!(extract_text(Some(&json!("hello"))), "hello");
    }

    #[test]
    fn test_choices_string_content() {
        let reply = json!({"choices": [{"message": {"content": "from choices"}}]});
        assert_eq!(extract_text(Some(&reply)), "from choices");
    }

    #[test]
    fn test_choices_content_parts_joined() {
        let reply = json!({"choices": [{"message": {"content": [
            {"type": "text", "text": "A"},
            {"type": "text", "text": "B"}
        ]}}]});
        assert_eq!(extract_text(Some(&reply)), "A B");
    }

    #[test]
    fn test_non_text_parts_dropped() {
        let reply = json!({"message": {"content": [
            {"type": "image", "url": "x.png"},
            {"type": "text", "text": " only this "}
        ]}});
        assert_eq!(extract_text(Some(&reply)), "only this");
    }

    #[test]
    fn test_message_content() {
        let reply = json!({"message": {"content": "plain"}});
        assert_eq!(extract_text(Some(&reply)), "plain");
    }

    #[test]
    fn test_choices_win_over_message() {
        let reply = json!({
            "choices": [{"message": {"content": "first"}}],
            "message": {"content": "second"}
        });
        assert_eq!(extract_text(Some(&reply)), "first");
    }

    #[test]
    fn test_content_field_stringified() {
        assert_eq!(extract_text(Some(&json!({"content": "direct"}))), "direct");
        assert_eq!(extract_text(Some(&json!({"content": 42}))), "42");
        assert_eq!(
            extract_text(Some(&json!({"content": {"eta": 3}}))),
            r#"{"eta":3}"#
        );
    }

    #[test]
    fn test_text_field() {
        assert_eq!(extract_text(Some(&json!({"text": "from text"}))), "from text");
    }

    #[test]
    fn test_empty_content_falls_through_to_text() {
        let reply = json!({"content": "", "text": "fallback"});
        assert_eq!(extract_text(Some(&reply)), "fallback");
    }

    #[test]
    fn test_unrecognized_shape() {
        assert!(extract_text(Some(&json!({"foo": "bar"}))).contains("apologize"));
        assert!(extract_text(Some(&json!([1, 2, 3]))).contains("apologize"));
        assert!(extract_text(Some(&json!({"choices": []}))).contains("apologize"));
    }

    #[test]
    fn test_apology_strings_are_distinct() {
        assert_ne!(NO_RESPONSE_TEXT, UNRECOGNIZED_TEXT);
        assert_ne!(NO_RESPONSE_TEXT, NORMALIZE_FAILURE_TEXT);
        assert_ne!(UNRECOGNIZED_TEXT, NORMALIZE_FAILURE_TEXT);
    }
}
