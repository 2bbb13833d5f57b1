//! Static fallback table: canned payloads keyed by cache key.
//!
//! Consulted only when an action fails. The table is authored outside this
//! crate (a YAML or JSON file, or built in code) and never written to here.

use std::collections::HashMap;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::errors::ActionError;

#[derive(Debug, Clone, Default)]
pub struct FallbackTable {
    entries: HashMap<String, Value>,
}

impl FallbackTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, key: impl Into<String>, payload: Value) -> Self {
        self.insert(key, payload);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, payload: Value) {
        self.entries.insert(key.into(), payload);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The payload for `key` decoded as `T`.
    ///
    /// A payload that does not fit `T` counts as absent.
    pub fn resolve<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let payload = self.entries.get(key)?;
        match serde_json::from_value(payload.clone()) {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::warn!(cache_key = key, error = %e, "fallback payload does not match result type");
                None
            }
        }
    }

    /// Parse a table from YAML (JSON is accepted too): a mapping of cache key
    /// to payload.
    pub fn from_yaml_str(raw: &str) -> Result<Self, ActionError> {
        if raw.trim().is_empty() {
            return Ok(Self::new());
        }
        let entries: HashMap<String, Value> = serde_yaml::from_str(raw)?;
        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> Result<Self, ActionError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ActionError::Serialization {
            reason: format!("failed to read fallback table {}: {e}", path.display()),
        })?;
        let table = Self::from_yaml_str(&raw)?;
        tracing::info!(path = %path.display(), entries = table.len(), "loaded fallback table");
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Estimate {
        total: f64,
        currency: String,
    }

    #[test]
    fn test_resolve_typed_payload() {
        let table = FallbackTable::new()
            .with_entry("freight-calculator", json!({"total": 850.0, "currency": "EUR"}));
        assert_eq!(
            table.resolve::<Estimate>("freight-calculator"),
            Some(Estimate {
                total: 850.0,
                currency: "EUR".into()
            })
        );
        assert_eq!(table.resolve::<Estimate>("missing"), None);
    }

    #[test]
    fn test_mismatched_payload_is_absent() {
        let table = FallbackTable::new().with_entry("k", json!(["not", "an", "estimate"]));
        assert_eq!(table.resolve::<Estimate>("k"), None);
        assert!(table.get("k").is_some());
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
            freight-calculator:
              total: 120.5
              currency: USD
            chatbot-tester: {"reply": "hi"}
        "#;
        let table = FallbackTable::from_yaml_str(yaml).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("chatbot-tester"), Some(&json!({"reply": "hi"})));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fallbacks.json");
        std::fs::write(&path, r#"{"route-optimizer": {"stops": ["A", "B"]}}"#).unwrap();
        let table = FallbackTable::load(&path).unwrap();
        assert_eq!(table.len(), 1);
        assert!(FallbackTable::load(&dir.path().join("absent.yaml")).is_err());
    }
}
