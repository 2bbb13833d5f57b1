//! Action error types.

use thiserror::Error;

use crate::ai::AiError;

/// Errors that can occur while running a cached AI action.
#[derive(Debug, Error)]
pub enum ActionError {
    /// Neither the shape parser nor the JSON extractor produced a result.
    #[error("could not read a result for '{cache_key}': {reason}")]
    Parse { cache_key: String, reason: String },

    /// The AI service could not answer.
    #[error(transparent)]
    Service(#[from] AiError),

    /// Cache store read or write failed.
    #[error("cache error: {reason}")]
    Cache { reason: String },

    /// Serialization error.
    #[error("serialization error: {reason}")]
    Serialization { reason: String },
}

impl From<rusqlite::Error> for ActionError {
    fn from(e: rusqlite::Error) -> Self {
        ActionError::Cache {
            reason: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for ActionError {
    fn from(e: serde_json::Error) -> Self {
        ActionError::Serialization {
            reason: e.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for ActionError {
    fn from(e: serde_yaml::Error) -> Self {
        ActionError::Serialization {
            reason: e.to_string(),
        }
    }
}
