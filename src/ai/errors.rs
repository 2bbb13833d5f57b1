//! AI service error types.
//!
//! All errors implement `std::error::Error` via `thiserror`. Structured logging
//! is the caller's responsibility. These types carry the context needed to build
//! meaningful log entries.

use thiserror::Error;

/// Lowercase fragments that mark an SDK rejection message as an auth failure.
const AUTH_MARKERS: &[&str] = &["auth", "unauthorized", "forbidden"];

/// Status codes recognized in a rejection message only as whole tokens.
const AUTH_STATUS_TOKENS: &[&str] = &["401", "403"];

/// Errors raised by the request entry point and configuration loading.
#[derive(Debug, Error)]
pub enum AiError {
    /// The SDK never became ready within the readiness budget.
    #[error("AI service unavailable after waiting {timeout_ms}ms")]
    ServiceUnavailable { timeout_ms: u64 },

    /// Any non-auth failure reported by the SDK chat call.
    #[error("AI request failed: {0}")]
    Transport(#[from] SdkError),

    /// Configuration loading or validation error.
    #[error("config error: {reason}")]
    Config { reason: String },
}

/// Failures reported by the external chat SDK.
#[derive(Debug, Clone, Error)]
pub enum SdkError {
    /// Non-2xx HTTP response from the SDK endpoint.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The endpoint could not be reached.
    #[error("connection failed to {endpoint}: {reason}")]
    Connection { endpoint: String, reason: String },

    /// The SDK rejected the call with its own message.
    #[error("{message}")]
    Rejected { message: String },
}

impl SdkError {
    /// Whether this failure looks like an authentication/authorization problem.
    ///
    /// HTTP failures are decided by status alone. Rejections are matched on
    /// their message, with bare status codes only counting as whole tokens.
    /// Connection failures are never auth failures.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            SdkError::Http { status, .. } => matches!(status, 401 | 403),
            SdkError::Connection { .. } => false,
            SdkError::Rejected { message } => {
                let message = message.to_lowercase();
                AUTH_MARKERS.iter().any(|marker| message.contains(marker))
                    || message
                        .split(|c: char| !c.is_ascii_alphanumeric())
                        .any(|token| AUTH_STATUS_TOKENS.contains(&token))
            }
        }
    }
}

/// Failures while loading the SDK into the host.
#[derive(Debug, Error)]
pub enum HostError {
    /// The loader for `url` failed to complete.
    #[error("failed to load SDK from {url}: {reason}")]
    LoadFailed { url: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_failure_from_status() {
        let err = SdkError::Http {
            status: 401,
            body: "nope".into(),
        };
        assert!(err.is_auth_failure());

        let err = SdkError::Http {
            status: 403,
            body: String::new(),
        };
        assert!(err.is_auth_failure());
    }

    #[test]
    fn test_auth_failure_from_message() {
        let err = SdkError::Rejected {
            message: "Authentication required: please sign in".into(),
        };
        assert!(err.is_auth_failure());

        let err = SdkError::Rejected {
            message: "User is not AUTHORIZED for this model".into(),
        };
        assert!(err.is_auth_failure());
    }

    #[test]
    fn test_non_auth_failure() {
        let err = SdkError::Http {
            status: 500,
            body: "internal server error".into(),
        };
        assert!(!err.is_auth_failure());

        let err = SdkError::Connection {
            endpoint: "http://localhost:1/v1".into(),
            reason: "connection refused".into(),
        };
        assert!(!err.is_auth_failure());
    }

    #[test]
    fn test_auth_status_token_in_message() {
        let err = SdkError::Rejected {
            message: "request failed (403)".into(),
        };
        assert!(err.is_auth_failure());

        let err = SdkError::Rejected {
            message: "upstream trace 7f4013 timed out".into(),
        };
        assert!(!err.is_auth_failure());
    }

    #[test]
    fn test_auth_words_outside_message_ignored() {
        let err = SdkError::Connection {
            endpoint: "https://gw.example/oauth-proxy/v1".into(),
            reason: "connection refused".into(),
        };
        assert!(!err.is_auth_failure());

        let err = SdkError::Http {
            status: 500,
            body: "internal error, trace 7f4013, auth backend slow".into(),
        };
        assert!(!err.is_auth_failure());
    }

    #[test]
    fn test_transport_wraps_sdk_error() {
        let err: AiError = SdkError::Rejected {
            message: "rate limited".into(),
        }
        .into();
        assert_eq!(err.to_string(), "AI request failed: rate limited");
    }
}
