//! Shared types for the AI service.
//!
//! Request options supplied per call, the payload handed to the SDK, and the
//! reply shapes returned to callers.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ─── Request Types ───────────────────────────────────────────────────────────

/// Per-call request options.
///
/// Every `None` falls back to the service defaults from `ai.yaml`.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Sampling temperature, clamped to `0.0..=2.0`.
    pub temperature: Option<f32>,
    /// Optional cap on generated tokens. `Some(0)` is treated as absent.
    pub max_tokens: Option<u32>,
    /// Return the SDK reply untouched instead of a `ParsedResponse`.
    pub raw_response: bool,
    /// Reserved. Forwarded to the SDK but no streaming is consumed.
    pub stream: bool,
    /// Model override.
    pub model: Option<String>,
    /// How long to wait for the SDK to become ready.
    pub timeout: Option<Duration>,
}

/// Options object passed to `ChatSdk::chat`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiOptions {
    pub model: String,
    pub temperature: f32,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

// ─── Response Types ──────────────────────────────────────────────────────────

/// A reply normalized to plain text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedResponse {
    pub text: String,
    /// The untouched SDK reply.
    pub raw: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// `true` when the text is a canned reply rather than a live answer.
    #[serde(default)]
    pub cached: bool,
}

/// What `AiService::make_ai_request` hands back.
#[derive(Debug, Clone, PartialEq)]
pub enum AiReply {
    /// `raw_response` was requested.
    Raw(serde_json::Value),
    Parsed(ParsedResponse),
}

impl AiReply {
    /// The reply as plain text, normalizing raw replies on the way.
    pub fn into_text(self) -> String {
        match self {
            AiReply::Parsed(parsed) => parsed.text,
            AiReply::Raw(serde_json::Value::String(text)) => text,
            AiReply::Raw(other) => super::normalizer::extract_text(Some(&other)),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
