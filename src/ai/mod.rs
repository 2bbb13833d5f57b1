//! AI service: the bridge between site features and the external chat SDK.
//!
//! This module handles everything up to a usable text reply:
//! - Loading the SDK once and answering "is it ready?" (`gate`)
//! - Sending prompts and recovering from auth rejections (`service`, `canned`)
//! - Normalizing unpredictable reply shapes to text (`normalizer`)
//! - Pulling embedded JSON out of that text (`extractor`)
//! - Configuration loading from `ai.yaml` (`config`)
//!
//! The SDK is reached through the `SdkHost` / `ChatSdk` traits, so the gate
//! never depends on how the SDK is actually delivered.

pub mod canned;
pub mod config;
pub mod errors;
pub mod extractor;
pub mod gate;
pub mod host;
pub mod normalizer;
pub mod service;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for convenience
pub use config::AiConfig;
pub use errors::{AiError, HostError, SdkError};
pub use extractor::{coerce_array, extract_json, safe_number};
pub use gate::{GatePhase, ReadinessGate, ReadySubscription, ServiceReadinessState};
pub use host::{ChatSdk, HttpSdkHost, SdkHost};
pub use normalizer::extract_text;
pub use service::AiService;
pub use types::{AiReply, ApiOptions, ParsedResponse, RequestOptions};
