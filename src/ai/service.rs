//! AI service: the request dispatcher in front of the readiness gate.
//!
//! Every request waits for the gate, builds the SDK options from the call's
//! `RequestOptions` and the configured defaults, sends the prompt, and
//! normalizes the reply. Auth rejections are answered with a canned reply
//! instead of an error; every other SDK failure propagates.

use std::sync::Arc;

use uuid::Uuid;

use super::canned::canned_response;
use super::config::{AiConfig, RequestDefaults};
use super::errors::AiError;
use super::gate::{GateSettings, ReadinessGate};
use super::host::SdkHost;
use super::normalizer::extract_text;
use super::types::{AiReply, ApiOptions, ParsedResponse, RequestOptions};

/// Shared AI service. Construct once and hand out behind an `Arc`.
pub struct AiService {
    gate: ReadinessGate,
    defaults: RequestDefaults,
}

impl AiService {
    pub fn new(gate: ReadinessGate, defaults: RequestDefaults) -> Self {
        Self { gate, defaults }
    }

    /// Build the gate and service from configuration.
    pub fn from_config(config: &AiConfig, host: Arc<dyn SdkHost>) -> Self {
        let gate = ReadinessGate::new(host, GateSettings::from_config(&config.sdk));
        Self::new(gate, config.request.clone())
    }

    pub fn gate(&self) -> &ReadinessGate {
        &self.gate
    }

    pub fn defaults(&self) -> &RequestDefaults {
        &self.defaults
    }

    /// Resolve per-call options against the defaults.
    pub fn api_options(&self, options: &RequestOptions) -> ApiOptions {
        ApiOptions {
            model: options
                .model
                .clone()
                .unwrap_or_else(|| self.defaults.model.clone()),
            temperature: options
                .temperature
                .unwrap_or(self.defaults.temperature)
                .clamp(0.0, 2.0),
            stream: options.stream,
            max_tokens: options
                .max_tokens
                .or(self.defaults.max_tokens)
                .filter(|&n| n > 0),
        }
    }

    /// Send `prompt` to the SDK.
    ///
    /// Fails with [`AiError::ServiceUnavailable`] if the SDK is not ready within
    /// the call's timeout, and with [`AiError::Transport`] for any non-auth SDK
    /// failure.
    pub async fn make_ai_request(
        &self,
        prompt: &str,
        options: &RequestOptions,
    ) -> Result<AiReply, AiError> {
        let request_id = Uuid::new_v4();
        let timeout = options.timeout.unwrap_or_else(|| self.defaults.timeout());
        let timeout_ms = timeout.as_millis() as u64;

        if !self.gate.ensure_ready(timeout).await {
            tracing::warn!(request_id = %request_id, timeout_ms, "AI service not ready");
            return Err(AiError::ServiceUnavailable { timeout_ms });
        }
        let sdk = self
            .gate
            .sdk()
            .ok_or(AiError::ServiceUnavailable { timeout_ms })?;

        let api = self.api_options(options);
        tracing::info!(
            request_id = %request_id,
            model = %api.model,
            temperature = api.temperature,
            max_tokens = ?api.max_tokens,
            prompt_chars = prompt.len(),
            raw = options.raw_response,
            "=== AI REQUEST ==="
        );

        match sdk.chat(prompt, &api).await {
            Ok(raw) if options.raw_response => Ok(AiReply::Raw(raw)),
            Ok(raw) => {
                let text = extract_text(Some(&raw));
                tracing::debug!(request_id = %request_id, text_chars = text.len(), "AI reply normalized");
                Ok(AiReply::Parsed(ParsedResponse {
                    text,
                    raw,
                    model: Some(api.model),
                    cached: false,
                }))
            }
            Err(e) if e.is_auth_failure() => {
                tracing::warn!(
                    request_id = %request_id,
                    error = %e,
                    "AI request rejected for auth, serving canned reply"
                );
                Ok(AiReply::Parsed(canned_response(prompt, &api.model)))
            }
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "AI request failed");
                Err(AiError::Transport(e))
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use serde_json::json;

    use crate::ai::errors::SdkError;
    use crate::ai::test_support::{MockHost, MockSdk, Scripted};

    fn service_with(host: MockHost) -> AiService {
        let gate = ReadinessGate::new(
            Arc::new(host),
            GateSettings {
                sdk_url: "https://sdk.example/v2".into(),
                poll_attempts: 4,
                poll_interval: Duration::from_millis(5),
                readiness_ttl: Duration::from_secs(10),
            },
        );
        AiService::new(
            gate,
            RequestDefaults {
                model: "default-model".into(),
                temperature: 0.7,
                max_tokens: None,
                timeout_ms: 500,
            },
        )
    }

    #[test]
    fn test_api_options_defaults_and_overrides() {
        let service = service_with(MockHost::unreachable());

        let api = service.api_options(&RequestOptions::default());
        assert_eq!(api.model, "default-model");
        assert_eq!(api.temperature, 0.7);
        assert_eq!(api.max_tokens, None);

        let api = service.api_options(&RequestOptions {
            model: Some("other".into()),
            temperature: Some(5.0),
            max_tokens: Some(0),
            ..Default::default()
        });
        assert_eq!(api.model, "other");
        assert_eq!(api.temperature, 2.0, "temperature clamped");
        assert_eq!(api.max_tokens, None, "zero cap dropped");
    }

    #[tokio::test]
    async fn test_parsed_reply() {
        let sdk = MockSdk::replying(json!({"choices": [{"message": {"content": "On its way"}}]}));
        let service = service_with(MockHost::new(sdk.clone()));

        let reply = service
            .make_ai_request("where is my cargo", &RequestOptions::default())
            .await
            .unwrap();

        match reply {
            AiReply::Parsed(parsed) => {
                assert_eq!(parsed.text, "On its way");
                assert_eq!(parsed.model.as_deref(), Some("default-model"));
                assert!(!parsed.cached);
            }
            other => panic!("expected parsed reply, got {other:?}"),
        }
        assert_eq!(sdk.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_raw_reply() {
        let body = json!({"message": {"content": "raw"}});
        let service = service_with(MockHost::ready(MockSdk::replying(body.clone())));

        let reply = service
            .make_ai_request(
                "x",
                &RequestOptions {
                    raw_response: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(reply, AiReply::Raw(body));
    }

    #[tokio::test]
    async fn test_max_tokens_forwarded() {
        let sdk = MockSdk::replying(json!("ok"));
        let service = service_with(MockHost::ready(sdk.clone()));

        service
            .make_ai_request(
                "x",
                &RequestOptions {
                    max_tokens: Some(300),
                    temperature: Some(0.1),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let sent = sdk.last_options.lock().unwrap().clone().unwrap();
        assert_eq!(sent.max_tokens, Some(300));
        assert_eq!(sent.temperature, 0.1);
    }

    #[tokio::test]
    async fn test_unavailable_service_errors() {
        let service = service_with(MockHost::unreachable());
        let result = service
            .make_ai_request(
                "x",
                &RequestOptions {
                    timeout: Some(Duration::from_millis(50)),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AiError::ServiceUnavailable { timeout_ms: 50 })));
    }

    #[tokio::test]
    async fn test_auth_failure_returns_canned_reply() {
        let sdk = MockSdk::failing("401 Unauthorized: token expired");
        let service = service_with(MockHost::ready(sdk));

        let reply = service
            .make_ai_request("Optimize my delivery route", &RequestOptions::default())
            .await
            .unwrap();

        match reply {
            AiReply::Parsed(parsed) => {
                assert!(parsed.cached);
                assert!(parsed.text.contains("route optimization"));
            }
            other => panic!("expected canned reply, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let sdk = MockSdk::scripted(vec![Scripted::Fail(SdkError::Http {
            status: 502,
            body: "bad gateway".into(),
        })]);
        let service = service_with(MockHost::ready(sdk));

        let result = service
            .make_ai_request("quote please", &RequestOptions::default())
            .await;
        assert!(matches!(result, Err(AiError::Transport(SdkError::Http { status: 502, .. }))));
    }
}
