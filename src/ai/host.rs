//! SDK host: the environment the chat SDK is loaded into.
//!
//! The readiness gate only ever talks to these two traits:
//! - [`SdkHost`] loads the SDK and exposes it once present.
//! - [`ChatSdk`] is the loaded SDK's single `chat` call.
//!
//! [`HttpSdkHost`] is the production host: "loading" the SDK means probing an
//! OpenAI-compatible endpoint, and the live SDK posts chat completions to it.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client as HttpClient;
use serde_json::{json, Value};

use super::errors::{HostError, SdkError};
use super::types::ApiOptions;

// ─── Constants ───────────────────────────────────────────────────────────────

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Total request timeout for chat calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

// ─── Traits ──────────────────────────────────────────────────────────────────

/// The loaded chat SDK.
pub trait ChatSdk: Send + Sync {
    /// Send one prompt. The reply shape is whatever the SDK produced.
    fn chat<'a>(
        &'a self,
        prompt: &'a str,
        options: &'a ApiOptions,
    ) -> BoxFuture<'a, Result<Value, SdkError>>;
}

/// The execution environment the SDK lives in.
pub trait SdkHost: Send + Sync {
    /// `false` when the SDK can never be loaded here (headless, tests, CLI).
    fn is_supported(&self) -> bool {
        true
    }

    /// Whether a loader for exactly `url` has already been injected.
    fn has_loader(&self, url: &str) -> bool;

    /// Start loading the SDK from `url`. Resolves when the load finishes.
    fn inject_loader<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<(), HostError>>;

    /// The live SDK, if it is currently present.
    fn sdk(&self) -> Option<Arc<dyn ChatSdk>>;
}

// ─── HttpSdkHost ─────────────────────────────────────────────────────────────

/// Host backed by an OpenAI-compatible HTTP endpoint.
pub struct HttpSdkHost {
    http: HttpClient,
    api_key: Option<String>,
    /// URLs whose probe succeeded. A failed probe leaves nothing behind so
    /// the next `initialize()` injects again.
    loaders: Mutex<HashSet<String>>,
    sdk: OnceLock<Arc<HttpChatSdk>>,
}

impl HttpSdkHost {
    pub fn new(api_key: Option<String>) -> Result<Self, HostError> {
        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| HostError::LoadFailed {
                url: String::new(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            api_key: api_key.filter(|k| !k.is_empty()),
            loaders: Mutex::new(HashSet::new()),
            sdk: OnceLock::new(),
        })
    }

    async fn probe(&self, url: &str) -> Result<(), HostError> {
        let models_url = format!("{}/models", url.trim_end_matches('/'));
        let mut request = self.http.get(&models_url).timeout(CONNECT_TIMEOUT);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| HostError::LoadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        // 401/403 still prove the endpoint is there; the chat call reports
        // the auth failure and the dispatcher recovers from it.
        let status = response.status();
        if status.is_success() || status.as_u16() == 401 || status.as_u16() == 403 {
            Ok(())
        } else {
            Err(HostError::LoadFailed {
                url: url.to_string(),
                reason: format!("probe returned HTTP {}", status.as_u16()),
            })
        }
    }
}

impl SdkHost for HttpSdkHost {
    fn has_loader(&self, url: &str) -> bool {
        self.loaders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(url)
    }

    fn inject_loader<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<(), HostError>> {
        async move {
            self.probe(url).await?;

            self.loaders
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(url.to_string());
            let _ = self.sdk.set(Arc::new(HttpChatSdk {
                http: self.http.clone(),
                base_url: url.trim_end_matches('/').to_string(),
                api_key: self.api_key.clone(),
            }));
            tracing::info!(url = %url, "AI SDK endpoint reachable");
            Ok(())
        }
        .boxed()
    }

    fn sdk(&self) -> Option<Arc<dyn ChatSdk>> {
        self.sdk.get().map(|sdk| Arc::clone(sdk) as Arc<dyn ChatSdk>)
    }
}

// ─── HttpChatSdk ─────────────────────────────────────────────────────────────

/// The live SDK handed out by [`HttpSdkHost`].
pub struct HttpChatSdk {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
}

impl HttpChatSdk {
    fn request_body(prompt: &str, options: &ApiOptions) -> Value {
        let mut body = json!({
            "model": options.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": options.temperature,
            "stream": options.stream,
        });
        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        body
    }
}

impl ChatSdk for HttpChatSdk {
    fn chat<'a>(
        &'a self,
        prompt: &'a str,
        options: &'a ApiOptions,
    ) -> BoxFuture<'a, Result<Value, SdkError>> {
        async move {
            let url = format!("{}/chat/completions", self.base_url);
            let mut request = self.http.post(&url).json(&Self::request_body(prompt, options));
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            let response = request.send().await.map_err(|e| SdkError::Connection {
                endpoint: url.clone(),
                reason: e.to_string(),
            })?;

            let status = response.status();
            let body_text = response.text().await.map_err(|e| SdkError::Connection {
                endpoint: url.clone(),
                reason: format!("failed to read response body: {e}"),
            })?;

            if !status.is_success() {
                return Err(SdkError::Http {
                    status: status.as_u16(),
                    body: body_text,
                });
            }

            // Some gateways answer with bare text; keep it as a JSON string.
            Ok(serde_json::from_str(&body_text).unwrap_or(Value::String(body_text)))
        }
        .boxed()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let options = ApiOptions {
            model: "gpt-4o-mini".into(),
            temperature: 0.3,
            stream: false,
            max_tokens: Some(256),
        };
        let body = HttpChatSdk::request_body("plan a route", &options);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "plan a route");
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn test_request_body_without_max_tokens() {
        let options = ApiOptions {
            model: "m".into(),
            temperature: 1.0,
            stream: false,
            max_tokens: None,
        };
        let body = HttpChatSdk::request_body("hi", &options);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_new_host_has_no_sdk() {
        let host = HttpSdkHost::new(Some(String::new())).unwrap();
        assert!(host.api_key.is_none(), "empty key should be dropped");
        assert!(host.sdk().is_none());
        assert!(!host.has_loader("http://localhost:1/v1"));
    }

    /// Serves one canned HTTP status per connection, in order, then 200s.
    async fn scripted_endpoint(statuses: Vec<u16>) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut statuses = statuses.into_iter();
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let status = statuses.next().unwrap_or(200);
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{{}}"
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{addr}/v1")
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails_load() {
        let host = HttpSdkHost::new(None).unwrap();
        let url = "http://127.0.0.1:9/v1";
        let result = host.inject_loader(url).await;
        assert!(result.is_err());
        assert!(!host.has_loader(url), "failed load leaves no loader behind");
        assert!(host.sdk().is_none());
    }

    #[tokio::test]
    async fn test_load_succeeds_once_endpoint_recovers() {
        let url = scripted_endpoint(vec![503]).await;
        let host = HttpSdkHost::new(None).unwrap();

        assert!(host.inject_loader(&url).await.is_err());
        assert!(!host.has_loader(&url));
        assert!(host.sdk().is_none());

        host.inject_loader(&url).await.unwrap();
        assert!(host.has_loader(&url));
        assert!(host.sdk().is_some());
    }

    #[tokio::test]
    async fn test_gate_recovers_after_transient_load_failure() {
        use crate::ai::gate::{GateSettings, ReadinessGate};

        let url = scripted_endpoint(vec![503]).await;
        let gate = ReadinessGate::new(
            Arc::new(HttpSdkHost::new(None).unwrap()),
            GateSettings {
                sdk_url: url,
                poll_attempts: 2,
                poll_interval: Duration::from_millis(5),
                readiness_ttl: Duration::from_secs(10),
            },
        );

        assert!(!gate.initialize().await);
        assert!(gate.initialize().await);
        assert!(gate.ensure_ready(Duration::from_millis(500)).await);
    }
}
