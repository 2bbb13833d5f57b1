//! Cached action orchestrator.
//!
//! A `CachedAction<T>` runs one AI-backed feature end to end:
//!
//! 1. Hydrate the last stored result on construction.
//! 2. On `run()`, wait for the gate, build the prompt and send it. A raw
//!    reply that already has the result shape is used directly; anything
//!    else is reduced to text.
//! 3. Parse a `T` with the action's shape parser, then with the generic JSON
//!    extractor.
//! 4. Persist a success. On any failure, substitute the fallback table entry
//!    for the cache key if one exists, otherwise surface the error.
//!
//! Concurrent `run()` calls on the same instance are not serialized; callers
//! gate their trigger on `state().loading`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;

use serde_json::Value;

use crate::ai::{extract_json, AiError, AiReply, AiService, RequestOptions};

use super::cache::{load_entry, save_entry, CacheEntry, CacheStore};
use super::diagnostics::{DiagnosticRecord, DiagnosticsSink};
use super::errors::ActionError;
use super::fallback::FallbackTable;

/// Builds the prompt fresh for every run.
pub type PromptBuilder = Box<dyn Fn() -> String + Send + Sync>;

/// Domain-specific reader for reply text. `None` means "not my shape".
pub type ShapeParser<T> = Box<dyn Fn(&str) -> Option<T> + Send + Sync>;

/// What one action asks for.
pub struct ActionSpec<T> {
    pub cache_key: String,
    pub prompt: PromptBuilder,
    pub parser: Option<ShapeParser<T>>,
    pub options: RequestOptions,
}

impl<T> ActionSpec<T> {
    pub fn new<F>(cache_key: impl Into<String>, prompt: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Self {
            cache_key: cache_key.into(),
            prompt: Box::new(prompt),
            parser: None,
            options: RequestOptions::default(),
        }
    }

    pub fn with_parser<P>(mut self, parser: P) -> Self
    where
        P: Fn(&str) -> Option<T> + Send + Sync + 'static,
    {
        self.parser = Some(Box::new(parser));
        self
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }
}

/// Shared collaborators for every action.
#[derive(Clone)]
pub struct ActionDeps {
    pub service: Arc<AiService>,
    pub cache: Arc<dyn CacheStore>,
    pub fallbacks: Arc<FallbackTable>,
    pub diagnostics: Option<Arc<dyn DiagnosticsSink>>,
}

/// Snapshot of an action's visible state.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
    /// `data` came from the fallback table, not a live reply.
    pub from_fallback: bool,
}

impl<T> Default for ActionState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
            from_fallback: false,
        }
    }
}

pub struct CachedAction<T> {
    spec: ActionSpec<T>,
    deps: ActionDeps,
    state: Mutex<ActionState<T>>,
}

impl<T> CachedAction<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + 'static,
{
    /// Create the action and hydrate any stored result for its cache key.
    ///
    /// An unreadable stored entry is logged and ignored.
    pub fn new(spec: ActionSpec<T>, deps: ActionDeps) -> Self {
        let mut state = ActionState::default();
        match load_entry::<T>(deps.cache.as_ref(), &spec.cache_key) {
            Ok(Some(entry)) => {
                tracing::debug!(
                    cache_key = %spec.cache_key,
                    from_fallback = entry.from_fallback,
                    saved_at = %entry.saved_at,
                    "hydrated cached result"
                );
                state.data = Some(entry.data);
                state.from_fallback = entry.from_fallback;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(cache_key = %spec.cache_key, error = %e, "discarding unreadable cached result");
            }
        }

        Self {
            spec,
            deps,
            state: Mutex::new(state),
        }
    }

    pub fn cache_key(&self) -> &str {
        &self.spec.cache_key
    }

    pub fn state(&self) -> ActionState<T> {
        self.lock_state().clone()
    }

    /// Run the action once and return the resulting state.
    pub async fn run(&self) -> ActionState<T> {
        {
            let mut state = self.lock_state();
            state.loading = true;
            state.error = None;
            state.from_fallback = false;
        }

        let key = &self.spec.cache_key;
        let (data, from_fallback, error) = match self.resolve().await {
            Ok(data) => {
                self.persist(&CacheEntry::live(data.clone()));
                (Some(data), false, None)
            }
            Err(err) => match self.deps.fallbacks.resolve::<T>(key) {
                Some(data) => {
                    tracing::info!(cache_key = %key, error = %err, "serving fallback result");
                    self.persist(&CacheEntry::fallback(data.clone()));
                    (Some(data), true, None)
                }
                None => {
                    tracing::warn!(cache_key = %key, error = %err, "action failed with no fallback");
                    (None, false, Some(err.to_string()))
                }
            },
        };

        if let Some(sink) = &self.deps.diagnostics {
            sink.record(DiagnosticRecord {
                key: key.clone(),
                from_fallback,
                timestamp: Utc::now(),
            });
        }

        let mut state = self.lock_state();
        if data.is_some() {
            state.data = data;
        }
        state.from_fallback = from_fallback;
        state.error = error;
        state.loading = false;
        state.clone()
    }

    async fn resolve(&self) -> Result<T, ActionError> {
        let service = &self.deps.service;
        let timeout = self
            .spec
            .options
            .timeout
            .unwrap_or_else(|| service.defaults().timeout());

        if !service.gate().ensure_ready(timeout).await {
            return Err(AiError::ServiceUnavailable {
                timeout_ms: timeout.as_millis() as u64,
            }
            .into());
        }

        let prompt = (self.spec.prompt)();
        let reply = service.make_ai_request(&prompt, &self.spec.options).await?;
        if let AiReply::Raw(value) = &reply {
            if let Some(data) = self.parse_structured(value) {
                return Ok(data);
            }
        }
        let text = reply.into_text();
        self.parse(&text)
    }

    /// A raw reply that already carries the result shape is used as is.
    fn parse_structured(&self, value: &Value) -> Option<T> {
        if !(value.is_object() || value.is_array()) {
            return None;
        }
        if let Ok(data) = serde_json::from_value::<T>(value.clone()) {
            return Some(data);
        }
        let parser = self.spec.parser.as_ref()?;
        parser(&value.to_string())
    }

    fn parse(&self, text: &str) -> Result<T, ActionError> {
        if let Some(parser) = &self.spec.parser {
            if let Some(data) = parser(text) {
                return Ok(data);
            }
        }

        let reason = match extract_json(text) {
            Some(value) => match serde_json::from_value::<T>(value) {
                Ok(data) => return Ok(data),
                Err(e) => format!("JSON in reply does not match the expected shape: {e}"),
            },
            None => "no JSON found in reply".to_string(),
        };

        Err(ActionError::Parse {
            cache_key: self.spec.cache_key.clone(),
            reason,
        })
    }

    fn persist(&self, entry: &CacheEntry<T>) {
        if let Err(e) = save_entry(self.deps.cache.as_ref(), &self.spec.cache_key, entry) {
            tracing::warn!(cache_key = %self.spec.cache_key, error = %e, "failed to persist action result");
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ActionState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
