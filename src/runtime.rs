//! Process-wide wiring: one `AiService` plus the action collaborators.
//!
//! Construct an `AiRuntime` once at startup and hand `deps()` (or `action()`)
//! to each feature instead of reaching for a global.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use crate::actions::{
    ActionDeps, ActionSpec, CacheStore, CachedAction, DiagnosticsSink, FallbackTable,
    MemoryCacheStore, SqliteCacheStore, TracingDiagnostics,
};
use crate::ai::config::{expand_tilde, find_config_path, load_config};
use crate::ai::{AiConfig, AiService, HttpSdkHost, SdkHost};

pub struct AiRuntime {
    deps: ActionDeps,
}

impl AiRuntime {
    /// Process entry point: load `ai.yaml`, start file logging as its
    /// `logging` section says, then build the runtime.
    pub fn bootstrap(start: &Path) -> anyhow::Result<Self> {
        let config = resolve_config(start)?;
        crate::init_tracing(&config.logging)?;
        Self::from_config(&config)
    }

    /// Find and load `ai.yaml` starting at `start`, then build the runtime.
    ///
    /// A missing config file means defaults.
    pub fn load(start: &Path) -> anyhow::Result<Self> {
        Self::from_config(&resolve_config(start)?)
    }

    /// Build the runtime against the HTTP SDK host.
    pub fn from_config(config: &AiConfig) -> anyhow::Result<Self> {
        let host = HttpSdkHost::new(config.sdk.api_key.clone())
            .context("failed to build SDK host")?;
        Self::with_host(config, Arc::new(host))
    }

    pub fn with_host(config: &AiConfig, host: Arc<dyn SdkHost>) -> anyhow::Result<Self> {
        let service = Arc::new(AiService::from_config(config, host));

        let cache: Arc<dyn CacheStore> = match &config.cache.path {
            Some(path) => {
                let path = expand_tilde(path);
                if let Some(parent) = Path::new(&path).parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent).with_context(|| {
                            format!("failed to create cache directory {}", parent.display())
                        })?;
                    }
                }
                let store = SqliteCacheStore::open(&path)
                    .with_context(|| format!("failed to open cache database {path}"))?;
                tracing::info!(path = %path, "AI result cache opened");
                Arc::new(store)
            }
            None => Arc::new(MemoryCacheStore::new()),
        };

        let fallbacks = match &config.fallback_path {
            Some(path) => FallbackTable::load(Path::new(&expand_tilde(path)))?,
            None => FallbackTable::new(),
        };

        let diagnostics = config
            .diagnostics
            .enabled
            .then(|| Arc::new(TracingDiagnostics) as Arc<dyn DiagnosticsSink>);

        tracing::info!(
            sdk_url = %config.sdk.url,
            model = %config.request.model,
            fallbacks = fallbacks.len(),
            diagnostics = diagnostics.is_some(),
            "AI runtime ready"
        );

        Ok(Self {
            deps: ActionDeps {
                service,
                cache,
                fallbacks: Arc::new(fallbacks),
                diagnostics,
            },
        })
    }

    pub fn service(&self) -> &Arc<AiService> {
        &self.deps.service
    }

    pub fn deps(&self) -> ActionDeps {
        self.deps.clone()
    }

    pub fn action<T>(&self, spec: ActionSpec<T>) -> CachedAction<T>
    where
        T: serde::Serialize + serde::de::DeserializeOwned + Clone + Send + 'static,
    {
        CachedAction::new(spec, self.deps())
    }
}

fn resolve_config(start: &Path) -> anyhow::Result<AiConfig> {
    match find_config_path(start) {
        Ok(path) => {
            let config = load_config(&path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!(path = %path.display(), "loaded AI config");
            Ok(config)
        }
        Err(e) => {
            tracing::info!(reason = %e, "no AI config found, using defaults");
            Ok(AiConfig::default())
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
