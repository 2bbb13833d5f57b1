//! AI service configuration loading.
//!
//! Reads `ai.yaml` and resolves environment variables. Every field has a
//! default, so an empty file (or no `sdk:` section) is a valid config.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::errors::AiError;

const CONFIG_FILE: &str = "ai.yaml";

// ─── Public Types ────────────────────────────────────────────────────────────

/// Where and how to load the chat SDK.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    /// Loader URL. For the HTTP host this is the API base URL.
    pub url: String,
    pub api_key: Option<String>,
    /// Poll attempts after the loader completes.
    pub poll_attempts: u32,
    pub poll_interval_ms: u64,
    /// How long a positive readiness answer is trusted.
    pub readiness_ttl_secs: u64,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434/v1".to_string(),
            api_key: None,
            poll_attempts: 20,
            poll_interval_ms: 250,
            readiness_ttl_secs: 10,
        }
    }
}

/// Request defaults applied when `RequestOptions` leaves a field unset.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RequestDefaults {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub timeout_ms: u64,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: None,
            timeout_ms: 15_000,
        }
    }
}

impl RequestDefaults {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// SQLite file holding one row per cache key. `None` keeps results in memory.
    pub path: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: Some("~/.freightdesk/ai-cache.db".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Emit one diagnostic record per action run (development builds).
    pub enabled: bool,
}

/// Where the log file goes and how much history is kept.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log directory. `None` means the platform data directory.
    pub dir: Option<String>,
    /// Rotated log files kept next to the live one.
    pub keep: u32,
    /// Default filter directive; `RUST_LOG` overrides it.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            keep: 3,
            filter: "freightdesk=info,warn".to_string(),
        }
    }
}

/// Top-level configuration (mirrors `ai.yaml`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub sdk: SdkConfig,
    pub request: RequestDefaults,
    pub cache: CacheConfig,
    pub diagnostics: DiagnosticsConfig,
    pub logging: LoggingConfig,
    /// Optional YAML/JSON file with canned payloads keyed by cache key.
    pub fallback_path: Option<String>,
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Resolve the config path.
///
/// Checks `FREIGHTDESK_PROJECT_ROOT` first, then searches upward from `start`
/// for `ai.yaml`.
pub fn find_config_path(start: &Path) -> Result<PathBuf, AiError> {
    if let Ok(root) = std::env::var("FREIGHTDESK_PROJECT_ROOT") {
        let candidate = PathBuf::from(&root).join(CONFIG_FILE);
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_FILE);
        if candidate.exists() {
            return Ok(candidate);
        }
        if !dir.pop() {
            break;
        }
    }

    Err(AiError::Config {
        reason: format!("could not find {CONFIG_FILE}"),
    })
}

/// Load and parse the configuration file.
///
/// Performs environment-variable interpolation on `${VAR_NAME}` and
/// `${VAR_NAME:-default}` before parsing.
pub fn load_config(path: &Path) -> Result<AiConfig, AiError> {
    let raw = std::fs::read_to_string(path).map_err(|e| AiError::Config {
        reason: format!("failed to read {}: {e}", path.display()),
    })?;
    parse_config(&raw)
}

/// Parse configuration from a YAML string.
pub fn parse_config(raw: &str) -> Result<AiConfig, AiError> {
    if raw.trim().is_empty() {
        return Ok(AiConfig::default());
    }

    let interpolated = interpolate_env_vars(raw);
    let mut config: AiConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| AiError::Config {
            reason: format!("failed to parse config: {e}"),
        })?;

    config.sdk.api_key = config.sdk.api_key.filter(|k| !k.is_empty());
    config.cache.path = config.cache.path.map(|p| expand_tilde(&p));
    config.fallback_path = config.fallback_path.map(|p| expand_tilde(&p));
    config.logging.dir = config.logging.dir.map(|p| expand_tilde(&p));
    validate(&config)?;
    Ok(config)
}

fn validate(config: &AiConfig) -> Result<(), AiError> {
    if config.sdk.url.trim().is_empty() {
        return Err(AiError::Config {
            reason: "sdk.url must not be empty".into(),
        });
    }
    if config.sdk.poll_attempts == 0 {
        return Err(AiError::Config {
            reason: "sdk.poll_attempts must be at least 1".into(),
        });
    }
    if !(0.0..=2.0).contains(&config.request.temperature) {
        return Err(AiError::Config {
            reason: format!(
                "request.temperature must be within 0-2, got {}",
                config.request.temperature
            ),
        });
    }
    if config.logging.keep == 0 {
        return Err(AiError::Config {
            reason: "logging.keep must be at least 1".into(),
        });
    }
    if config.request.timeout_ms == 0 {
        return Err(AiError::Config {
            reason: "request.timeout_ms must be positive".into(),
        });
    }
    Ok(())
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_expr.push(c);
            }
            result.push_str(&resolve_var_expr(&var_expr));
        } else {
            result.push(ch);
        }
    }

    result
}

fn resolve_var_expr(expr: &str) -> String {
    match expr.split_once(":-") {
        Some((name, default)) => std::env::var(name).unwrap_or_else(|_| default.to_string()),
        None => std::env::var(expr).unwrap_or_default(),
    }
}

/// Expand a leading `~` to the user's home directory.
pub(crate) fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.display());
        }
    }
    path.to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
