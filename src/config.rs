use crate::cache::backend::BackendKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const CONFIG_FILENAME: &str = ".translate-proxy.json";

/// Cache configuration with serde defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    #[serde(default = "default_backend")]
    pub backend: BackendKind,

    #[serde(default = "default_cache_path")]
    pub path: PathBuf,

    /// Number of matching re-translations required before a cache entry is
    /// served without calling the external translator.
    #[serde(default = "default_confirm_threshold")]
    pub confirm_threshold: u32,

    #[serde(default = "default_true")]
    pub cleanup_enabled: bool,

    /// Entries unused for longer than this are eligible for cleanup.
    #[serde(default = "default_ttl_days")]
    pub ttl_days: u32,
}

impl CacheConfig {
    pub fn max_age_secs(&self) -> i64 {
        i64::from(self.ttl_days) * 86_400
    }
}

fn default_backend() -> BackendKind {
    BackendKind::Text
}
fn default_cache_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".translate-proxy")
        .join("cache.jsonl")
}
fn default_confirm_threshold() -> u32 {
    5
}
fn default_ttl_days() -> u32 {
    30
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_cache_path(),
            confirm_threshold: default_confirm_threshold(),
            cleanup_enabled: true,
            ttl_days: default_ttl_days(),
        }
    }
}

/// Resilience configuration for retry, timeout, and circuit breaker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResilienceConfig {
    /// Request timeout in seconds (default: 30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connection timeout in seconds (default: 5).
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Maximum retry attempts for transient failures (default: 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds (default: 200).
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Circuit breaker failure threshold before opening (default: 5).
    #[serde(default = "default_circuit_breaker_threshold")]
    pub circuit_breaker_threshold: u32,

    /// Circuit breaker reset timeout in seconds (default: 60).
    #[serde(default = "default_circuit_breaker_reset_secs")]
    pub circuit_breaker_reset_secs: u64,
}

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 200;
const DEFAULT_CIRCUIT_BREAKER_THRESHOLD: u32 = 5;
const DEFAULT_CIRCUIT_BREAKER_RESET_SECS: u64 = 60;

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}
fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}
fn default_retry_base_delay_ms() -> u64 {
    DEFAULT_RETRY_BASE_DELAY_MS
}
fn default_circuit_breaker_threshold() -> u32 {
    DEFAULT_CIRCUIT_BREAKER_THRESHOLD
}
fn default_circuit_breaker_reset_secs() -> u64 {
    DEFAULT_CIRCUIT_BREAKER_RESET_SECS
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            circuit_breaker_threshold: DEFAULT_CIRCUIT_BREAKER_THRESHOLD,
            circuit_breaker_reset_secs: DEFAULT_CIRCUIT_BREAKER_RESET_SECS,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Where the daemon listens for `POST /translate` and `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// The external OpenAI-compatible chat-completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslatorConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the environment variable holding the API key. The key itself
    /// is never read from the config file or written to logs.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl TranslatorConfig {
    /// Read the API key from the environment. Returns `None` if the
    /// variable is unset, leaving the caller to decide how to react.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub resilience: ResilienceConfig,

    #[serde(default)]
    pub translator: TranslatorConfig,
}

/// Load configuration from file, applying environment variable overrides.
pub fn load_config() -> Config {
    let mut config: Config = find_config_file()
        .and_then(|path| {
            let content = std::fs::read_to_string(&path).ok()?;
            match serde_json::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "config parse error, falling back to defaults");
                    None
                }
            }
        })
        .unwrap_or_default();

    if let Ok(val) = std::env::var("TRANSLATE_PROXY_BIND_ADDR") {
        config.server.bind_addr = val;
    }
    if let Ok(val) = std::env::var("TRANSLATE_PROXY_CACHE_PATH") {
        config.cache.path = PathBuf::from(val);
    }
    if let Ok(val) = std::env::var("TRANSLATE_PROXY_CONFIRM_THRESHOLD") {
        if let Ok(threshold) = val.parse::<u32>() {
            config.cache.confirm_threshold = threshold;
        }
    }
    if let Ok(val) = std::env::var("TRANSLATE_PROXY_TTL_DAYS") {
        if let Ok(days) = val.parse::<u32>() {
            config.cache.ttl_days = days;
        }
    }
    if let Ok(val) = std::env::var("TRANSLATE_PROXY_BASE_URL") {
        config.translator.base_url = val;
    }
    if let Ok(val) = std::env::var("TRANSLATE_PROXY_MODEL") {
        config.translator.model = val;
    }

    config
}

/// Search for a config file in standard locations: cwd, home, XDG config dir.
fn find_config_file() -> Option<PathBuf> {
    let search_paths = [
        std::env::current_dir().ok(),
        dirs::home_dir(),
        dirs::config_dir().map(|p| p.join("translate-proxy")),
    ];

    for base in search_paths.into_iter().flatten() {
        let config_path = base.join(CONFIG_FILENAME);
        if config_path.exists() {
            return Some(config_path);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = Config::default();
        assert_eq!(config.server.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.cache.confirm_threshold, 5);
        assert_eq!(config.cache.ttl_days, 30);
        assert_eq!(config.cache.backend, BackendKind::Text);
    }

    #[test]
    fn cache_max_age_secs_derives_from_ttl_days() {
        let mut cache = CacheConfig::default();
        cache.ttl_days = 2;
        assert_eq!(cache.max_age_secs(), 2 * 86_400);
    }

    #[test]
    fn deserialize_partial_cache_config() {
        let json = r#"{"confirmThreshold": 5}"#;
        let config: CacheConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.confirm_threshold, 5);
        assert_eq!(config.ttl_days, 30); // default
    }

    #[test]
    fn resilience_config_defaults() {
        let config = ResilienceConfig::default();
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.circuit_breaker_threshold, 5);
    }

    #[test]
    fn resilience_config_partial_override() {
        let json = r#"{"maxRetries": 7, "timeoutSecs": 10}"#;
        let config: ResilienceConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_retries, 7);
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.connect_timeout_secs, 5); // default
    }

    #[test]
    fn translator_config_defaults() {
        let config = TranslatorConfig::default();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn deserialize_backend_kind_from_lowercase_string() {
        let json = r#"{"backend": "sqlite", "path": "/tmp/x.db"}"#;
        let config: CacheConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.backend, BackendKind::Sqlite);
    }
}
