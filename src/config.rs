use crate::cache::CacheConfig;
use crate::error::TransportError;
use crate::logging::LoggingConfig;
use crate::metrics::MetricsConfig;
use crate::retry::RetryConfig;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::info;

const DEFAULT_CONFIG_FILE: &str = "config.toml";

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub auth_scheme: String,
    pub timeout_ms: u64,
    pub marker_field: String,
    pub marker_value: Value,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: None,
            auth_scheme: "Bearer".to_string(),
            timeout_ms: 30_000,
            marker_field: "marker".to_string(),
            marker_value: Value::Bool(true),
        }
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("auth_scheme", &self.auth_scheme)
            .field("timeout_ms", &self.timeout_ms)
            .field("marker_field", &self.marker_field)
            .field("marker_value", &self.marker_value)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads `config.toml` from the working directory.
    pub fn new() -> Result<Self, TransportError> {
        Self::from_file(DEFAULT_CONFIG_FILE)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TransportError> {
        let config = Self::load_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a file without validating it, for callers that fill in
    /// settings (such as the backend URL) from the environment first.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, TransportError> {
        let path = path.as_ref();
        let config_str = fs::read_to_string(path).map_err(|err| {
            TransportError::Config(format!("cannot read {}: {err}", path.display()))
        })?;
        let config = Self::parse(&config_str)?;
        info!("Config: {:?}", config);
        Ok(config)
    }

    pub fn from_toml_str(config_str: &str) -> Result<Self, TransportError> {
        let config = Self::parse(config_str)?;
        config.validate()?;
        Ok(config)
    }

    fn parse(config_str: &str) -> Result<Self, TransportError> {
        toml::from_str(config_str).map_err(|err| TransportError::Config(err.message().to_string()))
    }

    /// Applies `API_TRANSPORT_BASE_URL` and `API_TRANSPORT_API_KEY` when set.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var("API_TRANSPORT_BASE_URL").ok(),
            std::env::var("API_TRANSPORT_API_KEY").ok(),
        );
    }

    pub fn apply_overrides(&mut self, base_url: Option<String>, api_key: Option<String>) {
        if let Some(base_url) = base_url {
            self.backend.base_url = base_url;
        }
        if let Some(api_key) = api_key {
            self.backend.api_key = Some(api_key);
        }
    }

    pub fn validate(&self) -> Result<(), TransportError> {
        if self.backend.base_url.trim().is_empty() {
            return Err(TransportError::Config("backend.base_url is required".to_string()));
        }
        self.validate_options()
    }

    /// Everything except the backend location, which a custom client owns.
    pub fn validate_options(&self) -> Result<(), TransportError> {
        if self.backend.marker_field.trim().is_empty() {
            return Err(TransportError::Config(
                "backend.marker_field must not be empty".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(TransportError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.exponential_base < 1.0 {
            return Err(TransportError::Config(
                "retry.exponential_base must be >= 1.0".to_string(),
            ));
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(TransportError::Config(
                "retry.max_delay_ms must be >= retry.base_delay_ms".to_string(),
            ));
        }
        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(TransportError::Config(
                "cache.max_entries must be at least 1 when the cache is enabled".to_string(),
            ));
        }
        for pattern in &self.cache.exclude_patterns {
            Regex::new(pattern).map_err(|err| {
                TransportError::Config(format!("invalid cache exclude pattern '{pattern}': {err}"))
            })?;
        }
        Ok(())
    }
}
