use crate::request::QueryParams;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

const REDACTED: &str = "[REDACTED]";
const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "token",
    "secret",
    "api_key",
    "apikey",
    "authorization",
    "credential",
];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub log_requests: bool,
    pub log_responses: bool,
    pub log_errors: bool,
    pub sanitize_sensitive_data: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_requests: true,
            log_responses: false,
            log_errors: true,
            sanitize_sensitive_data: true,
        }
    }
}

impl LoggingConfig {
    pub fn requests(&self) -> bool {
        self.enabled && self.log_requests
    }

    pub fn responses(&self) -> bool {
        self.enabled && self.log_responses
    }

    pub fn errors(&self) -> bool {
        self.enabled && self.log_errors
    }

    /// Renders a payload for a log line, redacted when configured.
    pub fn render(&self, value: &Value) -> String {
        if self.sanitize_sensitive_data {
            sanitize(value).to_string()
        } else {
            value.to_string()
        }
    }

    /// Renders query parameters under the same redaction rules as bodies.
    pub fn render_query(&self, query: &QueryParams) -> String {
        let map = query
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect::<Map<_, _>>();
        self.render(&Value::Object(map))
    }
}

/// Replaces values stored under credential-like keys, at any depth.
pub fn sanitize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, inner) in map {
                if is_sensitive(key) {
                    out.insert(key.clone(), Value::String(REDACTED.to_string()));
                } else {
                    out.insert(key.clone(), sanitize(inner));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sanitize).collect()),
        leaf => leaf.clone(),
    }
}

fn is_sensitive(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEYS.iter().any(|needle| key.contains(needle))
}

/// Installs a fmt subscriber. `RUST_LOG` overrides `default_level`.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
