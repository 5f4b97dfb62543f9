use api_transport::config::Config;
use api_transport::{ErrorKind, Transport, TransportError};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_config_from_file() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");

    let config_content = r#"
[backend]
base_url = "https://api.example.com/v1"
api_key = "test_key"
auth_scheme = "ApiKey"

[retry]
max_attempts = 4
retryable_error_kinds = ["network", "external_service"]

[cache]
ttl_ms = 2000
exclude_patterns = ["/logs"]
"#;

    fs::write(&config_path, config_content).unwrap();

    let config = Config::from_file(&config_path).unwrap();
    assert_eq!(config.backend.base_url, "https://api.example.com/v1");
    assert_eq!(config.backend.api_key.as_deref(), Some("test_key"));
    assert_eq!(config.backend.auth_scheme, "ApiKey");
    assert_eq!(config.retry.max_attempts, 4);
    assert!(config
        .retry
        .retryable_error_kinds
        .contains(&ErrorKind::ExternalService));
    assert_eq!(config.cache.ttl_ms, 2000);
    assert_eq!(config.cache.exclude_patterns, vec!["/logs".to_string()]);
}

#[test]
fn test_config_new_with_missing_file() {
    let dir = tempdir().unwrap();
    let result = Config::from_file(dir.path().join("config.toml"));
    assert!(matches!(result, Err(TransportError::Config(_))));
}

#[test]
fn test_config_with_invalid_toml() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");

    let invalid_content = r#"
[backend
base_url = "https://api.example.com"
"#;

    fs::write(&config_path, invalid_content).unwrap();

    assert!(Config::from_file(&config_path).is_err());
}

#[test]
fn test_config_with_unknown_error_kind() {
    let result = Config::from_toml_str(
        r#"
[backend]
base_url = "https://api.example.com"

[retry]
retryable_error_kinds = ["flaky"]
"#,
    );
    assert!(result.is_err());
}

#[test]
fn test_config_without_backend_is_rejected() {
    let result = Config::from_toml_str("[cache]\nenabled = false\n");
    assert!(matches!(result, Err(TransportError::Config(_))));
}

#[tokio::test]
async fn test_base_url_supplied_after_loading() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, "[retry]\nmax_attempts = 2\n").unwrap();

    assert!(Config::from_file(&config_path).is_err());

    let mut config = Config::load_file(&config_path).unwrap();
    config.apply_overrides(
        Some("https://api.example.com/v1".to_string()),
        Some("env-key".to_string()),
    );
    config.validate().unwrap();
    assert_eq!(config.backend.api_key.as_deref(), Some("env-key"));
    assert_eq!(config.retry.max_attempts, 2);

    let transport = Transport::new(config).unwrap();
    assert!(!transport.is_closed());
}

#[test]
fn test_config_clone() {
    let config = Config::from_toml_str("[backend]\nbase_url = \"https://x\"\n").unwrap();
    let cloned = config.clone();
    assert_eq!(config.backend.base_url, cloned.backend.base_url);
    assert_eq!(config.retry, cloned.retry);
}
