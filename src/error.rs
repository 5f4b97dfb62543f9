use crate::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

const MAX_MESSAGE_LEN: usize = 200;
const EXTERNAL_SERVICE_CODE: &str = "EXTERNAL_SERVICE_ERROR";

/// Classification of a failed call, used for retry decisions and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Network,
    HttpStatus,
    Authorization,
    NotFound,
    MalformedResponse,
    ExternalService,
    Cancelled,
    Closed,
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Network => "network",
            ErrorKind::HttpStatus => "http_status",
            ErrorKind::Authorization => "authorization",
            ErrorKind::NotFound => "not_found",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::ExternalService => "external_service",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Closed => "closed",
            ErrorKind::Config => "config",
        }
    }

    /// Kinds that no retry configuration can turn into retryable ones.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ErrorKind::Validation
                | ErrorKind::Authorization
                | ErrorKind::NotFound
                | ErrorKind::Cancelled
                | ErrorKind::Closed
                | ErrorKind::Config
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type returned by the transport.
///
/// Messages are short and never embed raw response bodies.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The request could not be built.
    #[error("invalid request: {0}")]
    Validation(String),
    /// Connection-level failure: unreachable host, reset, timeout.
    #[error("network error: {0}")]
    Network(String),
    /// Non-success status without a more specific classification.
    #[error("request failed with status {status}{}", suffix(.message))]
    HttpStatus { status: u16, message: Option<String> },
    /// 401 or 403.
    #[error("not authorized (status {status}){}", suffix(.message))]
    Authorization { status: u16, message: Option<String> },
    /// 404 for a specific resource.
    #[error("resource not found{}", suffix(.message))]
    NotFound { message: Option<String> },
    /// Response was not the expected JSON, e.g. an HTML error page.
    #[error("endpoint not found or service unavailable (status {status})")]
    MalformedResponse { status: u16 },
    /// Backend explicitly reported an internal failure.
    #[error("external service error (status {status}){}", suffix(.message))]
    ExternalService { status: u16, message: Option<String> },
    /// Caller cancelled the operation or the transport shut down mid-call.
    #[error("request cancelled")]
    Cancelled,
    /// The transport has been destroyed.
    #[error("transport is closed")]
    Closed,
    #[error("configuration error: {0}")]
    Config(String),
}

fn suffix(message: &Option<String>) -> String {
    match message {
        Some(message) => format!(": {message}"),
        None => String::new(),
    }
}

impl TransportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::Validation(_) => ErrorKind::Validation,
            TransportError::Network(_) => ErrorKind::Network,
            TransportError::HttpStatus { .. } => ErrorKind::HttpStatus,
            TransportError::Authorization { .. } => ErrorKind::Authorization,
            TransportError::NotFound { .. } => ErrorKind::NotFound,
            TransportError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            TransportError::ExternalService { .. } => ErrorKind::ExternalService,
            TransportError::Cancelled => ErrorKind::Cancelled,
            TransportError::Closed => ErrorKind::Closed,
            TransportError::Config(_) => ErrorKind::Config,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::HttpStatus { status, .. }
            | TransportError::Authorization { status, .. }
            | TransportError::MalformedResponse { status }
            | TransportError::ExternalService { status, .. } => Some(*status),
            TransportError::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    /// Whether `config` allows another attempt after this error. Terminal
    /// kinds never qualify, whatever the configuration lists.
    pub fn is_retryable_by(&self, config: &RetryConfig) -> bool {
        let kind = self.kind();
        if kind.is_terminal() {
            return false;
        }
        self.status()
            .is_some_and(|status| config.retryable_status_codes.contains(&status))
            || config.retryable_error_kinds.contains(&kind)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            return TransportError::Validation(short(&err.to_string()));
        }
        let reason = if err.is_timeout() {
            "request timed out"
        } else if err.is_connect() {
            "connection failed"
        } else if err.is_body() || err.is_decode() {
            "response body interrupted"
        } else {
            "request failed"
        };
        TransportError::Network(reason.to_string())
    }
}

/// Classifies a completed HTTP exchange.
///
/// Returns the decoded JSON body on success.
pub fn classify_response(
    status: u16,
    content_type: Option<&str>,
    body: &str,
) -> Result<Value, TransportError> {
    if looks_like_markup(content_type, body) {
        return Err(TransportError::MalformedResponse { status });
    }

    let parsed = if body.trim().is_empty() {
        Ok(Value::Null)
    } else {
        serde_json::from_str::<Value>(body)
    };

    if (200..300).contains(&status) {
        return parsed.map_err(|_| TransportError::MalformedResponse { status });
    }

    let payload = parsed.unwrap_or(Value::Null);
    let message = error_message(&payload);

    if error_code(&payload).is_some_and(|code| code.eq_ignore_ascii_case(EXTERNAL_SERVICE_CODE)) {
        return Err(TransportError::ExternalService { status, message });
    }

    Err(match status {
        401 | 403 => TransportError::Authorization { status, message },
        404 => TransportError::NotFound { message },
        _ => TransportError::HttpStatus { status, message },
    })
}

// Content type wins when declared; the leading '<' check only applies when
// the server did not claim JSON.
fn looks_like_markup(content_type: Option<&str>, body: &str) -> bool {
    match content_type.map(|ct| ct.to_ascii_lowercase()) {
        Some(ct) if ct.contains("text/html") => true,
        Some(ct) if ct.contains("json") => false,
        _ => body.trim_start().starts_with('<'),
    }
}

fn error_code(payload: &Value) -> Option<&str> {
    payload
        .get("code")
        .or_else(|| payload.get("error").and_then(|e| e.get("code")))
        .and_then(Value::as_str)
}

fn error_message(payload: &Value) -> Option<String> {
    payload
        .get("message")
        .or_else(|| payload.get("error").and_then(|e| e.get("message")))
        .or_else(|| payload.get("error").filter(|e| e.is_string()))
        .and_then(Value::as_str)
        .map(short)
}

fn short(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= MAX_MESSAGE_LEN {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(MAX_MESSAGE_LEN).collect();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_body_is_parsed() {
        let value = classify_response(200, Some("application/json"), r#"{"a":1}"#).unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_empty_success_body_is_null() {
        let value = classify_response(204, None, "").unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn test_html_content_type_is_malformed() {
        let err = classify_response(200, Some("text/html; charset=utf-8"), "<html></html>")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
        assert!(!err.to_string().contains("html"));
    }

    #[test]
    fn test_markup_without_content_type_is_malformed() {
        let err = classify_response(502, None, "  <!DOCTYPE html><body>Bad</body>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
        assert_eq!(err.status(), Some(502));
    }

    #[test]
    fn test_invalid_json_success_is_malformed() {
        let err = classify_response(200, Some("application/json"), "not json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    }

    #[test]
    fn test_external_service_code() {
        let body = r#"{"error":{"code":"external_service_error","message":"upstream down"}}"#;
        let err = classify_response(500, Some("application/json"), body).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalService);
        assert_eq!(err.to_string(), "external service error (status 500): upstream down");
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(
            classify_response(401, None, "").unwrap_err().kind(),
            ErrorKind::Authorization
        );
        assert_eq!(
            classify_response(403, None, "{}").unwrap_err().kind(),
            ErrorKind::Authorization
        );
        assert_eq!(
            classify_response(404, None, "").unwrap_err().kind(),
            ErrorKind::NotFound
        );
        let err = classify_response(503, None, r#"{"message":"busy"}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HttpStatus);
        assert_eq!(err.status(), Some(503));
    }

    #[test]
    fn test_long_messages_are_truncated() {
        let long = "x".repeat(500);
        let body = json!({ "message": long }).to_string();
        let err = classify_response(400, None, &body).unwrap_err();
        assert!(err.to_string().len() < 260);
    }

    #[test]
    fn test_is_retryable_by() {
        let config = RetryConfig::default();
        assert!(TransportError::Network("reset".to_string()).is_retryable_by(&config));
        assert!(classify_response(503, None, "").unwrap_err().is_retryable_by(&config));
        assert!(!classify_response(400, None, "").unwrap_err().is_retryable_by(&config));
        assert!(!TransportError::Cancelled.is_retryable_by(&config));

        let mut permissive = RetryConfig::default();
        permissive.retryable_status_codes.insert(404);
        permissive.retryable_error_kinds.insert(ErrorKind::Validation);
        assert!(!classify_response(404, None, "").unwrap_err().is_retryable_by(&permissive));
        assert!(!TransportError::Validation("bad".to_string()).is_retryable_by(&permissive));
    }

    #[test]
    fn test_terminal_kinds() {
        assert!(ErrorKind::Validation.is_terminal());
        assert!(ErrorKind::NotFound.is_terminal());
        assert!(!ErrorKind::Network.is_terminal());
        assert!(!ErrorKind::HttpStatus.is_terminal());
    }
}
