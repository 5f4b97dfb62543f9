use crate::config::BackendConfig;
use crate::error::TransportError;
use crate::request::{RequestDescriptor, Verb};
use async_trait::async_trait;
use reqwest::{header, Client, Method};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Raw outcome of one HTTP exchange, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            content_type: Some("application/json".to_string()),
            body: body.to_string(),
        }
    }
}

/// The network capability the transport drives. Swappable for a test double.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Performs exactly one exchange. Non-2xx statuses are returned as
    /// responses; only connection-level failures are errors.
    async fn send(&self, request: &RequestDescriptor) -> Result<HttpResponse, TransportError>;
}

#[derive(Clone)]
pub struct ReqwestClient {
    client: Client,
    base_url: String,
    authorization: Option<String>,
    timeout: Duration,
}

impl fmt::Debug for ReqwestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestClient")
            .field("base_url", &self.base_url)
            .field(
                "authorization",
                &self.authorization.as_ref().map(|_| "<redacted>"),
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ReqwestClient {
    pub fn new(config: &BackendConfig) -> Result<Self, TransportError> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(TransportError::Config("backend base_url is empty".to_string()));
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| TransportError::Config(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url,
            authorization: config
                .api_key
                .as_deref()
                .filter(|key| !key.trim().is_empty())
                .map(|key| normalize_authorization(&config.auth_scheme, key)),
            timeout: Duration::from_millis(config.timeout_ms),
        })
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, request: &RequestDescriptor) -> Result<HttpResponse, TransportError> {
        let url = self.url(&request.path);
        let mut builder = self
            .client
            .request(method(request.verb), &url)
            .header(header::ACCEPT, "application/json");

        if let Some(authorization) = &self.authorization {
            builder = builder.header(header::AUTHORIZATION, authorization);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        builder = match &request.body {
            None => builder,
            Some(Value::String(raw)) => builder
                .header(header::CONTENT_TYPE, "text/plain")
                .body(raw.clone()),
            Some(body) => builder.json(body),
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        debug!("{} {} -> {}", request.verb, url, status);

        let body = response.text().await?;
        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

fn method(verb: Verb) -> Method {
    match verb {
        Verb::Get => Method::GET,
        Verb::Post => Method::POST,
        Verb::Put => Method::PUT,
        Verb::Patch => Method::PATCH,
        Verb::Delete => Method::DELETE,
    }
}

/// `<scheme> <credential>`, unless the credential already carries the scheme.
pub fn normalize_authorization(scheme: &str, credential: &str) -> String {
    let scheme = scheme.trim();
    let credential = credential.trim();
    if scheme.is_empty() {
        return credential.to_string();
    }
    let prefix_len = scheme.len() + 1;
    let prefix = credential.get(..prefix_len);
    if prefix.is_some_and(|value| value.eq_ignore_ascii_case(&format!("{scheme} "))) {
        credential.to_string()
    } else {
        format!("{scheme} {credential}")
    }
}
