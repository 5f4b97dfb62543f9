use crate::error::TransportError;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Query parameters, ordered so that equal parameter sets share a cache key.
pub type QueryParams = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Verb {
    /// Read-style verbs carry the marker in the query string and are cache candidates.
    pub fn is_read(&self) -> bool {
        matches!(self, Verb::Get | Verb::Delete)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound call. Built once per call and not changed between attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub verb: Verb,
    pub path: String,
    pub query: QueryParams,
    pub body: Option<Value>,
    pub headers: BTreeMap<String, String>,
}

impl RequestDescriptor {
    pub fn new(verb: Verb, path: impl Into<String>) -> Self {
        Self {
            verb,
            path: path.into(),
            query: QueryParams::new(),
            body: None,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: Option<Value>) -> Self {
        self.body = body;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Rejects descriptors that can never produce a valid request.
    pub fn validate(&self) -> Result<(), TransportError> {
        let path = self.path.trim();
        if path.is_empty() {
            return Err(TransportError::Validation("path is empty".to_string()));
        }
        if path.contains("://") {
            return Err(TransportError::Validation(
                "path must be relative to the backend base URL".to_string(),
            ));
        }
        if path.chars().any(char::is_whitespace) {
            return Err(TransportError::Validation(
                "path contains whitespace".to_string(),
            ));
        }
        if let Some(name) = self.headers.keys().find(|name| name.trim().is_empty()) {
            return Err(TransportError::Validation(format!(
                "header name '{name}' is empty"
            )));
        }
        Ok(())
    }

    /// `VERB path?k1=v1&k2=v2`, keys in sorted order, keys and values
    /// percent-encoded so separators inside a value cannot alias another
    /// parameter set.
    pub fn cache_key(&self) -> String {
        if self.query.is_empty() {
            return format!("{} {}", self.verb, self.path);
        }
        let query = self
            .query
            .iter()
            .map(|(k, v)| {
                format!(
                    "{}={}",
                    utf8_percent_encode(k, NON_ALPHANUMERIC),
                    utf8_percent_encode(v, NON_ALPHANUMERIC)
                )
            })
            .collect::<Vec<_>>()
            .join("&");
        format!("{} {}?{}", self.verb, self.path, query)
    }
}
