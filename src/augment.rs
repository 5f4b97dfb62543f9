use crate::convention;
use crate::error::TransportError;
use crate::request::{QueryParams, RequestDescriptor};
use serde_json::{Map, Value};

/// Injects the client marker field into outgoing requests.
///
/// Read-style verbs get it in the query string, write-style verbs in the
/// body. A non-mapping body is left untouched and the marker is dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestAugmenter {
    field: String,
    value: Value,
}

impl Default for RequestAugmenter {
    fn default() -> Self {
        Self::new("marker", Value::Bool(true))
    }
}

impl RequestAugmenter {
    pub fn new(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            value,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn augment(&self, mut request: RequestDescriptor) -> RequestDescriptor {
        if request.verb.is_read() {
            request
                .query
                .insert(self.field.clone(), query_value(&self.value));
            return request;
        }

        match request.body.take() {
            None => {
                let mut body = Map::new();
                body.insert(self.field.clone(), self.value.clone());
                request.body = Some(Value::Object(body));
            }
            Some(Value::Object(mut body)) => {
                body.insert(self.field.clone(), self.value.clone());
                request.body = Some(Value::Object(body));
            }
            Some(other) => request.body = Some(other),
        }
        request
    }
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Converts a descriptor's body and query keys to the wire convention.
///
/// Two query keys that rename to the same wire key (`pageSize` and
/// `page_size`) are rejected rather than letting one value win.
pub fn to_wire(mut request: RequestDescriptor) -> Result<RequestDescriptor, TransportError> {
    request.body = request.body.as_ref().map(convention::to_wire);
    let mut query = QueryParams::new();
    for (key, value) in std::mem::take(&mut request.query) {
        let wire_key = convention::to_snake_case(&key);
        if query.contains_key(&wire_key) {
            return Err(TransportError::Validation(format!(
                "query parameter '{key}' collides with another parameter as '{wire_key}'"
            )));
        }
        query.insert(wire_key, value);
    }
    request.query = query;
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::request::Verb;
    use serde_json::json;

    #[test]
    fn test_read_marker_in_query() {
        let mut query = QueryParams::new();
        query.insert("page".to_string(), "2".to_string());
        let request = RequestDescriptor::new(Verb::Get, "/tests").with_query(query);
        let out = RequestAugmenter::default().augment(request);
        assert_eq!(out.query.get("page").map(String::as_str), Some("2"));
        assert_eq!(out.query.get("marker").map(String::as_str), Some("true"));
        assert!(out.body.is_none());
    }

    #[test]
    fn test_delete_is_read_style() {
        let out = RequestAugmenter::default().augment(RequestDescriptor::new(Verb::Delete, "/t/1"));
        assert!(out.query.contains_key("marker"));
    }

    #[test]
    fn test_write_marker_in_body() {
        let request =
            RequestDescriptor::new(Verb::Post, "/b").with_body(Some(json!({"test_name": "X"})));
        let out = RequestAugmenter::default().augment(request);
        assert_eq!(out.body, Some(json!({"test_name": "X", "marker": true})));
        assert!(out.query.is_empty());
    }

    #[test]
    fn test_write_without_body_creates_one() {
        let out = RequestAugmenter::default().augment(RequestDescriptor::new(Verb::Put, "/b"));
        assert_eq!(out.body, Some(json!({"marker": true})));
    }

    #[test]
    fn test_scalar_body_untouched() {
        let request =
            RequestDescriptor::new(Verb::Patch, "/b").with_body(Some(json!("raw payload")));
        let out = RequestAugmenter::default().augment(request);
        assert_eq!(out.body, Some(json!("raw payload")));
        assert!(out.query.is_empty());
    }

    #[test]
    fn test_custom_marker() {
        let augmenter = RequestAugmenter::new("source", json!("cli"));
        let out = augmenter.augment(RequestDescriptor::new(Verb::Get, "/x"));
        assert_eq!(out.query.get("source").map(String::as_str), Some("cli"));
    }

    #[test]
    fn test_to_wire_converts_query_and_body() {
        let mut query = QueryParams::new();
        query.insert("pageSize".to_string(), "10".to_string());
        let request = RequestDescriptor::new(Verb::Post, "/b")
            .with_query(query)
            .with_body(Some(json!({"testName": "X"})));
        let out = to_wire(request).unwrap();
        assert!(out.query.contains_key("page_size"));
        assert_eq!(out.body, Some(json!({"test_name": "X"})));
    }

    #[test]
    fn test_to_wire_rejects_colliding_query_keys() {
        let mut query = QueryParams::new();
        query.insert("pageSize".to_string(), "10".to_string());
        query.insert("page_size".to_string(), "20".to_string());
        let request = RequestDescriptor::new(Verb::Get, "/tests").with_query(query);

        let err = to_wire(request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
