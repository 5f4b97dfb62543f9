//! Key rewriting between the wire convention (`snake_case`) and the
//! application convention (`camelCase`).
//!
//! Only mapping keys are renamed. Sequence elements are traversed and leaf
//! values pass through untouched. Both directions are idempotent, and an
//! application key that starts lowercase comes back unchanged from a trip
//! through the wire convention.

use serde_json::{Map, Value};

/// Rewrites every mapping key to the wire convention.
pub fn to_wire(value: &Value) -> Value {
    rewrite_keys(value, to_snake_case)
}

/// Rewrites every mapping key to the application convention.
pub fn to_application(value: &Value) -> Value {
    rewrite_keys(value, to_camel_case)
}

fn rewrite_keys(value: &Value, rename: fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, inner) in map {
                out.insert(rename(key), rewrite_keys(inner, rename));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| rewrite_keys(v, rename)).collect()),
        leaf => leaf.clone(),
    }
}

/// `testName` -> `test_name`. Leading underscores are preserved.
pub fn to_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut seen_word = false;
    for c in key.chars() {
        if c.is_uppercase() {
            if seen_word && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
        if c != '_' {
            seen_word = true;
        }
    }
    out
}

/// `test_name` -> `testName`. Leading and trailing underscores are preserved.
pub fn to_camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut seen_word = false;
    let mut upper_next = false;
    for c in key.chars() {
        if c == '_' && seen_word {
            if upper_next {
                out.push('_');
            }
            upper_next = true;
            continue;
        }
        if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
        if c != '_' {
            seen_word = true;
        }
    }
    if upper_next {
        out.push('_');
    }
    out
}
