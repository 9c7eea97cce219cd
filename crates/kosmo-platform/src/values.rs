//! Claim value assembly: schema defaults, prompted answers, overrides
//!
//! Values flow through three layers with fixed precedence: schema
//! defaults first, operator answers second, `--set` overrides last.
//! Dotted paths nest into the claim spec.

use serde_json::{Map, Value};

use kosmo_common::{Error, Result};

/// Parse one `--set` flag (`key=value` pairs, comma separated)
///
/// Scalars are inferred: `true`/`false` become booleans, integers become
/// numbers, everything else stays a string. List syntax is not supported.
pub fn parse_set_flag(flag: &str) -> Result<Vec<(String, Value)>> {
    let mut pairs = Vec::new();
    for chunk in flag.split(',') {
        let chunk = chunk.trim();
        if chunk.is_empty() {
            continue;
        }
        let (key, raw) = chunk.split_once('=').ok_or_else(|| {
            Error::internal_with_context("values", format!("malformed --set entry '{chunk}'"))
        })?;
        if key.is_empty() {
            return Err(Error::internal_with_context(
                "values",
                format!("malformed --set entry '{chunk}'"),
            ));
        }
        pairs.push((key.to_string(), infer_scalar(raw)));
    }
    Ok(pairs)
}

/// Convert a raw string to a typed value per the schema type
pub fn typed_value(field_type: &str, raw: &str) -> Value {
    match field_type {
        "boolean" => raw
            .parse::<bool>()
            .map(Value::Bool)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        "integer" => raw
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        "number" => raw
            .parse::<f64>()
            .ok()
            .and_then(|n| serde_json::Number::from_f64(n).map(Value::Number))
            .unwrap_or_else(|| Value::String(raw.to_string())),
        _ => Value::String(raw.to_string()),
    }
}

/// Set a dotted path in a nested map, creating objects along the way
///
/// A scalar in the middle of the path is replaced by an object; the last
/// writer wins.
pub fn set_path(map: &mut Map<String, Value>, path: &str, value: Value) {
    let mut segments = path.split('.').peekable();
    let mut current = map;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(segment.to_string(), value);
            return;
        }
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(nested) = entry else { return };
        current = nested;
    }
}

/// Merge value layers in precedence order into one nested claim spec
pub fn merge_layers(layers: &[Vec<(String, Value)>]) -> Map<String, Value> {
    let mut merged = Map::new();
    for layer in layers {
        for (path, value) in layer {
            set_path(&mut merged, path, value.clone());
        }
    }
    merged
}

/// Flatten a nested map into dotted-path pairs
///
/// The inverse of [`set_path`] for object values; arrays and scalars are
/// leaves.
pub fn flatten_pairs(map: &Map<String, Value>) -> Vec<(String, Value)> {
    let mut pairs = Vec::new();
    flatten_into(map, "", &mut pairs);
    pairs
}

fn flatten_into(map: &Map<String, Value>, prefix: &str, out: &mut Vec<(String, Value)>) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(nested) => flatten_into(nested, &path, out),
            leaf => out.push((path, leaf.clone())),
        }
    }
}

fn infer_scalar(raw: &str) -> Value {
    if let Ok(b) = raw.parse::<bool>() {
        return Value::Bool(b);
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    Value::String(raw.to_string())
}
