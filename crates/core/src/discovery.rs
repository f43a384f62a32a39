//! Locating API objects inside an evaluated manifest.
//!
//! Manifests group objects under arbitrary keys, so the evaluated value is an
//! unknown tree. The walk treats any mapping with both `kind` and
//! `apiVersion` as an object and does not descend into it. Other mappings and
//! sequences are searched. Anything else where a container was expected fails
//! the whole walk.

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiscoveryError {
  #[error("unexpected {found} at {path}: expected an API object, a mapping or a sequence")]
  UnexpectedStructure { path: String, found: &'static str },
}

/// Whether a mapping describes an API object.
pub fn is_api_object(map: &Map<String, Value>) -> bool {
  let present = |key: &str| map.get(key).is_some_and(|v| !v.is_null());
  present("kind") && present("apiVersion")
}

/// Collect every API object in `value`.
///
/// Objects inside a sequence come out in sequence order. Across the keys of
/// a mapping they come out in the map's iteration order.
pub fn discover(value: &Value) -> Result<Vec<&Map<String, Value>>, DiscoveryError> {
  let mut found = Vec::new();
  walk(value, &mut String::from("$"), &mut found)?;
  Ok(found)
}

fn walk<'a>(value: &'a Value, path: &mut String, found: &mut Vec<&'a Map<String, Value>>) -> Result<(), DiscoveryError> {
  match value {
    Value::Object(map) if is_api_object(map) => found.push(map),
    Value::Object(map) => {
      for (key, child) in map {
        let len = path.len();
        path.push('.');
        path.push_str(key);
        walk(child, path, found)?;
        path.truncate(len);
      }
    }
    Value::Array(items) => {
      for (idx, child) in items.iter().enumerate() {
        let len = path.len();
        path.push_str(&format!("[{idx}]"));
        walk(child, path, found)?;
        path.truncate(len);
      }
    }
    Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
      return Err(DiscoveryError::UnexpectedStructure {
        path: path.clone(),
        found: type_name(value),
      });
    }
  }
  Ok(())
}

fn type_name(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "sequence",
    Value::Object(_) => "mapping",
  }
}
