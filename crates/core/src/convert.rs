//! Conversion of discovered objects into typed Kubernetes objects.

use std::fmt;

use kube::api::DynamicObject;
use kube::core::GroupVersionKind;
use serde_json::{Map, Value};
use thiserror::Error;

/// Names an object in error messages by whatever identifying fields it has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectIdent {
  pub index: usize,
  pub kind: Option<String>,
  pub api_version: Option<String>,
  pub name: Option<String>,
}

impl ObjectIdent {
  fn of(index: usize, object: &Map<String, Value>) -> Self {
    let text = |v: Option<&Value>| v.and_then(Value::as_str).map(str::to_string);
    Self {
      index,
      kind: text(object.get("kind")),
      api_version: text(object.get("apiVersion")),
      name: text(object.get("metadata").and_then(|m| m.get("name"))),
    }
  }
}

impl fmt::Display for ObjectIdent {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let or_unknown = |v: &Option<String>| v.clone().unwrap_or_else(|| "<unknown>".to_string());
    write!(
      f,
      "object #{} ({} {} '{}')",
      self.index,
      or_unknown(&self.api_version),
      or_unknown(&self.kind),
      or_unknown(&self.name)
    )
  }
}

#[derive(Debug, Error)]
pub enum ConvertError {
  #[error("{object}: field '{field}' must be a non-empty string")]
  InvalidField { object: ObjectIdent, field: &'static str },

  #[error("{object}: malformed apiVersion '{api_version}'")]
  InvalidApiVersion { object: ObjectIdent, api_version: String },

  #[error("{object}: list items must be mappings")]
  InvalidListItem { object: ObjectIdent },

  #[error("{object}: failed to encode: {source}")]
  Encode {
    object: ObjectIdent,
    #[source]
    source: serde_json::Error,
  },

  #[error("{object}: not a valid Kubernetes object: {source}")]
  Decode {
    object: ObjectIdent,
    #[source]
    source: serde_json::Error,
  },
}

/// A discovered object decoded through the Kubernetes object scheme.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedObject {
  pub gvk: GroupVersionKind,
  pub object: DynamicObject,
}

impl TypedObject {
  pub fn name(&self) -> Option<&str> {
    self.object.metadata.name.as_deref()
  }

  pub fn namespace(&self) -> Option<&str> {
    self.object.metadata.namespace.as_deref()
  }

  pub fn api_version(&self) -> String {
    self.gvk.api_version()
  }
}

impl fmt::Display for TypedObject {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.gvk.api_version(), self.gvk.kind)?;
    if let Some(ns) = self.namespace() {
      write!(f, " {ns}/")?;
    } else {
      write!(f, " ")?;
    }
    write!(f, "{}", self.name().unwrap_or("<unnamed>"))
  }
}

/// Convert discovered objects, flattening `List` wrappers into their items.
///
/// The first failure aborts the batch. Output order follows input order.
pub fn convert(objects: &[&Map<String, Value>]) -> Result<Vec<TypedObject>, ConvertError> {
  let mut out = Vec::with_capacity(objects.len());
  for (index, object) in objects.iter().enumerate() {
    convert_into(index, object, &mut out)?;
  }
  Ok(out)
}

fn convert_into(index: usize, object: &Map<String, Value>, out: &mut Vec<TypedObject>) -> Result<(), ConvertError> {
  let ident = ObjectIdent::of(index, object);
  let kind = required_str(object, "kind", &ident)?;
  let api_version = required_str(object, "apiVersion", &ident)?;

  if kind.ends_with("List") {
    if let Some(Value::Array(items)) = object.get("items") {
      for item in items {
        match item {
          Value::Object(map) => convert_into(index, map, out)?,
          _ => return Err(ConvertError::InvalidListItem { object: ident }),
        }
      }
      return Ok(());
    }
  }

  let gvk = parse_gvk(api_version, kind).ok_or_else(|| ConvertError::InvalidApiVersion {
    object: ident.clone(),
    api_version: api_version.to_string(),
  })?;

  // Round-trip through bytes so the typed decoder sees exactly what the
  // cluster would receive.
  let bytes = serde_json::to_vec(object).map_err(|source| ConvertError::Encode {
    object: ident.clone(),
    source,
  })?;
  let decoded: DynamicObject =
    serde_json::from_slice(&bytes).map_err(|source| ConvertError::Decode { object: ident, source })?;

  out.push(TypedObject { gvk, object: decoded });
  Ok(())
}

fn required_str<'a>(
  object: &'a Map<String, Value>,
  field: &'static str,
  ident: &ObjectIdent,
) -> Result<&'a str, ConvertError> {
  object
    .get(field)
    .and_then(Value::as_str)
    .filter(|s| !s.is_empty())
    .ok_or_else(|| ConvertError::InvalidField {
      object: ident.clone(),
      field,
    })
}

/// Split `group/version` (or a bare core `version`) and attach the kind.
fn parse_gvk(api_version: &str, kind: &str) -> Option<GroupVersionKind> {
  let (group, version) = match api_version.split_once('/') {
    Some((group, version)) => (group, version),
    None => ("", api_version),
  };
  if version.is_empty() || version.contains('/') || (api_version.contains('/') && group.is_empty()) {
    return None;
  }
  Some(GroupVersionKind::gvk(group, version, kind))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn as_map(value: &Value) -> &Map<String, Value> {
    value.as_object().unwrap()
  }

  #[test]
  fn converts_core_and_grouped_kinds() {
    let deploy = json!({ "kind": "Deployment", "apiVersion": "apps/v1", "metadata": { "name": "x" }, "spec": { "replicas": 1 } });
    let svc = json!({ "kind": "Service", "apiVersion": "v1", "metadata": { "name": "y", "namespace": "web" } });

    let typed = convert(&[as_map(&deploy), as_map(&svc)]).unwrap();

    assert_eq!(typed.len(), 2);
    assert_eq!(typed[0].gvk, GroupVersionKind::gvk("apps", "v1", "Deployment"));
    assert_eq!(typed[0].name(), Some("x"));
    assert_eq!(typed[0].object.data["spec"]["replicas"], 1);
    assert_eq!(typed[1].gvk, GroupVersionKind::gvk("", "v1", "Service"));
    assert_eq!(typed[1].namespace(), Some("web"));
    assert_eq!(typed[1].to_string(), "v1 Service web/y");
  }

  #[test]
  fn conversion_is_idempotent() {
    let obj = json!({ "kind": "ConfigMap", "apiVersion": "v1", "metadata": { "name": "c", "labels": { "a": "b" } }, "data": { "k": "v" } });

    let first = convert(&[as_map(&obj)]).unwrap();
    let second = convert(&[as_map(&obj)]).unwrap();

    assert_eq!(first, second);
  }

  #[test]
  fn list_wrappers_are_flattened_in_order() {
    let list = json!({
      "kind": "ConfigMapList",
      "apiVersion": "v1",
      "items": [
        { "kind": "ConfigMap", "apiVersion": "v1", "metadata": { "name": "one" } },
        { "kind": "ConfigMap", "apiVersion": "v1", "metadata": { "name": "two" } }
      ]
    });

    let typed = convert(&[as_map(&list)]).unwrap();
    let names: Vec<_> = typed.iter().map(|t| t.name().unwrap()).collect();
    assert_eq!(names, vec!["one", "two"]);
  }

  #[test]
  fn non_string_kind_is_rejected() {
    let obj = json!({ "kind": 7, "apiVersion": "v1", "metadata": { "name": "bad" } });
    let err = convert(&[as_map(&obj)]).unwrap_err();

    assert!(matches!(err, ConvertError::InvalidField { field: "kind", .. }));
    assert!(err.to_string().contains("'bad'"));
  }

  #[test]
  fn malformed_api_version_is_rejected() {
    for api_version in ["/v1", "a/b/c", "apps/"] {
      let obj = json!({ "kind": "Thing", "apiVersion": api_version, "metadata": { "name": "t" } });
      let err = convert(&[as_map(&obj)]).unwrap_err();
      assert!(matches!(err, ConvertError::InvalidApiVersion { .. }), "{api_version}");
    }
  }

  #[test]
  fn invalid_metadata_aborts_batch_naming_the_object() {
    let good = json!({ "kind": "Namespace", "apiVersion": "v1", "metadata": { "name": "ok" } });
    let bad = json!({ "kind": "Secret", "apiVersion": "v1", "metadata": { "name": "s", "labels": "not-a-map" } });

    let err = convert(&[as_map(&good), as_map(&bad)]).unwrap_err();
    match &err {
      ConvertError::Decode { object, .. } => {
        assert_eq!(object.index, 1);
        assert_eq!(object.kind.as_deref(), Some("Secret"));
      }
      other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("object #1 (v1 Secret 's')"));
  }
}
