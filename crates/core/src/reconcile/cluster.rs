//! Apply engine backed by the Kubernetes API.
//!
//! Objects are applied with server-side apply and tagged with the run's GC
//! tag. After applying, every listable object carrying the tag whose UID was
//! not part of this run is deleted.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, Patch, PatchParams};
use kube::core::{GroupVersionKind, TypeMeta};
use kube::discovery::{ApiCapabilities, ApiResource, Discovery, Scope, verbs};
use kube::{Client, ResourceExt};
use tracing::{debug, info, warn};

use super::engine::{ApplyEngine, ClusterError, Diagnostic, UpdateSummary};
use crate::convert::TypedObject;

/// Label and annotation key carrying the GC tag.
pub const GC_TAG_KEY: &str = "kubecfg.ksonnet.io/garbage-collect-tag";

/// Objects annotated with `ignore` under this key are never pruned.
pub const GC_STRATEGY_ANNOTATION: &str = "kubecfg.ksonnet.io/garbage-collect-strategy";

/// Field manager used for server-side apply.
pub const FIELD_MANAGER: &str = "kubeprod";

const CRD_WAIT_ATTEMPTS: u32 = 10;
const CRD_WAIT_INTERVAL: Duration = Duration::from_secs(1);

pub struct KubeEngine {
  client: Client,
}

impl KubeEngine {
  pub fn new(client: Client) -> Self {
    Self { client }
  }

  async fn discover(&self) -> Result<Discovery, ClusterError> {
    Discovery::new(self.client.clone())
      .run()
      .await
      .map_err(ClusterError::Discovery)
  }

  fn api(&self, resource: &ApiResource, namespace: Option<&str>) -> Api<DynamicObject> {
    match namespace {
      Some(ns) => Api::namespaced_with(self.client.clone(), ns, resource),
      None => Api::all_with(self.client.clone(), resource),
    }
  }

  /// Re-run discovery until a kind defined by a CRD applied earlier in this
  /// run is served.
  async fn wait_for_kind(
    &self,
    discovery: &mut Discovery,
    obj: &TypedObject,
  ) -> Result<(ApiResource, ApiCapabilities), ClusterError> {
    for attempt in 1..=CRD_WAIT_ATTEMPTS {
      debug!(object = %obj, attempt, "kind not yet served, refreshing discovery");
      tokio::time::sleep(CRD_WAIT_INTERVAL).await;
      *discovery = self.discover().await?;
      if let Some(found) = discovery.resolve_gvk(&obj.gvk) {
        return Ok(found);
      }
    }
    Err(ClusterError::UnknownKind { object: obj.to_string() })
  }

  async fn prune(&self, discovery: &Discovery, keep: &HashSet<String>, gc_tag: &str) -> Result<usize, ClusterError> {
    let selector = format!("{GC_TAG_KEY}={gc_tag}");
    let params = ListParams::default().labels(&selector);
    let mut deleted: HashSet<String> = HashSet::new();

    for group in discovery.groups() {
      for (resource, caps) in group.recommended_resources() {
        if !caps.supports_operation(verbs::LIST) || !caps.supports_operation(verbs::DELETE) {
          continue;
        }

        let listed = match self.api(&resource, None).list(&params).await {
          Ok(listed) => listed,
          Err(source) if is_unavailable(&source) => {
            warn!(
              resource = %format!("{}/{}", resource.api_version, resource.plural),
              error = %source,
              "resource not listable, skipping prune"
            );
            continue;
          }
          Err(source) => {
            return Err(ClusterError::List {
              resource: format!("{}/{}", resource.api_version, resource.plural),
              source,
            });
          }
        };

        for item in listed.items {
          if !is_prunable(&item, keep, gc_tag) {
            continue;
          }
          let uid = item.uid().unwrap_or_default();
          if !deleted.insert(uid) {
            continue;
          }

          let name = item.name_any();
          let namespace = item.namespace();
          let object = match &namespace {
            Some(ns) => format!("{} {} {ns}/{name}", resource.api_version, resource.kind),
            None => format!("{} {} {name}", resource.api_version, resource.kind),
          };
          info!(object = %object, "pruning object no longer in manifest");

          match self
            .api(&resource, namespace.as_deref())
            .delete(&name, &DeleteParams::background())
            .await
          {
            Ok(_) => {}
            Err(kube::Error::Api(resp)) if resp.code == 404 => {
              debug!(object = %object, "already gone");
            }
            Err(source) => return Err(ClusterError::Prune { object, source }),
          }
        }
      }
    }

    Ok(deleted.len())
  }
}

#[async_trait]
impl ApplyEngine for KubeEngine {
  async fn validate(&self, objects: &[TypedObject], ignore_unknown: bool) -> Result<Vec<Diagnostic>, ClusterError> {
    let discovery = self.discover().await?;
    Ok(check_objects(objects, ignore_unknown, |gvk| {
      discovery.resolve_gvk(gvk).is_some()
    }))
  }

  async fn update(
    &self,
    objects: &[TypedObject],
    default_namespace: &str,
    create: bool,
    gc_tag: &str,
  ) -> Result<UpdateSummary, ClusterError> {
    let mut discovery = self.discover().await?;
    let mut summary = UpdateSummary::default();
    let mut applied: HashSet<String> = HashSet::new();
    let mut crds_applied = false;

    for obj in order_for_apply(objects) {
      let name = obj
        .name()
        .ok_or_else(|| ClusterError::InvalidObject {
          object: obj.to_string(),
          message: "metadata.name is required".to_string(),
        })?
        .to_string();

      let (resource, caps) = match discovery.resolve_gvk(&obj.gvk) {
        Some(found) => found,
        None if crds_applied => self.wait_for_kind(&mut discovery, obj).await?,
        None => return Err(ClusterError::UnknownKind { object: obj.to_string() }),
      };

      let namespaced = matches!(caps.scope, Scope::Namespaced);
      let object = prepare_object(obj, namespaced, default_namespace, gc_tag);
      let api = self.api(&resource, object.metadata.namespace.as_deref());
      let apply_err = |source| ClusterError::Apply {
        object: obj.to_string(),
        source,
      };

      if !create && api.get_opt(&name).await.map_err(apply_err)?.is_none() {
        info!(object = %obj, "not present and creation disabled, skipping");
        summary.skipped += 1;
        continue;
      }

      let params = PatchParams::apply(FIELD_MANAGER).force();
      let result = api.patch(&name, &params, &Patch::Apply(&object)).await.map_err(apply_err)?;
      info!(object = %obj, "applied");

      if let Some(uid) = result.metadata.uid {
        applied.insert(uid);
      }
      if is_crd(&obj.gvk) {
        crds_applied = true;
      }
      summary.applied += 1;
    }

    summary.pruned = self.prune(&discovery, &applied, gc_tag).await?;
    Ok(summary)
  }
}

/// Discovered but unservable, typically an aggregated API whose backend is down.
fn is_unavailable(err: &kube::Error) -> bool {
  matches!(err, kube::Error::Api(resp) if resp.code == 404 || resp.code == 503)
}

fn is_crd(gvk: &GroupVersionKind) -> bool {
  gvk.group == "apiextensions.k8s.io" && gvk.kind == "CustomResourceDefinition"
}

/// CRDs first so their kinds exist, then namespaces, then everything else.
fn apply_rank(gvk: &GroupVersionKind) -> u8 {
  if is_crd(gvk) {
    0
  } else if gvk.group.is_empty() && gvk.kind == "Namespace" {
    1
  } else {
    2
  }
}

fn order_for_apply(objects: &[TypedObject]) -> Vec<&TypedObject> {
  let mut ordered: Vec<&TypedObject> = objects.iter().collect();
  ordered.sort_by_key(|obj| apply_rank(&obj.gvk));
  ordered
}

fn check_objects(
  objects: &[TypedObject],
  ignore_unknown: bool,
  served: impl Fn(&GroupVersionKind) -> bool,
) -> Vec<Diagnostic> {
  let mut diagnostics = Vec::new();
  for obj in objects {
    if obj.name().is_none_or(str::is_empty) {
      diagnostics.push(Diagnostic::error(obj.to_string(), "metadata.name is required"));
    }
    if !served(&obj.gvk) {
      if ignore_unknown {
        warn!(object = %obj, "kind not served by the cluster, skipping validation");
        diagnostics.push(Diagnostic::warning(obj.to_string(), "kind not served by the cluster"));
      } else {
        diagnostics.push(Diagnostic::error(obj.to_string(), "kind not served by the cluster"));
      }
    }
  }
  diagnostics
}

/// Copy of `obj` ready to apply: namespace defaulted and GC tag attached.
fn prepare_object(obj: &TypedObject, namespaced: bool, default_namespace: &str, gc_tag: &str) -> DynamicObject {
  let mut object = obj.object.clone();
  object.types = Some(TypeMeta {
    api_version: obj.gvk.api_version(),
    kind: obj.gvk.kind.clone(),
  });

  if namespaced {
    object
      .metadata
      .namespace
      .get_or_insert_with(|| default_namespace.to_string());
  } else {
    object.metadata.namespace = None;
  }

  object
    .metadata
    .labels
    .get_or_insert_with(Default::default)
    .insert(GC_TAG_KEY.to_string(), gc_tag.to_string());
  object
    .metadata
    .annotations
    .get_or_insert_with(Default::default)
    .insert(GC_TAG_KEY.to_string(), gc_tag.to_string());
  object
}

/// Whether a listed object is an orphan this run may delete.
fn is_prunable(obj: &DynamicObject, keep: &HashSet<String>, gc_tag: &str) -> bool {
  let meta = &obj.metadata;
  let annotation = |key: &str| meta.annotations.as_ref().and_then(|a| a.get(key)).map(String::as_str);

  let Some(uid) = meta.uid.as_deref() else {
    return false;
  };

  !keep.contains(uid)
    && annotation(GC_TAG_KEY) == Some(gc_tag)
    && annotation(GC_STRATEGY_ANNOTATION) != Some("ignore")
    && meta.owner_references.as_ref().is_none_or(|refs| refs.is_empty())
    && meta.deletion_timestamp.is_none()
}
