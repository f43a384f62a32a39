//! One reconciliation run: evaluate, discover, convert, validate, apply,
//! then the platform's post-update hook.
//!
//! Each stage completes before the next starts and the first failure ends
//! the run. Nothing is retried here; re-running the tool starts over from
//! evaluation. A post-update failure does not undo the apply.

use std::fmt;
use std::sync::Arc;

use kube::Client;
use kubeprod_lua::{EvalError, ExtVars, Importer, Location, evaluate};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};

use super::engine::{ApplyEngine, ClusterError, Diagnostic, UpdateSummary};
use crate::convert::{ConvertError, TypedObject, convert};
use crate::discovery::{DiscoveryError, discover};
use crate::platform::{self, LifecycleError, Platform};

/// Namespace given to namespaced objects that do not name one.
pub const DEFAULT_NAMESPACE: &str = "kube-system";

/// Tag identifying objects managed by kubeprod, for pruning.
pub const GC_TAG: &str = "kube_prod_runtime";

/// Where and how objects are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileTarget {
  pub default_namespace: String,
  pub gc_tag: String,
  /// Create objects that do not exist yet.
  pub create: bool,
  /// Treat kinds the cluster does not serve as warnings during validation.
  pub ignore_unknown: bool,
}

impl Default for ReconcileTarget {
  fn default() -> Self {
    Self {
      default_namespace: DEFAULT_NAMESPACE.to_string(),
      gc_tag: GC_TAG.to_string(),
      create: true,
      ignore_unknown: true,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunState {
  Idle,
  Evaluated,
  Discovered,
  Converted,
  Validated,
  Applied,
  PostUpdated,
}

impl fmt::Display for RunState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      RunState::Idle => "idle",
      RunState::Evaluated => "evaluated",
      RunState::Discovered => "discovered",
      RunState::Converted => "converted",
      RunState::Validated => "validated",
      RunState::Applied => "applied",
      RunState::PostUpdated => "post-updated",
    };
    f.write_str(name)
  }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
  pub state: RunState,
  pub objects: usize,
  pub diagnostics: Vec<Diagnostic>,
  pub summary: UpdateSummary,
}

#[derive(Debug, Error)]
pub enum ReconcileError {
  #[error(transparent)]
  Evaluate(#[from] EvalError),

  /// The evaluator returned text that is not JSON. This is a defect in the
  /// evaluator, not something the operator can fix.
  #[error("internal error: evaluator produced invalid JSON: {0}")]
  ContractViolation(#[source] serde_json::Error),

  #[error("manifest structure: {0}")]
  Discovery(#[from] DiscoveryError),

  #[error("manifest objects: {0}")]
  Convert(#[from] ConvertError),

  #[error("validation failed:\n{}", format_diagnostics(diagnostics))]
  Invalid { diagnostics: Vec<Diagnostic> },

  #[error("validation failed: {0}")]
  Validate(#[source] ClusterError),

  #[error("update failed: {0}")]
  Update(#[source] ClusterError),

  #[error(transparent)]
  PostUpdate(#[from] LifecycleError),
}

impl ReconcileError {
  /// The last state the run reached before failing.
  pub fn failed_after(&self) -> RunState {
    match self {
      ReconcileError::Evaluate(_) => RunState::Idle,
      ReconcileError::ContractViolation(_) | ReconcileError::Discovery(_) => RunState::Evaluated,
      ReconcileError::Convert(_) => RunState::Discovered,
      ReconcileError::Invalid { .. } | ReconcileError::Validate(_) => RunState::Converted,
      ReconcileError::Update(_) => RunState::Validated,
      ReconcileError::PostUpdate(_) => RunState::Applied,
    }
  }
}

fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
  diagnostics
    .iter()
    .map(|d| format!("  {d}"))
    .collect::<Vec<_>>()
    .join("\n")
}

/// Drives a run against a root manifest.
pub struct Reconciler {
  root: Location,
  importer: Arc<dyn Importer>,
  ext_vars: ExtVars,
  target: ReconcileTarget,
}

impl Reconciler {
  pub fn new(root: Location, importer: Arc<dyn Importer>) -> Self {
    Self {
      root,
      importer,
      ext_vars: ExtVars::new(),
      target: ReconcileTarget::default(),
    }
  }

  pub fn with_ext_vars(mut self, ext_vars: ExtVars) -> Self {
    self.ext_vars = ext_vars;
    self
  }

  pub fn with_target(mut self, target: ReconcileTarget) -> Self {
    self.target = target;
    self
  }

  /// Evaluate the root manifest and turn it into typed objects.
  pub fn materialize(&self) -> Result<Vec<TypedObject>, ReconcileError> {
    let json = evaluate(&self.root, Arc::clone(&self.importer), &self.ext_vars)?;
    let value = decode_evaluated(&json)?;
    info!(root = %self.root, state = %RunState::Evaluated, "manifest evaluated");

    let discovered = discover(&value)?;
    info!(count = discovered.len(), state = %RunState::Discovered, "objects discovered");

    let objects = convert(&discovered)?;
    info!(count = objects.len(), state = %RunState::Converted, "objects converted");
    Ok(objects)
  }

  pub async fn run(
    &self,
    engine: &dyn ApplyEngine,
    platform: &dyn Platform,
    client: &Client,
  ) -> Result<RunReport, ReconcileError> {
    let result = self.run_stages(engine, platform, client).await;
    if let Err(e) = &result {
      error!(failed_after = %e.failed_after(), error = %e, "reconciliation failed");
    }
    result
  }

  async fn run_stages(
    &self,
    engine: &dyn ApplyEngine,
    platform: &dyn Platform,
    client: &Client,
  ) -> Result<RunReport, ReconcileError> {
    let objects = self.materialize()?;

    let diagnostics = engine
      .validate(&objects, self.target.ignore_unknown)
      .await
      .map_err(ReconcileError::Validate)?;
    if diagnostics.iter().any(Diagnostic::is_error) {
      return Err(ReconcileError::Invalid { diagnostics });
    }
    info!(warnings = diagnostics.len(), state = %RunState::Validated, "objects validated");

    let summary = engine
      .update(
        &objects,
        &self.target.default_namespace,
        self.target.create,
        &self.target.gc_tag,
      )
      .await
      .map_err(ReconcileError::Update)?;
    info!(
      applied = summary.applied,
      skipped = summary.skipped,
      pruned = summary.pruned,
      state = %RunState::Applied,
      "cluster updated"
    );

    platform::run_post_update(platform, client).await?;

    Ok(RunReport {
      state: RunState::PostUpdated,
      objects: objects.len(),
      diagnostics,
      summary,
    })
  }
}

/// Decode evaluator output. Grouping tables may nest arbitrarily deep, so
/// serde_json's recursion limit does not apply here.
fn decode_evaluated(json: &str) -> Result<Value, ReconcileError> {
  let mut de = serde_json::Deserializer::from_str(json);
  de.disable_recursion_limit();
  let value = Value::deserialize(&mut de).map_err(ReconcileError::ContractViolation)?;
  de.end().map_err(ReconcileError::ContractViolation)?;
  Ok(value)
}
