//! The validate/apply contract between the coordinator and the cluster.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

use crate::convert::TypedObject;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
  Warning,
  Error,
}

/// A validation finding about one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
  pub object: String,
  pub severity: Severity,
  pub message: String,
}

impl Diagnostic {
  pub fn warning(object: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      object: object.into(),
      severity: Severity::Warning,
      message: message.into(),
    }
  }

  pub fn error(object: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      object: object.into(),
      severity: Severity::Error,
      message: message.into(),
    }
  }

  pub fn is_error(&self) -> bool {
    self.severity == Severity::Error
  }
}

impl fmt::Display for Diagnostic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let level = match self.severity {
      Severity::Warning => "warning",
      Severity::Error => "error",
    };
    write!(f, "{level}: {}: {}", self.object, self.message)
  }
}

/// Counts reported by an update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
  pub applied: usize,
  /// Objects not created because creation was disabled.
  pub skipped: usize,
  pub pruned: usize,
}

#[derive(Debug, Error)]
pub enum ClusterError {
  #[error("API discovery failed: {0}")]
  Discovery(#[source] kube::Error),

  #[error("{object}: kind is not served by the cluster")]
  UnknownKind { object: String },

  #[error("{object}: {message}")]
  InvalidObject { object: String, message: String },

  #[error("failed to apply {object}: {source}")]
  Apply {
    object: String,
    #[source]
    source: kube::Error,
  },

  #[error("failed to list {resource}: {source}")]
  List {
    resource: String,
    #[source]
    source: kube::Error,
  },

  #[error("failed to prune {object}: {source}")]
  Prune {
    object: String,
    #[source]
    source: kube::Error,
  },
}

/// Validates objects against a cluster and applies them with pruning.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ApplyEngine: Send + Sync {
  /// Check `objects` against the kinds the cluster serves.
  ///
  /// Unknown kinds are warnings when `ignore_unknown` is set and errors
  /// otherwise.
  async fn validate(&self, objects: &[TypedObject], ignore_unknown: bool) -> Result<Vec<Diagnostic>, ClusterError>;

  /// Create or update `objects`, then prune objects carrying `gc_tag` that
  /// are no longer among them.
  async fn update(
    &self,
    objects: &[TypedObject],
    default_namespace: &str,
    create: bool,
    gc_tag: &str,
  ) -> Result<UpdateSummary, ClusterError>;
}
