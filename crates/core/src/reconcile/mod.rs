//! Reconciliation of the evaluated manifest with a live cluster.

mod cluster;
mod coordinator;
mod engine;

pub use cluster::{FIELD_MANAGER, GC_STRATEGY_ANNOTATION, GC_TAG_KEY, KubeEngine};
pub use coordinator::{ReconcileError, ReconcileTarget, Reconciler, RunReport, RunState};
pub use engine::{ApplyEngine, ClusterError, Diagnostic, Severity, UpdateSummary};

#[cfg(test)]
pub use engine::MockApplyEngine;
