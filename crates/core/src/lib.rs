//! kubeprod-core: manifest materialization and cluster reconciliation
//!
//! The install pipeline, leaves first:
//! - [`config`]: the platform configuration and its JSON store
//! - [`platform`]: platform hooks, the registry, and the hook lifecycle
//! - [`scaffold`]: templated files written into the working directory
//! - [`installer`]: the local preparation steps run before touching the cluster
//! - [`discovery`] and [`convert`]: from evaluated JSON to typed objects
//! - [`reconcile`]: validate and apply against the cluster, with pruning

pub mod config;
pub mod convert;
pub mod discovery;
pub mod installer;
pub mod platform;
pub mod reconcile;
pub mod scaffold;

#[cfg(test)]
mod testutil;

pub use config::{AzureConfig, ConfigError, ConfigStore, GoogleConfig, OauthProxyConfig, PlatformConfig};
pub use convert::{ConvertError, TypedObject, convert};
pub use discovery::{DiscoveryError, discover, is_api_object};
pub use installer::{InstallError, prepare};
pub use platform::{GenerateContext, Hook, HookError, LifecycleError, Platform, PlatformRegistry};
pub use reconcile::{
  ApplyEngine, ClusterError, Diagnostic, KubeEngine, ReconcileError, ReconcileTarget, Reconciler, RunReport,
  RunState, Severity, UpdateSummary,
};
pub use scaffold::{ExistingFile, ScaffoldError};
