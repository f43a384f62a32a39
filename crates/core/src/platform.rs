//! Platform hooks and the registry of supported platforms.
//!
//! A platform customizes the platform-agnostic install pipeline at three
//! points: `generate` scaffolds local files before anything else happens,
//! `pre_update` adjusts the configuration before it is persisted, and
//! `post_update` acts on the cluster once the manifest has been applied.
//! Every hook defaults to a no-op.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use kube::Client;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::PlatformConfig;
use crate::scaffold::{ExistingFile, OVERRIDES_FILE, ROOT_MANIFEST_FILE, ScaffoldError};

/// Inputs for the generate hook and the root manifest.
#[derive(Debug, Clone)]
pub struct GenerateContext {
  /// Directory the scaffolded files are written to.
  pub work_dir: PathBuf,
  /// Base location of the manifest library (`internal:///` or a directory).
  pub manifests: String,
  /// Path of the persisted configuration, as the root manifest imports it.
  pub config_path: PathBuf,
  /// Name of the platform being installed.
  pub platform: String,
  /// What to do when a scaffolded file already exists.
  pub existing: ExistingFile,
}

impl GenerateContext {
  pub fn root_manifest_path(&self) -> PathBuf {
    self.work_dir.join(ROOT_MANIFEST_FILE)
  }

  pub fn overrides_path(&self) -> PathBuf {
    self.work_dir.join(OVERRIDES_FILE)
  }
}

/// Errors raised by a platform hook.
#[derive(Debug, Error)]
pub enum HookError {
  #[error("missing required setting: {setting} (set it with {flag})")]
  MissingSetting { setting: &'static str, flag: &'static str },

  #[error(transparent)]
  Scaffold(#[from] ScaffoldError),

  #[error(transparent)]
  Kube(#[from] kube::Error),

  #[error("{0}")]
  Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
  Generate,
  PreUpdate,
  PostUpdate,
}

impl fmt::Display for Hook {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Hook::Generate => "generate",
      Hook::PreUpdate => "pre-update",
      Hook::PostUpdate => "post-update",
    };
    f.write_str(name)
  }
}

/// A hook failure, tagged with the hook and platform that produced it.
#[derive(Debug, Error)]
#[error("{hook} hook of platform '{platform}' failed: {source}")]
pub struct LifecycleError {
  pub hook: Hook,
  pub platform: String,
  #[source]
  pub source: HookError,
}

/// A target environment with its own install customizations.
#[async_trait]
pub trait Platform: Send + Sync {
  /// Unique identifier, e.g. `gke+k8s-1.9`.
  fn name(&self) -> &str;

  fn description(&self) -> &str;

  /// Scaffold platform files on local disk. Runs before any cluster contact.
  fn generate(&self, _ctx: &GenerateContext) -> Result<(), HookError> {
    Ok(())
  }

  /// Transform the configuration before it is persisted and evaluated.
  fn pre_update(&self, config: PlatformConfig, _contact_email: &str) -> Result<PlatformConfig, HookError> {
    Ok(config)
  }

  /// Act on the cluster after a successful apply.
  async fn post_update(&self, _client: &Client) -> Result<(), HookError> {
    Ok(())
  }
}

/// The fixed set of platforms, built once at startup.
pub struct PlatformRegistry {
  platforms: Vec<Box<dyn Platform>>,
}

impl PlatformRegistry {
  pub fn new(platforms: Vec<Box<dyn Platform>>) -> Self {
    Self { platforms }
  }

  /// Look up a platform by exact name.
  pub fn find(&self, name: &str) -> Option<&dyn Platform> {
    self.platforms.iter().find(|p| p.name() == name).map(|p| p.as_ref())
  }

  /// Platforms in registration order.
  pub fn iter(&self) -> impl Iterator<Item = &dyn Platform> {
    self.platforms.iter().map(|p| p.as_ref())
  }

  pub fn names(&self) -> Vec<&str> {
    self.platforms.iter().map(|p| p.name()).collect()
  }
}

pub fn run_generate(platform: &dyn Platform, ctx: &GenerateContext) -> Result<(), LifecycleError> {
  debug!(platform = platform.name(), work_dir = %ctx.work_dir.display(), "running generate hook");
  platform.generate(ctx).map_err(|source| LifecycleError {
    hook: Hook::Generate,
    platform: platform.name().to_string(),
    source,
  })
}

pub fn run_pre_update(
  platform: &dyn Platform,
  config: PlatformConfig,
  contact_email: &str,
) -> Result<PlatformConfig, LifecycleError> {
  debug!(platform = platform.name(), "running pre-update hook");
  platform.pre_update(config, contact_email).map_err(|source| LifecycleError {
    hook: Hook::PreUpdate,
    platform: platform.name().to_string(),
    source,
  })
}

pub async fn run_post_update(platform: &dyn Platform, client: &Client) -> Result<(), LifecycleError> {
  debug!(platform = platform.name(), "running post-update hook");
  platform.post_update(client).await.map_err(|source| LifecycleError {
    hook: Hook::PostUpdate,
    platform: platform.name().to_string(),
    source,
  })?;
  info!(platform = platform.name(), "post-update complete");
  Ok(())
}
