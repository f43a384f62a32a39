//! Local preparation run before the cluster is contacted.
//!
//! Order matters: the generate hook may create the overrides file that the
//! root manifest imports, and the configuration is persisted before any
//! evaluation so an operator can re-run after a cluster failure without
//! re-entering settings.

use thiserror::Error;
use tracing::info;

use crate::config::{ConfigError, ConfigStore, PlatformConfig};
use crate::platform::{self, GenerateContext, LifecycleError, Platform};
use crate::scaffold::{self, ScaffoldError};

#[derive(Debug, Error)]
pub enum InstallError {
  #[error(transparent)]
  Lifecycle(#[from] LifecycleError),

  #[error("failed to write root manifest: {0}")]
  Scaffold(#[from] ScaffoldError),

  #[error(transparent)]
  Config(#[from] ConfigError),
}

/// Run generate, write the root manifest, run pre-update, persist.
///
/// A non-empty `contact_email` is recorded in the configuration even when the
/// platform has no pre-update hook. Returns the configuration as persisted.
pub fn prepare(
  ctx: &GenerateContext,
  platform: &dyn Platform,
  store: &ConfigStore,
  mut config: PlatformConfig,
  contact_email: &str,
) -> Result<PlatformConfig, InstallError> {
  platform::run_generate(platform, ctx)?;
  let root = scaffold::write_root_manifest(ctx)?;
  if !contact_email.is_empty() {
    config.contact_email = contact_email.to_string();
  }
  let config = platform::run_pre_update(platform, config, contact_email)?;
  store.write(&config)?;

  info!(
    platform = platform.name(),
    root = %root.display(),
    config = %store.path().display(),
    "prepared installation"
  );
  Ok(config)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::platform::HookError;
  use crate::scaffold::{ExistingFile, OVERRIDES_FILE};
  use std::fs;
  use std::path::PathBuf;
  use tempfile::TempDir;

  /// Writes an overrides file and stamps the contact email.
  struct Stamping;

  impl Platform for Stamping {
    fn name(&self) -> &str {
      "stamping"
    }

    fn description(&self) -> &str {
      "test platform"
    }

    fn generate(&self, ctx: &GenerateContext) -> Result<(), HookError> {
      scaffold::write_file(&ctx.overrides_path(), "return function(m, c) return m end\n", ctx.existing)?;
      Ok(())
    }

    fn pre_update(&self, mut config: PlatformConfig, contact_email: &str) -> Result<PlatformConfig, HookError> {
      config.contact_email = contact_email.to_string();
      Ok(config)
    }
  }

  fn context(dir: &TempDir, existing: ExistingFile) -> GenerateContext {
    GenerateContext {
      work_dir: dir.path().to_path_buf(),
      manifests: "internal:///".to_string(),
      config_path: PathBuf::from("config.json"),
      platform: "stamping".to_string(),
      existing,
    }
  }

  #[test]
  fn prepare_generates_then_persists_hook_output() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp, ExistingFile::Fail);
    let store = ConfigStore::new(temp.path().join("config.json"));

    let config = prepare(&ctx, &Stamping, &store, PlatformConfig::default(), "ops@example.com").unwrap();

    assert_eq!(config.contact_email, "ops@example.com");
    assert_eq!(store.read::<PlatformConfig>().unwrap(), config);
    let root = fs::read_to_string(ctx.root_manifest_path()).unwrap();
    assert!(root.contains(OVERRIDES_FILE));
  }

  struct Hookless;

  impl Platform for Hookless {
    fn name(&self) -> &str {
      "hookless"
    }

    fn description(&self) -> &str {
      "no hooks"
    }
  }

  #[test]
  fn contact_email_persisted_without_pre_update_hook() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp, ExistingFile::Fail);
    let store = ConfigStore::new(temp.path().join("config.json"));

    let config = prepare(&ctx, &Hookless, &store, PlatformConfig::default(), "ops@example.com").unwrap();
    assert_eq!(config.contact_email, "ops@example.com");

    let kept = prepare(&ctx, &Hookless, &store, config, "").unwrap();
    assert_eq!(store.read::<PlatformConfig>().unwrap().contact_email, "ops@example.com");
    assert_eq!(kept.contact_email, "ops@example.com");
  }

  #[test]
  fn generate_failure_stops_before_persisting() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp, ExistingFile::Fail);
    let store = ConfigStore::new(temp.path().join("config.json"));
    fs::write(ctx.overrides_path(), "-- edited").unwrap();

    let err = prepare(&ctx, &Stamping, &store, PlatformConfig::default(), "ops@example.com").unwrap_err();

    assert!(matches!(err, InstallError::Lifecycle(_)));
    assert!(!store.path().exists());
    assert!(!ctx.root_manifest_path().exists());
  }

  #[test]
  fn keep_policy_allows_rerun() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp, ExistingFile::Keep);
    let store = ConfigStore::new(temp.path().join("config.json"));
    fs::write(ctx.overrides_path(), "-- edited").unwrap();

    prepare(&ctx, &Stamping, &store, PlatformConfig::default(), "a@example.com").unwrap();
    prepare(&ctx, &Stamping, &store, PlatformConfig::default(), "b@example.com").unwrap();

    assert_eq!(fs::read_to_string(ctx.overrides_path()).unwrap(), "-- edited");
    assert_eq!(store.read::<PlatformConfig>().unwrap().contact_email, "b@example.com");
  }
}
