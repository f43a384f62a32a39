//! Implementation of the `kubeprod init` command.
//!
//! Runs only the local half of an install: the platform scaffolds its files,
//! the root manifest is written and the configuration is persisted. Nothing
//! is sent to a cluster.

use anyhow::Result;
use owo_colors::OwoColorize;

use kubeprod_core::ExistingFile;

use crate::output::{print_detail, print_success};
use crate::target::Target;

/// Execute the init command.
///
/// # Errors
///
/// Returns an error if a scaffolded file already exists, if a setting the
/// platform requires is missing, or if the configuration cannot be written.
pub fn cmd_init(target: &Target) -> Result<()> {
  let registry = kubeprod_platform::registry();
  let prepared = target.prepare(&registry, ExistingFile::Fail)?;
  let ctx = &prepared.context;

  print_success(&format!("Initialized {}", prepared.platform));
  println!();
  print_detail("Root manifest:", &ctx.root_manifest_path().display().to_string());
  if ctx.overrides_path().exists() {
    print_detail("Overrides:", &ctx.overrides_path().display().to_string());
  }
  print_detail("Configuration:", &ctx.work_dir.join(&ctx.config_path).display().to_string());
  if !prepared.config.dns_zone.is_empty() {
    print_detail("DNS zone:", &prepared.config.dns_zone);
  }
  if !prepared.config.cluster.is_empty() {
    print_detail("Cluster:", &prepared.config.cluster);
  }
  println!();
  println!("{}", "Next steps:".bold());
  println!("  1. Review the configuration and overrides");
  println!("  2. Run: {}", format!("kubeprod install {}", target.family()).cyan());

  Ok(())
}
