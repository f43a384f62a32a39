//! Implementation of the `kubeprod install` command.

use std::sync::Arc;

use anyhow::{Context, Result};
use kube::config::{Config, KubeConfigOptions};
use kube::Client;
use owo_colors::OwoColorize;
use tracing::debug;

use kubeprod_core::{ExistingFile, KubeEngine, Reconciler, RunReport, Severity};
use kubeprod_lua::{Location, UniversalImporter};

use crate::output::{print_detail, print_step, print_success, print_warning};
use crate::target::Target;

/// Execute the install command.
///
/// Local preparation (scaffolding, configuration) always completes before the
/// cluster is contacted, so a failed apply can be retried with the persisted
/// settings.
///
/// # Errors
///
/// Returns an error if preparation fails, the cluster is unreachable, or any
/// stage of the reconcile run fails.
pub fn cmd_install(target: &Target) -> Result<()> {
  let registry = kubeprod_platform::registry();
  let prepared = target.prepare(&registry, ExistingFile::Keep)?;
  let platform = registry
    .find(&prepared.platform)
    .with_context(|| format!("unsupported platform '{}'", prepared.platform))?;

  print_step(&format!("Installing {}", prepared.platform));

  let common = target.common();
  let importer = UniversalImporter::new(search_roots(&common.manifests)?);
  let reconciler = Reconciler::new(
    Location::File(prepared.context.root_manifest_path()),
    Arc::new(importer),
  );

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = rt.block_on(async {
    let client = connect(common.context.as_deref()).await?;
    let engine = KubeEngine::new(client.clone());
    match reconciler.run(&engine, platform, &client).await {
      Ok(report) => Ok(report),
      Err(err) => {
        let stage = err.failed_after();
        Err(anyhow::Error::new(err).context(format!("Install failed after stage '{stage}'")))
      }
    }
  })?;

  print_report(&report);
  Ok(())
}

/// Import search path: the manifest library base, then the bundled library.
fn search_roots(manifests: &str) -> Result<Vec<Location>> {
  let base = Location::parse(manifests).with_context(|| format!("Invalid manifest location '{manifests}'"))?;
  let internal = Location::internal_root();
  if base == internal {
    return Ok(vec![internal]);
  }
  Ok(vec![base, internal])
}

async fn connect(context: Option<&str>) -> Result<Client> {
  let config = match context {
    Some(name) => {
      debug!(context = name, "loading kubeconfig context");
      let options = KubeConfigOptions {
        context: Some(name.to_string()),
        ..Default::default()
      };
      Config::from_kubeconfig(&options)
        .await
        .with_context(|| format!("Failed to load kubeconfig context '{name}'"))?
    }
    None => Config::infer().await.context("Failed to load cluster configuration")?,
  };
  Client::try_from(config).context("Failed to create Kubernetes client")
}

fn print_report(report: &RunReport) {
  for diagnostic in &report.diagnostics {
    if diagnostic.severity == Severity::Warning {
      print_warning(&diagnostic.to_string());
    }
  }

  print_success("Install complete");
  println!();
  print_detail("Objects:", &report.objects.to_string());
  print_detail("Applied:", &report.summary.applied.to_string().green().to_string());
  if report.summary.skipped > 0 {
    print_detail("Skipped:", &report.summary.skipped.to_string());
  }
  print_detail("Pruned:", &report.summary.pruned.to_string());
}
