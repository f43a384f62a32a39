//! Per-platform command-line flags and the local preparation they drive.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use kubeprod_core::config::DEFAULT_CONFIG_FILE;
use kubeprod_core::{ConfigStore, ExistingFile, GenerateContext, PlatformConfig, PlatformRegistry};

#[derive(Debug, Subcommand)]
pub enum Target {
  /// Azure Kubernetes Service
  Aks {
    #[command(flatten)]
    common: CommonArgs,
    #[command(flatten)]
    azure: AzureArgs,
  },

  /// Google Kubernetes Engine
  Gke {
    #[command(flatten)]
    common: CommonArgs,
    #[command(flatten)]
    google: GoogleArgs,
  },

  /// Local minikube cluster
  Minikube {
    #[command(flatten)]
    common: CommonArgs,
  },
}

#[derive(Debug, Args)]
pub struct CommonArgs {
  /// Kubernetes version of the target cluster
  #[arg(long)]
  pub k8s_version: Option<String>,

  /// Contact email for certificate registration
  #[arg(long, env = "EMAIL")]
  pub email: Option<String>,

  /// DNS zone managed by the runtime
  #[arg(long)]
  pub dns_zone: Option<String>,

  /// Cluster name
  #[arg(long)]
  pub cluster: Option<String>,

  /// Path of the persisted configuration
  #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
  pub config: PathBuf,

  /// Base location of the manifest library (internal:/// or a directory)
  #[arg(long, env = "KUBEPROD_MANIFESTS", default_value = "internal:///")]
  pub manifests: String,

  /// kubeconfig context to use instead of the current one
  #[arg(long)]
  pub context: Option<String>,
}

#[derive(Debug, Args)]
pub struct GoogleArgs {
  /// Google Cloud project hosting the cluster
  #[arg(long)]
  pub project: Option<String>,

  /// OAuth client ID for the authenticating proxy
  #[arg(long)]
  pub oauth_client_id: Option<String>,

  /// OAuth client secret for the authenticating proxy
  #[arg(long)]
  pub oauth_client_secret: Option<String>,

  /// Google groups allowed through the proxy (comma separated)
  #[arg(long, value_delimiter = ',')]
  pub oauth_google_groups: Vec<String>,

  /// Email domain allowed through the proxy
  #[arg(long)]
  pub oauth_authz_domain: Option<String>,
}

#[derive(Debug, Args)]
pub struct AzureArgs {
  #[arg(long)]
  pub azure_tenant_id: Option<String>,

  #[arg(long)]
  pub azure_subscription_id: Option<String>,

  #[arg(long)]
  pub azure_client_id: Option<String>,

  #[arg(long)]
  pub azure_client_secret: Option<String>,

  #[arg(long)]
  pub azure_resource_group: Option<String>,
}

/// Outcome of the local preparation phase.
pub struct Prepared {
  pub platform: String,
  pub context: GenerateContext,
  pub config: PlatformConfig,
}

impl Target {
  pub fn family(&self) -> &'static str {
    match self {
      Target::Aks { .. } => "aks",
      Target::Gke { .. } => "gke",
      Target::Minikube { .. } => "minikube",
    }
  }

  fn default_k8s_version(&self) -> &'static str {
    match self {
      Target::Gke { .. } => "1.10",
      Target::Aks { .. } | Target::Minikube { .. } => "1.9",
    }
  }

  pub fn common(&self) -> &CommonArgs {
    match self {
      Target::Aks { common, .. } | Target::Gke { common, .. } | Target::Minikube { common } => common,
    }
  }

  pub fn platform_name(&self) -> String {
    let version = self.common().k8s_version.as_deref().unwrap_or(self.default_k8s_version());
    kubeprod_platform::qualified_name(self.family(), version)
  }

  /// Merge flags given on the command line over a persisted configuration.
  pub fn apply_flags(&self, config: &mut PlatformConfig) {
    let common = self.common();
    set(&mut config.contact_email, &common.email);
    set(&mut config.dns_zone, &common.dns_zone);
    set(&mut config.cluster, &common.cluster);

    match self {
      Target::Gke { google, .. } => {
        if let Some(project) = &google.project {
          config.google.get_or_insert_default().project = project.clone();
        }
        let wants_proxy = google.oauth_client_id.is_some()
          || google.oauth_client_secret.is_some()
          || google.oauth_authz_domain.is_some()
          || !google.oauth_google_groups.is_empty();
        if wants_proxy {
          let proxy = config.oauth_proxy.get_or_insert_default();
          set(&mut proxy.client_id, &google.oauth_client_id);
          set(&mut proxy.client_secret, &google.oauth_client_secret);
          set(&mut proxy.authz_domain, &google.oauth_authz_domain);
          if !google.oauth_google_groups.is_empty() {
            proxy.google_groups = google.oauth_google_groups.clone();
          }
        }
      }
      Target::Aks { azure, .. } => {
        let fields = [
          &azure.azure_tenant_id,
          &azure.azure_subscription_id,
          &azure.azure_client_id,
          &azure.azure_client_secret,
          &azure.azure_resource_group,
        ];
        if fields.iter().any(|f| f.is_some()) {
          let settings = config.azure.get_or_insert_default();
          set(&mut settings.tenant_id, &azure.azure_tenant_id);
          set(&mut settings.subscription_id, &azure.azure_subscription_id);
          set(&mut settings.client_id, &azure.azure_client_id);
          set(&mut settings.client_secret, &azure.azure_client_secret);
          set(&mut settings.resource_group, &azure.azure_resource_group);
        }
      }
      Target::Minikube { .. } => {}
    }
  }

  /// Scaffold files and persist the configuration for this target.
  pub fn prepare(&self, registry: &PlatformRegistry, existing: ExistingFile) -> Result<Prepared> {
    let name = self.platform_name();
    let platform = registry.find(&name).with_context(|| {
      format!(
        "unsupported platform '{name}' (supported: {})",
        registry.names().join(", ")
      )
    })?;

    let common = self.common();
    let work_dir = std::env::current_dir().context("Failed to determine working directory")?;
    let store = ConfigStore::new(work_dir.join(&common.config));
    let mut config: PlatformConfig = store.read().context("Failed to load configuration")?;
    self.apply_flags(&mut config);

    let context = GenerateContext {
      work_dir,
      manifests: common.manifests.clone(),
      config_path: common.config.clone(),
      platform: name.clone(),
      existing,
    };

    let email = common.email.as_deref().unwrap_or_default();
    let config = kubeprod_core::prepare(&context, platform, &store, config, email)?;

    Ok(Prepared {
      platform: name,
      context,
      config,
    })
  }
}

fn set(field: &mut String, value: &Option<String>) {
  if let Some(value) = value {
    *field = value.clone();
  }
}
