//! Azure Kubernetes Service.

use kubeprod_core::{GenerateContext, HookError, Platform, PlatformConfig};
use tracing::debug;

use crate::templates;

/// Cluster name used when none is configured.
const DEFAULT_CLUSTER: &str = "aks";

pub struct Aks {
  name: String,
  description: String,
}

impl Aks {
  pub fn new(k8s_version: &str) -> Self {
    Self {
      name: crate::qualified_name("aks", k8s_version),
      description: format!("Azure Container Service (AKS) with Kubernetes {k8s_version}"),
    }
  }
}

impl Platform for Aks {
  fn name(&self) -> &str {
    &self.name
  }

  fn description(&self) -> &str {
    &self.description
  }

  fn generate(&self, ctx: &GenerateContext) -> Result<(), HookError> {
    templates::write_overrides(ctx, &self.description)?;
    Ok(())
  }

  fn pre_update(&self, mut config: PlatformConfig, contact_email: &str) -> Result<PlatformConfig, HookError> {
    crate::apply_contact_email(&mut config, contact_email)?;
    crate::require(&config.dns_zone, "dnsZone", "--dns-zone")?;

    let azure = config.azure.as_ref().ok_or(HookError::MissingSetting {
      setting: "azure.tenantId",
      flag: "--azure-tenant-id",
    })?;
    crate::require(&azure.tenant_id, "azure.tenantId", "--azure-tenant-id")?;
    crate::require(&azure.subscription_id, "azure.subscriptionId", "--azure-subscription-id")?;
    crate::require(&azure.resource_group, "azure.resourceGroup", "--azure-resource-group")?;

    if config.cluster.is_empty() {
      debug!(cluster = DEFAULT_CLUSTER, "no cluster name configured, using default");
      config.cluster = DEFAULT_CLUSTER.to_string();
    }
    Ok(config)
  }
}
