//! Supported installation targets for kubeprod
//!
//! Each platform pairs a cluster flavour with a Kubernetes version:
//! - Azure Kubernetes Service (`aks+k8s-*`)
//! - Google Kubernetes Engine (`gke+k8s-*`)
//! - minikube (`minikube+k8s-*`)

mod aks;
mod gke;
mod minikube;
mod templates;

pub use aks::Aks;
pub use gke::Gke;
pub use minikube::Minikube;

use kubeprod_core::{HookError, PlatformConfig, PlatformRegistry};

/// Platform identifier for a cluster flavour and Kubernetes version.
pub fn qualified_name(family: &str, k8s_version: &str) -> String {
  format!("{family}+k8s-{k8s_version}")
}

/// Fail with a pointer to the flag when a required setting is empty.
pub(crate) fn require(value: &str, setting: &'static str, flag: &'static str) -> Result<(), HookError> {
  if value.trim().is_empty() {
    return Err(HookError::MissingSetting { setting, flag });
  }
  Ok(())
}

/// Record the contact email given on the command line, if any.
pub(crate) fn apply_contact_email(config: &mut PlatformConfig, contact_email: &str) -> Result<(), HookError> {
  if !contact_email.is_empty() {
    config.contact_email = contact_email.to_string();
  }
  require(&config.contact_email, "contactEmail", "--email")
}

/// The registry of every supported platform.
pub fn registry() -> PlatformRegistry {
  PlatformRegistry::new(vec![
    Box::new(Aks::new("1.8")),
    Box::new(Aks::new("1.9")),
    Box::new(Gke::new("1.9")),
    Box::new(Gke::new("1.10")),
    Box::new(Minikube::new("1.8")),
    Box::new(Minikube::new("1.9")),
  ])
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn registry_lists_every_platform_in_order() {
    assert_eq!(
      registry().names(),
      vec![
        "aks+k8s-1.8",
        "aks+k8s-1.9",
        "gke+k8s-1.9",
        "gke+k8s-1.10",
        "minikube+k8s-1.8",
        "minikube+k8s-1.9",
      ]
    );
  }

  #[test]
  fn every_platform_has_a_bundled_manifest() {
    for platform in registry().iter() {
      let path = format!("/platforms/{}.lua", platform.name());
      assert!(kubeprod_lua::library::get(&path).is_some(), "missing {path}");
    }
  }

  #[test]
  fn qualified_names_match_registry() {
    let registry = registry();
    assert!(registry.find(&qualified_name("gke", "1.10")).is_some());
    assert!(registry.find(&qualified_name("gke", "1.7")).is_none());
  }
}
