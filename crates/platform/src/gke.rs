//! Google Kubernetes Engine.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use k8s_openapi::api::core::v1::Service;
use kube::{Api, Client};
use kubeprod_core::{GenerateContext, HookError, Platform, PlatformConfig};
use rand::RngCore;
use tracing::{info, warn};

use crate::templates;

/// Namespace and name of the ingress controller's load balancer.
const INGRESS_NAMESPACE: &str = "kubeprod";
const INGRESS_SERVICE: &str = "nginx-ingress";

const COOKIE_SECRET_BYTES: usize = 16;

pub struct Gke {
  name: String,
  description: String,
}

impl Gke {
  pub fn new(k8s_version: &str) -> Self {
    Self {
      name: crate::qualified_name("gke", k8s_version),
      description: format!("Google Kubernetes Engine (GKE) with Kubernetes {k8s_version}"),
    }
  }
}

#[async_trait]
impl Platform for Gke {
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

    let project = config.google.as_ref().map(|g| g.project.as_str()).unwrap_or_default();
    crate::require(project, "google.project", "--project")?;

    if let Some(oauth) = config.oauth_proxy.as_mut() {
      if oauth.cookie_secret.is_empty() {
        info!("generating oauth2-proxy cookie secret");
        oauth.cookie_secret = cookie_secret();
      }
    }
    Ok(config)
  }

  async fn post_update(&self, client: &Client) -> Result<(), HookError> {
    let services: Api<Service> = Api::namespaced(client.clone(), INGRESS_NAMESPACE);
    let service = services.get(INGRESS_SERVICE).await?;

    match load_balancer_address(&service) {
      Some(address) => info!(
        address = %address,
        "ingress load balancer is ready; delegate the DNS zone to Google Cloud DNS if not done yet"
      ),
      None => warn!(
        service = INGRESS_SERVICE,
        namespace = INGRESS_NAMESPACE,
        "ingress load balancer address is still pending"
      ),
    }
    Ok(())
  }
}

fn cookie_secret() -> String {
  let mut bytes = [0u8; COOKIE_SECRET_BYTES];
  rand::thread_rng().fill_bytes(&mut bytes);
  STANDARD.encode(bytes)
}

/// External IP or hostname of a LoadBalancer Service, once assigned.
fn load_balancer_address(service: &Service) -> Option<String> {
  service
    .status
    .as_ref()?
    .load_balancer
    .as_ref()?
    .ingress
    .as_ref()?
    .iter()
    .find_map(|ingress| ingress.ip.clone().or_else(|| ingress.hostname.clone()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use kubeprod_core::platform::run_post_update;
  use kubeprod_core::{GoogleConfig, Hook, OauthProxyConfig};

  fn gke_config() -> PlatformConfig {
    PlatformConfig {
      dns_zone: "example.com".to_string(),
      google: Some(GoogleConfig {
        project: "my-project".to_string(),
      }),
      oauth_proxy: Some(OauthProxyConfig {
        client_id: "id".to_string(),
        client_secret: "secret".to_string(),
        ..Default::default()
      }),
      ..Default::default()
    }
  }

  #[test]
  fn pre_update_generates_cookie_secret_once() {
    let platform = Gke::new("1.10");
    let first = platform.pre_update(gke_config(), "ops@example.com").unwrap();
    let secret = first.oauth_proxy.as_ref().unwrap().cookie_secret.clone();

    assert_eq!(secret.len(), 24);
    assert_eq!(STANDARD.decode(&secret).unwrap().len(), COOKIE_SECRET_BYTES);

    let second = platform.pre_update(first, "").unwrap();
    assert_eq!(second.oauth_proxy.unwrap().cookie_secret, secret);
  }

  #[test]
  fn pre_update_requires_project_and_email() {
    let platform = Gke::new("1.9");

    let mut no_project = gke_config();
    no_project.google = None;
    let err = platform.pre_update(no_project, "ops@example.com").unwrap_err();
    assert!(err.to_string().contains("--project"));

    let err = platform.pre_update(gke_config(), "").unwrap_err();
    assert!(matches!(err, HookError::MissingSetting { setting: "contactEmail", .. }));
  }

  #[test]
  fn pre_update_without_oauth_leaves_it_absent() {
    let mut config = gke_config();
    config.oauth_proxy = None;
    let config = Gke::new("1.9").pre_update(config, "ops@example.com").unwrap();
    assert!(config.oauth_proxy.is_none());
  }

  #[tokio::test]
  async fn post_update_reports_unreachable_cluster() {
    let config = kube::Config::new("http://127.0.0.1:9".parse().unwrap());
    let client = Client::try_from(config).unwrap();

    let err = run_post_update(&Gke::new("1.10"), &client).await.unwrap_err();
    assert_eq!(err.hook, Hook::PostUpdate);
    assert_eq!(err.platform, "gke+k8s-1.10");
    assert!(matches!(err.source, HookError::Kube(_)));
  }

  #[test]
  fn load_balancer_address_prefers_ip() {
    let ready: Service = serde_json::from_value(serde_json::json!({
      "metadata": { "name": "nginx-ingress" },
      "status": { "loadBalancer": { "ingress": [{ "ip": "203.0.113.7" }] } }
    }))
    .unwrap();
    let hostname: Service = serde_json::from_value(serde_json::json!({
      "metadata": { "name": "nginx-ingress" },
      "status": { "loadBalancer": { "ingress": [{ "hostname": "lb.example.com" }] } }
    }))
    .unwrap();
    let pending: Service = serde_json::from_value(serde_json::json!({
      "metadata": { "name": "nginx-ingress" },
      "status": { "loadBalancer": {} }
    }))
    .unwrap();

    assert_eq!(load_balancer_address(&ready).as_deref(), Some("203.0.113.7"));
    assert_eq!(load_balancer_address(&hostname).as_deref(), Some("lb.example.com"));
    assert_eq!(load_balancer_address(&pending), None);
  }
}
