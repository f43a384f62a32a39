//! Every registered platform's bundled manifest evaluates to a valid object set.

use std::sync::Arc;

use kubeprod_core::{
  AzureConfig, ConfigStore, ExistingFile, GenerateContext, GoogleConfig, OauthProxyConfig, PlatformConfig, Reconciler,
  TypedObject, prepare,
};
use kubeprod_lua::{Location, UniversalImporter};
use tempfile::TempDir;

fn full_config() -> PlatformConfig {
  PlatformConfig {
    cluster: "test-cluster".to_string(),
    contact_email: "ops@example.com".to_string(),
    dns_zone: "example.com".to_string(),
    oauth_proxy: Some(OauthProxyConfig {
      client_id: "id".to_string(),
      client_secret: "secret".to_string(),
      authz_domain: "example.com".to_string(),
      google_groups: vec!["admins@example.com".to_string()],
      ..Default::default()
    }),
    google: Some(GoogleConfig {
      project: "my-project".to_string(),
    }),
    azure: Some(AzureConfig {
      tenant_id: "tenant".to_string(),
      subscription_id: "sub".to_string(),
      client_id: "app".to_string(),
      client_secret: "pw".to_string(),
      resource_group: "rg".to_string(),
    }),
  }
}

fn find<'a>(objects: &'a [TypedObject], kind: &str, name: &str) -> Option<&'a TypedObject> {
  objects
    .iter()
    .find(|o| o.gvk.kind == kind && o.name() == Some(name))
}

fn materialize(platform_name: &str) -> Vec<TypedObject> {
  materialize_with(platform_name, full_config(), "ops@example.com")
}

fn materialize_with(platform_name: &str, config: PlatformConfig, contact_email: &str) -> Vec<TypedObject> {
  let temp = TempDir::new().unwrap();
  let registry = kubeprod_platform::registry();
  let platform = registry.find(platform_name).unwrap();

  let ctx = GenerateContext {
    work_dir: temp.path().to_path_buf(),
    manifests: "internal:///".to_string(),
    config_path: "config.json".into(),
    platform: platform_name.to_string(),
    existing: ExistingFile::Fail,
  };
  let store = ConfigStore::new(temp.path().join("config.json"));
  prepare(&ctx, platform, &store, config, contact_email).unwrap();

  let reconciler = Reconciler::new(
    Location::File(ctx.root_manifest_path()),
    Arc::new(UniversalImporter::default()),
  );
  reconciler.materialize().unwrap()
}

#[test]
fn every_platform_materializes() {
  for platform in kubeprod_platform::registry().iter() {
    let objects = materialize(platform.name());

    assert!(find(&objects, "Namespace", "kubeprod").is_some(), "{}", platform.name());
    assert!(find(&objects, "Service", "nginx-ingress").is_some(), "{}", platform.name());
    assert!(find(&objects, "ClusterIssuer", "letsencrypt-prod").is_some(), "{}", platform.name());
    assert!(find(&objects, "Deployment", "oauth2-proxy").is_some(), "{}", platform.name());
  }
}

#[test]
fn gke_uses_google_dns_and_load_balancer() {
  let objects = materialize("gke+k8s-1.10");

  let service = find(&objects, "Service", "nginx-ingress").unwrap();
  assert_eq!(service.object.data["spec"]["type"], "LoadBalancer");

  let dns = find(&objects, "Deployment", "external-dns").unwrap();
  let args = &dns.object.data["spec"]["template"]["spec"]["containers"][0]["args"];
  let args: Vec<&str> = args.as_array().unwrap().iter().filter_map(|a| a.as_str()).collect();
  assert!(args.contains(&"--provider=google"));
  assert!(args.contains(&"--google-project=my-project"));
  assert!(args.contains(&"--domain-filter=example.com"));
}

#[test]
fn minikube_skips_external_dns() {
  let objects = materialize("minikube+k8s-1.9");

  assert!(find(&objects, "Deployment", "external-dns").is_none());
  let service = find(&objects, "Service", "nginx-ingress").unwrap();
  assert_eq!(service.object.data["spec"]["type"], "NodePort");
}

#[test]
fn aks_cert_manager_uses_contact_email() {
  let objects = materialize("aks+k8s-1.8");

  let issuer = find(&objects, "ClusterIssuer", "letsencrypt-prod").unwrap();
  assert_eq!(issuer.object.data["spec"]["acme"]["email"], "ops@example.com");
  assert_eq!(issuer.gvk.group, "cert-manager.io");
}

#[test]
fn minikube_issuer_gets_email_from_command_line() {
  let objects = materialize_with("minikube+k8s-1.9", PlatformConfig::default(), "dev@example.com");

  let issuer = find(&objects, "ClusterIssuer", "letsencrypt-prod").unwrap();
  assert_eq!(issuer.object.data["spec"]["acme"]["email"], "dev@example.com");
}
