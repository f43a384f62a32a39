//! The bundled manifest library, served under `internal:///`.

macro_rules! bundle {
  ($($path:literal),* $(,)?) => {
    &[$(($path, include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../manifests/", $path)))),*]
  };
}

static FILES: &[(&str, &str)] = bundle!(
  "lib/kube.lua",
  "components/cert-manager.lua",
  "components/external-dns.lua",
  "components/nginx-ingress.lua",
  "components/oauth2-proxy.lua",
  "platforms/base.lua",
  "platforms/aks.lua",
  "platforms/gke.lua",
  "platforms/minikube.lua",
  "platforms/aks+k8s-1.8.lua",
  "platforms/aks+k8s-1.9.lua",
  "platforms/gke+k8s-1.9.lua",
  "platforms/gke+k8s-1.10.lua",
  "platforms/minikube+k8s-1.8.lua",
  "platforms/minikube+k8s-1.9.lua",
);

/// Look up a bundled file by its absolute library path (`/lib/kube.lua`).
pub fn get(path: &str) -> Option<&'static str> {
  let path = path.trim_start_matches('/');
  FILES.iter().find(|(name, _)| *name == path).map(|(_, content)| *content)
}

/// Paths of every bundled file, relative to the library root.
pub fn paths() -> impl Iterator<Item = &'static str> {
  FILES.iter().map(|(name, _)| *name)
}
