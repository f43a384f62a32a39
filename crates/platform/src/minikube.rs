//! Local minikube clusters. No hooks: the defaults cover everything.

use kubeprod_core::Platform;

pub struct Minikube {
  name: String,
  description: String,
}

impl Minikube {
  pub fn new(k8s_version: &str) -> Self {
    Self {
      name: crate::qualified_name("minikube", k8s_version),
      description: format!("minikube with Kubernetes {k8s_version}"),
    }
  }
}

impl Platform for Minikube {
  fn name(&self) -> &str {
    &self.name
  }

  fn description(&self) -> &str {
    &self.description
  }
}
