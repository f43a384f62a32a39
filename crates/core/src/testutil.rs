//! Helpers shared by unit tests.

use kube::{Client, Config};

/// A client for hooks that never reach the network.
///
/// Must be built inside a tokio runtime.
pub fn offline_client() -> Client {
  let config = Config::new("http://127.0.0.1:9".parse().unwrap());
  Client::try_from(config).unwrap()
}
