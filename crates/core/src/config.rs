//! Platform configuration and its on-disk store.
//!
//! The configuration is persisted as `config.json` next to the root manifest,
//! which imports it as its parameter file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Default file name for the persisted configuration.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse {}: {source}", path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to serialize configuration: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("failed to write {}: {source}", path.display())]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Settings for one cluster installation.
///
/// Unknown keys in the file are dropped when the configuration is rewritten.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlatformConfig {
  pub cluster: String,
  pub contact_email: String,
  pub dns_zone: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub oauth_proxy: Option<OauthProxyConfig>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub google: Option<GoogleConfig>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub azure: Option<AzureConfig>,
}

/// oauth2_proxy settings; the proxy is only deployed when this is present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OauthProxyConfig {
  pub client_id: String,
  pub client_secret: String,
  pub cookie_secret: String,
  pub authz_domain: String,
  pub google_groups: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GoogleConfig {
  pub project: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AzureConfig {
  pub tenant_id: String,
  pub subscription_id: String,
  pub client_id: String,
  pub client_secret: String,
  pub resource_group: String,
}

/// Reads and writes a configuration document at a fixed path.
#[derive(Debug, Clone)]
pub struct ConfigStore {
  path: PathBuf,
}

impl ConfigStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Load the configuration.
  ///
  /// A missing file is a first run and yields `T::default()`.
  pub fn read<T: DeserializeOwned + Default>(&self) -> Result<T, ConfigError> {
    let content = match fs::read_to_string(&self.path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        debug!(path = %self.path.display(), "no saved configuration, starting from defaults");
        return Ok(T::default());
      }
      Err(source) => {
        return Err(ConfigError::Read {
          path: self.path.clone(),
          source,
        });
      }
    };

    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
      path: self.path.clone(),
      source,
    })
  }

  /// Persist the configuration as indented JSON.
  ///
  /// The file is written to a sibling temp file first and renamed into place.
  pub fn write<T: Serialize>(&self, config: &T) -> Result<(), ConfigError> {
    let mut content = serde_json::to_string_pretty(config).map_err(ConfigError::Serialize)?;
    content.push('\n');

    let write_err = |source| ConfigError::Write {
      path: self.path.clone(),
      source,
    };

    if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
      fs::create_dir_all(parent).map_err(write_err)?;
    }

    let mut temp_name = self.path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = self.path.with_file_name(temp_name);

    fs::write(&temp_path, content).map_err(write_err)?;
    fs::rename(&temp_path, &self.path).map_err(write_err)?;

    info!(path = %self.path.display(), "saved configuration");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn full_config() -> PlatformConfig {
    PlatformConfig {
      cluster: "prod-eu".to_string(),
      contact_email: "ops@example.com".to_string(),
      dns_zone: "example.com".to_string(),
      oauth_proxy: Some(OauthProxyConfig {
        client_id: "client".to_string(),
        client_secret: "s3cret".to_string(),
        cookie_secret: "Y29va2llc2VjcmV0MTIzNA==".to_string(),
        authz_domain: "example.com".to_string(),
        google_groups: vec!["admins@example.com".to_string(), "devs@example.com".to_string()],
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

  #[test]
  fn missing_file_reads_as_default() {
    let temp = TempDir::new().unwrap();
    let store = ConfigStore::new(temp.path().join("config.json"));

    let config: PlatformConfig = store.read().unwrap();
    assert_eq!(config, PlatformConfig::default());
  }

  #[test]
  fn write_then_read_round_trips_every_field() {
    let temp = TempDir::new().unwrap();
    let store = ConfigStore::new(temp.path().join("config.json"));
    let config = full_config();

    store.write(&config).unwrap();
    let loaded: PlatformConfig = store.read().unwrap();

    assert_eq!(loaded, config);
  }

  #[test]
  fn first_run_then_modified_config_round_trips() {
    let temp = TempDir::new().unwrap();
    let store = ConfigStore::new(temp.path().join("nested/config.json"));

    let mut config: PlatformConfig = store.read().unwrap();
    config.contact_email = "me@example.com".to_string();
    config.dns_zone = "k8s.example.com".to_string();
    store.write(&config).unwrap();

    let loaded: PlatformConfig = store.read().unwrap();
    assert_eq!(loaded, config);
    assert!(!temp.path().join("nested/config.json.tmp").exists());
  }

  #[test]
  fn written_file_uses_camel_case_and_indentation() {
    let temp = TempDir::new().unwrap();
    let store = ConfigStore::new(temp.path().join("config.json"));
    store.write(&full_config()).unwrap();

    let content = fs::read_to_string(store.path()).unwrap();
    assert!(content.contains("\n  \"contactEmail\": \"ops@example.com\""));
    assert!(content.contains("\"googleGroups\""));
    assert!(content.ends_with("}\n"));
  }

  #[test]
  fn absent_sections_are_omitted() {
    let temp = TempDir::new().unwrap();
    let store = ConfigStore::new(temp.path().join("config.json"));
    store.write(&PlatformConfig::default()).unwrap();

    let content = fs::read_to_string(store.path()).unwrap();
    assert!(!content.contains("oauthProxy"));
    assert!(content.contains("\"dnsZone\": \"\""));
  }

  #[test]
  fn malformed_file_is_parse_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.json");
    fs::write(&path, "{ not json").unwrap();

    let err = ConfigStore::new(&path).read::<PlatformConfig>().unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("config.json"));
  }

  #[test]
  fn partial_file_fills_defaults() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.json");
    fs::write(&path, r#"{ "dnsZone": "example.org", "unknownKey": 1 }"#).unwrap();

    let config: PlatformConfig = ConfigStore::new(&path).read().unwrap();
    assert_eq!(config.dns_zone, "example.org");
    assert_eq!(config.cluster, "");
    assert!(config.google.is_none());
  }
}
