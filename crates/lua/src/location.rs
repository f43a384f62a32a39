//! Manifest locations.
//!
//! A location names a manifest file either inside the bundled library
//! (`internal:///lib/kube.lua`) or on the local filesystem. Plain paths and
//! `file://` references both resolve to filesystem locations.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Scheme prefix for the bundled manifest library.
pub const INTERNAL_SCHEME: &str = "internal://";

const FILE_SCHEME: &str = "file://";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocationError {
  #[error("unsupported location '{0}': only internal:// and file:// locations can be read")]
  UnsupportedScheme(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
  /// A file in the bundled library. Always an absolute, normalized,
  /// slash-separated path.
  Internal(String),
  /// A file on the local filesystem.
  File(PathBuf),
}

impl Location {
  /// The root of the bundled library, `internal:///`.
  pub fn internal_root() -> Self {
    Location::Internal("/".to_string())
  }

  /// Parse a location reference.
  ///
  /// Anything without a scheme is taken as a filesystem path.
  pub fn parse(s: &str) -> Result<Self, LocationError> {
    if let Some(rest) = s.strip_prefix(INTERNAL_SCHEME) {
      return Ok(Location::Internal(normalize_internal(rest)));
    }
    if let Some(rest) = s.strip_prefix(FILE_SCHEME) {
      return Ok(Location::File(normalize_path(Path::new(rest))));
    }
    if s.contains("://") {
      return Err(LocationError::UnsupportedScheme(s.to_string()));
    }
    Ok(Location::File(normalize_path(Path::new(s))))
  }

  /// Resolve `reference` against this location, treated as a directory.
  ///
  /// References carrying a scheme or an absolute path ignore the base.
  pub fn join(&self, reference: &str) -> Result<Self, LocationError> {
    if reference.contains("://") {
      return Location::parse(reference);
    }
    Ok(match self {
      Location::Internal(dir) => {
        if reference.starts_with('/') {
          Location::Internal(normalize_internal(reference))
        } else {
          Location::Internal(normalize_internal(&format!("{dir}/{reference}")))
        }
      }
      Location::File(dir) => {
        let path = Path::new(reference);
        if path.is_absolute() {
          Location::File(normalize_path(path))
        } else {
          Location::File(normalize_path(&dir.join(path)))
        }
      }
    })
  }

  /// The directory containing this location.
  pub fn dir(&self) -> Self {
    match self {
      Location::Internal(path) => {
        let parent = match path.rfind('/') {
          Some(0) | None => "/",
          Some(idx) => &path[..idx],
        };
        Location::Internal(parent.to_string())
      }
      Location::File(path) => Location::File(path.parent().map(Path::to_path_buf).unwrap_or_default()),
    }
  }

  /// File extension of the final path component, if any.
  pub fn extension(&self) -> Option<&str> {
    match self {
      Location::Internal(path) => {
        let name = path.rsplit('/').next().unwrap_or(path);
        name.rsplit_once('.').map(|(_, ext)| ext).filter(|ext| !ext.is_empty())
      }
      Location::File(path) => path.extension().and_then(|ext| ext.to_str()),
    }
  }
}

impl fmt::Display for Location {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Location::Internal(path) => write!(f, "{INTERNAL_SCHEME}{path}"),
      Location::File(path) => write!(f, "{}", path.display()),
    }
  }
}

fn normalize_internal(path: &str) -> String {
  let mut parts: Vec<&str> = Vec::new();
  for part in path.split('/') {
    match part {
      "" | "." => {}
      ".." => {
        parts.pop();
      }
      other => parts.push(other),
    }
  }
  format!("/{}", parts.join("/"))
}

/// Lexical normalization; does not touch the filesystem.
fn normalize_path(path: &Path) -> PathBuf {
  let mut out = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        let popped = matches!(out.components().next_back(), Some(Component::Normal(_))) && out.pop();
        if !popped && !out.has_root() {
          out.push("..");
        }
      }
      other => out.push(other.as_os_str()),
    }
  }
  out
}
