//! Import resolution.
//!
//! An import is resolved first against the directory of the importing file,
//! then against each search location in order. The first location that
//! yields content wins.

use std::fs;
use std::io;

use thiserror::Error;
use tracing::trace;

use crate::library;
use crate::location::{Location, LocationError};

/// Content fetched for an import, with the location it was found at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contents {
  pub found_here: Location,
  pub content: String,
}

#[derive(Debug, Error)]
pub enum ImportError {
  #[error("couldn't open import \"{path}\" (tried: {})", tried.join(", "))]
  NotFound { path: String, tried: Vec<String> },

  #[error("failed to read {location}: {source}")]
  Read {
    location: String,
    #[source]
    source: io::Error,
  },

  #[error(transparent)]
  Location(#[from] LocationError),
}

/// Resolves import paths to file contents.
pub trait Importer: Send + Sync {
  /// Resolve `path` as imported from a file in `importing_dir`.
  fn import(&self, importing_dir: &Location, path: &str) -> Result<Contents, ImportError>;
}

/// Importer that reads both bundled and filesystem locations.
#[derive(Debug, Clone)]
pub struct UniversalImporter {
  search: Vec<Location>,
}

impl UniversalImporter {
  pub fn new(search: Vec<Location>) -> Self {
    Self { search }
  }

  /// Returns `Ok(None)` when nothing exists at `location`.
  fn fetch(&self, location: &Location) -> Result<Option<String>, ImportError> {
    match location {
      Location::Internal(path) => Ok(library::get(path).map(str::to_string)),
      Location::File(path) => match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ImportError::Read {
          location: location.to_string(),
          source,
        }),
      },
    }
  }
}

impl Default for UniversalImporter {
  fn default() -> Self {
    Self::new(vec![Location::internal_root()])
  }
}

impl Importer for UniversalImporter {
  fn import(&self, importing_dir: &Location, path: &str) -> Result<Contents, ImportError> {
    let mut tried: Vec<String> = Vec::new();

    for base in std::iter::once(importing_dir).chain(self.search.iter()) {
      let location = base.join(path)?;
      let shown = location.to_string();
      if tried.contains(&shown) {
        continue;
      }

      trace!(location = %shown, "trying import");
      if let Some(content) = self.fetch(&location)? {
        return Ok(Contents {
          found_here: location,
          content,
        });
      }
      tried.push(shown);
    }

    Err(ImportError::NotFound {
      path: path.to_string(),
      tried,
    })
  }
}
