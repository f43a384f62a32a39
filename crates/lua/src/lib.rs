//! kubeprod-lua: manifest evaluation for kubeprod
//!
//! Cluster manifests are Lua files that evaluate to plain data. This crate
//! provides:
//! - Locations: `internal:///` paths into the bundled library, or local files
//! - Importers: resolve an import relative to the importing file, then a search list
//! - The evaluator: runs a root manifest and returns its result as JSON text

mod error;
mod importer;
pub mod library;
mod location;
mod runtime;

pub use error::EvalError;
pub use importer::{Contents, ImportError, Importer, UniversalImporter};
pub use location::{Location, LocationError};
pub use runtime::{ExtVars, evaluate};
