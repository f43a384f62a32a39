//! Error types for manifest evaluation

use thiserror::Error;

use crate::importer::ImportError;

/// Errors that can occur while evaluating a root manifest
#[derive(Debug, Error)]
pub enum EvalError {
  #[error(transparent)]
  Import(#[from] ImportError),

  /// A Lua error raised while loading or running manifest code.
  ///
  /// The message is the interpreter's own text, including the chunk name
  /// and line of the failing expression.
  #[error("evaluation of {location} failed: {message}")]
  Lua { location: String, message: String },

  #[error("{location} did not evaluate to plain data: {message}")]
  NotData { location: String, message: String },

  #[error("failed to encode evaluation result: {0}")]
  Encode(#[source] serde_json::Error),
}
