//! Structured error types for the grouping engine.
//!
//! Only malformed input and broken invariants are errors. Rule failures are
//! reported as data (see `rules` and `validation`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("validation: {field}: {reason}")]
  Validation { field: String, reason: String },

  /// An algorithmic invariant was broken (file claimed twice, file count not
  /// conserved). Never recovered from.
  #[error("invariant violated: {0}")]
  Invariant(String),

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),
}

impl EngineError {
  pub fn validation(field: &str, reason: &str) -> Self {
    Self::Validation {
      field: field.to_string(),
      reason: reason.to_string(),
    }
  }

  pub fn invariant(msg: impl Into<String>) -> Self {
    Self::Invariant(msg.into())
  }
}
