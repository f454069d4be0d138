//! Grouping and validation policy with sane defaults.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Tunable thresholds for grouping, atomicity splitting, and rule validation.
///
/// Passed explicitly into every call. Requests may override any subset of
/// fields; missing fields take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
  /// Max files in one group before it must be split.
  pub max_files_per_group: usize,
  /// Max total churn (added + deleted lines) in one group.
  pub max_churn_per_group: u64,
  /// Max distinct top-level directories before a group counts as mixed.
  pub max_directories_per_group: usize,
  /// Max distinct file extensions before a group counts as mixed.
  pub max_extension_diversity: usize,
  /// Min file count at which conflicting concern classes make a group mixed.
  pub mixed_concern_min_files: usize,
  /// Confidence multiplier applied to every child of a forced split (0..1).
  pub split_confidence_factor: f64,
  /// Max additions/deletions ratio before the balanced-churn rule warns.
  pub max_imbalance_ratio: f64,
  /// Churn below this is never checked for imbalance.
  pub balanced_churn_floor: u64,
  /// Max top-level directories for the cross-module rule.
  pub max_modules: usize,
  /// Unfocused groups larger than this fail the cohesion rule.
  pub cohesion_max_unfocused_files: usize,
  /// Globs identifying test files (matched against path and file name).
  pub test_patterns: Vec<String>,
}

impl Default for Policy {
  fn default() -> Self {
    Self {
      max_files_per_group: 8,
      max_churn_per_group: 1000,
      max_directories_per_group: 3,
      max_extension_diversity: 4,
      mixed_concern_min_files: 2,
      split_confidence_factor: 0.8,
      max_imbalance_ratio: 10.0,
      balanced_churn_floor: 100,
      max_modules: 3,
      cohesion_max_unfocused_files: 5,
      test_patterns: vec![
        "test_*.py".into(),
        "*_test.py".into(),
        "*_test.go".into(),
        "*_test.rs".into(),
        "*.spec.ts".into(),
        "*.test.ts".into(),
        "*.test.js".into(),
        "*.spec.js".into(),
        "**/tests/**".into(),
        "**/__tests__/**".into(),
      ],
    }
  }
}

impl Policy {
  /// Reject values that would make the algorithms degenerate.
  pub fn validate(&self) -> Result<(), EngineError> {
    if self.max_files_per_group == 0 {
      return Err(EngineError::validation(
        "policy.max_files_per_group",
        "must be at least 1",
      ));
    }
    if self.max_churn_per_group == 0 {
      return Err(EngineError::validation(
        "policy.max_churn_per_group",
        "must be at least 1",
      ));
    }
    if !(self.split_confidence_factor > 0.0 && self.split_confidence_factor <= 1.0) {
      return Err(EngineError::validation(
        "policy.split_confidence_factor",
        "must be in (0, 1]",
      ));
    }
    if !(self.max_imbalance_ratio >= 1.0) {
      return Err(EngineError::validation(
        "policy.max_imbalance_ratio",
        "must be at least 1.0",
      ));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_are_valid() {
    assert!(Policy::default().validate().is_ok());
  }

  #[test]
  fn zero_max_files_rejected() {
    let policy = Policy {
      max_files_per_group: 0,
      ..Policy::default()
    };
    let err = policy.validate().unwrap_err();
    assert!(err.to_string().contains("max_files_per_group"));
  }

  #[test]
  fn partial_override_keeps_other_defaults() {
    let policy: Policy = serde_json::from_str(r#"{"max_files_per_group": 3}"#).unwrap();
    assert_eq!(policy.max_files_per_group, 3);
    assert_eq!(policy.max_churn_per_group, 1000);
    assert!(!policy.test_patterns.is_empty());
  }
}
