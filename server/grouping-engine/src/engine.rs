//! Core engine: runs a strategy, enforces atomicity, and assembles the result.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::atomicity::AtomicityValidator;
use crate::batch;
use crate::config::Policy;
use crate::error::EngineError;
use crate::grouping;
use crate::rules::Rule;
use crate::types::*;
use crate::validation;

/// Resolve a caller-supplied strategy name. Unknown or missing names select
/// the hybrid strategy.
pub fn resolve_strategy(name: Option<&str>) -> StrategyType {
  match name {
    Some(n) => StrategyType::from_str_loose(n).unwrap_or_else(|| {
      warn!(strategy = n, "unknown strategy; using hybrid");
      StrategyType::Hybrid
    }),
    None => {
      warn!("no strategy given; using hybrid");
      StrategyType::Hybrid
    }
  }
}

/// The PR grouping engine. Stateless apart from its policy, so one engine can
/// serve many change-sets.
#[derive(Debug, Clone)]
pub struct Engine {
  policy: Policy,
}

impl Engine {
  pub fn new(policy: Policy) -> Self {
    Self { policy }
  }

  pub fn with_defaults() -> Self {
    Self::new(Policy::default())
  }

  pub fn policy(&self) -> &Policy {
    &self.policy
  }

  /// Partition a change-set into atomic groups with the given strategy.
  pub fn group(
    &self,
    changes: &ChangeSet,
    index: Option<&PatternIndex>,
    deps: Option<&DependencyMap>,
    strategy: StrategyType,
  ) -> Result<GroupingResult, EngineError> {
    self.policy.validate()?;
    let files = &changes.files;

    let output = grouping::run(strategy, files, index, deps, &self.policy)?;
    let proposed = output.groups.len();

    let atomicity = AtomicityValidator::new(&self.policy, files);
    let groups = atomicity.validate_and_split(output.groups)?;
    check_conservation(files, &groups)?;

    let mut explanation = format!(
      "{} grouping produced {} groups from {} files.",
      strategy.as_str(),
      groups.len(),
      files.len()
    );
    if let Some(note) = &output.fallback {
      explanation.push_str(&format!(" Fallback: {}.", note));
    }
    if groups.len() > proposed {
      explanation.push_str(&format!(
        " Atomicity splitting turned {} proposed groups into {}.",
        proposed,
        groups.len()
      ));
    }

    let complexity = review_complexity(&groups, files, &self.policy);
    info!(
      strategy = strategy.as_str(),
      files = files.len(),
      groups = groups.len(),
      complexity,
      "grouping complete"
    );

    Ok(GroupingResult {
      strategy_type: strategy,
      groups,
      explanation,
      estimated_review_complexity: complexity,
      ungrouped_files: Vec::new(),
      analysis_timestamp: changes.analysis_timestamp.map(|t| t.to_rfc3339()),
    })
  }

  /// Deterministic grouping with no pattern index and no dependency data:
  /// directory locality plus extension buckets.
  pub fn fallback(&self, changes: &ChangeSet) -> Result<GroupingResult, EngineError> {
    info!(files = changes.files.len(), "running deterministic fallback grouping");
    let mut result = self.group(changes, None, None, StrategyType::Hybrid)?;
    result.explanation.push_str(" Deterministic fallback (directory and file type only).");
    Ok(result)
  }

  /// Check any grouping of `changes` against the selected rules and the
  /// structural checks.
  pub fn validate(
    &self,
    groups: &[ChangeGroup],
    changes: &ChangeSet,
    deps: Option<&DependencyMap>,
    rules: Vec<Rule>,
    final_pass: bool,
  ) -> Result<ValidationReport, EngineError> {
    self.policy.validate()?;
    validation::validate(groups, &changes.files, deps, &self.policy, rules, final_pass)
  }

  pub fn plan_batches(
    &self,
    changes: &ChangeSet,
    index: Option<&PatternIndex>,
    target_batch_size: usize,
  ) -> Result<BatchPlan, EngineError> {
    batch::plan(&changes.files, target_batch_size, index)
  }
}

/// Every input file must land in exactly one group.
fn check_conservation(files: &[FileRecord], groups: &[ChangeGroup]) -> Result<(), EngineError> {
  let mut counts: HashMap<&str, usize> = files.iter().map(|f| (f.path.as_str(), 0)).collect();
  for file in groups.iter().flat_map(|g| &g.files) {
    match counts.get_mut(file.as_str()) {
      Some(n) => *n += 1,
      None => {
        return Err(EngineError::invariant(format!(
          "group contains '{}', which is not in the change-set",
          file
        )))
      }
    }
  }
  if let Some((path, n)) = counts.iter().find(|(_, n)| **n != 1) {
    return Err(EngineError::invariant(format!(
      "file '{}' assigned to {} groups",
      path, n
    )));
  }
  Ok(())
}

/// Mean per-group load on a 1–10 scale: half from file count, half from
/// churn, each relative to the policy ceiling.
pub fn review_complexity(groups: &[ChangeGroup], files: &[FileRecord], policy: &Policy) -> f64 {
  if groups.is_empty() {
    return 1.0;
  }
  let records: HashMap<&str, &FileRecord> = files.iter().map(|f| (f.path.as_str(), f)).collect();
  let total: f64 = groups
    .iter()
    .map(|g| {
      let size = 5.0 * g.files.len() as f64 / policy.max_files_per_group as f64;
      let churn = 5.0 * g.churn(&records) as f64 / policy.max_churn_per_group as f64;
      size + churn
    })
    .sum();
  let mean = (total / groups.len() as f64).clamp(1.0, 10.0);
  (mean * 10.0).round() / 10.0
}
