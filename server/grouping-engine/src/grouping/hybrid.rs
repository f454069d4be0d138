//! Hybrid reconciliation of the dependency, pattern, and directory strategies.
//!
//! Precedence is fixed: dependency-connected files need co-review the most,
//! pattern relations next, directory locality least. Each file goes to the
//! first candidate that offers it.

use std::collections::HashSet;

use tracing::debug;

use crate::config::Policy;
use crate::error::EngineError;
use crate::grouping::{bucket_by_extension, dependency, directory, pattern};
use crate::types::*;

/// Claims files for emitted groups. One merger per run.
struct Merger {
  claimed: HashSet<String>,
  groups: Vec<ChangeGroup>,
}

impl Merger {
  fn new() -> Self {
    Self {
      claimed: HashSet::new(),
      groups: Vec::new(),
    }
  }

  /// Emit the unclaimed remainder of a candidate, if any.
  fn offer(&mut self, candidate: &ChangeGroup) -> Result<(), EngineError> {
    let remaining: Vec<String> = candidate
      .files
      .iter()
      .filter(|f| !self.claimed.contains(*f))
      .cloned()
      .collect();
    if remaining.is_empty() {
      return Ok(());
    }
    for file in &remaining {
      if !self.claimed.insert(file.clone()) {
        return Err(EngineError::invariant(format!(
          "file '{}' claimed twice while merging '{}'",
          file, candidate.label
        )));
      }
    }
    let group = if remaining.len() == candidate.files.len() {
      candidate.clone()
    } else {
      candidate.with_files(remaining)
    };
    self.groups.push(group);
    Ok(())
  }
}

/// Merge strategy candidates by precedence, then bucket any unclaimed files
/// by extension as miscellaneous catch-all groups.
pub fn group(
  files: &[FileRecord],
  index: Option<&PatternIndex>,
  deps: Option<&DependencyMap>,
  policy: &Policy,
) -> Result<Vec<ChangeGroup>, EngineError> {
  let sources = [
    dependency::connected_groups(files, deps, policy),
    pattern::matched_groups(files, index, policy),
    directory::group(files, policy),
  ];

  let mut merger = Merger::new();
  for candidates in &sources {
    for candidate in candidates {
      merger.offer(candidate)?;
    }
  }

  let leftover: Vec<String> = files
    .iter()
    .filter(|f| !merger.claimed.contains(&f.path))
    .map(|f| f.path.clone())
    .collect();
  debug!(
    groups = merger.groups.len(),
    leftover = leftover.len(),
    "hybrid merge done"
  );

  let mut groups = merger.groups;
  groups.extend(bucket_by_extension(
    leftover,
    Provenance::Fallback,
    "Miscellaneous",
    0.4,
    policy,
  ));
  Ok(groups)
}
