//! Grouping strategies and the helpers they share.
//!
//! Every strategy is a pure function from the change-set (plus optional
//! pattern index / dependency map) to a list of disjoint, non-empty groups.

pub mod dependency;
pub mod directory;
pub mod hybrid;
pub mod pattern;

use std::collections::HashMap;

use tracing::debug;

use crate::concern::{self, NO_EXTENSION};
use crate::config::Policy;
use crate::error::EngineError;
use crate::fingerprint;
use crate::types::*;

/// Groups produced by one strategy, plus a note when it degraded to a
/// simpler strategy.
#[derive(Debug, Clone)]
pub struct StrategyOutput {
  pub groups: Vec<ChangeGroup>,
  pub fallback: Option<String>,
}

impl StrategyOutput {
  fn direct(groups: Vec<ChangeGroup>) -> Self {
    Self {
      groups,
      fallback: None,
    }
  }
}

/// Run one strategy on the change-set.
pub fn run(
  strategy: StrategyType,
  files: &[FileRecord],
  index: Option<&PatternIndex>,
  deps: Option<&DependencyMap>,
  policy: &Policy,
) -> Result<StrategyOutput, EngineError> {
  debug!(strategy = strategy.as_str(), files = files.len(), "running strategy");
  let out = match strategy {
    StrategyType::Directory => StrategyOutput::direct(directory::group(files, policy)),
    StrategyType::Pattern => pattern::group(files, index, policy),
    StrategyType::Dependency => dependency::group(files, deps, policy),
    StrategyType::Hybrid => StrategyOutput::direct(hybrid::group(files, index, deps, policy)?),
    StrategyType::Module => StrategyOutput::direct(group_by_module(files, policy)),
    StrategyType::SizeBalanced => StrategyOutput::direct(group_size_balanced(files, policy)),
  };
  Ok(out)
}

// ---------------------------------------------------------------------------
// Group construction
// ---------------------------------------------------------------------------

impl ChangeGroup {
  /// New group with a stable id and a category derived from its members.
  pub fn new(provenance: Provenance, label: impl Into<String>, files: Vec<String>) -> Self {
    Self {
      id: fingerprint::group_id(provenance, &files),
      label: label.into(),
      category: concern::category_of(&files),
      confidence: 0.5,
      reasoning: String::new(),
      semantic_similarity: 0.5,
      directory_focus: None,
      feature_focus: None,
      provenance,
      files,
    }
  }

  pub fn with_confidence(mut self, confidence: f64) -> Self {
    self.confidence = confidence.clamp(0.0, 1.0);
    self
  }

  pub fn with_similarity(mut self, similarity: f64) -> Self {
    self.semantic_similarity = similarity.clamp(0.0, 1.0);
    self
  }

  pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
    self.reasoning = reasoning.into();
    self
  }

  pub fn with_directory_focus(mut self, dir: impl Into<String>) -> Self {
    self.directory_focus = Some(dir.into());
    self
  }

  pub fn with_feature_focus(mut self, feature: impl Into<String>) -> Self {
    self.feature_focus = Some(feature.into());
    self
  }

  /// Same metadata over a different member list (new id and category).
  pub fn with_files(&self, files: Vec<String>) -> Self {
    Self {
      id: fingerprint::group_id(self.provenance, &files),
      category: concern::category_of(&files),
      files,
      ..self.clone()
    }
  }

  pub fn churn(&self, records: &HashMap<&str, &FileRecord>) -> u64 {
    self
      .files
      .iter()
      .filter_map(|f| records.get(f.as_str()))
      .map(|r| r.churn())
      .fold(0, u64::saturating_add)
  }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Split `files` into ceil(n/max) contiguous chunks whose sizes differ by at
/// most one.
pub fn chunk_evenly(files: Vec<String>, max: usize) -> Vec<Vec<String>> {
  let n = files.len();
  let max = max.max(1);
  if n <= max {
    return vec![files];
  }
  let parts = n.div_ceil(max);
  let base = n / parts;
  let extra = n % parts;
  let mut out = Vec::with_capacity(parts);
  let mut iter = files.into_iter();
  for i in 0..parts {
    let size = base + usize::from(i < extra);
    out.push(iter.by_ref().take(size).collect());
  }
  out
}

/// Split a group larger than `max` into equal contiguous parts labelled
/// "(Part i/n)". Groups within the limit come back unchanged.
pub fn split_oversized(group: ChangeGroup, max: usize) -> Vec<ChangeGroup> {
  if group.files.len() <= max {
    return vec![group];
  }
  let chunks = chunk_evenly(group.files.clone(), max);
  let total = chunks.len();
  chunks
    .into_iter()
    .enumerate()
    .map(|(i, files)| {
      let mut part = group.with_files(files);
      part.label = format!("{} (Part {}/{})", group.label, i + 1, total);
      part
    })
    .collect()
}

/// Bucket paths by extension in first-seen order; oversized buckets are
/// chunked evenly.
pub fn bucket_by_extension(
  paths: Vec<String>,
  provenance: Provenance,
  label_prefix: &str,
  confidence: f64,
  policy: &Policy,
) -> Vec<ChangeGroup> {
  let mut order: Vec<String> = Vec::new();
  let mut buckets: HashMap<String, Vec<String>> = HashMap::new();
  for path in paths {
    let ext = concern::extension(&path);
    if !buckets.contains_key(&ext) {
      order.push(ext.clone());
    }
    buckets.entry(ext).or_default().push(path);
  }

  let mut out = Vec::new();
  for ext in order {
    let Some(files) = buckets.remove(&ext) else {
      continue;
    };
    let display = if ext == NO_EXTENSION {
      "extensionless".to_string()
    } else {
      format!(".{}", ext)
    };
    let group = ChangeGroup::new(provenance, format!("{} {} changes", label_prefix, display), files)
      .with_confidence(confidence)
      .with_similarity(0.3)
      .with_reasoning(format!("Files grouped by file type '{}'.", display))
      .with_feature_focus(format!("module-{}", ext));
    out.extend(split_oversized(group, policy.max_files_per_group));
  }
  out
}

fn paths(files: &[FileRecord]) -> Vec<String> {
  files.iter().map(|f| f.path.clone()).collect()
}

/// Module strategy: one group per file extension.
pub fn group_by_module(files: &[FileRecord], policy: &Policy) -> Vec<ChangeGroup> {
  bucket_by_extension(paths(files), Provenance::Module, "Module:", 0.5, policy)
}

/// Size-balanced strategy: even contiguous chunks in input order.
pub fn group_size_balanced(files: &[FileRecord], policy: &Policy) -> Vec<ChangeGroup> {
  if files.is_empty() {
    return Vec::new();
  }
  let chunks = chunk_evenly(paths(files), policy.max_files_per_group);
  let total = chunks.len();
  chunks
    .into_iter()
    .enumerate()
    .map(|(i, chunk)| {
      ChangeGroup::new(
        Provenance::SizeBalanced,
        format!("Batch changes (Part {}/{})", i + 1, total),
        chunk,
      )
      .with_confidence(0.4)
      .with_similarity(0.2)
      .with_reasoning(format!("Part {} of the change-set, grouped for balanced size.", i + 1))
      .with_feature_focus(format!("size-balanced-{}", i + 1))
    })
    .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
  use crate::types::{FileRecord, FileStatus};

  pub fn record(path: &str) -> FileRecord {
    record_with(path, 10, 2)
  }

  pub fn record_with(path: &str, added: u64, deleted: u64) -> FileRecord {
    FileRecord {
      path: path.into(),
      status: FileStatus::Modified,
      lines_added: added,
      lines_deleted: deleted,
      is_binary: false,
      staged: false,
    }
  }

  pub fn records(paths: &[&str]) -> Vec<FileRecord> {
    paths.iter().map(|p| record(p)).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::test_support::records;
  use super::*;

  fn strings(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("f{}.py", i)).collect()
  }

  #[test]
  fn chunk_evenly_exact() {
    let chunks = chunk_evenly(strings(9), 3);
    assert_eq!(chunks.iter().map(Vec::len).collect::<Vec<_>>(), vec![3, 3, 3]);
  }

  #[test]
  fn chunk_evenly_uneven_sizes_differ_by_one() {
    let chunks = chunk_evenly(strings(10), 3);
    assert_eq!(chunks.iter().map(Vec::len).collect::<Vec<_>>(), vec![3, 3, 2, 2]);
    assert_eq!(chunks[0][0], "f0.py");
    assert_eq!(chunks[3][1], "f9.py");
  }

  #[test]
  fn split_oversized_labels_parts() {
    let group = ChangeGroup::new(Provenance::Pattern, "Pattern", strings(5));
    let parts = split_oversized(group, 2);
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0].label, "Pattern (Part 1/3)");
    assert_eq!(parts[2].label, "Pattern (Part 3/3)");
    assert_ne!(parts[0].id, parts[1].id);
  }

  #[test]
  fn extension_buckets_keep_first_seen_order() {
    let paths = vec!["a.rs".to_string(), "b.md".into(), "c.rs".into(), "Makefile".into()];
    let groups = bucket_by_extension(paths, Provenance::Module, "Module:", 0.5, &Policy::default());
    assert_eq!(groups.len(), 3);
    assert_eq!(groups[0].files, vec!["a.rs", "c.rs"]);
    assert_eq!(groups[1].files, vec!["b.md"]);
    assert_eq!(groups[2].label, "Module: extensionless changes");
  }

  #[test]
  fn size_balanced_covers_all_files() {
    let files = records(&["a.py", "b.py", "c.py", "d.py", "e.py"]);
    let policy = Policy {
      max_files_per_group: 2,
      ..Policy::default()
    };
    let groups = group_size_balanced(&files, &policy);
    assert_eq!(groups.len(), 3);
    assert_eq!(groups.iter().map(|g| g.files.len()).sum::<usize>(), 5);
  }

  #[test]
  fn builder_clamps_scores() {
    let g = ChangeGroup::new(Provenance::Directory, "x", vec!["a".into()])
      .with_confidence(1.7)
      .with_similarity(-0.2);
    assert_eq!(g.confidence, 1.0);
    assert_eq!(g.semantic_similarity, 0.0);
  }
}
