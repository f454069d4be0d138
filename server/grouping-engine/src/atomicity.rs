//! Atomicity enforcement: split groups that are too large or mix concerns.
//!
//! Each group is assessed as `Atomic` or `NeedsSplit`. Split order is by
//! directory, then by concern class, then by file type, then contiguous
//! fixed-size chunks; the first that yields more than one child wins and
//! every child is assessed again. File count is conserved across every split.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::concern;
use crate::config::Policy;
use crate::error::EngineError;
use crate::fingerprint;
use crate::types::{ChangeGroup, FileRecord, GroupCategory};

#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
  TooManyFiles { count: usize, max: usize },
  TooMuchChurn { churn: u64, max: u64 },
  MixedConcerns,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
  Atomic,
  NeedsSplit(Vec<Violation>),
}

pub struct AtomicityValidator<'a> {
  policy: &'a Policy,
  churn: HashMap<&'a str, u64>,
}

impl<'a> AtomicityValidator<'a> {
  pub fn new(policy: &'a Policy, files: &'a [FileRecord]) -> Self {
    Self {
      policy,
      churn: files.iter().map(|f| (f.path.as_str(), f.churn())).collect(),
    }
  }

  fn churn_of(&self, path: &str) -> u64 {
    self.churn.get(path).copied().unwrap_or(0)
  }

  fn group_churn(&self, files: &[String]) -> u64 {
    files.iter().map(|f| self.churn_of(f)).fold(0, u64::saturating_add)
  }

  pub fn assess(&self, group: &ChangeGroup) -> Verdict {
    let mut violations = Vec::new();
    let count = group.files.len();
    if count > self.policy.max_files_per_group {
      violations.push(Violation::TooManyFiles {
        count,
        max: self.policy.max_files_per_group,
      });
    }
    let churn = self.group_churn(&group.files);
    if churn > self.policy.max_churn_per_group {
      violations.push(Violation::TooMuchChurn {
        churn,
        max: self.policy.max_churn_per_group,
      });
    }
    if concern::has_mixed_concerns(&group.files, self.policy) {
      violations.push(Violation::MixedConcerns);
    }
    if violations.is_empty() {
      Verdict::Atomic
    } else {
      Verdict::NeedsSplit(violations)
    }
  }

  pub fn is_atomic(&self, group: &ChangeGroup) -> bool {
    self.assess(group) == Verdict::Atomic
  }

  /// Settle every group into atomic children. Empty groups are dropped.
  pub fn validate_and_split(&self, groups: Vec<ChangeGroup>) -> Result<Vec<ChangeGroup>, EngineError> {
    let mut out = Vec::with_capacity(groups.len());
    for group in groups {
      if group.files.is_empty() {
        debug!(id = %group.id, "dropping empty group");
        continue;
      }
      self.settle(group, &mut out)?;
    }
    Ok(out)
  }

  fn settle(&self, group: ChangeGroup, out: &mut Vec<ChangeGroup>) -> Result<(), EngineError> {
    let violations = match self.assess(&group) {
      Verdict::Atomic => {
        out.push(group);
        return Ok(());
      }
      Verdict::NeedsSplit(v) => v,
    };

    match self.split_group(&group) {
      Some(children) => {
        let total: usize = children.iter().map(|c| c.files.len()).sum();
        if total != group.files.len() {
          return Err(EngineError::invariant(format!(
            "split of '{}' produced {} files from {}",
            group.id,
            total,
            group.files.len()
          )));
        }
        debug!(id = %group.id, children = children.len(), ?violations, "split group");
        for child in children {
          self.settle(child, out)?;
        }
      }
      None => {
        warn!(id = %group.id, ?violations, "group cannot be split further; keeping as is");
        out.push(group);
      }
    }
    Ok(())
  }

  /// One level of splitting. `None` when no strategy yields more than one
  /// child, which only happens for a single over-churn file or a group that
  /// is already atomic.
  pub fn split_group(&self, group: &ChangeGroup) -> Option<Vec<ChangeGroup>> {
    let by_dir = self.split_by_directory(group);
    if by_dir.len() > 1 {
      return Some(by_dir);
    }
    let by_concern = self.split_by_concern(group);
    if by_concern.len() > 1 {
      return Some(by_concern);
    }
    let by_extension = self.split_by_extension(group);
    if by_extension.len() > 1 {
      return Some(by_extension);
    }
    let by_size = self.split_by_size(group);
    if by_size.len() > 1 {
      return Some(by_size);
    }
    None
  }

  fn child(&self, parent: &ChangeGroup, id: String, label: String, files: Vec<String>) -> ChangeGroup {
    ChangeGroup {
      id,
      label,
      category: concern::category_of(&files),
      confidence: (parent.confidence * self.policy.split_confidence_factor).clamp(0.0, 1.0),
      reasoning: parent.reasoning.clone(),
      semantic_similarity: parent.semantic_similarity,
      directory_focus: parent.directory_focus.clone(),
      feature_focus: parent.feature_focus.clone(),
      provenance: parent.provenance,
      files,
    }
  }

  pub fn split_by_directory(&self, group: &ChangeGroup) -> Vec<ChangeGroup> {
    let buckets = ordered_buckets(&group.files, |f| concern::parent_dir(f).to_string());
    buckets
      .into_iter()
      .enumerate()
      .map(|(i, (dir, files))| {
        let mut child = self.child(
          group,
          fingerprint::split_id(&group.id, i),
          format!("{} [{}]", group.label, dir),
          files,
        );
        child.reasoning = format!("{} Split by directory '{}'.", group.reasoning, dir)
          .trim()
          .to_string();
        child.directory_focus = Some(dir);
        child
      })
      .collect()
  }

  pub fn split_by_concern(&self, group: &ChangeGroup) -> Vec<ChangeGroup> {
    let buckets = ordered_buckets(&group.files, |f| concern::classify(f));
    buckets
      .into_iter()
      .enumerate()
      .map(|(i, (class, files))| {
        let name = class.as_str();
        let mut child = self.child(
          group,
          fingerprint::split_id(&group.id, i),
          format!("{} [{}]", group.label, name),
          files,
        );
        child.category = GroupCategory::from(class);
        child.reasoning = format!("{} Split by concern '{}'.", group.reasoning, name)
          .trim()
          .to_string();
        child
      })
      .collect()
  }

  /// Files bucketed by extension in first-seen order, with consecutive
  /// buckets packed so no child carries more than `max_extension_diversity`
  /// distinct extensions.
  pub fn split_by_extension(&self, group: &ChangeGroup) -> Vec<ChangeGroup> {
    let max = self.policy.max_extension_diversity.max(1);
    let buckets = ordered_buckets(&group.files, concern::extension);
    let packs: Vec<Vec<(String, Vec<String>)>> = buckets
      .chunks(max)
      .map(|pack| pack.to_vec())
      .collect();
    packs
      .into_iter()
      .enumerate()
      .map(|(i, pack)| {
        let exts: Vec<String> = pack.iter().map(|(ext, _)| format!(".{}", ext)).collect();
        let files: Vec<String> = pack.into_iter().flat_map(|(_, files)| files).collect();
        let mut child = self.child(
          group,
          fingerprint::split_id(&group.id, i),
          format!("{} [{}]", group.label, exts.join(", ")),
          files,
        );
        child.reasoning = format!("{} Split by file type ({}).", group.reasoning, exts.join(", "))
          .trim()
          .to_string();
        child
      })
      .collect()
  }

  /// Contiguous slices of at most `max_files_per_group` files. A slice also
  /// closes before the file that would push it over the churn ceiling, so an
  /// over-churn group of several small-count files still splits.
  pub fn split_by_size(&self, group: &ChangeGroup) -> Vec<ChangeGroup> {
    let max_files = self.policy.max_files_per_group;
    let max_churn = self.policy.max_churn_per_group;
    let mut chunks: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_churn = 0u64;
    for file in &group.files {
      let churn = self.churn_of(file);
      let full = current.len() >= max_files || current_churn.saturating_add(churn) > max_churn;
      if full && !current.is_empty() {
        chunks.push(std::mem::take(&mut current));
        current_churn = 0;
      }
      current.push(file.clone());
      current_churn = current_churn.saturating_add(churn);
    }
    if !current.is_empty() {
      chunks.push(current);
    }

    let total = chunks.len();
    chunks
      .into_iter()
      .enumerate()
      .map(|(i, files)| {
        self.child(
          group,
          fingerprint::chunk_id(&group.id, i),
          format!("{} (Part {}/{})", group.label, i + 1, total),
          files,
        )
      })
      .collect()
  }
}

/// Bucket files by key in first-seen key order, preserving file order.
fn ordered_buckets<K, F>(files: &[String], key: F) -> Vec<(K, Vec<String>)>
where
  K: PartialEq,
  F: Fn(&str) -> K,
{
  let mut buckets: Vec<(K, Vec<String>)> = Vec::new();
  for file in files {
    let k = key(file.as_str());
    match buckets.iter_mut().find(|(existing, _)| *existing == k) {
      Some((_, members)) => members.push(file.clone()),
      None => buckets.push((k, vec![file.clone()])),
    }
  }
  buckets
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::grouping::test_support::{record_with, records};
  use crate::types::Provenance;

  fn group_of(id: &str, paths: &[&str], confidence: f64) -> ChangeGroup {
    let mut g = ChangeGroup::new(
      Provenance::Directory,
      id,
      paths.iter().map(|p| p.to_string()).collect(),
    )
    .with_confidence(confidence)
    .with_similarity(0.7);
    g.id = id.to_string();
    g
  }

  #[test]
  fn small_single_concern_group_is_atomic() {
    let files = records(&["src/main.py", "src/utils.py"]);
    let policy = Policy::default();
    let v = AtomicityValidator::new(&policy, &files);
    let g = group_of("g1", &["src/main.py", "src/utils.py"], 0.9);
    assert!(v.is_atomic(&g));
    let out = v.validate_and_split(vec![g.clone()]).unwrap();
    assert_eq!(out, vec![g]);
  }

  #[test]
  fn huge_churn_is_not_atomic() {
    let files = vec![record_with("huge_file.py", 800, 500)];
    let policy = Policy::default();
    let v = AtomicityValidator::new(&policy, &files);
    let g = group_of("huge", &["huge_file.py"], 0.8);
    assert_eq!(
      v.assess(&g),
      Verdict::NeedsSplit(vec![Violation::TooMuchChurn { churn: 1300, max: 1000 }])
    );
    // Nothing can split a single file; it is kept unchanged.
    assert_eq!(v.validate_and_split(vec![g.clone()]).unwrap(), vec![g]);
  }

  #[test]
  fn migration_with_model_is_atomic() {
    let files = records(&["db/migration_001.sql", "models/user.py"]);
    let policy = Policy::default();
    let v = AtomicityValidator::new(&policy, &files);
    assert!(v.is_atomic(&group_of("db", &["db/migration_001.sql", "models/user.py"], 0.8)));
  }

  #[test]
  fn mixed_concerns_split_into_several() {
    let paths = ["src/main.py", "config.json", "docs/README.md"];
    let files = records(&paths);
    let policy = Policy::default();
    let v = AtomicityValidator::new(&policy, &files);
    let g = group_of("mixed", &paths, 0.75);
    assert!(!v.is_atomic(&g));
    let out = v.validate_and_split(vec![g.clone()]).unwrap();
    assert_eq!(out.len(), 3);
    for child in &out {
      assert_eq!(child.files.len(), 1);
      assert!(child.confidence < g.confidence);
      assert_eq!(child.semantic_similarity, g.semantic_similarity);
    }
  }

  #[test]
  fn split_by_directory_groups_each_directory() {
    let paths = ["src/main.py", "src/utils.py", "lib/helpers.py", "lib/constants.py"];
    let files = records(&paths);
    let policy = Policy::default();
    let v = AtomicityValidator::new(&policy, &files);
    let split = v.split_by_directory(&group_of("dir_group", &paths, 0.9));
    assert_eq!(split.len(), 2);
    assert_eq!(split[0].directory_focus.as_deref(), Some("src"));
    assert_eq!(split[1].files, vec!["lib/helpers.py", "lib/constants.py"]);
    assert_eq!(split[0].id, "dir_group_split_0");
  }

  #[test]
  fn split_by_concern_one_group_per_class() {
    let paths = ["src/main.py", "tests/test_main.py", "config.yaml", "README.md", "data.csv"];
    let files = records(&paths);
    let policy = Policy::default();
    let v = AtomicityValidator::new(&policy, &files);
    let split = v.split_by_concern(&group_of("mixed", &paths, 0.8));
    assert_eq!(split.len(), 5);
    let categories: Vec<GroupCategory> = split.iter().map(|g| g.category).collect();
    assert_eq!(
      categories,
      vec![
        GroupCategory::Source,
        GroupCategory::Test,
        GroupCategory::Config,
        GroupCategory::Docs,
        GroupCategory::Other
      ]
    );
  }

  #[test]
  fn split_by_size_uneven_chunks() {
    let paths: Vec<String> = (0..10).map(|i| format!("file_{}.py", i)).collect();
    let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let files = records(&refs);
    let policy = Policy {
      max_files_per_group: 3,
      ..Policy::default()
    };
    let v = AtomicityValidator::new(&policy, &files);
    let split = v.split_by_size(&group_of("uneven", &refs, 0.9));
    assert_eq!(split.iter().map(|g| g.files.len()).collect::<Vec<_>>(), vec![3, 3, 3, 1]);
    assert_eq!(split[1].id, "uneven_chunk_1");
    assert!((split[0].confidence - 0.72).abs() < 1e-9);
  }

  #[test]
  fn twelve_source_files_fall_through_to_chunking() {
    let paths: Vec<String> = (0..12).map(|i| format!("src/file_{}.py", i)).collect();
    let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let files = records(&refs);
    let policy = Policy::default();
    let v = AtomicityValidator::new(&policy, &files);
    let out = v.validate_and_split(vec![group_of("large", &refs, 0.8)]).unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out.iter().map(|g| g.files.len()).sum::<usize>(), 12);
    assert!(out.iter().all(|g| g.id.contains("chunk")));
  }

  #[test]
  fn churn_overflow_splits_on_churn_boundary() {
    let files = vec![
      record_with("src/a.py", 400, 200),
      record_with("src/b.py", 300, 200),
      record_with("src/c.py", 10, 0),
    ];
    let policy = Policy::default();
    let v = AtomicityValidator::new(&policy, &files);
    let out = v
      .validate_and_split(vec![group_of("heavy", &["src/a.py", "src/b.py", "src/c.py"], 0.9)])
      .unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].files, vec!["src/a.py"]);
    assert_eq!(out[1].files, vec!["src/b.py", "src/c.py"]);
  }

  #[test]
  fn output_is_stable_under_revalidation() {
    let paths = ["src/a.py", "config.yaml", "README.md", "lib/x.rs", "lib/y.rs"];
    let files = records(&paths);
    let policy = Policy::default();
    let v = AtomicityValidator::new(&policy, &files);
    let once = v.validate_and_split(vec![group_of("g", &paths, 0.9)]).unwrap();
    let twice = v.validate_and_split(once.clone()).unwrap();
    assert_eq!(once, twice);
  }

  #[test]
  fn diverse_front_end_directory_splits_by_file_type() {
    let paths = ["web/a.ts", "web/b.tsx", "web/c.js", "web/d.css", "web/e.html"];
    let files = records(&paths);
    let policy = Policy::default();
    let v = AtomicityValidator::new(&policy, &files);
    let g = group_of("web", &paths, 0.9);
    assert_eq!(v.assess(&g), Verdict::NeedsSplit(vec![Violation::MixedConcerns]));

    let out = v.validate_and_split(vec![g]).unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].files, vec!["web/a.ts", "web/b.tsx", "web/c.js", "web/d.css"]);
    assert_eq!(out[1].files, vec!["web/e.html"]);
    assert_eq!(out[0].id, "web_split_0");
    assert!(out.iter().all(|c| v.is_atomic(c)));
  }

  #[test]
  fn huge_line_counts_saturate_instead_of_overflowing() {
    let files = vec![
      record_with("src/a.py", u64::MAX / 2, 0),
      record_with("src/b.py", u64::MAX / 2, 0),
      record_with("src/c.py", u64::MAX / 2, 0),
    ];
    let policy = Policy::default();
    let v = AtomicityValidator::new(&policy, &files);
    let g = group_of("big", &["src/a.py", "src/b.py", "src/c.py"], 0.9);
    assert_eq!(
      v.assess(&g),
      Verdict::NeedsSplit(vec![Violation::TooMuchChurn { churn: u64::MAX, max: 1000 }])
    );
    let out = v.validate_and_split(vec![g]).unwrap();
    assert_eq!(out.len(), 3);
    assert!(out.iter().all(|c| c.files.len() == 1));
  }

  #[test]
  fn empty_groups_are_dropped() {
    let policy = Policy::default();
    let v = AtomicityValidator::new(&policy, &[]);
    let out = v.validate_and_split(vec![group_of("empty", &[], 0.5)]).unwrap();
    assert!(out.is_empty());
    assert!(v.validate_and_split(Vec::new()).unwrap().is_empty());
  }
}
