//! Batch planning: packs changed files into review batches of roughly equal
//! weight before grouping very large change-sets.

use std::collections::HashSet;

use tracing::debug;

use crate::concern;
use crate::error::EngineError;
use crate::normalize::normalize_path;
use crate::types::{BatchPlan, FileRecord, PatternIndex};

/// Relative review weight of one file.
pub fn file_complexity(file: &FileRecord) -> f64 {
  let churn = file.churn();
  let mut score = 1.0;
  if churn > 500 {
    score *= 3.0;
  } else if churn > 200 {
    score *= 2.0;
  } else if churn > 50 {
    score *= 1.5;
  }
  match concern::extension(&file.path).as_str() {
    "py" | "java" | "cpp" => score *= 1.5,
    "yml" | "yaml" | "json" | "toml" => score *= 1.2,
    _ => {}
  }
  score
}

/// Split `files` into batches. With churn data, files are packed heaviest
/// first up to 1.5 × `target_batch_size` complexity per batch. Otherwise,
/// when the pattern index has relations, related files share a batch.
/// Failing both, batches are plain runs of `target_batch_size` files.
pub fn plan(
  files: &[FileRecord],
  target_batch_size: usize,
  index: Option<&PatternIndex>,
) -> Result<BatchPlan, EngineError> {
  if target_batch_size == 0 {
    return Err(EngineError::validation("batch_size", "must be at least 1"));
  }
  if files.is_empty() {
    return Ok(BatchPlan {
      batches: Vec::new(),
      strategy_used: "simple".into(),
      notes: "No files to batch.".into(),
    });
  }

  let has_churn = files.iter().any(|f| f.churn() > 0);
  let relations = index.filter(|i| !i.relations.is_empty());
  let plan = match relations {
    _ if has_churn => adaptive(files, target_batch_size),
    Some(index) => pattern_based(files, target_batch_size, index),
    None => simple(files, target_batch_size),
  };
  debug!(
    batches = plan.batches.len(),
    strategy = %plan.strategy_used,
    "batch plan built"
  );
  Ok(plan)
}

fn simple(files: &[FileRecord], size: usize) -> BatchPlan {
  let batches: Vec<Vec<String>> = files
    .chunks(size)
    .map(|chunk| chunk.iter().map(|f| f.path.clone()).collect())
    .collect();
  BatchPlan {
    notes: format!("Split {} files into {} batches of up to {} files.", files.len(), batches.len(), size),
    batches,
    strategy_used: "simple".into(),
  }
}

/// One bucket per relation kind, in first-seen order. A file belongs to the
/// first relation naming it by path or file name. Buckets over 1.5 × `size`
/// are cut into runs of `size`; unmatched files follow in runs of `size`.
fn pattern_based(files: &[FileRecord], size: usize, index: &PatternIndex) -> BatchPlan {
  let mut buckets: Vec<(&str, Vec<String>)> = Vec::new();
  let mut claimed: HashSet<&str> = HashSet::new();
  for relation in &index.relations {
    let wanted: HashSet<String> = relation.files.iter().map(|f| normalize_path(f)).collect();
    let members: Vec<&FileRecord> = files
      .iter()
      .filter(|f| !claimed.contains(f.path.as_str()))
      .filter(|f| wanted.contains(&f.path) || wanted.contains(concern::file_name(&f.path)))
      .collect();
    if members.is_empty() {
      continue;
    }
    claimed.extend(members.iter().map(|f| f.path.as_str()));
    let paths = members.iter().map(|f| f.path.clone());
    match buckets.iter_mut().find(|(kind, _)| *kind == relation.kind) {
      Some((_, bucket)) => bucket.extend(paths),
      None => buckets.push((relation.kind.as_str(), paths.collect())),
    }
  }

  let mut batches: Vec<Vec<String>> = Vec::new();
  for (_, bucket) in &buckets {
    if bucket.len() * 2 > size * 3 {
      batches.extend(bucket.chunks(size).map(<[String]>::to_vec));
    } else {
      batches.push(bucket.clone());
    }
  }
  let unmatched: Vec<String> = files
    .iter()
    .filter(|f| !claimed.contains(f.path.as_str()))
    .map(|f| f.path.clone())
    .collect();
  batches.extend(unmatched.chunks(size).map(<[String]>::to_vec));

  BatchPlan {
    notes: format!(
      "Batched {} files by {} relation patterns; {} unmatched files chunked by {}.",
      files.len(),
      buckets.len(),
      unmatched.len(),
      size
    ),
    batches,
    strategy_used: "pattern".into(),
  }
}

fn adaptive(files: &[FileRecord], size: usize) -> BatchPlan {
  let target = size as f64 * 1.5;
  let mut weighted: Vec<(f64, &FileRecord)> = files.iter().map(|f| (file_complexity(f), f)).collect();
  // Stable sort keeps input order among equal weights.
  weighted.sort_by(|a, b| b.0.total_cmp(&a.0));

  let mut batches: Vec<Vec<String>> = Vec::new();
  let mut current: Vec<String> = Vec::new();
  let mut load = 0.0;
  for (weight, file) in weighted {
    if !current.is_empty() && load + weight > target {
      batches.push(std::mem::take(&mut current));
      load = 0.0;
    }
    current.push(file.path.clone());
    load += weight;
  }
  if !current.is_empty() {
    batches.push(current);
  }

  BatchPlan {
    notes: format!(
      "Packed {} files into {} batches by review complexity (target {:.1} per batch).",
      files.len(),
      batches.len(),
      target
    ),
    batches,
    strategy_used: "adaptive".into(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::grouping::test_support::record_with;
  use crate::types::RelationPattern;

  #[test]
  fn complexity_weights() {
    assert_eq!(file_complexity(&record_with("a.md", 1, 0)), 1.0);
    assert_eq!(file_complexity(&record_with("a.py", 600, 0)), 4.5);
    assert_eq!(file_complexity(&record_with("a.yaml", 100, 0)), 1.5 * 1.2);
    assert_eq!(file_complexity(&record_with("a.rs", 250, 0)), 2.0);
  }

  #[test]
  fn zero_target_is_rejected() {
    let err = plan(&[], 0, None).unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }));
  }

  #[test]
  fn without_churn_uses_simple_chunks() {
    let files: Vec<FileRecord> = (0..5).map(|i| record_with(&format!("f{}.md", i), 0, 0)).collect();
    let plan = plan(&files, 2, None).unwrap();
    assert_eq!(plan.strategy_used, "simple");
    assert_eq!(plan.batches.iter().map(Vec::len).collect::<Vec<_>>(), vec![2, 2, 1]);
  }

  #[test]
  fn adaptive_packs_heaviest_first() {
    let files = vec![
      record_with("small.md", 1, 0),
      record_with("huge.py", 900, 0),
      record_with("mid.rs", 300, 0),
      record_with("tiny.md", 1, 0),
    ];
    // target complexity 3.0: huge.py (4.5) alone, then mid.rs (2.0) + small + tiny would be 4.0
    let plan = plan(&files, 2, None).unwrap();
    assert_eq!(plan.strategy_used, "adaptive");
    assert_eq!(
      plan.batches,
      vec![
        vec!["huge.py".to_string()],
        vec!["mid.rs".to_string(), "small.md".to_string()],
        vec!["tiny.md".to_string()],
      ]
    );
  }

  #[test]
  fn relations_batch_related_files_together() {
    let files: Vec<FileRecord> = ["src/auth.py", "docs/a.md", "tests/test_auth.py", "docs/b.md", "docs/c.md"]
      .iter()
      .map(|p| record_with(p, 0, 0))
      .collect();
    let index = PatternIndex {
      relations: vec![RelationPattern {
        kind: "implementation_test".into(),
        files: vec!["./src/auth.py".into(), "test_auth.py".into()],
      }],
      ..PatternIndex::default()
    };
    let plan = plan(&files, 2, Some(&index)).unwrap();
    assert_eq!(plan.strategy_used, "pattern");
    assert_eq!(
      plan.batches,
      vec![
        vec!["src/auth.py".to_string(), "tests/test_auth.py".to_string()],
        vec!["docs/a.md".to_string(), "docs/b.md".to_string()],
        vec!["docs/c.md".to_string()],
      ]
    );
  }

  #[test]
  fn oversized_relation_bucket_is_chunked() {
    let files: Vec<FileRecord> = (0..4).map(|i| record_with(&format!("m{}.py", i), 0, 0)).collect();
    let index = PatternIndex {
      relations: vec![RelationPattern {
        kind: "module".into(),
        files: files.iter().map(|f| f.path.clone()).collect(),
      }],
      ..PatternIndex::default()
    };
    let out = plan(&files, 2, Some(&index)).unwrap();
    assert_eq!(out.batches.iter().map(Vec::len).collect::<Vec<_>>(), vec![2, 2]);

    // Churn data takes precedence over relations.
    let mut churned = files.clone();
    churned[0].lines_added = 10;
    let out = plan(&churned, 2, Some(&index)).unwrap();
    assert_eq!(out.strategy_used, "adaptive");
  }
}
