//! Naming/pattern similarity from a precomputed PatternIndex.
//!
//! Claim order: relation pairs, similar-name clusters, prefix/suffix
//! clusters, then extension buckets for whatever is left. Each step only
//! claims files no earlier step took.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::config::Policy;
use crate::grouping::{bucket_by_extension, directory, split_oversized, StrategyOutput};
use crate::normalize::normalize_path;
use crate::types::*;

/// Tracks which changed files have been claimed by an earlier pattern.
struct Claims<'a> {
  changed: HashSet<&'a str>,
  claimed: HashSet<String>,
}

impl<'a> Claims<'a> {
  fn new(files: &'a [FileRecord]) -> Self {
    Self {
      changed: files.iter().map(|f| f.path.as_str()).collect(),
      claimed: HashSet::new(),
    }
  }

  /// Unclaimed changed members of a candidate, in candidate order, deduped.
  fn available(&self, candidates: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    candidates
      .iter()
      .map(|c| normalize_path(c))
      .filter(|p| self.changed.contains(p.as_str()) && !self.claimed.contains(p))
      .filter(|p| seen.insert(p.clone()))
      .collect()
  }

  fn claim(&mut self, files: &[String]) {
    self.claimed.extend(files.iter().cloned());
  }
}

/// Full pattern strategy. Without a usable index this degrades to directory
/// grouping.
pub fn group(
  files: &[FileRecord],
  index: Option<&PatternIndex>,
  policy: &Policy,
) -> StrategyOutput {
  let index = match index {
    Some(ix) if !ix.is_empty() => ix,
    _ => {
      info!("no pattern index supplied; falling back to directory grouping");
      return StrategyOutput {
        groups: directory::group(files, policy),
        fallback: Some("no pattern index supplied; used directory grouping".into()),
      };
    }
  };

  let (mut groups, claims) = matched(files, index, policy);
  let leftover: Vec<String> = files
    .iter()
    .filter(|f| !claims.claimed.contains(&f.path))
    .map(|f| f.path.clone())
    .collect();
  debug!(matched = groups.len(), leftover = leftover.len(), "pattern matching done");
  groups.extend(bucket_by_extension(
    leftover,
    Provenance::Pattern,
    "Other",
    0.5,
    policy,
  ));

  StrategyOutput {
    groups,
    fallback: None,
  }
}

/// Groups backed by an actual pattern match (steps 1–3 only). Used by the
/// hybrid merger, where unmatched files are left to weaker strategies.
pub fn matched_groups(
  files: &[FileRecord],
  index: Option<&PatternIndex>,
  policy: &Policy,
) -> Vec<ChangeGroup> {
  match index {
    Some(ix) if !ix.is_empty() => matched(files, ix, policy).0,
    _ => Vec::new(),
  }
}

fn matched<'a>(
  files: &'a [FileRecord],
  index: &PatternIndex,
  policy: &Policy,
) -> (Vec<ChangeGroup>, Claims<'a>) {
  let mut claims = Claims::new(files);
  let mut groups = Vec::new();
  let max = policy.max_files_per_group;

  for relation in &index.relations {
    let members = claims.available(&relation.files);
    if members.is_empty() {
      continue;
    }
    claims.claim(&members);
    let group = ChangeGroup::new(
      Provenance::Pattern,
      format!("Related {} changes", relation.kind),
      members,
    )
    .with_confidence(0.85)
    .with_similarity(0.85)
    .with_reasoning(format!("Files related by the '{}' pattern.", relation.kind))
    .with_feature_focus(relation.kind.clone());
    groups.extend(split_oversized(group, max));
  }

  for cluster in &index.similar_names {
    let members = claims.available(&cluster.files);
    if members.is_empty() {
      continue;
    }
    claims.claim(&members);
    let group = ChangeGroup::new(
      Provenance::Pattern,
      format!("Files related to '{}'", cluster.base_pattern),
      members,
    )
    .with_confidence(0.8)
    .with_similarity(0.8)
    .with_reasoning(format!(
      "Files sharing the common base pattern '{}'.",
      cluster.base_pattern
    ))
    .with_feature_focus(cluster.base_pattern.clone());
    groups.extend(split_oversized(group, max));
  }

  let affixes = index
    .common_prefixes
    .iter()
    .map(|c| ("prefix", c))
    .chain(index.common_suffixes.iter().map(|c| ("suffix", c)));
  for (kind, cluster) in affixes {
    let members = claims.available(&cluster.files);
    // Oversized affix clusters stay unclaimed rather than being split into
    // two groups with the same rationale.
    if members.is_empty() || members.len() > max {
      if members.len() > max {
        debug!(kind, pattern = %cluster.pattern_value, size = members.len(), "affix cluster too large; skipped");
      }
      continue;
    }
    claims.claim(&members);
    groups.push(
      ChangeGroup::new(
        Provenance::Pattern,
        format!("Files with {} '{}'", kind, cluster.pattern_value),
        members,
      )
      .with_confidence(0.7)
      .with_similarity(0.7)
      .with_reasoning(format!(
        "Files sharing the common {} '{}'.",
        kind, cluster.pattern_value
      ))
      .with_feature_focus(format!("{}-{}", kind, cluster.pattern_value)),
    );
  }

  (groups, claims)
}
