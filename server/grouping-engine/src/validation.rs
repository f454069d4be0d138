//! Whole-grouping validation: named rules per group plus structural checks
//! across groups (empties, non-atomic groups, duplicates, ungrouped files and
//! dependency cycles).

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::{debug, info};

use crate::atomicity::{AtomicityValidator, Verdict, Violation};
use crate::config::Policy;
use crate::error::EngineError;
use crate::normalize::normalize_path;
use crate::rules::{Rule, RuleValidator};
use crate::types::*;

/// Validate a grouping of `files`. `final_pass` additionally requires every
/// changed file to appear in some group.
pub fn validate(
  groups: &[ChangeGroup],
  files: &[FileRecord],
  deps: Option<&DependencyMap>,
  policy: &Policy,
  rules: Vec<Rule>,
  final_pass: bool,
) -> Result<ValidationReport, EngineError> {
  let validator = RuleValidator::new(policy, files, deps, rules)?;

  let mut reports = Vec::with_capacity(groups.len());
  let mut issues = Vec::new();
  for group in groups {
    let (report, group_issues) = validator.check_group(group);
    reports.push(report);
    issues.extend(group_issues);
  }

  let structural = structural_issues(groups, files, deps, policy, final_pass);
  let is_valid = structural.is_empty() && reports.iter().all(|r| r.valid);
  issues.extend(structural);

  info!(
    groups = groups.len(),
    issues = issues.len(),
    valid = is_valid,
    "validation complete"
  );
  Ok(ValidationReport {
    is_valid,
    notes: format!("Validation complete. Found {} issues.", issues.len()),
    groups: reports,
    issues,
  })
}

/// Problems with the grouping as a whole, independent of rule selection.
pub fn structural_issues(
  groups: &[ChangeGroup],
  files: &[FileRecord],
  deps: Option<&DependencyMap>,
  policy: &Policy,
  final_pass: bool,
) -> Vec<ValidationIssue> {
  let mut issues = Vec::new();
  let atomicity = AtomicityValidator::new(policy, files);

  for group in groups.iter().filter(|g| g.files.is_empty()) {
    issues.push(ValidationIssue {
      severity: IssueSeverity::High,
      issue_type: "empty_group".into(),
      description: format!("Group '{}' contains no files", group.label),
      affected_group_ids: vec![group.id.clone()],
      recommendation: "Remove the empty group.".into(),
    });
  }

  for group in groups.iter().filter(|g| !g.files.is_empty()) {
    if let Verdict::NeedsSplit(violations) = atomicity.assess(group) {
      let reasons: Vec<String> = violations.iter().map(describe_violation).collect();
      issues.push(ValidationIssue {
        severity: IssueSeverity::Medium,
        issue_type: "non_atomic_group".into(),
        description: format!("Group '{}' is not atomic: {}", group.label, reasons.join("; ")),
        affected_group_ids: vec![group.id.clone()],
        recommendation: "Split the group further or review it as a known exception.".into(),
      });
    }
  }

  // file -> ids of the groups containing it, in group order
  let mut owners: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
  for group in groups {
    for file in &group.files {
      owners.entry(file.as_str()).or_default().push(group.id.as_str());
    }
  }
  for (file, ids) in owners.iter().filter(|(_, ids)| ids.len() > 1) {
    issues.push(ValidationIssue {
      severity: IssueSeverity::Critical,
      issue_type: "duplicate_file".into(),
      description: format!("File '{}' appears in {} groups", file, ids.len()),
      affected_group_ids: ids.iter().map(|id| id.to_string()).collect(),
      recommendation: "Assign each file to exactly one group.".into(),
    });
  }

  if final_pass {
    let ungrouped: Vec<&str> = files
      .iter()
      .map(|f| f.path.as_str())
      .filter(|p| !owners.contains_key(p))
      .collect();
    if !ungrouped.is_empty() {
      issues.push(ValidationIssue {
        severity: IssueSeverity::Medium,
        issue_type: "ungrouped_files".into(),
        description: format!("{} files are not in any group: {}", ungrouped.len(), ungrouped.join(", ")),
        affected_group_ids: Vec::new(),
        recommendation: "Add the remaining files to a group.".into(),
      });
    }
  }

  for cycle in group_cycles(groups, deps) {
    let labels: Vec<&str> = cycle.iter().map(String::as_str).collect();
    issues.push(ValidationIssue {
      severity: IssueSeverity::High,
      issue_type: "dependency_cycle".into(),
      description: format!("Groups depend on each other in a cycle: {}", labels.join(" -> ")),
      affected_group_ids: cycle[..cycle.len() - 1].to_vec(),
      recommendation: "Merge the groups in the cycle or break the dependency.".into(),
    });
  }

  issues
}

fn describe_violation(v: &Violation) -> String {
  match v {
    Violation::TooManyFiles { count, max } => format!("{} files (max {})", count, max),
    Violation::TooMuchChurn { churn, max } => format!("{} changed lines (max {})", churn, max),
    Violation::MixedConcerns => "mixed concerns".to_string(),
  }
}

/// Cycles in the group graph, where group A depends on group B when a member
/// of A depends on a member of B. Each cycle is returned closed (first id
/// repeated at the end), rotated to start at its smallest id, without
/// duplicates.
pub fn group_cycles(groups: &[ChangeGroup], deps: Option<&DependencyMap>) -> Vec<Vec<String>> {
  let Some(deps) = deps else {
    return Vec::new();
  };

  let mut owner: HashMap<String, &str> = HashMap::new();
  for group in groups {
    for file in &group.files {
      owner.entry(file.clone()).or_insert(group.id.as_str());
    }
  }

  let mut adjacency: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
  for (from, targets) in deps {
    let Some(&a) = owner.get(&normalize_path(from)) else {
      continue;
    };
    for to in targets {
      if let Some(&b) = owner.get(&normalize_path(to)) {
        if a != b {
          adjacency.entry(a).or_default().insert(b);
        }
      }
    }
  }
  debug!(edges = adjacency.values().map(BTreeSet::len).sum::<usize>(), "group graph built");

  let mut state = DfsState::default();
  let nodes: Vec<&str> = adjacency.keys().copied().collect();
  for node in nodes {
    if !state.visited.contains(node) {
      dfs(node, &adjacency, &mut state);
    }
  }
  state.cycles.into_iter().collect()
}

#[derive(Default)]
struct DfsState<'a> {
  visited: HashSet<&'a str>,
  on_stack: HashSet<&'a str>,
  path: Vec<&'a str>,
  cycles: BTreeSet<Vec<String>>,
}

/// Depth-first walk from `start` with an explicit frame stack; each frame
/// holds a node and its not-yet-visited neighbours.
fn dfs<'a>(start: &'a str, adjacency: &BTreeMap<&'a str, BTreeSet<&'a str>>, state: &mut DfsState<'a>) {
  let empty = BTreeSet::new();
  let neighbors = |node: &str| adjacency.get(node).unwrap_or(&empty).iter();

  enter(start, state);
  let mut frames = vec![(start, neighbors(start))];
  while let Some(frame) = frames.last_mut() {
    let node = frame.0;
    match frame.1.next().copied() {
      Some(next) if !state.visited.contains(next) => {
        enter(next, state);
        frames.push((next, neighbors(next)));
      }
      Some(next) => {
        if state.on_stack.contains(next) {
          record_cycle(next, state);
        }
      }
      None => {
        state.on_stack.remove(node);
        state.path.pop();
        frames.pop();
      }
    }
  }
}

fn enter<'a>(node: &'a str, state: &mut DfsState<'a>) {
  state.visited.insert(node);
  state.on_stack.insert(node);
  state.path.push(node);
}

fn record_cycle(start: &str, state: &mut DfsState<'_>) {
  let Some(pos) = state.path.iter().position(|n| *n == start) else {
    return;
  };
  let members = &state.path[pos..];
  let min = members
    .iter()
    .enumerate()
    .min_by_key(|(_, id)| **id)
    .map(|(i, _)| i)
    .unwrap_or(0);
  let mut cycle: Vec<String> = members[min..]
    .iter()
    .chain(&members[..min])
    .map(|id| id.to_string())
    .collect();
  cycle.push(cycle[0].clone());
  state.cycles.insert(cycle);
}
