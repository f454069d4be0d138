//! Dependency connectivity: connected components of the undirected import
//! graph restricted to the change-set.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::config::Policy;
use crate::grouping::{bucket_by_extension, directory, split_oversized, StrategyOutput};
use crate::normalize::normalize_path;
use crate::types::*;

/// Undirected adjacency over changed files, indexed by input position.
pub struct DependencyGraph {
  adjacency: Vec<Vec<usize>>,
  edges: usize,
}

impl DependencyGraph {
  /// Edge (a, b) exists if a depends on b or b on a, and both are changed.
  /// Self-dependencies and paths outside the change-set are dropped.
  pub fn build(files: &[FileRecord], deps: Option<&DependencyMap>) -> Self {
    let position: HashMap<&str, usize> = files
      .iter()
      .enumerate()
      .map(|(i, f)| (f.path.as_str(), i))
      .collect();
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); files.len()];

    for (from, targets) in deps.into_iter().flatten() {
      let Some(&a) = position.get(normalize_path(from).as_str()) else {
        continue;
      };
      for to in targets {
        let Some(&b) = position.get(normalize_path(to).as_str()) else {
          continue;
        };
        if a != b {
          adjacency[a].push(b);
          adjacency[b].push(a);
        }
      }
    }

    let mut edges = 0;
    for neighbors in &mut adjacency {
      neighbors.sort_unstable();
      neighbors.dedup();
      edges += neighbors.len();
    }

    Self {
      adjacency,
      edges: edges / 2,
    }
  }

  pub fn edge_count(&self) -> usize {
    self.edges
  }

  /// Connected components, each sorted by input position, ordered by their
  /// first member. Uses an explicit worklist; nodes are marked visited
  /// before being pushed so cycles terminate.
  pub fn components(&self) -> Vec<Vec<usize>> {
    let n = self.adjacency.len();
    let mut visited = vec![false; n];
    let mut out = Vec::new();

    for start in 0..n {
      if visited[start] {
        continue;
      }
      visited[start] = true;
      let mut stack = vec![start];
      let mut component = Vec::new();
      while let Some(node) = stack.pop() {
        component.push(node);
        for &next in &self.adjacency[node] {
          if !visited[next] {
            visited[next] = true;
            stack.push(next);
          }
        }
      }
      component.sort_unstable();
      out.push(component);
    }
    out
  }
}

fn component_paths(files: &[FileRecord], component: &[usize]) -> Vec<String> {
  component.iter().map(|&i| files[i].path.clone()).collect()
}

fn component_group(files: &[FileRecord], component: &[usize], policy: &Policy) -> Vec<ChangeGroup> {
  let paths = component_paths(files, component);
  let anchor = paths[0].clone();
  let group = ChangeGroup::new(
    Provenance::Dependency,
    format!("Dependency cluster around '{}'", anchor),
    paths,
  )
  .with_confidence(0.9)
  .with_similarity(0.8)
  .with_reasoning(format!(
    "{} files connected through import/dependency edges.",
    component.len()
  ));
  split_oversized(group, policy.max_files_per_group)
}

/// Groups for connected components with at least two files. Used by the
/// hybrid merger, where isolated files are left to weaker strategies.
pub fn connected_groups(
  files: &[FileRecord],
  deps: Option<&DependencyMap>,
  policy: &Policy,
) -> Vec<ChangeGroup> {
  let graph = DependencyGraph::build(files, deps);
  graph
    .components()
    .iter()
    .filter(|c| c.len() > 1)
    .flat_map(|c| component_group(files, c, policy))
    .collect()
}

/// Full dependency strategy: one group per component, isolated files
/// bucketed by extension. With no edges among the changed files this defers
/// to directory grouping.
pub fn group(
  files: &[FileRecord],
  deps: Option<&DependencyMap>,
  policy: &Policy,
) -> StrategyOutput {
  let graph = DependencyGraph::build(files, deps);
  if graph.edge_count() == 0 {
    info!("no dependency edges among changed files; falling back to directory grouping");
    return StrategyOutput {
      groups: directory::group(files, policy),
      fallback: Some("no dependency edges among changed files; used directory grouping".into()),
    };
  }

  let mut groups = Vec::new();
  let mut isolated = Vec::new();
  for component in graph.components() {
    if component.len() == 1 {
      isolated.push(files[component[0]].path.clone());
    } else {
      groups.extend(component_group(files, &component, policy));
    }
  }
  debug!(
    edges = graph.edge_count(),
    components = groups.len(),
    isolated = isolated.len(),
    "dependency graph built"
  );
  groups.extend(bucket_by_extension(
    isolated,
    Provenance::Dependency,
    "Independent",
    0.5,
    policy,
  ));

  StrategyOutput {
    groups,
    fallback: None,
  }
}
