//! Directory locality: one group per parent directory.

use std::collections::HashMap;

use crate::concern;
use crate::config::Policy;
use crate::grouping::split_oversized;
use crate::types::{ChangeGroup, FileRecord, Provenance};

/// Group files by parent directory in first-seen order. Oversized
/// directories are split into "(Part i/n)" chunks that keep the directory
/// focus. No file is dropped.
pub fn group(files: &[FileRecord], policy: &Policy) -> Vec<ChangeGroup> {
  let mut order: Vec<&str> = Vec::new();
  let mut buckets: HashMap<&str, Vec<String>> = HashMap::new();
  for f in files {
    let dir = concern::parent_dir(&f.path);
    buckets
      .entry(dir)
      .or_insert_with(|| {
        order.push(dir);
        Vec::new()
      })
      .push(f.path.clone());
  }

  let mut out = Vec::new();
  for dir in order {
    let Some(paths) = buckets.remove(dir) else {
      continue;
    };
    let group = ChangeGroup::new(Provenance::Directory, format!("Changes in '{}'", dir), paths)
      .with_confidence(0.6)
      .with_similarity(0.5)
      .with_reasoning(format!("Changes focused within the '{}' directory.", dir))
      .with_directory_focus(dir);
    out.extend(split_oversized(group, policy.max_files_per_group));
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::grouping::test_support::records;

  #[test]
  fn one_group_per_directory() {
    let files = records(&["src/a.rs", "lib/b.rs", "src/c.rs", "README.md"]);
    let groups = group(&files, &Policy::default());
    assert_eq!(groups.len(), 3);
    assert_eq!(groups[0].files, vec!["src/a.rs", "src/c.rs"]);
    assert_eq!(groups[0].directory_focus.as_deref(), Some("src"));
    assert_eq!(groups[1].directory_focus.as_deref(), Some("lib"));
    assert_eq!(groups[2].directory_focus.as_deref(), Some("root"));
  }

  #[test]
  fn nine_files_max_three_gives_three_parts() {
    let paths: Vec<String> = (0..9).map(|i| format!("src/file_{}.py", i)).collect();
    let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let files = records(&refs);
    let policy = Policy {
      max_files_per_group: 3,
      ..Policy::default()
    };
    let groups = group(&files, &policy);
    assert_eq!(groups.len(), 3);
    for (i, g) in groups.iter().enumerate() {
      assert_eq!(g.files.len(), 3);
      assert!(g.label.ends_with(&format!("(Part {}/3)", i + 1)), "label: {}", g.label);
      assert_eq!(g.directory_focus.as_deref(), Some("src"));
    }
  }

  #[test]
  fn empty_input_gives_no_groups() {
    assert!(group(&[], &Policy::default()).is_empty());
  }
}
