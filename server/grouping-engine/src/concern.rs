//! Path helpers and concern classification derived from path patterns.

use std::collections::BTreeSet;

use crate::config::Policy;
use crate::types::{Concern, GroupCategory};

/// Sentinel bucket for files with no parent directory.
pub const ROOT_DIR: &str = "root";

/// Sentinel extension for files without one.
pub const NO_EXTENSION: &str = "(noext)";

const SOURCE_EXTS: &[&str] = &[
  "py", "rs", "go", "java", "kt", "scala", "js", "jsx", "ts", "tsx", "mjs", "cjs", "c", "h",
  "cc", "cpp", "hpp", "cs", "rb", "php", "swift", "m", "sh", "vue", "svelte", "css", "scss",
  "html",
];
const CONFIG_EXTS: &[&str] = &[
  "json", "yaml", "yml", "toml", "ini", "cfg", "conf", "env", "properties", "xml", "lock",
];
const DOC_EXTS: &[&str] = &["md", "rst", "txt", "adoc"];

/// Parent directory of a path, or `ROOT_DIR`.
pub fn parent_dir(path: &str) -> &str {
  match path.rsplit_once('/') {
    Some((dir, _)) if !dir.is_empty() => dir,
    _ => ROOT_DIR,
  }
}

/// First path segment, or `None` for files at the repository root.
pub fn top_level_dir(path: &str) -> Option<&str> {
  path.split_once('/').map(|(top, _)| top).filter(|t| !t.is_empty())
}

pub fn file_name(path: &str) -> &str {
  path.rsplit('/').next().unwrap_or(path)
}

/// Lowercased extension without the dot, or `NO_EXTENSION`.
/// Dotfiles such as `.env` count as having no extension.
pub fn extension(path: &str) -> String {
  let name = file_name(path);
  match name.rsplit_once('.') {
    Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_ascii_lowercase(),
    _ => NO_EXTENSION.to_string(),
  }
}

fn is_test_path(p: &str, name: &str) -> bool {
  let in_test_dir = p
    .split('/')
    .rev()
    .skip(1)
    .any(|seg| matches!(seg, "test" | "tests" | "__tests__" | "spec" | "specs"));
  in_test_dir
    || name.starts_with("test_")
    || name.contains("_test.")
    || name.contains(".test.")
    || name.contains(".spec.")
    || name.contains("_spec.")
}

/// Concern class of one file from path and extension heuristics.
pub fn classify(path: &str) -> Concern {
  let p = path.to_lowercase();
  let name = file_name(&p);
  let ext = extension(&p);

  if is_test_path(&p, name) {
    return Concern::Test;
  }
  if ext == "sql"
    || p.starts_with("migrations/")
    || p.contains("/migrations/")
    || name.contains("migration")
  {
    return Concern::Database;
  }
  if DOC_EXTS.contains(&ext.as_str())
    || p.starts_with("docs/")
    || p.contains("/docs/")
    || name.starts_with("readme")
    || name.starts_with("changelog")
  {
    return Concern::Docs;
  }
  if CONFIG_EXTS.contains(&ext.as_str())
    || name.starts_with(".env")
    || name == "dockerfile"
    || name == "makefile"
  {
    return Concern::Config;
  }
  if SOURCE_EXTS.contains(&ext.as_str()) {
    return Concern::Source;
  }
  Concern::Other
}

/// Category for a set of files: the shared concern, or `Mixed`.
pub fn category_of<S: AsRef<str>>(files: &[S]) -> GroupCategory {
  let concerns: BTreeSet<Concern> = files.iter().map(|f| classify(f.as_ref())).collect();
  match concerns.len() {
    1 => concerns
      .into_iter()
      .next()
      .map(GroupCategory::from)
      .unwrap_or(GroupCategory::Other),
    0 => GroupCategory::Other,
    _ => GroupCategory::Mixed,
  }
}

/// Concern classes that should not share a pull request. Tests and database
/// changes travel with the source they exercise, so they never conflict.
pub fn conflicting_concerns<S: AsRef<str>>(files: &[S]) -> BTreeSet<Concern> {
  files
    .iter()
    .map(|f| classify(f.as_ref()))
    .filter(|c| matches!(c, Concern::Source | Concern::Config | Concern::Docs))
    .collect()
}

pub fn top_level_dirs<S: AsRef<str>>(files: &[S]) -> BTreeSet<&str> {
  files.iter().filter_map(|f| top_level_dir(f.as_ref())).collect()
}

pub fn extensions<S: AsRef<str>>(files: &[S]) -> BTreeSet<String> {
  files
    .iter()
    .map(|f| extension(f.as_ref()))
    .filter(|e| e != NO_EXTENSION)
    .collect()
}

/// Mixed-concern predicate shared by atomicity splitting and the cohesion rule.
pub fn has_mixed_concerns<S: AsRef<str>>(files: &[S], policy: &Policy) -> bool {
  top_level_dirs(files).len() > policy.max_directories_per_group
    || (files.len() >= policy.mixed_concern_min_files && conflicting_concerns(files).len() > 1)
    || extensions(files).len() > policy.max_extension_diversity
}
