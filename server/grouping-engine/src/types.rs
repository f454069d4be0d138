//! Core types for the grouping engine (JSON contracts + internal models).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::Policy;

// ---------------------------------------------------------------------------
// Inbound types (JSON contract: what the caller sends)
// ---------------------------------------------------------------------------

/// One changed file as reported by the repository analyzer.
/// Unknown fields are silently ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFile {
  pub path: String,
  #[serde(alias = "status_code")]
  pub status: String,
  #[serde(default)]
  pub lines_added: i64,
  #[serde(default)]
  pub lines_deleted: i64,
  #[serde(default)]
  pub is_binary: bool,
  #[serde(default)]
  pub staged: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundChangeSet {
  #[serde(default)]
  pub repository_path: Option<String>,
  #[serde(default)]
  pub analysis_timestamp: Option<String>,
  pub files: Vec<InboundFile>,
}

/// Naming/pattern relationships precomputed by an external analyzer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatternIndex {
  /// Related files such as implementation/test pairs.
  #[serde(default)]
  pub relations: Vec<RelationPattern>,
  #[serde(default)]
  pub similar_names: Vec<SimilarNameCluster>,
  #[serde(default)]
  pub common_prefixes: Vec<AffixCluster>,
  #[serde(default)]
  pub common_suffixes: Vec<AffixCluster>,
}

impl PatternIndex {
  pub fn is_empty(&self) -> bool {
    self.relations.is_empty()
      && self.similar_names.is_empty()
      && self.common_prefixes.is_empty()
      && self.common_suffixes.is_empty()
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelationPattern {
  #[serde(alias = "type")]
  pub kind: String,
  #[serde(alias = "matches")]
  pub files: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimilarNameCluster {
  pub base_pattern: String,
  pub files: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AffixCluster {
  pub pattern_value: String,
  pub files: Vec<String>,
}

/// File → files it depends on. Entries outside the change-set are ignored.
pub type DependencyMap = HashMap<String, Vec<String>>;

/// One grouping run as requested by the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupingRequest {
  pub change_set: InboundChangeSet,
  #[serde(default)]
  pub pattern_index: Option<PatternIndex>,
  #[serde(default)]
  pub dependencies: Option<DependencyMap>,
  #[serde(default)]
  pub strategy: Option<String>,
  #[serde(default)]
  pub policy: Policy,
  /// Rule names to run; all rules when absent.
  #[serde(default)]
  pub rules: Option<Vec<String>>,
  /// When set, also plan batches of roughly this many files.
  #[serde(default)]
  pub batch_size: Option<usize>,
}

// ---------------------------------------------------------------------------
// Internal normalized types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
  Added,
  Modified,
  Deleted,
  Renamed,
  Untracked,
}

impl FileStatus {
  pub fn from_str_loose(s: &str) -> Option<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "a" | "added" | "c" | "copied" => Some(Self::Added),
      "m" | "modified" | "u" | "unmerged" => Some(Self::Modified),
      "d" | "deleted" => Some(Self::Deleted),
      "r" | "renamed" => Some(Self::Renamed),
      "?" | "??" | "untracked" => Some(Self::Untracked),
      _ => None,
    }
  }
}

/// Canonical changed file after normalization + validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
  pub path: String,
  pub status: FileStatus,
  pub lines_added: u64,
  pub lines_deleted: u64,
  pub is_binary: bool,
  pub staged: bool,
}

impl FileRecord {
  pub fn churn(&self) -> u64 {
    self.lines_added.saturating_add(self.lines_deleted)
  }
}

#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
  pub repository_path: Option<String>,
  pub analysis_timestamp: Option<DateTime<Utc>>,
  pub files: Vec<FileRecord>,
}

impl ChangeSet {
  /// Path → record lookup for churn and membership checks.
  pub fn index(&self) -> HashMap<&str, &FileRecord> {
    self.files.iter().map(|f| (f.path.as_str(), f)).collect()
  }
}

// ---------------------------------------------------------------------------
// Strategy selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
  Directory,
  Pattern,
  Dependency,
  Hybrid,
  Module,
  SizeBalanced,
}

impl StrategyType {
  pub fn from_str_loose(s: &str) -> Option<Self> {
    match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
      "directory" | "directory_based" => Some(Self::Directory),
      "pattern" | "semantic" | "feature" | "feature_based" => Some(Self::Pattern),
      "dependency" => Some(Self::Dependency),
      "hybrid" | "mixed" => Some(Self::Hybrid),
      "module" | "module_based" | "extension" => Some(Self::Module),
      "size_balanced" | "size" => Some(Self::SizeBalanced),
      _ => None,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Directory => "directory",
      Self::Pattern => "pattern",
      Self::Dependency => "dependency",
      Self::Hybrid => "hybrid",
      Self::Module => "module",
      Self::SizeBalanced => "size_balanced",
    }
  }
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

/// Coarse category of a file's purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Concern {
  Source,
  Test,
  Config,
  Docs,
  Database,
  Other,
}

impl Concern {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Source => "source",
      Self::Test => "test",
      Self::Config => "config",
      Self::Docs => "docs",
      Self::Database => "database",
      Self::Other => "other",
    }
  }
}

/// Group category: one concern, or `Mixed` when members span several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupCategory {
  Source,
  Test,
  Config,
  Docs,
  Database,
  Other,
  Mixed,
}

impl From<Concern> for GroupCategory {
  fn from(c: Concern) -> Self {
    match c {
      Concern::Source => Self::Source,
      Concern::Test => Self::Test,
      Concern::Config => Self::Config,
      Concern::Docs => Self::Docs,
      Concern::Database => Self::Database,
      Concern::Other => Self::Other,
    }
  }
}

/// Which strategy originally proposed a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
  Dependency,
  Pattern,
  Directory,
  Module,
  SizeBalanced,
  Fallback,
}

impl Provenance {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Dependency => "dependency",
      Self::Pattern => "pattern",
      Self::Directory => "directory",
      Self::Module => "module",
      Self::SizeBalanced => "size_balanced",
      Self::Fallback => "fallback",
    }
  }
}

/// A subset of the change-set proposed as one reviewable unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeGroup {
  pub id: String,
  pub label: String,
  pub files: Vec<String>,
  pub category: GroupCategory,
  pub confidence: f64,
  pub reasoning: String,
  pub semantic_similarity: f64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub directory_focus: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub feature_focus: Option<String>,
  pub provenance: Provenance,
}

// ---------------------------------------------------------------------------
// Output types (JSON contract: what we emit)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct GroupingResult {
  pub strategy_type: StrategyType,
  pub groups: Vec<ChangeGroup>,
  pub explanation: String,
  pub estimated_review_complexity: f64,
  pub ungrouped_files: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub analysis_timestamp: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
  Low,
  Medium,
  High,
  Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
  pub severity: IssueSeverity,
  pub issue_type: String,
  pub description: String,
  pub affected_group_ids: Vec<String>,
  pub recommendation: String,
}

/// Per-group rule outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupReport {
  pub group_id: String,
  pub valid: bool,
  pub errors: Vec<String>,
  pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
  pub is_valid: bool,
  pub groups: Vec<GroupReport>,
  pub issues: Vec<ValidationIssue>,
  pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchPlan {
  pub batches: Vec<Vec<String>>,
  pub strategy_used: String,
  pub notes: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupingResponse {
  pub result: GroupingResult,
  pub validation: ValidationReport,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub batches: Option<BatchPlan>,
}

// ---------------------------------------------------------------------------
// CLI stream wrappers
// ---------------------------------------------------------------------------

/// Structured error output for invalid requests.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorOutput {
  pub error: bool,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub field: Option<String>,
}

impl ErrorOutput {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      error: true,
      message: message.into(),
      field: None,
    }
  }

  pub fn with_field(mut self, field: impl Into<String>) -> Self {
    self.field = Some(field.into());
    self
  }
}
