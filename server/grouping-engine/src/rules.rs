//! Named validation rules applied to finished groups.
//!
//! Rules run independently of the atomicity splitter, so groupings produced
//! elsewhere can be checked too. Failures are data, never errors.

use std::collections::{HashMap, HashSet};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::warn;

use crate::concern;
use crate::config::Policy;
use crate::error::EngineError;
use crate::normalize::normalize_path;
use crate::types::*;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Rule {
  Size,
  Cohesion,
  DependencyCompleteness,
  TestCoverage,
  BalancedChurn,
  CrossModule,
  /// Unrecognized name; reported as a warning and otherwise ignored.
  Unknown(String),
}

impl Rule {
  pub fn from_name(name: &str) -> Self {
    match name.trim().to_ascii_lowercase().as_str() {
      "size" | "size_check" => Self::Size,
      "cohesion" | "cohesion_check" => Self::Cohesion,
      "dependency" | "dependency_check" | "dependency_completeness" => {
        Self::DependencyCompleteness
      }
      "test_coverage" => Self::TestCoverage,
      "balanced_churn" | "balanced_changes" => Self::BalancedChurn,
      "cross_module" | "cross_module_check" => Self::CrossModule,
      _ => Self::Unknown(name.to_string()),
    }
  }

  pub fn name(&self) -> &str {
    match self {
      Self::Size => "size",
      Self::Cohesion => "cohesion",
      Self::DependencyCompleteness => "dependency_completeness",
      Self::TestCoverage => "test_coverage",
      Self::BalancedChurn => "balanced_churn",
      Self::CrossModule => "cross_module",
      Self::Unknown(name) => name,
    }
  }

  pub fn all() -> Vec<Rule> {
    vec![
      Self::Size,
      Self::Cohesion,
      Self::DependencyCompleteness,
      Self::TestCoverage,
      Self::BalancedChurn,
      Self::CrossModule,
    ]
  }

  /// Parse a caller-supplied rule list; `None` selects every rule.
  pub fn parse_list(names: Option<&[String]>) -> Vec<Rule> {
    match names {
      Some(names) => names.iter().map(|n| Rule::from_name(n)).collect(),
      None => Rule::all(),
    }
  }

  fn failure_severity(&self) -> IssueSeverity {
    match self {
      Self::Size | Self::DependencyCompleteness => IssueSeverity::High,
      Self::Cohesion | Self::CrossModule => IssueSeverity::Medium,
      Self::TestCoverage | Self::BalancedChurn | Self::Unknown(_) => IssueSeverity::Low,
    }
  }

  fn recommendation(&self) -> &'static str {
    match self {
      Self::Size => "Split the group into smaller pull requests.",
      Self::Cohesion => "Separate unrelated files into their own groups.",
      Self::DependencyCompleteness => "Move the missing dependencies into this group or land them first.",
      Self::TestCoverage => "Add or include tests for the changed implementation files.",
      Self::BalancedChurn => "Check whether the change mixes a large addition with an unrelated removal.",
      Self::CrossModule => "Limit the group to fewer top-level modules.",
      Self::Unknown(_) => "Check the rule name.",
    }
  }
}

/// Result of one rule on one group. `passed` is false only for hard failures;
/// warnings never fail a group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleOutcome {
  pub passed: bool,
  pub errors: Vec<String>,
  pub warnings: Vec<String>,
}

impl RuleOutcome {
  fn pass() -> Self {
    Self {
      passed: true,
      ..Self::default()
    }
  }

  fn fail(&mut self, msg: impl Into<String>) {
    self.passed = false;
    self.errors.push(msg.into());
  }

  fn warn(&mut self, msg: impl Into<String>) {
    self.warnings.push(msg.into());
  }
}

pub struct RuleValidator<'a> {
  policy: &'a Policy,
  rules: Vec<Rule>,
  records: HashMap<&'a str, &'a FileRecord>,
  deps: HashMap<String, Vec<String>>,
  test_globs: GlobSet,
}

impl<'a> RuleValidator<'a> {
  pub fn new(
    policy: &'a Policy,
    files: &'a [FileRecord],
    deps: Option<&DependencyMap>,
    rules: Vec<Rule>,
  ) -> Result<Self, EngineError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in &policy.test_patterns {
      let glob = Glob::new(pattern).map_err(|e| {
        EngineError::validation("policy.test_patterns", &format!("invalid glob '{}': {}", pattern, e))
      })?;
      builder.add(glob);
    }
    let test_globs = builder
      .build()
      .map_err(|e| EngineError::validation("policy.test_patterns", &e.to_string()))?;

    let deps = deps
      .into_iter()
      .flatten()
      .map(|(from, to)| {
        (
          normalize_path(from),
          to.iter().map(|t| normalize_path(t)).collect(),
        )
      })
      .collect();

    Ok(Self {
      policy,
      rules,
      records: files.iter().map(|f| (f.path.as_str(), f)).collect(),
      deps,
      test_globs,
    })
  }

  pub fn rules(&self) -> &[Rule] {
    &self.rules
  }

  /// Run every selected rule on one group.
  pub fn check_group(&self, group: &ChangeGroup) -> (GroupReport, Vec<ValidationIssue>) {
    let mut report = GroupReport {
      group_id: group.id.clone(),
      valid: true,
      errors: Vec::new(),
      warnings: Vec::new(),
    };
    let mut issues = Vec::new();

    for rule in &self.rules {
      let outcome = self.apply(rule, group);
      if !outcome.passed {
        report.valid = false;
      }
      for msg in &outcome.errors {
        issues.push(self.issue(rule, rule.failure_severity(), group, msg));
      }
      for msg in &outcome.warnings {
        issues.push(self.issue(rule, IssueSeverity::Low, group, msg));
      }
      report.errors.extend(outcome.errors);
      report.warnings.extend(outcome.warnings);
    }
    (report, issues)
  }

  fn issue(&self, rule: &Rule, severity: IssueSeverity, group: &ChangeGroup, msg: &str) -> ValidationIssue {
    ValidationIssue {
      severity,
      issue_type: rule.name().to_string(),
      description: msg.to_string(),
      affected_group_ids: vec![group.id.clone()],
      recommendation: rule.recommendation().to_string(),
    }
  }

  pub fn apply(&self, rule: &Rule, group: &ChangeGroup) -> RuleOutcome {
    match rule {
      Rule::Size => self.size(group),
      Rule::Cohesion => self.cohesion(group),
      Rule::DependencyCompleteness => self.dependency_completeness(group),
      Rule::TestCoverage => self.test_coverage(group),
      Rule::BalancedChurn => self.balanced_churn(group),
      Rule::CrossModule => self.cross_module(group),
      Rule::Unknown(name) => {
        warn!(rule = %name, "unknown validation rule");
        let mut out = RuleOutcome::pass();
        out.warn(format!("Rule '{}' not implemented.", name));
        out
      }
    }
  }

  fn totals(&self, group: &ChangeGroup) -> (u64, u64) {
    group
      .files
      .iter()
      .filter_map(|f| self.records.get(f.as_str()))
      .fold((0u64, 0u64), |(a, d), r| {
        (a.saturating_add(r.lines_added), d.saturating_add(r.lines_deleted))
      })
  }

  fn size(&self, group: &ChangeGroup) -> RuleOutcome {
    let mut out = RuleOutcome::pass();
    let count = group.files.len();
    if count > self.policy.max_files_per_group {
      out.fail(format!(
        "Group exceeds maximum file count ({}/{})",
        count, self.policy.max_files_per_group
      ));
    }
    let (added, deleted) = self.totals(group);
    let churn = added.saturating_add(deleted);
    if churn > self.policy.max_churn_per_group {
      out.fail(format!(
        "Group exceeds maximum change size ({}/{})",
        churn, self.policy.max_churn_per_group
      ));
    }
    out
  }

  fn cohesion(&self, group: &ChangeGroup) -> RuleOutcome {
    let mut out = RuleOutcome::pass();
    let count = group.files.len();
    let focused = group.directory_focus.is_some() || group.feature_focus.is_some();
    if !focused && count > self.policy.cohesion_max_unfocused_files {
      out.fail("Group lacks cohesion - files may not be logically related");
    }

    let conflicting = concern::conflicting_concerns(&group.files);
    if count >= self.policy.mixed_concern_min_files && conflicting.len() > 1 {
      let names: Vec<&str> = conflicting.iter().map(|c| c.as_str()).collect();
      out.fail(format!("Group mixes unrelated concerns: {}", names.join(", ")));
    }

    let extensions = concern::extensions(&group.files).len();
    if extensions > 5 && count > 10 {
      out.warn(format!(
        "Group contains many different file types ({}), which may indicate low cohesion",
        extensions
      ));
    }
    out
  }

  fn dependency_completeness(&self, group: &ChangeGroup) -> RuleOutcome {
    let mut out = RuleOutcome::pass();
    let members: HashSet<&str> = group.files.iter().map(String::as_str).collect();
    let mut missing: Vec<(&str, &str)> = Vec::new();
    for file in &group.files {
      let Some(deps) = self.deps.get(file) else {
        continue;
      };
      for dep in deps {
        let changed = self.records.contains_key(dep.as_str());
        if changed && dep != file && !members.contains(dep.as_str()) {
          missing.push((file.as_str(), dep.as_str()));
        }
      }
    }
    if !missing.is_empty() {
      let examples: Vec<String> = missing
        .iter()
        .take(3)
        .map(|(from, to)| format!("{} -> {}", from, to))
        .collect();
      let mut msg = format!("Group is missing dependencies: {}", examples.join(", "));
      if missing.len() > 3 {
        msg.push_str(&format!(" (and {} more)", missing.len() - 3));
      }
      out.fail(msg);
    }
    out
  }

  fn is_test_file(&self, path: &str) -> bool {
    self.test_globs.is_match(path) || self.test_globs.is_match(concern::file_name(path))
  }

  fn test_coverage(&self, group: &ChangeGroup) -> RuleOutcome {
    let mut out = RuleOutcome::pass();
    let (tests, impls): (Vec<&String>, Vec<&String>) =
      group.files.iter().partition(|f| self.is_test_file(f));
    let has_impl = impls
      .iter()
      .any(|f| concern::classify(f) == Concern::Source);
    if has_impl && tests.is_empty() {
      out.warn("Group contains implementation files but no test files");
    }
    out
  }

  fn balanced_churn(&self, group: &ChangeGroup) -> RuleOutcome {
    let mut out = RuleOutcome::pass();
    let (added, deleted) = self.totals(group);
    if added.saturating_add(deleted) > self.policy.balanced_churn_floor {
      let (hi, lo) = if added > deleted {
        (added, deleted)
      } else {
        (deleted, added)
      };
      let ratio = hi as f64 / lo.max(1) as f64;
      if ratio > self.policy.max_imbalance_ratio {
        out.warn(format!(
          "Group has highly imbalanced changes (ratio: {:.1}). Additions: {}, Deletions: {}",
          ratio, added, deleted
        ));
      }
    }
    out
  }

  fn cross_module(&self, group: &ChangeGroup) -> RuleOutcome {
    let mut out = RuleOutcome::pass();
    let dirs = concern::top_level_dirs(&group.files);
    if dirs.len() > self.policy.max_modules {
      let names: Vec<&str> = dirs.into_iter().collect();
      out.fail(format!(
        "Group spans too many modules/components ({}): {}",
        names.len(),
        names.join(", ")
      ));
    }
    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::grouping::test_support::{record_with, records};

  fn group(paths: &[&str]) -> ChangeGroup {
    ChangeGroup::new(
      Provenance::Fallback,
      "test group",
      paths.iter().map(|p| p.to_string()).collect(),
    )
  }

  fn validator<'a>(policy: &'a Policy, files: &'a [FileRecord]) -> RuleValidator<'a> {
    RuleValidator::new(policy, files, None, Rule::all()).unwrap()
  }

  #[test]
  fn rule_names_and_aliases() {
    assert_eq!(Rule::from_name("size_check"), Rule::Size);
    assert_eq!(Rule::from_name("balanced_changes"), Rule::BalancedChurn);
    assert_eq!(Rule::from_name("Dependency_Check"), Rule::DependencyCompleteness);
    assert_eq!(Rule::from_name("future_rule"), Rule::Unknown("future_rule".into()));
    assert_eq!(Rule::parse_list(None).len(), 6);
  }

  #[test]
  fn size_rule_fails_on_file_count_and_churn() {
    let paths: Vec<String> = (0..9).map(|i| format!("src/f{}.py", i)).collect();
    let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let files = records(&refs);
    let policy = Policy::default();
    let v = validator(&policy, &files);
    let out = v.apply(&Rule::Size, &group(&refs));
    assert!(!out.passed);
    assert!(out.errors[0].contains("9/8"));

    let heavy = vec![record_with("src/big.py", 900, 200)];
    let v = validator(&policy, &heavy);
    let out = v.apply(&Rule::Size, &group(&["src/big.py"]));
    assert!(out.errors[0].contains("1100/1000"));
  }

  #[test]
  fn cohesion_fails_for_source_config_docs() {
    let paths = ["src/app.py", "config.yaml", "README.md"];
    let files = records(&paths);
    let policy = Policy::default();
    let v = validator(&policy, &files);
    let out = v.apply(&Rule::Cohesion, &group(&paths));
    assert!(!out.passed);
    assert!(out.errors.iter().any(|e| e.contains("source, config, docs")));
  }

  #[test]
  fn cohesion_fails_for_large_unfocused_group() {
    let paths = ["a/1.py", "a/2.py", "a/3.py", "a/4.py", "a/5.py", "a/6.py"];
    let files = records(&paths);
    let policy = Policy::default();
    let v = validator(&policy, &files);
    assert!(!v.apply(&Rule::Cohesion, &group(&paths)).passed);
    let focused = group(&paths).with_directory_focus("a");
    assert!(v.apply(&Rule::Cohesion, &focused).passed);
  }

  #[test]
  fn dependency_completeness_lists_three_examples() {
    let paths = ["a.py", "b.py", "c.py", "d.py", "e.py"];
    let files = records(&paths);
    let mut deps = DependencyMap::new();
    deps.insert(
      "a.py".into(),
      vec!["b.py".into(), "c.py".into(), "d.py".into(), "e.py".into(), "external.py".into()],
    );
    let policy = Policy::default();
    let v = RuleValidator::new(&policy, &files, Some(&deps), Rule::all()).unwrap();
    let out = v.apply(&Rule::DependencyCompleteness, &group(&["a.py"]));
    assert!(!out.passed);
    assert_eq!(
      out.errors[0],
      "Group is missing dependencies: a.py -> b.py, a.py -> c.py, a.py -> d.py (and 1 more)"
    );
    let complete = group(&paths);
    assert!(v.apply(&Rule::DependencyCompleteness, &complete).passed);
  }

  #[test]
  fn test_coverage_warns_without_failing() {
    let files = records(&["src/app.py", "tests/test_app.py"]);
    let policy = Policy::default();
    let v = validator(&policy, &files);
    let out = v.apply(&Rule::TestCoverage, &group(&["src/app.py"]));
    assert!(out.passed);
    assert_eq!(out.warnings.len(), 1);
    let covered = v.apply(&Rule::TestCoverage, &group(&["src/app.py", "tests/test_app.py"]));
    assert!(covered.warnings.is_empty());
  }

  #[test]
  fn balanced_churn_warns_on_one_sided_change() {
    let files = vec![record_with("src/new.py", 500, 10)];
    let policy = Policy::default();
    let v = validator(&policy, &files);
    let out = v.apply(&Rule::BalancedChurn, &group(&["src/new.py"]));
    assert!(out.passed);
    assert!(out.warnings[0].contains("ratio: 50.0"));
  }

  #[test]
  fn cross_module_fails_over_limit() {
    let paths = ["a/x.py", "b/x.py", "c/x.py", "d/x.py"];
    let files = records(&paths);
    let policy = Policy::default();
    let v = validator(&policy, &files);
    let out = v.apply(&Rule::CrossModule, &group(&paths));
    assert!(!out.passed);
    assert!(out.errors[0].contains("(4): a, b, c, d"));
  }

  #[test]
  fn unknown_rule_only_warns() {
    let files = records(&["a.py"]);
    let policy = Policy::default();
    let v = RuleValidator::new(&policy, &files, None, vec![Rule::from_name("future_rule")]).unwrap();
    let (report, issues) = v.check_group(&group(&["a.py"]));
    assert!(report.valid);
    assert_eq!(report.warnings, vec!["Rule 'future_rule' not implemented."]);
    assert_eq!(issues[0].severity, IssueSeverity::Low);
  }

  #[test]
  fn invalid_test_glob_is_rejected() {
    let policy = Policy {
      test_patterns: vec!["[".into()],
      ..Policy::default()
    };
    let err = RuleValidator::new(&policy, &[], None, Rule::all()).err().unwrap();
    assert!(err.to_string().contains("test_patterns"));
  }

  #[test]
  fn test_files_are_recognized_by_configured_globs_only() {
    let policy = Policy {
      test_patterns: vec!["*.check.py".into()],
      ..Policy::default()
    };
    let files = records(&["src/app.py", "tests/test_app.py", "src/app.check.py"]);
    let v = validator(&policy, &files);
    let unmatched = v.apply(&Rule::TestCoverage, &group(&["src/app.py", "tests/test_app.py"]));
    assert_eq!(unmatched.warnings.len(), 1);
    let matched = v.apply(&Rule::TestCoverage, &group(&["src/app.py", "src/app.check.py"]));
    assert!(matched.warnings.is_empty());
  }

  #[test]
  fn huge_line_counts_fail_size_without_overflow() {
    let files = vec![
      record_with("src/a.py", u64::MAX / 2, u64::MAX / 2),
      record_with("src/b.py", u64::MAX / 2, 0),
    ];
    let policy = Policy::default();
    let v = validator(&policy, &files);
    let g = group(&["src/a.py", "src/b.py"]);
    let out = v.apply(&Rule::Size, &g);
    assert!(!out.passed);
    assert!(out.errors[0].contains(&format!("({}/1000)", u64::MAX)));
    assert!(v.apply(&Rule::BalancedChurn, &g).passed);
  }
}
