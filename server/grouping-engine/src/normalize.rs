//! Normalize inbound change-sets into canonical FileRecords.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::error::EngineError;
use crate::types::*;

/// Parse and validate an InboundChangeSet. Fails fast on the first bad file.
pub fn normalize(raw: &InboundChangeSet) -> Result<ChangeSet, EngineError> {
  let analysis_timestamp = match &raw.analysis_timestamp {
    Some(ts) => Some(
      DateTime::parse_from_rfc3339(ts)
        .map_err(|e| {
          EngineError::validation("analysis_timestamp", &format!("invalid RFC3339: {}", e))
        })?
        .with_timezone(&Utc),
    ),
    None => None,
  };

  let mut seen: HashSet<String> = HashSet::with_capacity(raw.files.len());
  let mut files = Vec::with_capacity(raw.files.len());
  for (i, f) in raw.files.iter().enumerate() {
    let record = normalize_file(f, i)?;
    if !seen.insert(record.path.clone()) {
      return Err(EngineError::validation(
        &format!("files[{}].path", i),
        &format!("duplicate path '{}'", record.path),
      ));
    }
    files.push(record);
  }

  Ok(ChangeSet {
    repository_path: raw.repository_path.clone(),
    analysis_timestamp,
    files,
  })
}

fn normalize_file(f: &InboundFile, i: usize) -> Result<FileRecord, EngineError> {
  let path = normalize_path(&f.path);
  if path.is_empty() {
    return Err(EngineError::validation(
      &format!("files[{}].path", i),
      "must not be empty",
    ));
  }

  let status = FileStatus::from_str_loose(&f.status).ok_or_else(|| {
    EngineError::validation(
      &format!("files[{}].status", i),
      "expected added|modified|deleted|renamed|untracked",
    )
  })?;

  if f.lines_added < 0 {
    return Err(EngineError::validation(
      &format!("files[{}].lines_added", i),
      "must not be negative",
    ));
  }
  if f.lines_deleted < 0 {
    return Err(EngineError::validation(
      &format!("files[{}].lines_deleted", i),
      "must not be negative",
    ));
  }

  Ok(FileRecord {
    path,
    status,
    lines_added: f.lines_added as u64,
    lines_deleted: f.lines_deleted as u64,
    is_binary: f.is_binary,
    staged: f.staged,
  })
}

/// Normalize a file path for stable comparison:
/// - backslash -> forward slash
/// - collapse repeated slashes
/// - strip leading ./ and trailing /
///
/// Case is preserved; paths are matched exactly against the pattern index and
/// dependency map, which go through the same function.
pub fn normalize_path(p: &str) -> String {
  let s = p.trim().replace('\\', "/");
  let mut out = String::with_capacity(s.len());
  let mut prev_slash = false;
  for ch in s.chars() {
    if ch == '/' {
      if !prev_slash {
        out.push('/');
      }
      prev_slash = true;
    } else {
      prev_slash = false;
      out.push(ch);
    }
  }
  let mut trimmed = out.as_str();
  while let Some(rest) = trimmed.strip_prefix("./") {
    trimmed = rest;
  }
  trimmed.trim_end_matches('/').to_string()
}
