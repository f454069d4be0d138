//! Stable group identifiers.

use crate::types::Provenance;

/// Compute a stable group id from provenance + member paths.
///
/// Groups within a run are disjoint, so the member list alone makes the id
/// unique; provenance keeps ids from different strategies visibly distinct.
/// Uses blake3 for a fast, deterministic hash.
pub fn group_id<S: AsRef<str>>(provenance: Provenance, files: &[S]) -> String {
  let mut hasher = blake3::Hasher::new();
  hasher.update(provenance.as_str().as_bytes());
  for file in files {
    hasher.update(b"|");
    hasher.update(file.as_ref().as_bytes());
  }
  let hex = hasher.finalize().to_hex();
  format!("grp-{}", &hex[..16])
}

/// Id of the `index`-th child of a directory or concern split.
pub fn split_id(parent: &str, index: usize) -> String {
  format!("{}_split_{}", parent, index)
}

/// Id of the `index`-th child of a fixed-size chunking.
pub fn chunk_id(parent: &str, index: usize) -> String {
  format!("{}_chunk_{}", parent, index)
}
