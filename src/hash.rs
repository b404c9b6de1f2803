//! Content hashing and path normalization used for change detection.
//!
//! Hashing is always re-derived from the file on disk during lock; watcher
//! hints (see [`crate::session::WatcherHint`]) never substitute for it.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::VaultError;
use crate::models::ContentHash;

/// SHA-256 of `bytes`.
pub fn hash_bytes(bytes: &[u8]) -> ContentHash {
  let mut hasher = Sha256::new();
  hasher.update(bytes);
  let digest = hasher.finalize();
  let mut out = [0u8; 32];
  out.copy_from_slice(&digest);
  ContentHash(out)
}

/// SHA-256 of the file at `path`.
pub fn hash_file(path: &Path) -> Result<ContentHash, VaultError> {
  let bytes = std::fs::read(path)?;
  Ok(hash_bytes(&bytes))
}

/// Converts a workspace-relative filesystem path to its normalized,
/// forward-slash posix form, as stored in the index and used as the key
/// when diffing the workspace against the index during lock.
pub fn to_posix_relative(root: &Path, path: &Path) -> Result<String, VaultError> {
  let relative = path
    .strip_prefix(root)
    .map_err(|_| VaultError::InvalidInput(format!("{} is not under {}", path.display(), root.display())))?;

  let mut components = Vec::new();
  for component in relative.components() {
    match component {
      std::path::Component::Normal(part) => {
        let part = part
          .to_str()
          .ok_or_else(|| VaultError::InvalidInput("non-utf8 path component".into()))?;
        components.push(part.to_string());
      }
      std::path::Component::CurDir => {}
      other => {
        return Err(VaultError::InvalidInput(format!("unsupported path component: {other:?}")));
      }
    }
  }
  Ok(components.join("/"))
}

/// Converts a posix-relative path (as stored in the index) back to a native
/// filesystem path rooted at `root`.
pub fn from_posix_relative(root: &Path, posix_path: &str) -> PathBuf {
  let mut out = root.to_path_buf();
  if posix_path.is_empty() {
    return out;
  }
  for component in posix_path.split('/') {
    out.push(component);
  }
  out
}
