//! On-disk vault directory layout: the `.vault_id` sidecar, `index.enc`, and
//! per-file `<hex>.enc` ciphertext blobs.

use std::path::{Path, PathBuf};

use crate::config::{BLOB_EXTENSION, INDEX_FILENAME, VAULT_ID_FILENAME};
use crate::error::VaultError;
use crate::io::atomic_write;
use crate::models::{FileIdentifier, VaultIdentifier};

/// True iff `dir` contains a `.vault_id` sidecar that parses.
pub fn is_vault(dir: &Path) -> bool {
  read_vault_id(dir).is_ok()
}

/// Reads and parses the `.vault_id` sidecar.
///
/// # Errors
///
/// Returns [`VaultError::NotAVault`] if the file is missing or does not
/// parse as a 32-character hex string.
pub fn read_vault_id(dir: &Path) -> Result<VaultIdentifier, VaultError> {
  let path = dir.join(VAULT_ID_FILENAME);
  let contents = std::fs::read_to_string(&path).map_err(|_| VaultError::NotAVault(dir.display().to_string()))?;
  VaultIdentifier::from_hex(contents.trim()).map_err(|_| VaultError::NotAVault(dir.display().to_string()))
}

/// Writes the `.vault_id` sidecar: 32 hex characters followed by a newline.
pub fn write_vault_id(dir: &Path, id: VaultIdentifier) -> Result<(), VaultError> {
  let path = dir.join(VAULT_ID_FILENAME);
  let mut contents = id.to_hex();
  contents.push('\n');
  atomic_write(&path, contents.as_bytes())
}

/// Path to the encrypted index blob.
pub fn index_path(dir: &Path) -> PathBuf {
  dir.join(INDEX_FILENAME)
}

/// Path to the ciphertext blob for `file_id`.
pub fn blob_path(dir: &Path, file_id: FileIdentifier) -> PathBuf {
  dir.join(format!("{}.{}", file_id.to_hex(), BLOB_EXTENSION))
}

/// Lists every `<hex>.enc` blob present in `dir`, parsed back to a
/// [`FileIdentifier`]. Used by repair/audit tooling to find orphan blobs
/// (see the index invariant: every on-disk blob corresponds to at most one
/// index entry, but not every blob need have one).
pub fn list_blob_files(dir: &Path) -> Result<Vec<FileIdentifier>, VaultError> {
  let mut out = Vec::new();
  for entry in std::fs::read_dir(dir)? {
    let entry = entry?;
    let path = entry.path();
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
      continue;
    };
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
      continue;
    };
    if ext != BLOB_EXTENSION {
      continue;
    }
    if let Ok(id) = FileIdentifier::from_hex(stem) {
      out.push(id);
    }
  }
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn not_a_vault_without_sidecar() {
    let dir = tempdir().unwrap();
    assert!(!is_vault(dir.path()));
    assert!(matches!(read_vault_id(dir.path()), Err(VaultError::NotAVault(_))));
  }

  #[test]
  fn write_then_read_vault_id_roundtrips() {
    let dir = tempdir().unwrap();
    let id = VaultIdentifier::random();
    write_vault_id(dir.path(), id).unwrap();
    assert!(is_vault(dir.path()));
    let read_back = read_vault_id(dir.path()).unwrap();
    assert_eq!(id.0, read_back.0);
  }

  #[test]
  fn blob_path_uses_hex_file_id_and_enc_extension() {
    let dir = Path::new("/vault");
    let id = FileIdentifier([0xAB; 16]);
    let path = blob_path(dir, id);
    assert_eq!(path, dir.join(format!("{}.enc", "ab".repeat(16))));
  }

  #[test]
  fn list_blob_files_ignores_index_and_sidecar() {
    let dir = tempdir().unwrap();
    let id = FileIdentifier::random();
    std::fs::write(blob_path(dir.path(), id), b"ciphertext").unwrap();
    std::fs::write(index_path(dir.path()), b"index ciphertext").unwrap();
    std::fs::write(dir.path().join(".vault_id"), b"irrelevant").unwrap();

    let blobs = list_blob_files(dir.path()).unwrap();
    assert_eq!(blobs.len(), 1);
    assert_eq!(blobs[0].0, id.0);
  }
}
