//! Best-effort secure deletion: overwrite file contents before unlinking.
//!
//! Three passes — random, random, zero — with an `fsync` between each, then
//! unlink. This is ineffective against wear-leveled flash and copy-on-write
//! filesystems that retain prior sector contents elsewhere; it is documented
//! as best-effort only, never a guarantee.

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use rand::RngCore;
use walkdir::WalkDir;

use crate::error::VaultError;

const CHUNK_SIZE: usize = 64 * 1024;

fn overwrite_pass(file: &mut std::fs::File, len: u64, zero: bool) -> std::io::Result<()> {
  file.seek(SeekFrom::Start(0))?;
  let mut remaining = len;
  let mut buf = vec![0u8; CHUNK_SIZE.min(len as usize).max(1)];
  while remaining > 0 {
    let n = (buf.len() as u64).min(remaining) as usize;
    if zero {
      buf[..n].fill(0);
    } else {
      rand::rngs::OsRng.fill_bytes(&mut buf[..n]);
    }
    file.write_all(&buf[..n])?;
    remaining -= n as u64;
  }
  file.sync_all()?;
  Ok(())
}

/// Overwrites `path`'s full length three times (random, random, zero) and
/// unlinks it. A no-op if `path` does not exist.
///
/// # Errors
///
/// Returns [`VaultError::ResourceBusy`] naming `path` if it cannot be opened
/// for writing (e.g. held open elsewhere).
pub fn secure_delete_file(path: &Path) -> Result<(), VaultError> {
  let metadata = match std::fs::metadata(path) {
    Ok(m) => m,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
    Err(_) => {
      return Err(VaultError::ResourceBusy {
        paths: vec![path.to_path_buf()],
      })
    }
  };
  let len = metadata.len();

  let mut file = OpenOptions::new().write(true).open(path).map_err(|_| VaultError::ResourceBusy {
    paths: vec![path.to_path_buf()],
  })?;

  for zero in [false, false, true] {
    overwrite_pass(&mut file, len, zero).map_err(|_| VaultError::ResourceBusy {
      paths: vec![path.to_path_buf()],
    })?;
  }
  drop(file);

  std::fs::remove_file(path)?;
  tracing::debug!(path = %path.display(), "securely deleted file");
  Ok(())
}

/// Recursively secure-deletes every file under `dir_path`, then removes the
/// now-empty directories depth-first.
///
/// # Errors
///
/// If any file cannot be opened for overwrite, returns
/// [`VaultError::ResourceBusy`] naming the offending path; the directory
/// tree is left exactly as it was for every entry not yet processed (no
/// directory removal happens until every file has been overwritten).
pub fn secure_delete_dir(dir_path: &Path) -> Result<(), VaultError> {
  if !dir_path.exists() {
    return Ok(());
  }

  let mut dirs_to_remove: Vec<PathBuf> = Vec::new();

  for entry in WalkDir::new(dir_path).contents_first(true) {
    let entry = entry.map_err(|e| VaultError::IoFailure(e.to_string()))?;
    if entry.file_type().is_dir() {
      dirs_to_remove.push(entry.into_path());
    } else if entry.file_type().is_file() {
      secure_delete_file(entry.path())?;
    } else {
      // Symlinks and other special files: unlink without overwrite.
      std::fs::remove_file(entry.path())?;
    }
  }

  for dir in dirs_to_remove {
    std::fs::remove_dir(&dir)?;
  }

  tracing::debug!(path = %dir_path.display(), "securely deleted directory");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::tempdir;

  #[test]
  fn missing_file_is_a_no_op() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("gone.enc");
    assert!(secure_delete_file(&path).is_ok());
  }

  #[test]
  fn deletes_file_from_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("secret.enc");
    fs::write(&path, b"sensitive plaintext").unwrap();

    secure_delete_file(&path).unwrap();
    assert!(!path.exists());
  }

  #[test]
  fn recursively_removes_directory_tree() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("workspace_abc123");
    fs::create_dir_all(root.join("sub")).unwrap();
    fs::write(root.join("a.md"), b"alpha").unwrap();
    fs::write(root.join("sub/b.md"), b"beta").unwrap();

    secure_delete_dir(&root).unwrap();
    assert!(!root.exists());
  }

  #[test]
  fn missing_directory_is_a_no_op() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("never_existed");
    assert!(secure_delete_dir(&root).is_ok());
  }
}
