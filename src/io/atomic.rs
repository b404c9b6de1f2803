//! Atomic file writes: write to a temp file beside the target, fsync, then
//! rename over the target and fsync the directory. A reader never observes
//! a partially-written file.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use rand::RngCore;

use crate::error::VaultError;

/// Writes `data` to `target` atomically.
///
/// Writes to `<target>.tmp-<random>` in `target`'s directory, calls
/// `sync_all`, renames over `target`, then best-effort fsyncs the containing
/// directory so the rename itself is durable. On any failure before the
/// rename the temp file is removed and `target` is left untouched.
pub fn atomic_write(target: &Path, data: &[u8]) -> Result<(), VaultError> {
  let dir = target
    .parent()
    .filter(|p| !p.as_os_str().is_empty())
    .unwrap_or_else(|| Path::new("."));
  fs::create_dir_all(dir)?;

  let mut suffix = [0u8; 8];
  rand::rngs::OsRng.fill_bytes(&mut suffix);
  let tmp_name = format!(
    "{}.tmp-{}",
    target.file_name().and_then(|n| n.to_str()).unwrap_or("blob"),
    hex::encode(suffix)
  );
  let tmp_path = dir.join(tmp_name);

  let write_result = (|| -> Result<(), VaultError> {
    let mut file = File::create(&tmp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    Ok(())
  })();

  if let Err(e) = write_result {
    let _ = fs::remove_file(&tmp_path);
    return Err(e);
  }

  if let Err(e) = fs::rename(&tmp_path, target) {
    let _ = fs::remove_file(&tmp_path);
    return Err(e.into());
  }

  // Best-effort: fsync the directory so the rename is durable too. Not all
  // platforms support opening a directory for this; ignore failures here.
  if let Ok(dir_file) = OpenOptions::new().read(true).open(dir) {
    let _ = dir_file.sync_all();
  }

  tracing::trace!(path = %target.display(), bytes = data.len(), "atomic write");
  Ok(())
}
