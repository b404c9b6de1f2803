//! The unlock/edit/lock session: materializes an encrypted vault into a
//! plaintext workspace, then reconciles the workspace back into the
//! encrypted vault on lock.
//!
//! Grounded in the teacher's `AppState`/`VaultSession` session-holding
//! pattern, generalized from a flat entry list to a workspace tree.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use walkdir::WalkDir;

use crate::config::{VaultConfig, WORKSPACE_DIR_PREFIX};
use crate::crypto::{decrypt_blob, derive_file_key, encrypt_blob};
use crate::error::VaultError;
use crate::hash::{from_posix_relative, hash_file, to_posix_relative};
use crate::index::{self, Index};
use crate::layout::{blob_path, read_vault_id};
use crate::models::{ContentHash, FileIdentifier, Salt, VaultIdentifier, VaultKey};
use crate::progress::Progress;

/// Where a session's decrypted workspace currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
  Unlocked,
  Locking,
}

/// An advisory hint that a path may have changed, passed in from an
/// external file-system watcher. The lock protocol never trusts these —
/// it always re-scans and re-hashes the whole workspace — so a missed or
/// spurious hint cannot cause data loss or a skipped write.
#[derive(Debug, Clone)]
pub struct WatcherHint {
  pub workspace_relative_path: String,
}

/// An active, unlocked vault session: a decrypted workspace on disk plus
/// the key material and index needed to re-encrypt it on lock.
pub struct Session {
  vault_dir: PathBuf,
  vault_id: VaultIdentifier,
  workspace_dir: PathBuf,
  vault_key: VaultKey,
  salt: Salt,
  index: Index,
  state: SessionState,
  last_interaction: Instant,
}

impl Session {
  /// Decrypts the index, materializes every indexed file into a fresh
  /// workspace directory, and returns the resulting session.
  ///
  /// If any step fails the partially-populated workspace is secure-deleted
  /// and no `Session` is returned — the vault stays locked.
  pub fn unlock(
    vault_dir: &Path,
    password: &[u8],
    config: &VaultConfig,
    mut progress_cb: impl FnMut(Progress),
  ) -> Result<Session, VaultError> {
    let vault_id = read_vault_id(vault_dir)?;
    let (index, vault_key, salt) = index::load(vault_dir, vault_id, password)?;

    let workspace_dir = config.workspace_base_dir.join(format!("{WORKSPACE_DIR_PREFIX}{}", hex::encode(rand_suffix())));

    match Self::materialize_workspace(vault_dir, &workspace_dir, &vault_key, &index, &mut progress_cb) {
      Ok(()) => {
        tracing::info!(vault_id = %vault_id.to_hex(), workspace = %workspace_dir.display(), "unlocked vault");
        Ok(Session {
          vault_dir: vault_dir.to_path_buf(),
          vault_id,
          workspace_dir,
          vault_key,
          salt,
          index,
          state: SessionState::Unlocked,
          last_interaction: Instant::now(),
        })
      }
      Err(e) => {
        let _ = crate::io::secure_delete_dir(&workspace_dir);
        Err(e)
      }
    }
  }

  fn materialize_workspace(
    vault_dir: &Path,
    workspace_dir: &Path,
    vault_key: &VaultKey,
    index: &Index,
    progress_cb: &mut impl FnMut(Progress),
  ) -> Result<(), VaultError> {
    std::fs::create_dir_all(workspace_dir)?;

    let entries = index.file_entries();
    let total = entries.len() as u64;
    for (done, (path, file_id, _recorded_hash)) in entries.iter().enumerate() {
      let file_key = derive_file_key(vault_key, file_id)?;
      let blob = std::fs::read(blob_path(vault_dir, *file_id))?;
      let plaintext = decrypt_blob(file_key.as_bytes(), &blob)?;

      let real_path = from_posix_relative(workspace_dir, path);
      crate::io::atomic_write(&real_path, &plaintext)?;
      progress_cb(Progress::new(done as u64 + 1, total));
    }
    Ok(())
  }

  /// Re-encrypts every change in the workspace back into the vault, then
  /// secure-deletes the workspace. A three-phase scan/diff/apply that is
  /// idempotent under retry: re-running it after a crash mid-lock simply
  /// redoes whatever didn't make it to disk.
  ///
  /// On success the session is consumed. On failure (most commonly
  /// [`VaultError::ResourceBusy`] from the final workspace deletion) the
  /// session is handed back so the caller can retry.
  pub fn lock(mut self, config: &VaultConfig, mut progress_cb: impl FnMut(Progress)) -> Result<(), (Session, VaultError)> {
    if self.state != SessionState::Unlocked {
      let err = VaultError::InvalidState("session is not unlocked".into());
      return Err((self, err));
    }
    self.state = SessionState::Locking;

    match self.reconcile(config, &mut progress_cb) {
      Ok(()) => {
        tracing::info!(vault_id = %self.vault_id.to_hex(), "locked vault");
        self.zeroize_and_drop();
        Ok(())
      }
      Err(e) => {
        self.state = SessionState::Unlocked;
        Err((self, e))
      }
    }
  }

  fn reconcile(&mut self, config: &VaultConfig, progress_cb: &mut impl FnMut(Progress)) -> Result<(), VaultError> {
    // Phase A: scan the workspace.
    let mut on_disk: Vec<(String, ContentHash)> = Vec::new();
    for entry in WalkDir::new(&self.workspace_dir)
      .into_iter()
      .filter_entry(|e| !config.is_ignored(e.path()))
    {
      let entry = entry.map_err(|e| VaultError::IoFailure(e.to_string()))?;
      if !entry.file_type().is_file() {
        continue;
      }
      let posix = to_posix_relative(&self.workspace_dir, entry.path())?;
      let hash = hash_file(entry.path())?;
      on_disk.push((posix, hash));
    }

    // Phase B: diff against the index.
    let indexed = self.index.file_entries();
    let indexed_by_path: std::collections::HashMap<&str, (FileIdentifier, ContentHash)> =
      indexed.iter().map(|(p, id, h)| (p.as_str(), (*id, *h))).collect();
    let on_disk_by_path: std::collections::HashMap<&str, ContentHash> =
      on_disk.iter().map(|(p, h)| (p.as_str(), *h)).collect();

    let mut created = Vec::new();
    let mut modified = Vec::new();
    let mut deleted = Vec::new();
    for (path, hash) in &on_disk {
      match indexed_by_path.get(path.as_str()) {
        None => created.push((path.clone(), *hash)),
        Some((_, recorded)) if recorded.0 != hash.0 => modified.push((path.clone(), *hash)),
        Some(_) => {}
      }
    }
    for (path, _, _) in &indexed {
      if !on_disk_by_path.contains_key(path.as_str()) {
        deleted.push(path.clone());
      }
    }

    let total = (created.len() + modified.len() + deleted.len() + 1) as u64;
    let mut done = 0u64;
    let mut tick = |progress_cb: &mut dyn FnMut(Progress)| {
      done += 1;
      progress_cb(Progress::new(done, total));
    };

    // Phase C: apply modified, then created, then deleted; save; then
    // delete the now-orphaned ciphertext for removed files; then secure
    // delete the workspace. Index save happens only after every ciphertext
    // write succeeds, and blob deletion for removed files happens only
    // after the index save, so a crash anywhere here leaves either an
    // orphan blob (harmless, garbage-collectable) or an unsaved index
    // (retry redoes the same work) — never a dangling index entry.
    let mut working = self.index.clone();
    let mut removed_blob_ids = Vec::new();

    for (path, new_hash) in &modified {
      let (file_id, _) = indexed_by_path[path.as_str()];
      let real_path = from_posix_relative(&self.workspace_dir, path);
      let plaintext = std::fs::read(&real_path)?;
      let file_key = derive_file_key(&self.vault_key, &file_id)?;
      let blob = encrypt_blob(file_key.as_bytes(), &plaintext)?;
      crate::io::atomic_write(&blob_path(&self.vault_dir, file_id), &blob)?;
      working.update_content_hash(file_id, *new_hash)?;
      tick(progress_cb);
    }

    for (path, new_hash) in &created {
      let (parent_path, leaf) = split_leaf(path);
      ensure_ancestor_folders(&mut working, &parent_path);
      let file_id = FileIdentifier::random();
      working.add_file(&parent_path, &leaf, file_id, *new_hash)?;

      let real_path = from_posix_relative(&self.workspace_dir, path);
      let plaintext = std::fs::read(&real_path)?;
      let file_key = derive_file_key(&self.vault_key, &file_id)?;
      let blob = encrypt_blob(file_key.as_bytes(), &plaintext)?;
      crate::io::atomic_write(&blob_path(&self.vault_dir, file_id), &blob)?;
      tick(progress_cb);
    }

    for path in &deleted {
      removed_blob_ids.extend(working.remove(path)?);
      tick(progress_cb);
    }

    index::save(&self.vault_dir, &self.vault_key, self.salt, &working)?;
    self.index = working;
    tick(progress_cb);

    for file_id in removed_blob_ids {
      crate::io::secure_delete_file(&blob_path(&self.vault_dir, file_id))?;
    }

    crate::io::secure_delete_dir(&self.workspace_dir)?;
    Ok(())
  }

  fn zeroize_and_drop(self) {
    // Dropping `self` runs `VaultKey`'s `Zeroizing` drop glue; nothing else
    // to do here beyond making the intent explicit at the call site.
    drop(self);
  }

  /// The workspace directory this session decrypted into. The external
  /// editor and the GUI shell read and write files here directly.
  pub fn workspace_dir(&self) -> &Path {
    &self.workspace_dir
  }

  pub fn vault_id(&self) -> VaultIdentifier {
    self.vault_id
  }

  /// Renames an indexed file in place: the identifier and its ciphertext
  /// blob are untouched, only the tree's name field and the workspace file
  /// on disk change. Applied immediately (not deferred to the next lock),
  /// so [`lock`](Self::lock) later sees the renamed path already reflected
  /// in the index and treats it as unchanged rather than a delete+create.
  ///
  /// If the index update is rejected (a sibling already has `new_name`),
  /// the on-disk rename is rolled back before the error is returned.
  pub fn rename(&mut self, path: &str, new_name: &str) -> Result<(), VaultError> {
    let (parent, _leaf) = split_leaf(path);
    let new_path = if parent.is_empty() {
      new_name.to_string()
    } else {
      format!("{parent}/{new_name}")
    };
    let old_real = from_posix_relative(&self.workspace_dir, path);
    let new_real = from_posix_relative(&self.workspace_dir, &new_path);
    std::fs::rename(&old_real, &new_real)?;

    if let Err(e) = self.index.rename(path, new_name) {
      let _ = std::fs::rename(&new_real, &old_real);
      return Err(e);
    }
    Ok(())
  }

  /// Accepts a watcher's suspicion that a path changed. Recorded nowhere
  /// and trusted for nothing — `lock` always re-scans from scratch. This
  /// exists purely so a caller wiring in a filesystem watcher has a place
  /// to hand hints to, without that wiring changing lock's correctness.
  pub fn ignore(&self, _hint: WatcherHint) {}

  /// Resets the idle timer. Call on any user interaction the shell wants
  /// to count as activity.
  pub fn heartbeat(&mut self) {
    self.last_interaction = Instant::now();
  }

  /// How long the session has sat idle since the last [`heartbeat`](Self::heartbeat).
  /// The shell polls this against its own auto-lock timeout and calls
  /// `lock` itself; this crate does not run a background timer.
  pub fn idle_for(&self) -> Duration {
    self.last_interaction.elapsed()
  }

  /// Spawns the user's configured external editor rooted at the workspace
  /// directory. Does not wait for it to exit — launching an editor is a
  /// fire-and-forget handoff, not a blocking operation.
  pub fn launch_editor(&self, editor_path: &Path) -> Result<(), VaultError> {
    std::process::Command::new(editor_path)
      .current_dir(&self.workspace_dir)
      .spawn()?;
    Ok(())
  }
}

fn split_leaf(path: &str) -> (String, String) {
  match path.rsplit_once('/') {
    Some((parent, leaf)) => (parent.to_string(), leaf.to_string()),
    None => (String::new(), path.to_string()),
  }
}

fn ensure_ancestor_folders(index: &mut Index, folder_path: &str) {
  let mut built = String::new();
  for component in folder_path.split('/').filter(|c| !c.is_empty()) {
    let candidate = if built.is_empty() {
      component.to_string()
    } else {
      format!("{built}/{component}")
    };
    if index.find_by_path(&candidate).is_none() {
      let _ = index.add_folder(&built, component);
    }
    built = candidate;
  }
}

fn rand_suffix() -> [u8; 4] {
  use rand::RngCore;
  let mut bytes = [0u8; 4];
  rand::rngs::OsRng.fill_bytes(&mut bytes);
  bytes
}

/// Lists `workspace_*` directories left behind by a prior crashed session,
/// under `config.workspace_base_dir`. The keys are gone with the process
/// that held them, so these directories can only be secure-deleted, never
/// re-encrypted back into a vault.
pub fn list_leftover_workspaces(config: &VaultConfig) -> Result<Vec<PathBuf>, VaultError> {
  if !config.workspace_base_dir.exists() {
    return Ok(Vec::new());
  }
  let mut out = Vec::new();
  for entry in std::fs::read_dir(&config.workspace_base_dir)? {
    let entry = entry?;
    if entry.file_type()?.is_dir() {
      if let Some(name) = entry.file_name().to_str() {
        if name.starts_with(WORKSPACE_DIR_PREFIX) {
          out.push(entry.path());
        }
      }
    }
  }
  Ok(out)
}

/// Secure-deletes a leftover workspace directory found by
/// [`list_leftover_workspaces`]. Never called automatically — the caller
/// must obtain the user's consent first, since the directory may hold
/// edits the user still wants to recover by hand before they vanish.
pub fn clean_leftover_workspace(path: &Path) -> Result<(), VaultError> {
  crate::io::secure_delete_dir(path)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::manager::VaultManager;
  use tempfile::tempdir;

  fn test_config(base: &Path) -> VaultConfig {
    VaultConfig {
      workspace_base_dir: base.to_path_buf(),
      ignored_dir_names: Vec::new(),
    }
  }

  #[test]
  fn unlock_empty_vault_creates_empty_workspace_then_locks_clean() {
    let root = tempdir().unwrap();
    let vault_dir = root.path().join("vault");
    let config = test_config(&root.path().join("workspaces"));
    VaultManager::create(&vault_dir, "Notes", b"hunter2").unwrap();

    let session = Session::unlock(&vault_dir, b"hunter2", &config, |_| {}).unwrap();
    assert!(session.workspace_dir().exists());
    let workspace_dir = session.workspace_dir().to_path_buf();

    session.lock(&config, |_| {}).unwrap();
    assert!(!workspace_dir.exists());
  }

  #[test]
  fn create_a_file_then_lock_then_unlock_roundtrips_content() {
    let root = tempdir().unwrap();
    let vault_dir = root.path().join("vault");
    let config = test_config(&root.path().join("workspaces"));
    VaultManager::create(&vault_dir, "Notes", b"hunter2").unwrap();

    let session = Session::unlock(&vault_dir, b"hunter2", &config, |_| {}).unwrap();
    std::fs::write(session.workspace_dir().join("today.md"), b"hello vault").unwrap();
    session.lock(&config, |_| {}).unwrap();

    let session = Session::unlock(&vault_dir, b"hunter2", &config, |_| {}).unwrap();
    let contents = std::fs::read(session.workspace_dir().join("today.md")).unwrap();
    assert_eq!(contents, b"hello vault");
    session.lock(&config, |_| {}).unwrap();
  }

  #[test]
  fn unlock_with_wrong_password_fails() {
    let root = tempdir().unwrap();
    let vault_dir = root.path().join("vault");
    let config = test_config(&root.path().join("workspaces"));
    VaultManager::create(&vault_dir, "Notes", b"hunter2").unwrap();

    let err = Session::unlock(&vault_dir, b"wrong", &config, |_| {});
    assert!(matches!(err, Err(VaultError::InvalidPassword)));
  }

  #[test]
  fn edit_then_delete_then_lock_removes_from_index_and_blobs() {
    let root = tempdir().unwrap();
    let vault_dir = root.path().join("vault");
    let config = test_config(&root.path().join("workspaces"));
    VaultManager::create(&vault_dir, "Notes", b"hunter2").unwrap();

    let session = Session::unlock(&vault_dir, b"hunter2", &config, |_| {}).unwrap();
    std::fs::write(session.workspace_dir().join("today.md"), b"first draft").unwrap();
    session.lock(&config, |_| {}).unwrap();

    let session = Session::unlock(&vault_dir, b"hunter2", &config, |_| {}).unwrap();
    std::fs::remove_file(session.workspace_dir().join("today.md")).unwrap();
    session.lock(&config, |_| {}).unwrap();

    let session = Session::unlock(&vault_dir, b"hunter2", &config, |_| {}).unwrap();
    assert!(!session.workspace_dir().join("today.md").exists());
    session.lock(&config, |_| {}).unwrap();
  }

  fn blob_filenames(vault_dir: &Path) -> Vec<String> {
    std::fs::read_dir(vault_dir)
      .unwrap()
      .filter_map(|e| e.ok())
      .map(|e| e.file_name().to_string_lossy().into_owned())
      .filter(|name| name.ends_with(".enc") && name != "index.enc")
      .collect()
  }

  #[test]
  fn rename_preserves_the_same_ciphertext_blob() {
    let root = tempdir().unwrap();
    let vault_dir = root.path().join("vault");
    let config = test_config(&root.path().join("workspaces"));
    VaultManager::create(&vault_dir, "Notes", b"hunter2").unwrap();

    let session = Session::unlock(&vault_dir, b"hunter2", &config, |_| {}).unwrap();
    std::fs::write(session.workspace_dir().join("Ideas.md"), b"an idea").unwrap();
    session.lock(&config, |_| {}).unwrap();

    let mut blobs_before = blob_filenames(&vault_dir);
    assert_eq!(blobs_before.len(), 1);

    let mut session = Session::unlock(&vault_dir, b"hunter2", &config, |_| {}).unwrap();
    session.rename("Ideas.md", "Thoughts.md").unwrap();
    session.lock(&config, |_| {}).unwrap();

    let mut blobs_after = blob_filenames(&vault_dir);
    blobs_before.sort();
    blobs_after.sort();
    assert_eq!(blobs_before, blobs_after, "rename must not create or delete a blob");

    let session = Session::unlock(&vault_dir, b"hunter2", &config, |_| {}).unwrap();
    assert!(!session.workspace_dir().join("Ideas.md").exists());
    let contents = std::fs::read(session.workspace_dir().join("Thoughts.md")).unwrap();
    assert_eq!(contents, b"an idea");
    session.lock(&config, |_| {}).unwrap();
  }
}
