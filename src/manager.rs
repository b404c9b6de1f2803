//! Vault creation/discovery and failed-unlock rate limiting.
//!
//! [`VaultManager`] only deals with a vault directory as a whole — creating
//! one, or confirming one already exists — it never holds key material.
//! Unlocking into a live [`crate::session::Session`] is a separate step so a
//! caller can show a locked-vault picker without ever deriving a key.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::config::{LOCKOUT_DURATION_SECS, MAX_FAILED_ATTEMPTS};
use crate::crypto::{derive_master_key, derive_vault_key};
use crate::error::VaultError;
use crate::index::{self, Index};
use crate::layout;
use crate::models::{Salt, VaultIdentifier};

/// Creates and discovers vaults on disk.
pub struct VaultManager;

impl VaultManager {
  /// True iff `dir` already contains a vault (a parseable `.vault_id`).
  pub fn is_vault(dir: &Path) -> bool {
    layout::is_vault(dir)
  }

  /// Initializes a brand-new, empty vault at `dir`: generates a vault
  /// identifier and salt, derives keys from `password`, and writes the
  /// `.vault_id` sidecar and an empty encrypted index whose root folder is
  /// named `vault_name`.
  ///
  /// `dir` must either not exist yet or be empty. On any failure partway
  /// through, whatever was written is secure-deleted before the error is
  /// returned, so a failed `create` never leaves a half-initialized vault.
  ///
  /// # Errors
  ///
  /// [`VaultError::Exists`] if `dir` is already a vault or is a nonempty
  /// directory.
  pub fn create(dir: &Path, vault_name: &str, password: &[u8]) -> Result<VaultIdentifier, VaultError> {
    if layout::is_vault(dir) {
      return Err(VaultError::Exists(dir.display().to_string()));
    }
    if dir.exists() && std::fs::read_dir(dir)?.next().is_some() {
      return Err(VaultError::Exists(dir.display().to_string()));
    }

    match Self::create_inner(dir, vault_name, password) {
      Ok(vault_id) => {
        tracing::info!(vault_id = %vault_id.to_hex(), "created vault");
        Ok(vault_id)
      }
      Err(e) => {
        let _ = crate::io::secure_delete_dir(dir);
        Err(e)
      }
    }
  }

  fn create_inner(dir: &Path, vault_name: &str, password: &[u8]) -> Result<VaultIdentifier, VaultError> {
    std::fs::create_dir_all(dir)?;

    let vault_id = VaultIdentifier::random();
    let salt = Salt::random();
    let master_key = derive_master_key(password, salt.as_bytes())?;
    let vault_key = derive_vault_key(&master_key, &vault_id)?;

    layout::write_vault_id(dir, vault_id)?;
    index::save(dir, &vault_key, salt, &Index::new_named(vault_name))?;
    Ok(vault_id)
  }

  /// Reads the vault identifier of an existing vault without touching any
  /// key material.
  ///
  /// # Errors
  ///
  /// [`VaultError::NotAVault`] if `dir` is not a vault.
  pub fn open(dir: &Path) -> Result<VaultIdentifier, VaultError> {
    layout::read_vault_id(dir)
  }
}

/// Tracks consecutive failed unlock attempts against a single vault and
/// imposes a cooldown once [`MAX_FAILED_ATTEMPTS`] is reached.
///
/// This tracker never gates `unlock` itself — callers decide whether to
/// consult [`FailedAttemptTracker::check_lockout`] before attempting one.
/// It is purely advisory bookkeeping the caller chooses to enforce.
#[derive(Clone, Debug, Default)]
pub struct FailedAttemptTracker {
  count: u32,
  locked_until: Option<Instant>,
}

impl FailedAttemptTracker {
  pub fn new() -> Self {
    Self::default()
  }

  /// Records a failed unlock attempt. Returns the lockout duration in
  /// seconds if this attempt pushed the tracker over the threshold.
  pub fn record_failure(&mut self) -> Option<u64> {
    self.count += 1;
    if self.count >= MAX_FAILED_ATTEMPTS {
      self.locked_until = Some(Instant::now() + Duration::from_secs(LOCKOUT_DURATION_SECS));
      Some(LOCKOUT_DURATION_SECS)
    } else {
      None
    }
  }

  /// Seconds remaining in an active lockout, if any. Resets the tracker
  /// once the lockout has expired, so the caller gets a fresh attempt
  /// budget without an explicit [`reset`](Self::reset) call.
  pub fn check_lockout(&mut self) -> Option<u64> {
    let until = self.locked_until?;
    let now = Instant::now();
    if now < until {
      return Some(until.duration_since(now).as_secs());
    }
    self.count = 0;
    self.locked_until = None;
    None
  }

  /// Clears the tracker after a successful unlock.
  pub fn reset(&mut self) {
    self.count = 0;
    self.locked_until = None;
  }
}

/// A vault directory plus the parsed identifier needed to derive its keys,
/// as returned by discovery helpers before any password has been supplied.
#[derive(Clone, Debug)]
pub struct VaultRef {
  pub dir: PathBuf,
  pub vault_id: VaultIdentifier,
}

impl VaultRef {
  pub fn open(dir: &Path) -> Result<Self, VaultError> {
    let vault_id = VaultManager::open(dir)?;
    Ok(Self { dir: dir.to_path_buf(), vault_id })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn create_then_open_roundtrips_vault_id() {
    let dir = tempdir().unwrap();
    let vault_dir = dir.path().join("vault");
    let vault_id = VaultManager::create(&vault_dir, "My Notes", b"correct horse battery staple").unwrap();
    assert!(VaultManager::is_vault(&vault_dir));
    assert_eq!(VaultManager::open(&vault_dir).unwrap().0, vault_id.0);
  }

  #[test]
  fn create_twice_fails_with_exists() {
    let dir = tempdir().unwrap();
    let vault_dir = dir.path().join("vault");
    VaultManager::create(&vault_dir, "My Notes", b"pw").unwrap();
    assert!(matches!(
      VaultManager::create(&vault_dir, "My Notes", b"pw"),
      Err(VaultError::Exists(_))
    ));
  }

  #[test]
  fn create_rejects_nonempty_directory() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("preexisting.txt"), b"hello").unwrap();
    assert!(matches!(
      VaultManager::create(dir.path(), "My Notes", b"pw"),
      Err(VaultError::Exists(_))
    ));
  }

  #[test]
  fn tracker_imposes_lockout_after_threshold() {
    let mut tracker = FailedAttemptTracker::new();
    for _ in 0..MAX_FAILED_ATTEMPTS - 1 {
      assert!(tracker.record_failure().is_none());
    }
    let lockout = tracker.record_failure();
    assert_eq!(lockout, Some(LOCKOUT_DURATION_SECS));
    assert!(tracker.check_lockout().is_some());
  }

  #[test]
  fn tracker_reset_clears_lockout() {
    let mut tracker = FailedAttemptTracker::new();
    for _ in 0..MAX_FAILED_ATTEMPTS {
      tracker.record_failure();
    }
    tracker.reset();
    assert!(tracker.check_lockout().is_none());
  }
}
