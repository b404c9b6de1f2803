//! Error taxonomy for vault and session operations.
//!
//! Every fallible operation in this crate returns [`VaultError`]. Variants
//! match the taxonomy enumerated in the vault format specification: callers
//! can match on the kind without parsing message text, and message text never
//! carries a password, key, or plaintext byte.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by vault, index, and session operations.
#[derive(Error, Debug)]
pub enum VaultError {
  /// Malformed argument: wrong salt length, empty password, etc.
  #[error("invalid input: {0}")]
  InvalidInput(String),

  /// The directory does not contain a valid `.vault_id` sidecar.
  #[error("not a vault: {0}")]
  NotAVault(String),

  /// A target that must not already exist does.
  #[error("already exists: {0}")]
  Exists(String),

  /// The index failed to decrypt under the supplied password. Deliberately
  /// indistinguishable from index corruption.
  #[error("invalid password")]
  InvalidPassword,

  /// A data blob failed authenticated decryption (tampering or corruption).
  #[error("decryption failed: vault data is corrupt or tampered")]
  DecryptFailure,

  /// A path could not be written or deleted because another process holds it.
  #[error("resource busy: {paths:?}")]
  ResourceBusy { paths: Vec<PathBuf> },

  /// Any other I/O failure.
  #[error("io failure: {0}")]
  IoFailure(String),

  /// Operation not allowed in the session's current state.
  #[error("invalid state: {0}")]
  InvalidState(String),
}

impl From<std::io::Error> for VaultError {
  fn from(e: std::io::Error) -> Self {
    use std::io::ErrorKind;
    match e.kind() {
      // Best-effort classification; platform sharing violations usually
      // surface as PermissionDenied or (on Windows) a raw OS error we don't
      // special-case here since the std ErrorKind set is not that granular.
      ErrorKind::PermissionDenied => VaultError::ResourceBusy { paths: Vec::new() },
      _ => VaultError::IoFailure(e.to_string()),
    }
  }
}

pub type VaultResult<T> = Result<T, VaultError>;
