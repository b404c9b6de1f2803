//! Fixed cryptographic parameters and runtime configuration.
//!
//! The v1 wire format pins its KDF and AEAD parameters rather than storing
//! them per-vault (see the format version field in [`crate::index::IndexFile`]
//! for the future-proofing hook). This module is the single source of truth
//! for those constants so call sites never hardcode a number twice.

use std::path::PathBuf;

/// Argon2id memory cost in KiB (64 MiB).
pub const KDF_MEMORY_KIB: u32 = 64 * 1024;
/// Argon2id time cost (passes).
pub const KDF_TIME_COST: u32 = 3;
/// Argon2id parallelism (lanes).
pub const KDF_PARALLELISM: u32 = 4;
/// Derived master key length in bytes.
pub const KDF_OUTPUT_LEN: usize = 32;

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;
/// Vault identifier length in bytes.
pub const VAULT_ID_LEN: usize = 16;
/// File identifier length in bytes.
pub const FILE_ID_LEN: usize = 16;

/// AES-256 key length in bytes.
pub const AES_KEY_LEN: usize = 32;
/// AES-GCM nonce length in bytes.
pub const GCM_NONCE_LEN: usize = 12;
/// AES-GCM authentication tag length in bytes.
pub const GCM_TAG_LEN: usize = 16;

/// HKDF info label binding master key -> vault key.
pub const HKDF_INFO_VAULT_KEY: &[u8] = b"vault-key-v1";
/// HKDF info label binding vault key -> file key.
pub const HKDF_INFO_FILE_KEY: &[u8] = b"file-key-v1";

/// Current on-disk format version for both blobs and the index plaintext.
pub const FORMAT_VERSION: u32 = 1;
/// AEAD algorithm identifier recorded in the blob header.
pub const ALGORITHM_ID: &str = "AES-256-GCM";

/// Name of the vault identifier sidecar file.
pub const VAULT_ID_FILENAME: &str = ".vault_id";
/// Name of the encrypted index blob.
pub const INDEX_FILENAME: &str = "index.enc";
/// Extension used for per-file ciphertext blobs.
pub const BLOB_EXTENSION: &str = "enc";

/// Product name used to namespace the platform local-app-data directory.
pub const PRODUCT_DIR_NAME: &str = "NoteSafe";
/// Prefix for workspace directories created under the product's local app
/// data directory; followed by 8 hex characters of randomness.
pub const WORKSPACE_DIR_PREFIX: &str = "workspace_";

/// Maximum failed unlock attempts before a lockout is imposed.
pub const MAX_FAILED_ATTEMPTS: u32 = 5;
/// Lockout duration after exceeding [`MAX_FAILED_ATTEMPTS`].
pub const LOCKOUT_DURATION_SECS: u64 = 30;
/// Auto-lock timeout: how long a session may sit idle before `idle_for`
/// reports it should be locked.
pub const INACTIVITY_TIMEOUT_SECS: u64 = 300;

/// Runtime-tunable knobs that are not part of the on-disk wire format.
///
/// Everything that *is* part of the wire format lives in the constants above
/// and is never made configurable, per the "fixed in v1" note in the format
/// specification.
#[derive(Clone, Debug)]
pub struct VaultConfig {
  /// Base directory under which session workspaces are created. Defaults to
  /// the platform per-user local application data directory joined with
  /// [`PRODUCT_DIR_NAME`].
  pub workspace_base_dir: PathBuf,

  /// Path components that are ignored when scanning the workspace during
  /// lock (editor-specific hidden configuration directories, etc.). Empty by
  /// default: such directories are treated as ordinary files unless the
  /// caller opts in.
  pub ignored_dir_names: Vec<String>,
}

impl Default for VaultConfig {
  fn default() -> Self {
    let base = dirs::data_local_dir()
      .unwrap_or_else(std::env::temp_dir)
      .join(PRODUCT_DIR_NAME);
    Self {
      workspace_base_dir: base,
      ignored_dir_names: Vec::new(),
    }
  }
}

impl VaultConfig {
  /// True if any component of `path` matches an ignored directory name.
  pub fn is_ignored(&self, path: &std::path::Path) -> bool {
    path
      .components()
      .any(|c| match c.as_os_str().to_str() {
        Some(name) => self.ignored_dir_names.iter().any(|ignored| ignored == name),
        None => false,
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::Path;

  #[test]
  fn ignored_dir_matches_any_component() {
    let cfg = VaultConfig {
      workspace_base_dir: PathBuf::from("/tmp"),
      ignored_dir_names: vec![".obsidian".to_string()],
    };
    assert!(cfg.is_ignored(Path::new("notes/.obsidian/workspace.json")));
    assert!(!cfg.is_ignored(Path::new("notes/Ideas.md")));
  }
}
