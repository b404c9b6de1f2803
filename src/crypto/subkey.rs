//! HKDF-SHA256 subkey derivation, binding the master key to the vault and
//! each file in it.
//!
//! ```text
//! vault_key = HKDF(master_key, salt = vault_id, info = "vault-key-v1")
//! file_key  = HKDF(vault_key,  salt = file_id,  info = "file-key-v1")
//! ```
//!
//! The info labels domain-separate the two derivations; no other key
//! material may be derived with them.

use hkdf::Hkdf;
use sha2::Sha256;

use crate::config::{HKDF_INFO_FILE_KEY, HKDF_INFO_VAULT_KEY};
use crate::error::VaultError;
use crate::models::{FileIdentifier, FileKey, MasterKey, VaultIdentifier, VaultKey};

fn expand(ikm: &[u8], salt: &[u8], info: &[u8]) -> Result<[u8; 32], VaultError> {
  let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
  let mut out = [0u8; 32];
  hk.expand(info, &mut out)
    .map_err(|e| VaultError::InvalidInput(format!("hkdf expand: {e}")))?;
  Ok(out)
}

/// Derives the vault key from the master key and vault identifier.
pub fn derive_vault_key(master_key: &MasterKey, vault_id: &VaultIdentifier) -> Result<VaultKey, VaultError> {
  let bytes = expand(master_key.as_bytes(), vault_id.as_bytes(), HKDF_INFO_VAULT_KEY)?;
  Ok(VaultKey::new(bytes))
}

/// Derives a per-file key from the vault key and file identifier.
pub fn derive_file_key(vault_key: &VaultKey, file_id: &FileIdentifier) -> Result<FileKey, VaultError> {
  let bytes = expand(vault_key.as_bytes(), file_id.as_bytes(), HKDF_INFO_FILE_KEY)?;
  Ok(FileKey::new(bytes))
}
