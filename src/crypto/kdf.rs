//! Password key derivation (Argon2id).
//!
//! # Security
//!
//! Memory cost 64 MiB, 3 passes, 4 lanes, 32-byte output — fixed for the v1
//! wire format rather than stored per-vault (see [`crate::config`]).

use argon2::{Algorithm, Argon2, Params, Version};

use crate::config::{KDF_MEMORY_KIB, KDF_OUTPUT_LEN, KDF_PARALLELISM, KDF_TIME_COST, SALT_LEN};
use crate::error::VaultError;
use crate::models::MasterKey;

/// Derives the 32-byte master key from a password and a 16-byte salt.
///
/// # Errors
///
/// Returns [`VaultError::InvalidInput`] if `salt` is not [`SALT_LEN`] bytes or
/// `password` is empty.
pub fn derive_master_key(password: &[u8], salt: &[u8]) -> Result<MasterKey, VaultError> {
  if password.is_empty() {
    return Err(VaultError::InvalidInput("password must not be empty".into()));
  }
  if salt.len() != SALT_LEN {
    return Err(VaultError::InvalidInput(format!(
      "salt must be {SALT_LEN} bytes, got {}",
      salt.len()
    )));
  }

  let params = Params::new(KDF_MEMORY_KIB, KDF_TIME_COST, KDF_PARALLELISM, Some(KDF_OUTPUT_LEN))
    .map_err(|e| VaultError::InvalidInput(format!("argon2 params: {e}")))?;
  let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

  let mut key = [0u8; KDF_OUTPUT_LEN];
  argon2
    .hash_password_into(password, salt, &mut key)
    .map_err(|e| VaultError::InvalidInput(format!("argon2: {e}")))?;

  tracing::debug!("derived master key from password");
  Ok(MasterKey::new(key))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn deterministic_for_same_password_and_salt() {
    let salt = [7u8; SALT_LEN];
    let a = derive_master_key(b"correct horse battery staple", &salt).unwrap();
    let b = derive_master_key(b"correct horse battery staple", &salt).unwrap();
    assert_eq!(a.as_bytes(), b.as_bytes());
  }

  #[test]
  fn different_salt_yields_different_key() {
    let a = derive_master_key(b"same password", &[1u8; SALT_LEN]).unwrap();
    let b = derive_master_key(b"same password", &[2u8; SALT_LEN]).unwrap();
    assert_ne!(a.as_bytes(), b.as_bytes());
  }

  #[test]
  fn rejects_empty_password() {
    assert!(matches!(
      derive_master_key(b"", &[0u8; SALT_LEN]),
      Err(VaultError::InvalidInput(_))
    ));
  }

  #[test]
  fn rejects_wrong_salt_length() {
    assert!(matches!(
      derive_master_key(b"pw", &[0u8; 8]),
      Err(VaultError::InvalidInput(_))
    ));
  }
}
