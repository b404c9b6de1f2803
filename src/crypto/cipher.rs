//! AES-256-GCM blob framing.
//!
//! On-disk layout (concatenation):
//!
//! ```text
//! header_len (4 bytes LE) | header_json | ciphertext || tag (16 bytes)
//! ```
//!
//! `header_json` is bound into the AEAD associated data, so tampering with
//! the version, algorithm, or nonce fields breaks authentication the same
//! way tampering with the ciphertext does. A fresh random nonce is drawn for
//! every encryption call; nonces are never cached or reused.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::config::{ALGORITHM_ID, FORMAT_VERSION, GCM_NONCE_LEN};
use crate::error::VaultError;

#[derive(Serialize, Deserialize)]
struct BlobHeader {
  version: u32,
  alg: String,
  nonce: String,
}

/// Encrypts `plaintext` under `key`, returning the full framed blob.
pub fn encrypt_blob(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, VaultError> {
  let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

  let mut nonce_bytes = [0u8; GCM_NONCE_LEN];
  rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
  let nonce = Nonce::from_slice(&nonce_bytes);

  let header = BlobHeader {
    version: FORMAT_VERSION,
    alg: ALGORITHM_ID.to_string(),
    nonce: base64::engine::general_purpose::STANDARD.encode(nonce_bytes),
  };
  let header_json = serde_json::to_vec(&header)
    .map_err(|e| VaultError::InvalidInput(format!("blob header serialization: {e}")))?;

  let ciphertext = cipher
    .encrypt(
      nonce,
      aes_gcm::aead::Payload {
        msg: plaintext,
        aad: &header_json,
      },
    )
    .map_err(|_| VaultError::DecryptFailure)?;

  let mut out = Vec::with_capacity(4 + header_json.len() + ciphertext.len());
  out.extend_from_slice(&(header_json.len() as u32).to_le_bytes());
  out.extend_from_slice(&header_json);
  out.extend_from_slice(&ciphertext);

  tracing::trace!(blob_len = out.len(), "encrypted blob");
  Ok(out)
}

/// Decrypts a blob produced by [`encrypt_blob`] under `key`.
///
/// # Errors
///
/// Returns [`VaultError::DecryptFailure`] if the blob is truncated, the
/// header cannot parse, the version or algorithm is unrecognized, or the
/// authentication tag does not verify. All of these surface identically so
/// no caller can distinguish "wrong password" from "corrupt blob" by error
/// shape alone.
pub fn decrypt_blob(key: &[u8; 32], blob: &[u8]) -> Result<Vec<u8>, VaultError> {
  if blob.len() < 4 {
    return Err(VaultError::DecryptFailure);
  }
  let header_len = u32::from_le_bytes(blob[0..4].try_into().unwrap()) as usize;
  if blob.len() < 4 + header_len {
    return Err(VaultError::DecryptFailure);
  }
  let header_json = &blob[4..4 + header_len];
  let ciphertext = &blob[4 + header_len..];

  let header: BlobHeader = serde_json::from_slice(header_json).map_err(|_| VaultError::DecryptFailure)?;
  if header.version != FORMAT_VERSION || header.alg != ALGORITHM_ID {
    return Err(VaultError::DecryptFailure);
  }
  let nonce_bytes = base64::engine::general_purpose::STANDARD
    .decode(header.nonce.as_bytes())
    .map_err(|_| VaultError::DecryptFailure)?;
  if nonce_bytes.len() != GCM_NONCE_LEN {
    return Err(VaultError::DecryptFailure);
  }

  let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
  let nonce = Nonce::from_slice(&nonce_bytes);

  let plaintext = cipher
    .decrypt(
      nonce,
      aes_gcm::aead::Payload {
        msg: ciphertext,
        aad: header_json,
      },
    )
    .map_err(|_| VaultError::DecryptFailure)?;

  tracing::trace!(blob_len = blob.len(), "decrypted blob");
  Ok(plaintext)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn roundtrip() {
    let key = [1u8; 32];
    let blob = encrypt_blob(&key, b"hello\n").unwrap();
    let plaintext = decrypt_blob(&key, &blob).unwrap();
    assert_eq!(plaintext, b"hello\n");
  }

  #[test]
  fn wrong_key_fails() {
    let blob = encrypt_blob(&[1u8; 32], b"secret").unwrap();
    assert!(decrypt_blob(&[2u8; 32], &blob).is_err());
  }

  #[test]
  fn flipped_ciphertext_byte_fails() {
    let key = [5u8; 32];
    let mut blob = encrypt_blob(&key, b"payload").unwrap();
    let last = blob.len() - 1;
    blob[last] ^= 0x01;
    assert!(decrypt_blob(&key, &blob).is_err());
  }

  #[test]
  fn flipped_header_byte_fails() {
    let key = [5u8; 32];
    let mut blob = encrypt_blob(&key, b"payload").unwrap();
    // byte 4 is inside header_json ({"version":1,...) — flipping it changes
    // the associated data without touching the ciphertext.
    blob[4] ^= 0x01;
    assert!(decrypt_blob(&key, &blob).is_err());
  }

  #[test]
  fn truncated_blob_fails() {
    let key = [5u8; 32];
    let blob = encrypt_blob(&key, b"payload").unwrap();
    assert!(decrypt_blob(&key, &blob[..blob.len() - 2]).is_err());
  }

  #[test]
  fn nonces_are_not_reused_across_calls() {
    let key = [5u8; 32];
    let a = encrypt_blob(&key, b"same plaintext").unwrap();
    let b = encrypt_blob(&key, b"same plaintext").unwrap();
    assert_ne!(a, b);
  }
}
