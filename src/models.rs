//! Core data types shared across the vault, index, and session modules.
//!
//! - [`VaultIdentifier`] / [`FileIdentifier`] — opaque 16-byte handles.
//! - [`MasterKey`] / [`VaultKey`] / [`FileKey`] — 32-byte secrets, zeroized
//!   on drop.
//! - [`ContentHash`] — a SHA-256 digest recorded against a `File` index node.
//!
//! # Security
//!
//! Key material is held in [`zeroize::Zeroizing`]-wrapped buffers and is
//! overwritten before release, matching the memory-handling discipline the
//! rest of this crate follows for passwords and plaintext.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::config::{FILE_ID_LEN, SALT_LEN, VAULT_ID_LEN};
use crate::error::VaultError;

macro_rules! fixed_id {
  ($name:ident, $len:expr) => {
    #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct $name(pub [u8; $len]);

    impl $name {
      pub fn random() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; $len];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
      }

      pub fn to_hex(self) -> String {
        hex::encode(self.0)
      }

      pub fn from_hex(s: &str) -> Result<Self, VaultError> {
        let bytes = hex::decode(s.trim())
          .map_err(|e| VaultError::InvalidInput(format!("bad hex for {}: {e}", stringify!($name))))?;
        let arr: [u8; $len] = bytes
          .try_into()
          .map_err(|_| VaultError::InvalidInput(format!("{} must be {} bytes", stringify!($name), $len)))?;
        Ok(Self(arr))
      }

      pub fn as_bytes(&self) -> &[u8; $len] {
        &self.0
      }
    }

    impl fmt::Debug for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", stringify!($name), self.to_hex())
      }
    }

    impl Serialize for $name {
      fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD
          .encode(self.0)
          .serialize(serializer)
      }
    }

    impl<'de> Deserialize<'de> for $name {
      fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use base64::Engine;
        let encoded = String::deserialize(deserializer)?;
        let bytes = base64::engine::general_purpose::STANDARD
          .decode(encoded.as_bytes())
          .map_err(serde::de::Error::custom)?;
        let arr: [u8; $len] = bytes
          .try_into()
          .map_err(|_| serde::de::Error::custom(concat!(stringify!($name), " wrong length")))?;
        Ok(Self(arr))
      }
    }
  };
}

fixed_id!(VaultIdentifier, VAULT_ID_LEN);
fixed_id!(FileIdentifier, FILE_ID_LEN);
fixed_id!(Salt, SALT_LEN);

/// A 32-byte SHA-256 digest of a file's plaintext bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
  pub fn as_bytes(&self) -> &[u8; 32] {
    &self.0
  }
}

impl fmt::Debug for ContentHash {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "ContentHash({})", hex::encode(self.0))
  }
}

impl Serialize for ContentHash {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
      .encode(self.0)
      .serialize(serializer)
  }
}

impl<'de> Deserialize<'de> for ContentHash {
  fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    use base64::Engine;
    let encoded = String::deserialize(deserializer)?;
    let bytes = base64::engine::general_purpose::STANDARD
      .decode(encoded.as_bytes())
      .map_err(serde::de::Error::custom)?;
    let arr: [u8; 32] = bytes
      .try_into()
      .map_err(|_| serde::de::Error::custom("content hash must be 32 bytes"))?;
    Ok(ContentHash(arr))
  }
}

macro_rules! secret_key {
  ($name:ident) => {
    /// 32-byte secret key, zeroized on drop.
    pub struct $name(pub Zeroizing<[u8; 32]>);

    impl $name {
      pub fn new(bytes: [u8; 32]) -> Self {
        Self(Zeroizing::new(bytes))
      }

      pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
      }
    }

    impl Clone for $name {
      fn clone(&self) -> Self {
        Self(Zeroizing::new(*self.0))
      }
    }

    impl fmt::Debug for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(..)", stringify!($name))
      }
    }
  };
}

secret_key!(MasterKey);
secret_key!(VaultKey);
secret_key!(FileKey);

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn file_identifier_hex_roundtrip() {
    let id = FileIdentifier::random();
    let hex = id.to_hex();
    let parsed = FileIdentifier::from_hex(&hex).unwrap();
    assert_eq!(id.0, parsed.0);
  }

  #[test]
  fn file_identifier_base64_roundtrip() {
    let id = FileIdentifier::random();
    let json = serde_json::to_string(&id).unwrap();
    let parsed: FileIdentifier = serde_json::from_str(&json).unwrap();
    assert_eq!(id.0, parsed.0);
  }

  #[test]
  fn debug_never_prints_key_bytes() {
    let key = MasterKey::new([0x42; 32]);
    let rendered = format!("{key:?}");
    assert!(!rendered.contains("42"));
  }
}
