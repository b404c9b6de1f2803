//! Key derivation and authenticated encryption primitives.
//!
//! - [`kdf`] — password-based master key derivation (Argon2id).
//! - [`subkey`] — HKDF-SHA256 subkey derivation (vault key, file key).
//! - [`cipher`] — AES-256-GCM blob framing and encrypt/decrypt.

pub mod cipher;
pub mod kdf;
pub mod subkey;

pub use cipher::{decrypt_blob, encrypt_blob};
pub use kdf::derive_master_key;
pub use subkey::{derive_file_key, derive_vault_key};
