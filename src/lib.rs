//! Cryptographic and vault-state core for an encrypted notes vault.
//!
//! This crate owns the password KDF, the three-level key hierarchy, the
//! authenticated file-encryption format, the encrypted folder/file index,
//! crash-safe I/O primitives, and the unlock/edit/lock session protocol. It
//! has no GUI, no external editor integration, and no filesystem watcher of
//! its own — those are collaborators a shell wires in around this crate.
//!
//! # Layout
//!
//! - [`error`] — the `VaultError` taxonomy every public operation returns.
//! - [`config`] — fixed wire-format constants plus [`config::VaultConfig`].
//! - [`models`] — identifiers, secret key newtypes, content hashes.
//! - [`crypto`] — Argon2id KDF, HKDF subkey derivation, AES-256-GCM blobs.
//! - [`io`] — atomic writes and best-effort secure deletion.
//! - [`hash`] — content hashing and posix-path normalization.
//! - [`layout`] — the `.vault_id` / `index.enc` / `<hex>.enc` directory shape.
//! - [`index`] — the in-memory folder/file tree and its persistence.
//! - [`manager`] — vault creation/discovery and failed-unlock rate limiting.
//! - [`session`] — the unlock/edit/lock reconciliation protocol.
//! - [`progress`] — a plain callback type for long-running operations.
//!
//! # Architecture
//!
//! ```text
//! VaultManager::create/open ─── vault directory, no key material held
//!       │
//!       ▼
//! Session::unlock ──────────── decrypts index.enc, materializes workspace
//!       │
//!       ▼  (external editor / GUI reads and writes workspace files)
//!       │
//! Session::lock ─────────────── scan, diff, re-encrypt, save index, wipe
//! ```

pub mod config;
pub mod crypto;
pub mod error;
pub mod hash;
pub mod index;
pub mod io;
pub mod layout;
pub mod manager;
pub mod models;
pub mod progress;
pub mod session;

pub use config::VaultConfig;
pub use error::{VaultError, VaultResult};
pub use manager::{FailedAttemptTracker, VaultManager, VaultRef};
pub use progress::Progress;
pub use session::{Session, WatcherHint};
