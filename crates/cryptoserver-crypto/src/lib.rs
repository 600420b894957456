//! CryptoServer Cryptographic Primitives
//!
//! Cryptographic building blocks for CryptoServer. Pure functions with
//! deterministic outputs. Callers provide the timestamp and sequence number
//! used for session keys so that every transform is reproducible in tests.
//!
//! # Key Lifecycle
//!
//! Every encrypt operation gets a fresh session key. The session key is never
//! handed to the caller directly; instead it is sealed under the master
//! passphrase and returned as an opaque key-serial-number (KSN). Decryption
//! reverses the chain: KSN → session key → working key → cleartext.
//!
//! ```text
//! Timestamp + Sequence
//!        │
//!        ▼
//! Session Key (16 chars) ──► AES-256-CBC under master passphrase ──► KSN
//!        │
//!        ▼
//! Legacy PBKDF (SHA-1) + configured salt → Working Key (32 bytes)
//!        │
//!        ▼
//! AES-256-CBC with configured IV → Ciphertext
//! ```
//!
//! # Security
//!
//! Key material:
//! - Working keys, session keys and master material are zeroized on drop
//! - `Debug` output of secret-bearing types is redacted
//! - Error values never carry key material or cleartext
//!
//! Known weaknesses (kept for wire compatibility):
//! - The key derivation is the legacy SHA-1 `PasswordDeriveBytes` scheme with
//!   only two iterations
//! - The IV is static per deployment and the mode is unauthenticated CBC
//! - KSN validity is checked by padding and length only

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cipher;
pub mod error;
pub mod kdf;
pub mod master;
pub mod session_key;

pub use cipher::{BLOCK_SIZE, CipherTransform, IV_SIZE};
pub use error::CryptoError;
pub use kdf::{DERIVED_KEY_SIZE, WorkingKey, derive_bytes, derive_key};
pub use master::{KDF_ITERATIONS, MASTER_MATERIAL_LEN, MasterSecret};
pub use session_key::{Ksn, SESSION_KEY_LEN, SessionKey, SessionKeyCodec};
