//! Encrypt/decrypt orchestration for CryptoServer.
//!
//! Composes the primitives in [`cryptoserver_crypto`] into the two public
//! operations:
//!
//! ```text
//! Encrypt(data)           → CryptoOperation { Cipher, Ksn, StartTime, EndTime, TotalTimeMs }
//! Decrypt({Cipher, Ksn})  → cleartext bytes
//! ```
//!
//! # Architecture
//!
//! - [`CryptoManager`]: stateless per call, shareable across threads
//! - [`PendingOperation`]: staged operation record; [`PendingOperation::scrub`]
//!   is the only way to obtain a caller-visible [`CryptoOperation`]
//! - [`Environment`]: clock abstraction so tests control timestamps
//!
//! Failures are reported as [`OperationError`], whose `Display` is the reason
//! text handed back to callers.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod crypto_manager;
pub mod env;
pub mod error;
pub mod operation;

pub use crypto_manager::CryptoManager;
pub use env::Environment;
pub use error::OperationError;
pub use operation::{
    Created, CryptoOperation, DecryptRequest, KeyResolved, Payload, PendingOperation, Transformed,
};
