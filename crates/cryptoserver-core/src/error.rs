//! Error types for encrypt/decrypt operations.
//!
//! Each variant's `Display` is the human-readable failure reason returned to
//! callers. The underlying [`CryptoError`] stays available through `source()`
//! for logging, but is never part of the reason text.

use cryptoserver_crypto::CryptoError;
use thiserror::Error;

/// Errors that end an encrypt or decrypt operation.
///
/// All are terminal: nothing in the core retries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// Session key or KSN could not be created
    #[error("Unable to generate session key and KSN.")]
    KeyGeneration(#[source] CryptoError),

    /// The KSN did not resolve to a valid session key
    #[error("Unable to derive session key.")]
    SessionKey(#[source] CryptoError),

    /// The cipher rejected the payload during encryption
    #[error("Unable to encrypt payload.")]
    Encrypt(#[source] CryptoError),

    /// The cipher rejected the payload during decryption
    #[error("Unable to decrypt payload.")]
    Decrypt(#[source] CryptoError),

    /// Encryption produced no ciphertext
    #[error("Null value for cipher after encryption.")]
    EmptyCipherResult,

    /// Decryption had no ciphertext to recover cleartext from
    #[error("Null value for cleartext after decryption.")]
    EmptyCleartextResult,
}

impl OperationError {
    /// Failure reason for the caller. Contains no key material.
    pub fn reason(&self) -> String {
        self.to_string()
    }

    /// Underlying cryptographic error, if any.
    pub fn crypto_error(&self) -> Option<&CryptoError> {
        match self {
            Self::KeyGeneration(err)
            | Self::SessionKey(err)
            | Self::Encrypt(err)
            | Self::Decrypt(err) => Some(err),
            Self::EmptyCipherResult | Self::EmptyCleartextResult => None,
        }
    }
}
