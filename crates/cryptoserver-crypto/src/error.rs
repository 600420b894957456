//! Error types for the cryptographic primitives.

use thiserror::Error;

/// Errors from key derivation, session key handling and the cipher transform.
///
/// Every variant is terminal for the operation that produced it. None of them
/// carry key material: reasons describe the shape of the failure only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Passphrase, salt or IV unusable (empty, wrong length, output too long)
    #[error("invalid key material: {reason}")]
    InvalidKeyMaterial {
        /// What was wrong with the material
        reason: &'static str,
    },

    /// A fresh session key could not be built or sealed
    #[error("session key generation failed: {reason}")]
    KeyGenerationFailure {
        /// Why generation failed
        reason: String,
    },

    /// The KSN was empty or not decodable
    #[error("invalid KSN: {reason}")]
    InvalidKsn {
        /// Why the KSN was rejected
        reason: &'static str,
    },

    /// The KSN decoded, but not to a usable session key
    #[error("invalid session key: {reason}")]
    InvalidSessionKey {
        /// Why the recovered key was rejected
        reason: String,
    },

    /// The block cipher rejected its input (bad length, bad padding)
    #[error("cipher transform failed: {reason}")]
    CipherTransform {
        /// What the cipher rejected
        reason: &'static str,
    },
}
