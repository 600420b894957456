//! Legacy password-based key derivation (`PasswordDeriveBytes`, SHA-1)
//!
//! This is PBKDF1 with the non-standard extension that lets it produce more
//! than one hash worth of output. It is weak by modern standards and kept only
//! so that ciphertexts and KSNs stay interoperable with existing deployments.
//! Do not swap in a stronger KDF without changing the wire contract.

use sha1::{Digest, Sha1};
use zeroize::{Zeroize, Zeroizing};

use crate::error::CryptoError;

/// Size of the working key fed to AES-256 (bytes)
pub const DERIVED_KEY_SIZE: usize = 32;

/// SHA-1 output size (bytes)
const SHA1_OUTPUT_SIZE: usize = 20;

/// Output blocks beyond the first are prefixed with their decimal index; the
/// legacy scheme stops at three digits.
const MAX_OUTPUT_BLOCKS: usize = 1000;

/// A 256-bit working key derived from a passphrase.
///
/// Used for exactly one cipher call and zeroized on drop.
pub struct WorkingKey {
    key: [u8; DERIVED_KEY_SIZE],
}

impl WorkingKey {
    /// Raw key bytes for the block cipher.
    pub fn as_bytes(&self) -> &[u8; DERIVED_KEY_SIZE] {
        &self.key
    }
}

impl Drop for WorkingKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl std::fmt::Debug for WorkingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WorkingKey([REDACTED])")
    }
}

/// Derive `output_len` bytes from `passphrase` and `salt`.
///
/// Algorithm:
/// 1. `base = SHA1(passphrase || salt)`, re-hashed until it has been hashed
///    `max(1, iterations - 1)` times in total
/// 2. block 0 is `SHA1(base)`, block `n` is `SHA1(decimal(n) || base)`
/// 3. blocks are concatenated and truncated to `output_len`
///
/// Deterministic: same inputs always produce the same output.
///
/// # Errors
///
/// - `InvalidKeyMaterial`: empty passphrase or salt, or more output requested
///   than the scheme can produce
pub fn derive_bytes(
    passphrase: &[u8],
    salt: &[u8],
    iterations: u32,
    output_len: usize,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if passphrase.is_empty() {
        return Err(CryptoError::InvalidKeyMaterial { reason: "empty passphrase" });
    }
    if salt.is_empty() {
        return Err(CryptoError::InvalidKeyMaterial { reason: "empty salt" });
    }
    if output_len > MAX_OUTPUT_BLOCKS * SHA1_OUTPUT_SIZE {
        return Err(CryptoError::InvalidKeyMaterial {
            reason: "requested output exceeds 1000 hash blocks",
        });
    }

    let mut base = Zeroizing::new([0u8; SHA1_OUTPUT_SIZE]);
    let mut hasher = Sha1::new();
    hasher.update(passphrase);
    hasher.update(salt);
    base.copy_from_slice(&hasher.finalize());

    let rounds = iterations.saturating_sub(1).max(1);
    for _ in 1..rounds {
        let next = Sha1::digest(base.as_slice());
        base.copy_from_slice(&next);
    }

    let mut output =
        Zeroizing::new(Vec::with_capacity(output_len.next_multiple_of(SHA1_OUTPUT_SIZE)));
    let mut block = 0usize;
    while output.len() < output_len {
        let mut hasher = Sha1::new();
        if block > 0 {
            hasher.update(block.to_string().as_bytes());
        }
        hasher.update(base.as_slice());
        output.extend_from_slice(&hasher.finalize());
        block += 1;
    }
    output.truncate(output_len);

    Ok(output)
}

/// Derive the 256-bit working key for one cipher call.
///
/// # Errors
///
/// - `InvalidKeyMaterial`: empty passphrase or salt
pub fn derive_key(
    passphrase: &[u8],
    salt: &[u8],
    iterations: u32,
) -> Result<WorkingKey, CryptoError> {
    let bytes = derive_bytes(passphrase, salt, iterations, DERIVED_KEY_SIZE)?;

    let mut key = [0u8; DERIVED_KEY_SIZE];
    key.copy_from_slice(&bytes);
    Ok(WorkingKey { key })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_legacy_vector_two_iterations() {
        let key = derive_key(b"0123456789ABCDEF", b"FEDCBA9876543210", 2).unwrap();
        assert_eq!(
            hex::encode(key.as_bytes()),
            "8c29ae0dd846dfb4483f09aff427ae79a5d6ced29d6d9bc72ea807c81ef7200a"
        );
    }

    #[test]
    fn matches_legacy_vector_multi_block() {
        // Three output blocks: SHA1(base), SHA1("1"||base), SHA1("2"||base)
        let bytes = derive_bytes(b"passphrase", b"saltsalt", 5, 48).unwrap();
        assert_eq!(
            hex::encode(bytes.as_slice()),
            "159908a796e731f77357b63bb1e287987b1ce3786c90995e\
             8ae5d74b3351159f57516a8a641f188b72113fde5a749ceb"
        );
    }

    #[test]
    fn one_and_two_iterations_are_equivalent() {
        let one = derive_bytes(b"passphrase", b"saltsalt", 1, 20).unwrap();
        let two = derive_bytes(b"passphrase", b"saltsalt", 2, 20).unwrap();

        assert_eq!(one.as_slice(), two.as_slice());
        assert_eq!(hex::encode(one.as_slice()), "44baf649709e345190e76c8a365f9d4cbb1bac93");
    }

    #[test]
    fn derive_is_deterministic() {
        let a = derive_key(b"pass", b"salt", 2).unwrap();
        let b = derive_key(b"pass", b"salt", 2).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes(), "same inputs must produce same output");
    }

    #[test]
    fn different_salts_produce_different_keys() {
        let a = derive_key(b"pass", b"salt-a", 2).unwrap();
        let b = derive_key(b"pass", b"salt-b", 2).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn shorter_output_is_prefix_of_longer() {
        let short = derive_bytes(b"pass", b"salt", 2, 7).unwrap();
        let long = derive_bytes(b"pass", b"salt", 2, 45).unwrap();
        assert_eq!(short.as_slice(), &long[..7]);
    }

    #[test]
    fn empty_passphrase_rejected() {
        let result = derive_key(b"", b"salt", 2);
        assert!(matches!(result, Err(CryptoError::InvalidKeyMaterial { .. })));
    }

    #[test]
    fn empty_salt_rejected() {
        let result = derive_key(b"pass", b"", 2);
        assert!(matches!(result, Err(CryptoError::InvalidKeyMaterial { .. })));
    }

    #[test]
    fn output_limit_enforced() {
        assert!(derive_bytes(b"pass", b"salt", 2, 20_000).is_ok());
        assert!(matches!(
            derive_bytes(b"pass", b"salt", 2, 20_001),
            Err(CryptoError::InvalidKeyMaterial { .. })
        ));
    }

    #[test]
    fn debug_is_redacted() {
        let key = derive_key(b"pass", b"salt", 2).unwrap();
        assert_eq!(format!("{key:?}"), "WorkingKey([REDACTED])");
    }
}
