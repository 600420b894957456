//! Master secret: the static passphrase, salt and IV triple.

use zeroize::Zeroizing;

use crate::{cipher::CipherTransform, error::CryptoError};

/// Key derivation iteration count used by every deployment.
pub const KDF_ITERATIONS: u32 = 2;

/// Expected length of operator-supplied passphrase, salt and IV (characters).
pub const MASTER_MATERIAL_LEN: usize = 16;

/// Static key material loaded from configuration.
///
/// Protects KSNs (via the passphrase) and feeds every per-operation key
/// derivation (via the salt and IV). Never taken from request input.
#[derive(Clone)]
pub struct MasterSecret {
    passphrase: Zeroizing<String>,
    salt: Zeroizing<String>,
    init_vector: Zeroizing<String>,
    iterations: u32,
}

impl MasterSecret {
    /// Build a master secret with the standard iteration count.
    ///
    /// # Errors
    ///
    /// - `InvalidKeyMaterial`: empty passphrase or salt, IV not 16 bytes
    pub fn new(passphrase: &str, salt: &str, init_vector: &str) -> Result<Self, CryptoError> {
        Self::with_iterations(passphrase, salt, init_vector, KDF_ITERATIONS)
    }

    /// Build a master secret with an explicit iteration count.
    ///
    /// # Errors
    ///
    /// - `InvalidKeyMaterial`: empty passphrase or salt, IV not 16 bytes
    pub fn with_iterations(
        passphrase: &str,
        salt: &str,
        init_vector: &str,
        iterations: u32,
    ) -> Result<Self, CryptoError> {
        if passphrase.is_empty() {
            return Err(CryptoError::InvalidKeyMaterial { reason: "empty passphrase" });
        }

        // Fail here rather than on the first request
        CipherTransform::new(salt, init_vector, iterations)?;

        Ok(Self {
            passphrase: Zeroizing::new(passphrase.to_owned()),
            salt: Zeroizing::new(salt.to_owned()),
            init_vector: Zeroizing::new(init_vector.to_owned()),
            iterations,
        })
    }

    /// Master passphrase that seals session keys into KSNs.
    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }

    /// Iteration count for the key derivation.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Cipher transform bound to this secret's salt and IV.
    ///
    /// # Errors
    ///
    /// - `InvalidKeyMaterial`: unreachable for a secret built through `new`
    pub fn transform(&self) -> Result<CipherTransform, CryptoError> {
        CipherTransform::new(&self.salt, &self.init_vector, self.iterations)
    }
}

impl std::fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterSecret")
            .field("passphrase", &"[REDACTED]")
            .field("salt", &"[REDACTED]")
            .field("init_vector", &"[REDACTED]")
            .field("iterations", &self.iterations)
            .finish()
    }
}
