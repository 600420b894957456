//! Block cipher transform: AES-256-CBC with PKCS#7 padding
//!
//! Each call derives its own working key from the supplied key string and the
//! configured salt, then runs the cipher with the configured static IV. The
//! working key lives only for the duration of the call.

use aes::Aes256;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use zeroize::Zeroizing;

use crate::{error::CryptoError, kdf::derive_key};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// AES block size (bytes)
pub const BLOCK_SIZE: usize = 16;

/// Initialization vector size (bytes)
pub const IV_SIZE: usize = 16;

/// Encrypts and decrypts payloads under a per-call key string.
///
/// Holds only the static parts of the configuration (salt, IV, iteration
/// count). Safe to share between threads: every call is independent.
pub struct CipherTransform {
    salt: Zeroizing<Vec<u8>>,
    init_vector: Zeroizing<[u8; IV_SIZE]>,
    iterations: u32,
}

impl CipherTransform {
    /// Build a transform from the configured salt and IV strings.
    ///
    /// Both are used as their UTF-8 bytes.
    ///
    /// # Errors
    ///
    /// - `InvalidKeyMaterial`: empty salt, or IV that is not exactly 16 bytes
    pub fn new(salt: &str, init_vector: &str, iterations: u32) -> Result<Self, CryptoError> {
        if salt.is_empty() {
            return Err(CryptoError::InvalidKeyMaterial { reason: "empty salt" });
        }

        let iv_bytes = init_vector.as_bytes();
        if iv_bytes.len() != IV_SIZE {
            return Err(CryptoError::InvalidKeyMaterial {
                reason: "initialization vector must be exactly 16 bytes",
            });
        }

        let mut iv = Zeroizing::new([0u8; IV_SIZE]);
        iv.copy_from_slice(iv_bytes);

        Ok(Self { salt: Zeroizing::new(salt.as_bytes().to_vec()), init_vector: iv, iterations })
    }

    /// Encrypt `clear` under `key`.
    ///
    /// Output is block aligned: always at least one block, even for empty
    /// input, because PKCS#7 pads a full block when the input is aligned.
    ///
    /// # Errors
    ///
    /// - `InvalidKeyMaterial`: empty `key`
    pub fn encrypt(&self, clear: &[u8], key: &str) -> Result<Vec<u8>, CryptoError> {
        let working_key = derive_key(key.as_bytes(), &self.salt, self.iterations)?;

        let encryptor =
            Aes256CbcEnc::new_from_slices(working_key.as_bytes(), self.init_vector.as_slice())
                .map_err(|_| CryptoError::CipherTransform { reason: "invalid key or IV length" })?;

        Ok(encryptor.encrypt_padded_vec_mut::<Pkcs7>(clear))
    }

    /// Decrypt `cipher` under `key`.
    ///
    /// Returns exactly the recovered plaintext, padding stripped.
    ///
    /// # Errors
    ///
    /// - `InvalidKeyMaterial`: empty `key`
    /// - `CipherTransform`: ciphertext not block aligned, or padding invalid
    ///   (wrong key, tampering, truncation)
    pub fn decrypt(&self, cipher: &[u8], key: &str) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        if cipher.is_empty() || cipher.len() % BLOCK_SIZE != 0 {
            return Err(CryptoError::CipherTransform {
                reason: "ciphertext is not a whole number of blocks",
            });
        }

        let working_key = derive_key(key.as_bytes(), &self.salt, self.iterations)?;

        let decryptor =
            Aes256CbcDec::new_from_slices(working_key.as_bytes(), self.init_vector.as_slice())
                .map_err(|_| CryptoError::CipherTransform { reason: "invalid key or IV length" })?;

        decryptor
            .decrypt_padded_vec_mut::<Pkcs7>(cipher)
            .map(Zeroizing::new)
            .map_err(|_| CryptoError::CipherTransform { reason: "invalid padding" })
    }
}

impl std::fmt::Debug for CipherTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherTransform")
            .field("salt", &"[REDACTED]")
            .field("init_vector", &"[REDACTED]")
            .field("iterations", &self.iterations)
            .finish()
    }
}
