//! Session key generation and the KSN (key-serial-number) codec
//!
//! A session key is a 16-character string built from the local timestamp at
//! millisecond precision plus a three-digit sequence number. The sequence
//! number keeps keys distinct when several operations land in the same
//! millisecond. The KSN is the session key encrypted under the master
//! passphrase and base64 encoded; it is the only form in which a session key
//! ever leaves the process.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::NaiveDateTime;
use zeroize::Zeroizing;

use crate::{cipher::CipherTransform, error::CryptoError, master::MasterSecret};

/// Length of every valid session key (characters)
pub const SESSION_KEY_LEN: usize = 16;

/// `MMddHHmmssfff`: 13 characters at millisecond resolution
const TIMESTAMP_FORMAT: &str = "%m%d%H%M%S%3f";

/// The sequence suffix is three decimal digits
const SEQUENCE_MODULUS: u32 = 1000;

/// A single-use session key.
///
/// Always exactly [`SESSION_KEY_LEN`] characters. Zeroized on drop and
/// redacted in `Debug` output.
pub struct SessionKey(Zeroizing<String>);

impl SessionKey {
    /// The key string, used as the passphrase for the payload cipher.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey([REDACTED])")
    }
}

/// Opaque key-serial-number handed to callers in place of the session key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ksn(String);

impl Ksn {
    /// Base64 text of the KSN.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the base64 text.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Ksn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Creates session keys and converts them to and from KSNs.
///
/// Holds the master passphrase and the cipher transform built from the master
/// salt and IV. Stateless across calls: safe to share between threads.
pub struct SessionKeyCodec {
    passphrase: Zeroizing<String>,
    transform: CipherTransform,
}

impl SessionKeyCodec {
    /// Bind a codec to the master secret.
    ///
    /// # Errors
    ///
    /// - `InvalidKeyMaterial`: the secret's salt or IV is unusable
    pub fn new(master: &MasterSecret) -> Result<Self, CryptoError> {
        Ok(Self {
            passphrase: Zeroizing::new(master.passphrase().to_owned()),
            transform: master.transform()?,
        })
    }

    /// Cipher transform shared with payload encryption.
    pub fn transform(&self) -> &CipherTransform {
        &self.transform
    }

    /// Build a fresh session key for `timestamp` and seal it into a KSN.
    ///
    /// `sequence` disambiguates keys created within the same millisecond;
    /// only its last three decimal digits are used.
    ///
    /// # Errors
    ///
    /// - `KeyGenerationFailure`: the formatted key is not 16 characters, or
    ///   sealing failed. Neither happens with a valid master secret.
    pub fn create_session_key(
        &self,
        timestamp: NaiveDateTime,
        sequence: u32,
    ) -> Result<(SessionKey, Ksn), CryptoError> {
        let key = Zeroizing::new(format!(
            "{}{:03}",
            timestamp.format(TIMESTAMP_FORMAT),
            sequence % SEQUENCE_MODULUS
        ));

        let len = key.chars().count();
        if len != SESSION_KEY_LEN {
            return Err(CryptoError::KeyGenerationFailure {
                reason: format!("formatted key has {len} characters, expected {SESSION_KEY_LEN}"),
            });
        }

        let sealed = self
            .transform
            .encrypt(key.as_bytes(), &self.passphrase)
            .map_err(|err| CryptoError::KeyGenerationFailure { reason: err.to_string() })?;

        Ok((SessionKey(key), Ksn(STANDARD.encode(sealed))))
    }

    /// Recover the session key sealed in `ksn`.
    ///
    /// # Errors
    ///
    /// - `InvalidKsn`: empty, or not base64
    /// - `InvalidSessionKey`: does not decrypt under the master secret, or
    ///   decrypts to something other than a 16-character string (corrupted,
    ///   tampered, or sealed under a different master secret)
    pub fn resolve_session_key(&self, ksn: &str) -> Result<SessionKey, CryptoError> {
        if ksn.is_empty() {
            return Err(CryptoError::InvalidKsn { reason: "empty KSN" });
        }

        let sealed = STANDARD
            .decode(ksn)
            .map_err(|_| CryptoError::InvalidKsn { reason: "KSN is not valid base64" })?;

        let opened = self.transform.decrypt(&sealed, &self.passphrase).map_err(|_| {
            CryptoError::InvalidSessionKey {
                reason: "KSN does not decrypt under the master secret".to_string(),
            }
        })?;

        let key = std::str::from_utf8(&opened).map_err(|_| CryptoError::InvalidSessionKey {
            reason: "session key is not valid UTF-8".to_string(),
        })?;

        let len = key.chars().count();
        if len != SESSION_KEY_LEN {
            return Err(CryptoError::InvalidSessionKey {
                reason: format!("session key length was {len}, expected {SESSION_KEY_LEN}"),
            });
        }

        Ok(SessionKey(Zeroizing::new(key.to_owned())))
    }
}

impl fmt::Debug for SessionKeyCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeyCodec")
            .field("passphrase", &"[REDACTED]")
            .field("transform", &self.transform)
            .finish()
    }
}
