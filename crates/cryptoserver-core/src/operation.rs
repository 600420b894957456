//! Operation records and their staged lifecycle.
//!
//! An operation moves through explicit stages:
//!
//! ```text
//! Created ──► KeyResolved ──► Transformed ──► Scrubbed (CryptoOperation)
//! ```
//!
//! Sensitive state (the session key) exists only in the `KeyResolved` and
//! `Transformed` stages. [`PendingOperation::scrub`] consumes the operation and
//! returns a [`CryptoOperation`], which has no field that could hold a
//! passphrase, salt, IV or session key. The scrub invariant is therefore
//! enforced by the type system rather than by clearing fields.
//!
//! Master material never enters an operation at all: it lives in the
//! [`cryptoserver_crypto::SessionKeyCodec`] built from configuration.

use std::time::Duration;

use chrono::NaiveDateTime;
use cryptoserver_crypto::{Ksn, SessionKey};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Operation has started; no key material yet.
#[derive(Debug)]
pub struct Created;

/// Session key is known (freshly created, or resolved from a KSN).
#[derive(Debug)]
pub struct KeyResolved {
    session_key: SessionKey,
    ksn: Option<Ksn>,
}

/// Cipher transform has run.
#[derive(Debug)]
pub struct Transformed {
    session_key: SessionKey,
    ksn: Option<Ksn>,
    payload: Payload,
}

/// Output of the cipher transform.
pub enum Payload {
    /// Ciphertext produced by an encrypt operation
    Cipher(Vec<u8>),
    /// Cleartext recovered by a decrypt operation
    Clear(Zeroizing<Vec<u8>>),
}

impl Payload {
    /// Length of the payload in bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::Cipher(bytes) => bytes.len(),
            Self::Clear(bytes) => bytes.len(),
        }
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cipher(bytes) => write!(f, "Cipher({} bytes)", bytes.len()),
            Self::Clear(bytes) => write!(f, "Clear({} bytes)", bytes.len()),
        }
    }
}

/// An in-flight operation at stage `S`.
///
/// Created fresh per call, never cached and never shared between operations.
#[derive(Debug)]
pub struct PendingOperation<S> {
    start_time: NaiveDateTime,
    stage: S,
}

impl PendingOperation<Created> {
    /// Start a new operation at `start_time`.
    pub fn start(start_time: NaiveDateTime) -> Self {
        Self { start_time, stage: Created }
    }

    /// Attach the session key, and the KSN to report back (encrypt only).
    pub fn key_resolved(
        self,
        session_key: SessionKey,
        ksn: Option<Ksn>,
    ) -> PendingOperation<KeyResolved> {
        PendingOperation { start_time: self.start_time, stage: KeyResolved { session_key, ksn } }
    }
}

impl<S> PendingOperation<S> {
    /// Local time the operation started.
    pub fn start_time(&self) -> NaiveDateTime {
        self.start_time
    }
}

impl PendingOperation<KeyResolved> {
    /// Session key for the cipher transform.
    pub fn session_key(&self) -> &SessionKey {
        &self.stage.session_key
    }

    /// Record the transform output.
    pub fn transformed(self, payload: Payload) -> PendingOperation<Transformed> {
        let KeyResolved { session_key, ksn } = self.stage;
        PendingOperation {
            start_time: self.start_time,
            stage: Transformed { session_key, ksn, payload },
        }
    }
}

impl PendingOperation<Transformed> {
    /// Transform output.
    pub fn payload(&self) -> &Payload {
        &self.stage.payload
    }

    /// Drop all key material and produce the caller-visible record.
    ///
    /// The session key is zeroized as it is dropped here.
    pub fn scrub(self, end_time: NaiveDateTime, elapsed: Duration) -> CryptoOperation {
        let Transformed { session_key, ksn, payload } = self.stage;
        drop(session_key);

        let (cipher, clear) = match payload {
            Payload::Cipher(bytes) => (Some(bytes), None),
            Payload::Clear(mut bytes) => (None, Some(std::mem::take(&mut *bytes))),
        };

        CryptoOperation {
            cipher,
            clear,
            ksn: ksn.map(Ksn::into_string),
            start_time: Some(self.start_time),
            end_time: Some(end_time),
            total_time_ms: elapsed.as_micros() as f64 / 1000.0,
        }
    }
}

/// A completed, scrubbed encrypt or decrypt operation.
///
/// Carries ciphertext (encrypt) or cleartext (decrypt) plus KSN and timing
/// metadata. Serialized on the wire with PascalCase keys; cipher bytes are
/// base64. Cleartext is never serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CryptoOperation {
    /// Ciphertext (encrypt results)
    #[serde(default, with = "base64_field", skip_serializing_if = "Option::is_none")]
    pub cipher: Option<Vec<u8>>,

    /// Cleartext (decrypt results)
    #[serde(skip)]
    pub clear: Option<Vec<u8>>,

    /// KSN sealing the session key (encrypt results)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ksn: Option<String>,

    /// Local time the operation started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<NaiveDateTime>,

    /// Local time the operation finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<NaiveDateTime>,

    /// Elapsed time in milliseconds
    #[serde(default)]
    pub total_time_ms: f64,
}

impl CryptoOperation {
    /// Consume into the recovered cleartext (empty for encrypt results).
    pub fn into_clear(self) -> Vec<u8> {
        self.clear.unwrap_or_default()
    }
}

/// Decrypt request body: ciphertext plus the KSN returned by encrypt.
///
/// Any other fields a caller sends (passphrase, salt, IV) are ignored; secret
/// material always comes from configuration. Legacy clients send lowercase or
/// uppercase field names, which are accepted alongside PascalCase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DecryptRequest {
    /// Ciphertext from a previous encrypt
    #[serde(default, with = "base64_field", alias = "cipher", alias = "CIPHER")]
    pub cipher: Option<Vec<u8>>,

    /// KSN from the same encrypt
    #[serde(default, alias = "ksn", alias = "KSN")]
    pub ksn: Option<String>,
}

impl DecryptRequest {
    /// Build a request from an encrypt result.
    pub fn from_operation(operation: &CryptoOperation) -> Self {
        Self { cipher: operation.cipher.clone(), ksn: operation.ksn.clone() }
    }
}

/// Serde adapter: `Option<Vec<u8>>` as an optional base64 string.
mod base64_field {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer>(
        value: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|text| STANDARD.decode(text).map_err(D::Error::custom))
            .transpose()
    }
}
