//! Encrypt/decrypt orchestration.
//!
//! [`CryptoManager`] composes the session key codec and cipher transform into
//! the public Encrypt and Decrypt contracts. It holds no per-operation state:
//! every call builds its own [`PendingOperation`] and scrubs it before
//! returning, so a single manager can be shared by any number of concurrent
//! request handlers without locking.

use std::sync::atomic::{AtomicU32, Ordering};

use cryptoserver_crypto::{CryptoError, Ksn, MasterSecret, SessionKeyCodec};
use zeroize::Zeroizing;

use crate::{
    env::Environment,
    error::OperationError,
    operation::{CryptoOperation, DecryptRequest, Payload, PendingOperation},
};

/// Orchestrates encrypt and decrypt operations under one master secret.
pub struct CryptoManager<E: Environment> {
    env: E,
    codec: SessionKeyCodec,
    /// Session key suffix; separates keys created within one millisecond
    sequence: AtomicU32,
}

impl<E: Environment> CryptoManager<E> {
    /// Create a manager bound to `master`.
    ///
    /// # Errors
    ///
    /// - `InvalidKeyMaterial`: the master secret's salt or IV is unusable
    pub fn new(env: E, master: &MasterSecret) -> Result<Self, CryptoError> {
        Ok(Self { env, codec: SessionKeyCodec::new(master)?, sequence: AtomicU32::new(0) })
    }

    /// Encrypt `data` under a fresh session key.
    ///
    /// Zero-length payloads are valid. On success the returned record carries
    /// the ciphertext, the KSN and timing metadata, and nothing else.
    ///
    /// # Errors
    ///
    /// - `KeyGeneration`: session key or KSN could not be created
    /// - `Encrypt`: the cipher rejected the session key
    /// - `EmptyCipherResult`: the cipher produced no output
    pub fn encrypt(&self, data: &[u8]) -> Result<CryptoOperation, OperationError> {
        let started = self.env.now();
        let operation = PendingOperation::start(self.env.local_time());

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let (session_key, ksn) =
            self.codec.create_session_key(operation.start_time(), sequence).map_err(|err| {
                tracing::warn!(error = %err, "encrypt unable to generate session key and KSN");
                OperationError::KeyGeneration(err)
            })?;

        let operation = operation.key_resolved(session_key, Some(ksn));

        let cipher =
            self.codec.transform().encrypt(data, operation.session_key().as_str()).map_err(
                |err| {
                    tracing::warn!(error = %err, "encrypt cipher transform failed");
                    OperationError::Encrypt(err)
                },
            )?;

        if cipher.is_empty() {
            tracing::warn!("encrypt null value for cipher after encryption");
            return Err(OperationError::EmptyCipherResult);
        }

        let operation = operation.transformed(Payload::Cipher(cipher));
        let cipher_len = operation.payload().len();
        let record = operation.scrub(self.env.local_time(), self.env.now() - started);

        tracing::debug!(
            clear_bytes = data.len(),
            cipher_bytes = cipher_len,
            total_time_ms = record.total_time_ms,
            "encrypt complete"
        );

        Ok(record)
    }

    /// Decrypt `request` using the session key sealed in its KSN.
    ///
    /// Secret material comes from the master secret this manager was built
    /// with, never from the request.
    ///
    /// # Errors
    ///
    /// - `SessionKey`: KSN missing, malformed, or not sealed under this master
    /// - `EmptyCleartextResult`: the request carried no ciphertext
    /// - `Decrypt`: the cipher rejected the ciphertext
    pub fn decrypt(&self, request: &DecryptRequest) -> Result<Vec<u8>, OperationError> {
        self.decrypt_operation(request).map(CryptoOperation::into_clear)
    }

    /// Decrypt `request`, returning the scrubbed record with timing metadata.
    ///
    /// # Errors
    ///
    /// Same as [`Self::decrypt`].
    pub fn decrypt_operation(
        &self,
        request: &DecryptRequest,
    ) -> Result<CryptoOperation, OperationError> {
        let started = self.env.now();
        let operation = PendingOperation::start(self.env.local_time());

        let ksn = request.ksn.as_deref().unwrap_or_default();
        let session_key = self.codec.resolve_session_key(ksn).map_err(|err| {
            tracing::warn!(error = %err, "decrypt unable to derive session key");
            OperationError::SessionKey(err)
        })?;

        let operation = operation.key_resolved(session_key, None::<Ksn>);

        let cipher = request.cipher.as_deref().unwrap_or_default();
        if cipher.is_empty() {
            tracing::warn!("decrypt null value for cleartext after decryption");
            return Err(OperationError::EmptyCleartextResult);
        }

        let clear: Zeroizing<Vec<u8>> = self
            .codec
            .transform()
            .decrypt(cipher, operation.session_key().as_str())
            .map_err(|err| {
                tracing::warn!(error = %err, "decrypt cipher transform failed");
                OperationError::Decrypt(err)
            })?;

        let operation = operation.transformed(Payload::Clear(clear));
        let clear_len = operation.payload().len();
        let record = operation.scrub(self.env.local_time(), self.env.now() - started);

        tracing::debug!(
            cipher_bytes = cipher.len(),
            clear_bytes = clear_len,
            total_time_ms = record.total_time_ms,
            "decrypt complete"
        );

        Ok(record)
    }
}

impl<E: Environment> std::fmt::Debug for CryptoManager<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoManager")
            .field("codec", &self.codec)
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
