//! Fuzz target for the AES-CBC cipher transform
//!
//! # Strategy
//!
//! - Arbitrary payloads, including empty and block-aligned lengths
//! - Arbitrary session key strings (empty, non-ASCII, long)
//! - Arbitrary ciphertext presented for decryption
//! - Single-byte corruption of genuine ciphertext
//!
//! # Invariants
//!
//! - Encrypt then decrypt with the same key returns the payload
//! - Ciphertext is the payload padded up to the next full block
//! - Decryption of arbitrary or corrupted input never panics

#![no_main]

use arbitrary::Arbitrary;
use cryptoserver_crypto::{CipherTransform, BLOCK_SIZE};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
struct CipherScenario {
    /// Cleartext to encrypt
    payload: Vec<u8>,
    /// Session key string driving the key derivation
    key: String,
    /// Arbitrary bytes presented as ciphertext
    forged: Vec<u8>,
    /// Byte to corrupt in the genuine ciphertext
    corrupt_index: u16,
    /// XOR mask applied at `corrupt_index`
    corrupt_mask: u8,
}

fuzz_target!(|scenario: CipherScenario| {
    let Ok(transform) = CipherTransform::new("FEDCBA9876543210", "A1B2C3D4E5F60718", 2) else {
        return;
    };

    // INVARIANT 1: Arbitrary ciphertext never panics
    let _ = transform.decrypt(&scenario.forged, &scenario.key);

    let Ok(cipher) = transform.encrypt(&scenario.payload, &scenario.key) else {
        // Only an empty key is rejected
        assert!(scenario.key.is_empty(), "non-empty key rejected");
        return;
    };

    // INVARIANT 2: PKCS#7 always adds 1..=16 bytes
    assert_eq!(cipher.len(), (scenario.payload.len() / BLOCK_SIZE + 1) * BLOCK_SIZE);

    // INVARIANT 3: Roundtrip
    let clear = transform.decrypt(&cipher, &scenario.key).expect("genuine ciphertext must decrypt");
    assert_eq!(clear.as_slice(), scenario.payload.as_slice());

    // INVARIANT 4: Corrupted ciphertext never panics and never yields the
    // payload unchanged
    if scenario.corrupt_mask != 0 {
        let mut corrupted = cipher.clone();
        let i = usize::from(scenario.corrupt_index) % corrupted.len();
        corrupted[i] ^= scenario.corrupt_mask;

        if let Ok(clear) = transform.decrypt(&corrupted, &scenario.key) {
            assert_ne!(clear.as_slice(), scenario.payload.as_slice());
        }
    }
});
