//! Fuzz target for KSN creation and resolution
//!
//! Feeds the session key codec adversarial KSN text and sealed bytes, plus
//! mutations of genuine KSNs.
//!
//! # Strategy
//!
//! - Arbitrary text (non-base64, empty, huge)
//! - Arbitrary sealed bytes, base64-encoded (padding and length attacks)
//! - Single-byte corruption of a genuine KSN
//! - Truncation of a genuine KSN
//! - Boundary timestamps and sequence values
//!
//! # Invariants
//!
//! - Resolution never panics
//! - A resolved session key is always 16 characters
//! - A genuine KSN resolves to exactly the key it sealed
//! - A corrupted or truncated KSN never resolves to the original key

#![no_main]

use arbitrary::Arbitrary;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{NaiveDate, NaiveDateTime};
use cryptoserver_crypto::{MasterSecret, SessionKeyCodec, SESSION_KEY_LEN};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
struct KsnScenario {
    /// Raw timestamp fields (clamped into a valid date)
    timestamp: [u16; 7],
    /// Session key sequence suffix
    sequence: u32,
    /// KSN presented for resolution
    input: KsnInput,
}

#[derive(Debug, Clone, Arbitrary)]
enum KsnInput {
    /// Genuine KSN, unmodified
    Genuine,
    /// Arbitrary text
    Text(String),
    /// Arbitrary bytes, base64-encoded
    Sealed(Vec<u8>),
    /// Genuine KSN with one sealed byte XORed
    Corrupt { index: u8, mask: u8 },
    /// Genuine KSN with sealed bytes dropped from the end
    Truncate { drop: u8 },
}

fn timestamp(fields: [u16; 7]) -> Option<NaiveDateTime> {
    let [year, month, day, hour, minute, second, milli] = fields;
    NaiveDate::from_ymd_opt(
        2000 + i32::from(year % 100),
        1 + u32::from(month % 12),
        1 + u32::from(day % 28),
    )?
    .and_hms_milli_opt(
            u32::from(hour % 24),
            u32::from(minute % 60),
            u32::from(second % 60),
            u32::from(milli % 1000),
        )
}

fuzz_target!(|scenario: KsnScenario| {
    let Ok(master) = MasterSecret::new("0123456789ABCDEF", "FEDCBA9876543210", "A1B2C3D4E5F60718")
    else {
        return;
    };
    let Ok(codec) = SessionKeyCodec::new(&master) else {
        return;
    };
    let Some(timestamp) = timestamp(scenario.timestamp) else {
        return;
    };

    // INVARIANT 1: Creation succeeds for every valid timestamp and sequence
    let (key, ksn) = codec
        .create_session_key(timestamp, scenario.sequence)
        .expect("session key creation must succeed");
    assert_eq!(key.as_str().chars().count(), SESSION_KEY_LEN);

    let sealed = STANDARD.decode(ksn.as_str()).expect("KSN must be valid base64");

    let (presented, mutated) = match scenario.input {
        KsnInput::Genuine => (ksn.as_str().to_owned(), false),
        KsnInput::Text(text) => (text, true),
        KsnInput::Sealed(bytes) => (STANDARD.encode(&bytes), bytes != sealed),
        KsnInput::Corrupt { index, mask } => {
            let mut bytes = sealed.clone();
            let i = usize::from(index) % bytes.len();
            bytes[i] ^= mask;
            (STANDARD.encode(&bytes), mask != 0)
        },
        KsnInput::Truncate { drop } => {
            let keep = sealed.len().saturating_sub(usize::from(drop));
            (STANDARD.encode(&sealed[..keep]), keep != sealed.len())
        },
    };

    // INVARIANT 2: Resolution never panics
    match codec.resolve_session_key(&presented) {
        Ok(resolved) => {
            // INVARIANT 3: Resolved keys are always 16 characters
            assert_eq!(resolved.as_str().chars().count(), SESSION_KEY_LEN);

            // INVARIANT 4: Only the genuine KSN yields the original key
            if mutated && presented != ksn.as_str() {
                assert_ne!(resolved.as_str(), key.as_str(), "mutated KSN resolved to original key");
            } else {
                assert_eq!(resolved.as_str(), key.as_str());
            }
        },
        Err(_) => {
            // INVARIANT 5: The genuine KSN always resolves
            assert!(presented != ksn.as_str(), "genuine KSN failed to resolve");
        },
    }
});
