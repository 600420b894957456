//! Property-based tests for the session key codec and cipher transform
//!
//! These verify the KSN invariants for arbitrary timestamps, sequences and
//! adversarial KSN input.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{NaiveDate, NaiveDateTime};
use cryptoserver_crypto::{CryptoError, MasterSecret, SESSION_KEY_LEN, SessionKeyCodec};
use proptest::prelude::*;

const PASSPHRASE: &str = "0123456789ABCDEF";
const SALT: &str = "FEDCBA9876543210";
const IV: &str = "A1B2C3D4E5F60718";

fn codec_with(passphrase: &str) -> SessionKeyCodec {
    SessionKeyCodec::new(&MasterSecret::new(passphrase, SALT, IV).unwrap()).unwrap()
}

fn arb_timestamp() -> impl Strategy<Value = NaiveDateTime> {
    (2000i32..2100, 1u32..=12, 1u32..=28, 0u32..24, 0u32..60, 0u32..60, 0u32..1000).prop_map(
        |(year, month, day, hour, minute, second, milli)| {
            NaiveDate::from_ymd_opt(year, month, day)
                .unwrap()
                .and_hms_milli_opt(hour, minute, second, milli)
                .unwrap()
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: every created session key is exactly 16 characters and its
    /// KSN resolves back to it
    #[test]
    fn prop_ksn_roundtrip(timestamp in arb_timestamp(), sequence in any::<u32>()) {
        let codec = codec_with(PASSPHRASE);

        let (key, ksn) = codec.create_session_key(timestamp, sequence)?;
        prop_assert_eq!(key.as_str().chars().count(), SESSION_KEY_LEN);

        let resolved = codec.resolve_session_key(ksn.as_str())?;
        prop_assert_eq!(resolved.as_str(), key.as_str());
    }

    /// Property: keys created in the same millisecond with distinct sequence
    /// suffixes never collide
    #[test]
    fn prop_sequence_separates_same_millisecond(
        timestamp in arb_timestamp(),
        a in 0u32..1000,
        b in 0u32..1000,
    ) {
        prop_assume!(a != b);
        let codec = codec_with(PASSPHRASE);

        let (key_a, _) = codec.create_session_key(timestamp, a)?;
        let (key_b, _) = codec.create_session_key(timestamp, b)?;
        prop_assert_ne!(key_a.as_str(), key_b.as_str());
    }

    /// Property: a KSN sealed under another passphrase never yields the
    /// original session key
    #[test]
    fn prop_wrong_master_never_resolves(
        timestamp in arb_timestamp(),
        sequence in 0u32..1000,
        other in "[0-9A-F]{16}",
    ) {
        prop_assume!(other != PASSPHRASE);
        let sealing = codec_with(&other);
        let (key, ksn) = sealing.create_session_key(timestamp, sequence)?;

        match codec_with(PASSPHRASE).resolve_session_key(ksn.as_str()) {
            Ok(resolved) => prop_assert_ne!(resolved.as_str(), key.as_str()),
            Err(err) => {
                let rejected = matches!(
                    err,
                    CryptoError::InvalidSessionKey { .. } | CryptoError::InvalidKsn { .. }
                );
                prop_assert!(rejected, "unexpected error: {}", err);
            },
        }
    }

    /// Property: arbitrary KSN text either fails or yields a 16-character key
    #[test]
    fn prop_arbitrary_ksn_never_yields_bad_length(ksn in ".*") {
        if let Ok(key) = codec_with(PASSPHRASE).resolve_session_key(&ksn) {
            prop_assert_eq!(key.as_str().chars().count(), SESSION_KEY_LEN);
        }
    }

    /// Property: arbitrary sealed bytes either fail or yield a 16-character key
    #[test]
    fn prop_arbitrary_sealed_bytes_never_yield_bad_length(
        sealed in prop::collection::vec(any::<u8>(), 0..96),
    ) {
        let ksn = STANDARD.encode(&sealed);
        if let Ok(key) = codec_with(PASSPHRASE).resolve_session_key(&ksn) {
            prop_assert_eq!(key.as_str().chars().count(), SESSION_KEY_LEN);
        }
    }

    /// Property: the payload cipher round-trips any byte string
    #[test]
    fn prop_cipher_roundtrip(payload in prop::collection::vec(any::<u8>(), 0..512)) {
        let codec = codec_with(PASSPHRASE);
        let (key, _) = codec.create_session_key(
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap().and_hms_milli_opt(0, 0, 0, 0).unwrap(),
            0,
        )?;

        let cipher = codec.transform().encrypt(&payload, key.as_str())?;
        prop_assert!(!cipher.is_empty());

        let clear = codec.transform().decrypt(&cipher, key.as_str())?;
        prop_assert_eq!(clear.as_slice(), payload.as_slice());
    }
}
