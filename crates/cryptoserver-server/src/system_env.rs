//! Production Environment implementation using system clocks and OS RNG.
//!
//! `SystemEnv` is the production implementation of the Environment trait:
//!
//! - Real monotonic time (`std::time::Instant`) for elapsed measurements
//! - Local wall-clock time (`chrono::Local`) for session keys and timestamps
//! - OS cryptographic RNG (getrandom) for generating key material at setup
//!
//! Production behavior is therefore non-deterministic; tests that need
//! reproducible timestamps supply their own environment.

use cryptoserver_core::Environment;

use crate::error::ServerError;

/// Production environment using system time and cryptographic RNG.
///
/// # Security
///
/// The RNG uses getrandom which provides OS-level cryptographic randomness
/// (e.g., /dev/urandom on Linux, `BCryptGenRandom` on Windows). Suitable for
/// generating passphrases, salts and initialization vectors.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Fill `buffer` from the OS RNG.
    ///
    /// # Errors
    ///
    /// - `Internal`: the OS RNG is unavailable
    pub fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), ServerError> {
        getrandom::fill(buffer)
            .map_err(|err| ServerError::Internal(format!("OS RNG failure: {err}")))
    }

    /// Random uppercase hex string of `len` characters.
    ///
    /// # Errors
    ///
    /// - `Internal`: the OS RNG is unavailable
    pub fn random_hex(&self, len: usize) -> Result<String, ServerError> {
        const DIGITS: &[u8; 16] = b"0123456789ABCDEF";

        let mut bytes = vec![0u8; len];
        self.random_bytes(&mut bytes)?;
        Ok(bytes.iter().map(|b| char::from(DIGITS[usize::from(b & 0x0F)])).collect())
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    #[allow(clippy::disallowed_methods)]
    fn local_time(&self) -> chrono::NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    #[allow(clippy::disallowed_methods)]
    fn system_env_time_advances() {
        let env = SystemEnv::new();

        let t1 = env.now();
        std::thread::sleep(Duration::from_millis(10));
        let t2 = env.now();

        assert!(t2 > t1, "Time should advance");
    }

    #[test]
    fn system_env_random_bytes_are_random() {
        let env = SystemEnv::new();

        let mut bytes1 = [0u8; 32];
        let mut bytes2 = [0u8; 32];

        env.random_bytes(&mut bytes1).unwrap();
        env.random_bytes(&mut bytes2).unwrap();

        // Extremely unlikely to be equal if random
        assert_ne!(bytes1, bytes2, "Random bytes should differ");
    }

    #[test]
    fn random_hex_has_requested_length_and_alphabet() {
        let hex = SystemEnv::new().random_hex(16).unwrap();

        assert_eq!(hex.len(), 16);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }
}
