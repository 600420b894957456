//! Environment abstraction for deterministic testing.
//!
//! Decouples operation logic from system resources (time). Production uses
//! the real clocks; tests substitute a fixed or stepping clock so that session
//! keys and timing metadata are reproducible.

use std::time::Duration;

use chrono::NaiveDateTime;

/// Abstract environment providing monotonic and wall-clock time.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - Methods are infallible
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`; tests may use any
    /// ordered type that yields a `Duration` on subtraction.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic). Used for elapsed-time measurement.
    ///
    /// # Invariants
    ///
    /// - Subsequent calls must return times >= previous calls.
    fn now(&self) -> Self::Instant;

    /// Current local wall-clock time.
    ///
    /// Feeds session key generation and the start/end timestamps reported
    /// on operation records. May jump (NTP, DST); never used for durations.
    fn local_time(&self) -> NaiveDateTime;
}
