//! Wall-clock abstraction for throttle bookkeeping.
//!
//! Rebuild timestamps are compared in unix-epoch seconds so they stay
//! meaningful across processes. The trait exists so tests can drive the
//! throttle window deterministically.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current unix-epoch time in seconds.
pub trait Clock: Send + Sync + 'static {
    /// Current time as fractional unix-epoch seconds.
    fn now(&self) -> f64;
}

/// Production clock reading [`SystemTime`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// Manually advanced clock for tests.
///
/// Stores whole milliseconds; throttle windows are second-scale so the
/// resolution is more than enough.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    /// Creates a clock starting at `start` epoch seconds.
    pub fn starting_at(start: f64) -> Self {
        Self {
            millis: AtomicU64::new((start * 1000.0) as u64),
        }
    }

    /// Advances the clock by `seconds`.
    pub fn advance(&self, seconds: f64) {
        self.millis
            .fetch_add((seconds * 1000.0) as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.millis.load(Ordering::SeqCst) as f64 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_recent() {
        let now = SystemClock.now();
        // Well after 2020-01-01.
        assert!(now > 1_577_836_800.0);
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::starting_at(1_000.0);
        assert!((clock.now() - 1_000.0).abs() < 1e-9);
        clock.advance(300.5);
        assert!((clock.now() - 1_300.5).abs() < 1e-9);
    }
}
