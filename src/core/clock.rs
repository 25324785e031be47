//! Time source abstraction for the security monitor.
//!
//! All time-dependent components (windows, blocklist, brute-force
//! tracking) read the clock through this trait so tests can drive
//! time deterministically instead of sleeping.

use std::time::{SystemTime, UNIX_EPOCH};

/// A source of wall-clock time.
pub trait Clock: Send + Sync {
    /// Current Unix time in whole seconds.
    fn now_secs(&self) -> u64;

    /// Current Unix time in milliseconds.
    fn now_millis(&self) -> u64;
}

/// Production clock backed by `SystemTime`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }

    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Manually advanced clock for tests.
#[cfg(test)]
pub struct ManualClock(std::sync::atomic::AtomicU64);

#[cfg(test)]
impl ManualClock {
    /// Create a clock pinned at `secs` seconds since the epoch.
    pub fn at(secs: u64) -> Self {
        Self(std::sync::atomic::AtomicU64::new(secs * 1000))
    }

    /// Advance the clock by `secs` seconds.
    pub fn advance_secs(&self, secs: u64) {
        self.0
            .fetch_add(secs * 1000, std::sync::atomic::Ordering::SeqCst);
    }

    /// Advance the clock by `ms` milliseconds.
    pub fn advance_millis(&self, ms: u64) {
        self.0.fetch_add(ms, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now_secs(&self) -> u64 {
        self.0.load(std::sync::atomic::Ordering::SeqCst) / 1000
    }

    fn now_millis(&self) -> u64 {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}
