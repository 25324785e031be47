//! Sliding window counters keyed by string.
//!
//! Each key owns an ordered list of second-resolution timestamps.
//! Pruning happens on every count rather than in a background task, so
//! memory stays bounded per active key without a timer thread. A single
//! mutex guards the whole map; operations are O(window size) and windows
//! are small in practice.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::core::clock::Clock;

/// Append-and-prune timestamp windows shared across the monitor.
pub struct SlidingWindowCounter {
    windows: Mutex<HashMap<String, Vec<u64>>>,
    clock: Arc<dyn Clock>,
}

impl SlidingWindowCounter {
    /// Create an empty counter using the given time source.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Append the current timestamp to `key`'s window.
    pub fn record_event(&self, key: &str) {
        let now = self.clock.now_secs();
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        windows.entry(key.to_string()).or_default().push(now);
    }

    /// Prune `key`'s window to the last `window_seconds` and return the
    /// remaining count. Absent keys count as an empty window.
    pub fn count_recent(&self, key: &str, window_seconds: u64) -> usize {
        let now = self.clock.now_secs();
        let cutoff = now.saturating_sub(window_seconds);
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        match windows.get_mut(key) {
            Some(timestamps) => {
                timestamps.retain(|&ts| ts >= cutoff);
                timestamps.len()
            }
            None => 0,
        }
    }

    /// Record an event and return the window count including it.
    pub fn record_and_count(&self, key: &str, window_seconds: u64) -> usize {
        let now = self.clock.now_secs();
        let cutoff = now.saturating_sub(window_seconds);
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let timestamps = windows.entry(key.to_string()).or_default();
        timestamps.retain(|&ts| ts >= cutoff);
        timestamps.push(now);
        timestamps.len()
    }

    /// Drop keys whose windows have fully aged past `max_window_seconds`.
    /// Called periodically to bound key cardinality over the process
    /// lifetime; per-key pruning alone never forgets an inactive key.
    pub fn sweep(&self, max_window_seconds: u64) -> usize {
        let cutoff = self.clock.now_secs().saturating_sub(max_window_seconds);
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let before = windows.len();
        windows.retain(|_, timestamps| {
            timestamps.retain(|&ts| ts >= cutoff);
            !timestamps.is_empty()
        });
        before - windows.len()
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.windows.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
