//! Temporary IP blocklist with lazy expiry.
//!
//! A block's effective state is a pure function of (entry, now): an entry
//! whose expiry has passed is logically absent and is physically removed
//! the next time it is observed. Every request passes through
//! `is_blocked`, so stale entries never outlive their next observation by
//! much and no timer thread is needed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::core::clock::Clock;

/// Map from IP to block-expiry timestamp in milliseconds.
pub struct Blocklist {
    entries: Mutex<HashMap<String, u64>>,
    clock: Arc<dyn Clock>,
}

impl Blocklist {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Whether `ip` is currently blocked. Expired entries are evicted as
    /// a side effect of being observed.
    pub fn is_blocked(&self, ip: &str) -> bool {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(ip) {
            Some(&expires_at) if expires_at > now => true,
            Some(_) => {
                entries.remove(ip);
                false
            }
            None => false,
        }
    }

    /// Block `ip` for `duration_seconds` from now. A later call replaces
    /// any existing expiry; durations do not stack.
    pub fn block(&self, ip: &str, duration_seconds: u64) {
        let expires_at = self.clock.now_millis() + duration_seconds * 1000;
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(ip.to_string(), expires_at);
    }

    /// Remove any block for `ip`; returns whether an entry was present
    /// and still active.
    pub fn unblock(&self, ip: &str) -> bool {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        matches!(entries.remove(ip), Some(expires_at) if expires_at > now)
    }

    /// Currently active blocks as (ip, expires_at_ms), expired entries
    /// evicted on the way through.
    pub fn list_active(&self) -> Vec<(String, u64)> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|_, &mut expires_at| expires_at > now);
        let mut active: Vec<_> = entries
            .iter()
            .map(|(ip, &expires_at)| (ip.clone(), expires_at))
            .collect();
        active.sort_by(|a, b| a.0.cmp(&b.0));
        active
    }

    /// Evict every expired entry; returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, &mut expires_at| expires_at > now);
        before - entries.len()
    }
}
