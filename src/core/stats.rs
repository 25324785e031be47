//! Process-wide request counters.
//!
//! Counters reset only at process restart. Everything recorded here is
//! mirrored into the `metrics` recorder so the Prometheus endpoint and
//! the admin stats view always agree.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use metrics::{counter, histogram};
use serde::Serialize;

/// Snapshot of the counters for the admin view.
#[derive(Debug, Serialize)]
pub struct StatsSnapshot {
    pub counters: HashMap<String, u64>,
    pub last_request_duration_ms: u64,
}

/// Named monotonically increasing counters plus the last observed
/// request duration.
#[derive(Default)]
pub struct RequestStats {
    counters: Mutex<HashMap<String, u64>>,
    last_duration_ms: AtomicU64,
}

impl RequestStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one inbound request.
    pub fn record_request(&self) {
        self.incr("requests_total");
        counter!("requests_total", 1);
    }

    /// Count one finished response with its status and duration.
    pub fn record_response(&self, status: u16, duration_ms: u64) {
        self.incr(&format!("status_{}", status));
        if status >= 400 {
            self.incr("errors_total");
            counter!("errors_total", 1);
        }
        self.last_duration_ms.store(duration_ms, Ordering::Relaxed);
        counter!(format!("status_{}", status), 1);
        histogram!("request_duration_ms", duration_ms as f64);
    }

    /// Count one rejected (blocked) request.
    pub fn record_blocked(&self) {
        self.incr("blocked_total");
        counter!("blocked_total", 1);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        StatsSnapshot {
            counters: counters.clone(),
            last_request_duration_ms: self.last_duration_ms.load(Ordering::Relaxed),
        }
    }

    fn incr(&self, name: &str) {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        *counters.entry(name.to_string()).or_insert(0) += 1;
    }
}
