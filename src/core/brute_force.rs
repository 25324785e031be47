//! Brute-force tracking over failed authentication attempts.
//!
//! Each reported failure for an IP is checked against the recent-failure
//! window before being recorded: if the incoming failure is the Nth
//! within the window (threshold N), the IP escalates immediately to a
//! long block and the failure is not appended, letting the window age
//! back to clean.

use std::sync::Arc;

use log::warn;

use crate::core::alerts::AlertSink;
use crate::core::blocklist::Blocklist;
use crate::core::sliding_window::SlidingWindowCounter;
use crate::models::{AlertLevel, MonitorConfig, SecurityEventKind};
use crate::utils::format_window_key;

/// Tracks failed logins per IP and escalates past the threshold.
pub struct BruteForceTracker {
    windows: Arc<SlidingWindowCounter>,
    blocklist: Arc<Blocklist>,
    alerts: Arc<AlertSink>,
    threshold: u32,
    window_seconds: u64,
    block_duration_seconds: u64,
}

impl BruteForceTracker {
    pub fn new(
        windows: Arc<SlidingWindowCounter>,
        blocklist: Arc<Blocklist>,
        alerts: Arc<AlertSink>,
        config: &MonitorConfig,
    ) -> Self {
        Self {
            windows,
            blocklist,
            alerts,
            threshold: config.failed_login_threshold,
            window_seconds: config.failed_login_window_seconds,
            block_duration_seconds: config.brute_force_block_duration_seconds,
        }
    }

    /// Report one failed login for `ip`. Returns whether this failure
    /// escalated to a block.
    pub fn report_failure(&self, ip: &str) -> bool {
        let key = format_window_key("failed_login", ip);
        let recent = self.windows.count_recent(&key, self.window_seconds) as u32;

        // the incoming failure counts toward the threshold, so the Nth
        // failure escalates, not the N+1th
        if recent + 1 >= self.threshold {
            self.escalate(ip, recent + 1);
            return true;
        }

        self.windows.record_event(&key);
        false
    }

    fn escalate(&self, ip: &str, failures: u32) {
        warn!(
            "brute force detected from {}: {} failed logins in {}s, blocking for {}s",
            ip, failures, self.window_seconds, self.block_duration_seconds
        );
        self.blocklist.block(ip, self.block_duration_seconds);
        self.alerts.log_event(
            SecurityEventKind::BruteForceDetected,
            serde_json::json!({
                "ip": ip,
                "failures": failures,
                "window_seconds": self.window_seconds,
                "block_duration_seconds": self.block_duration_seconds,
            }),
        );
        self.alerts.raise(
            AlertLevel::High,
            "Brute force detected",
            &format!(
                "{} failed logins from {} within {}s; blocked for {}s",
                failures, ip, self.window_seconds, self.block_duration_seconds
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use std::fs;
    use std::path::PathBuf;
    use uuid::Uuid;

    struct Fixture {
        clock: Arc<ManualClock>,
        tracker: BruteForceTracker,
        blocklist: Arc<Blocklist>,
        alerts: Arc<AlertSink>,
        event_log: PathBuf,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::at(10_000));
        let windows = Arc::new(SlidingWindowCounter::new(clock.clone()));
        let blocklist = Arc::new(Blocklist::new(clock.clone()));
        let dir = std::env::temp_dir().join(format!("brute-force-{}", Uuid::new_v4()));
        let event_log = dir.join("events.log");
        let alerts = Arc::new(AlertSink::new(dir.join("alerts.json"), event_log.clone(), None));
        let tracker = BruteForceTracker::new(
            windows,
            blocklist.clone(),
            alerts.clone(),
            &MonitorConfig::default(),
        );
        Fixture {
            clock,
            tracker,
            blocklist,
            alerts,
            event_log,
        }
    }

    #[test]
    fn four_failures_do_not_block() {
        let f = fixture();
        for _ in 0..4 {
            assert!(!f.tracker.report_failure("10.0.0.1"));
        }
        assert!(!f.blocklist.is_blocked("10.0.0.1"));
        assert!(f.alerts.recent().is_empty());
    }

    #[test]
    fn fifth_failure_blocks_with_the_long_duration() {
        let f = fixture();
        for _ in 0..4 {
            f.tracker.report_failure("10.0.0.1");
        }
        assert!(f.tracker.report_failure("10.0.0.1"));
        assert!(f.blocklist.is_blocked("10.0.0.1"));

        // block uses the brute-force duration, not the generic one
        f.clock.advance_secs(3601);
        assert!(f.blocklist.is_blocked("10.0.0.1"));
        f.clock.advance_secs(86_400);
        assert!(!f.blocklist.is_blocked("10.0.0.1"));
    }

    #[test]
    fn escalation_emits_one_high_alert_and_one_log_record() {
        let f = fixture();
        for _ in 0..5 {
            f.tracker.report_failure("10.0.0.1");
        }

        let alerts = f.alerts.recent();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::High);

        let log = fs::read_to_string(&f.event_log).unwrap();
        let records: Vec<serde_json::Value> = log
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        let brute: Vec<_> = records
            .iter()
            .filter(|r| r["event"] == "BRUTE_FORCE_DETECTED")
            .collect();
        assert_eq!(brute.len(), 1);
        assert_eq!(brute[0]["ip"], "10.0.0.1");
    }

    #[test]
    fn failures_outside_the_window_age_out() {
        let f = fixture();
        for _ in 0..4 {
            f.tracker.report_failure("10.0.0.1");
        }
        // past the 300s window the old failures stop counting
        f.clock.advance_secs(301);
        assert!(!f.tracker.report_failure("10.0.0.1"));
        assert!(!f.blocklist.is_blocked("10.0.0.1"));
    }

    #[test]
    fn ips_are_tracked_independently() {
        let f = fixture();
        for _ in 0..4 {
            f.tracker.report_failure("10.0.0.1");
            f.tracker.report_failure("10.0.0.2");
        }
        assert!(f.tracker.report_failure("10.0.0.1"));
        assert!(f.blocklist.is_blocked("10.0.0.1"));
        assert!(!f.blocklist.is_blocked("10.0.0.2"));
    }
}
