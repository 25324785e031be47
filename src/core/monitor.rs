//! Request monitor orchestration.
//!
//! One `SecurityMonitor` instance owns all mutable monitoring state and
//! is shared across requests. The middleware calls `check_blocked`
//! before anything else (a blocked IP gets the fixed rejection and
//! nothing more), then `begin_request` ahead of the handler and
//! `finish_request` once the response is finalized.
//!
//! Everything except the block check is observational: internal failures
//! of any step are contained and the request proceeds exactly as if
//! monitoring were absent.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use log::{debug, info, warn};
use uuid::Uuid;

use crate::core::alerts::{AlertNotifier, AlertSink};
use crate::core::blocklist::Blocklist;
use crate::core::brute_force::BruteForceTracker;
use crate::core::clock::Clock;
use crate::core::sliding_window::SlidingWindowCounter;
use crate::core::stats::{RequestStats, StatsSnapshot};
use crate::core::threat_patterns::ThreatDetector;
use crate::models::{
    Alert, AlertLevel, Config, MonitorConfig, RequestSnapshot, SecurityEventKind, Severity,
};
use crate::utils::{format_window_key, normalize_ip};

/// Per-request state carried from the pre-hook to the post-hook.
pub struct RequestContext {
    pub request_id: String,
    pub ip: String,
    pub method: String,
    pub path: String,
    started_at_ms: u64,
}

/// The monitor instance shared by the middleware and the admin API.
pub struct SecurityMonitor {
    config: MonitorConfig,
    clock: Arc<dyn Clock>,
    windows: Arc<SlidingWindowCounter>,
    detector: ThreatDetector,
    blocklist: Arc<Blocklist>,
    brute_force: BruteForceTracker,
    alerts: Arc<AlertSink>,
    stats: RequestStats,
}

impl SecurityMonitor {
    pub fn new(
        config: &Config,
        clock: Arc<dyn Clock>,
        notifier: Option<Arc<dyn AlertNotifier>>,
    ) -> Self {
        let windows = Arc::new(SlidingWindowCounter::new(clock.clone()));
        let blocklist = Arc::new(Blocklist::new(clock.clone()));
        let alerts = Arc::new(AlertSink::new(
            &config.storage.alerts_file,
            &config.storage.security_log_file,
            notifier,
        ));
        let brute_force = BruteForceTracker::new(
            windows.clone(),
            blocklist.clone(),
            alerts.clone(),
            &config.monitor,
        );
        Self {
            config: config.monitor.clone(),
            clock,
            windows,
            detector: ThreatDetector::new(),
            blocklist,
            brute_force,
            alerts,
            stats: RequestStats::new(),
        }
    }

    /// Middleware short-circuit: is this IP currently denied service?
    pub fn check_blocked(&self, ip: &str) -> bool {
        let blocked = self.blocklist.is_blocked(normalize_ip(ip));
        if blocked {
            self.stats.record_blocked();
        }
        blocked
    }

    /// Pre-handling hook. Scans for threats, observes the request rate,
    /// and returns the context the post-hook needs. Never fails the
    /// request: any internal problem is contained per step.
    pub fn begin_request(
        &self,
        snapshot: &RequestSnapshot,
        inbound_request_id: Option<&str>,
    ) -> RequestContext {
        let request_id = inbound_request_id
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        self.stats.record_request();
        self.contained("threat scan", || self.scan_for_threats(snapshot));
        self.contained("rate observation", || self.observe_rate(snapshot));

        RequestContext {
            request_id,
            ip: snapshot.ip.clone(),
            method: snapshot.method.clone(),
            path: snapshot.path.clone(),
            started_at_ms: self.clock.now_millis(),
        }
    }

    /// Post-handling hook: duration and status accounting, auth-failure
    /// forwarding, slow-request detection.
    pub fn finish_request(&self, ctx: &RequestContext, status: u16) {
        let elapsed_ms = self
            .clock
            .now_millis()
            .saturating_sub(ctx.started_at_ms);
        self.stats.record_response(status, elapsed_ms);

        if status == 401 {
            self.contained("auth failure report", || {
                self.brute_force.report_failure(&ctx.ip);
            });
        }

        if elapsed_ms > self.config.slow_request_ms {
            self.contained("slow request accounting", || {
                warn!(
                    "slow request {} {} from {} took {}ms",
                    ctx.method, ctx.path, ctx.ip, elapsed_ms
                );
                self.alerts.log_event(
                    SecurityEventKind::SlowRequest,
                    serde_json::json!({
                        "request_id": ctx.request_id,
                        "method": ctx.method,
                        "path": ctx.path,
                        "ip": ctx.ip,
                        "duration_ms": elapsed_ms,
                    }),
                );
                if elapsed_ms > self.config.very_slow_request_ms {
                    self.alerts.raise(
                        AlertLevel::Warn,
                        "Very slow request",
                        &format!("{} {} took {}ms", ctx.method, ctx.path, elapsed_ms),
                    );
                }
            });
        }
    }

    /// Entry point for the collaborator auth layer: one rejected login
    /// attempt for `ip`.
    pub fn report_auth_failure(&self, ip: &str) {
        self.contained("auth failure report", || {
            self.brute_force.report_failure(normalize_ip(ip));
        });
    }

    /// Periodic maintenance: drop windows with no recent events and
    /// evict expired blocks, bounding key cardinality over time.
    pub fn sweep(&self) {
        let horizon = self
            .config
            .failed_login_window_seconds
            .max(self.config.rate_limit_window_seconds);
        let windows_dropped = self.windows.sweep(horizon);
        let blocks_evicted = self.blocklist.sweep();
        debug!(
            "sweep: dropped {} idle windows, evicted {} expired blocks",
            windows_dropped, blocks_evicted
        );
    }

    /// Alerts retained in memory, newest first.
    pub fn recent_alerts(&self) -> Vec<Alert> {
        self.alerts.recent()
    }

    /// Currently blocked IPs with their expiry timestamps (ms).
    pub fn blocked_ips(&self) -> Vec<(String, u64)> {
        self.blocklist.list_active()
    }

    /// Manually lift a block. Returns whether an active block existed.
    pub fn unblock(&self, ip: &str) -> bool {
        let ip = normalize_ip(ip);
        let removed = self.blocklist.unblock(ip);
        if removed {
            info!("manually unblocked {}", ip);
            self.alerts
                .log_event(SecurityEventKind::IpUnblocked, serde_json::json!({"ip": ip}));
        }
        removed
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    fn scan_for_threats(&self, snapshot: &RequestSnapshot) {
        for threat in self.detector.detect(snapshot) {
            warn!(
                "threat detected: {:?} ({:?}) {} {} from {}",
                threat.kind, threat.severity, threat.method, threat.path, threat.ip
            );
            self.alerts.log_event(
                SecurityEventKind::ThreatDetected,
                serde_json::json!({
                    "kind": threat.kind,
                    "severity": threat.severity,
                    "method": threat.method,
                    "path": threat.path,
                    "ip": threat.ip,
                    "user_agent": threat.user_agent,
                }),
            );

            match threat.severity {
                Severity::Critical => {
                    // snapshots should arrive pre-normalized, but block and
                    // check must agree on the key either way
                    let ip = normalize_ip(&threat.ip);
                    self.blocklist
                        .block(ip, self.config.block_duration_seconds);
                    self.alerts.log_event(
                        SecurityEventKind::IpBlocked,
                        serde_json::json!({
                            "ip": ip,
                            "reason": threat.kind,
                            "duration_seconds": self.config.block_duration_seconds,
                        }),
                    );
                    self.alerts.raise(
                        AlertLevel::Critical,
                        "Critical threat detected",
                        &format!(
                            "{:?} in {} {} from {}; blocked for {}s",
                            threat.kind,
                            threat.method,
                            threat.path,
                            threat.ip,
                            self.config.block_duration_seconds
                        ),
                    );
                }
                Severity::High => {
                    self.alerts.raise(
                        AlertLevel::High,
                        "Threat detected",
                        &format!(
                            "{:?} in {} {} from {}",
                            threat.kind, threat.method, threat.path, threat.ip
                        ),
                    );
                }
                Severity::Medium => {}
            }
        }
    }

    fn observe_rate(&self, snapshot: &RequestSnapshot) {
        let key = format_window_key("request_rate", &snapshot.ip);
        let count = self
            .windows
            .record_and_count(&key, self.config.rate_limit_window_seconds);
        // advisory only: the soft limit alerts, it never blocks
        if count > self.config.rate_limit_max_requests as usize {
            self.alerts.raise(
                AlertLevel::Warn,
                "High request rate",
                &format!(
                    "{} made {} requests in the last {}s (soft limit {})",
                    snapshot.ip,
                    count,
                    self.config.rate_limit_window_seconds,
                    self.config.rate_limit_max_requests
                ),
            );
        }
    }

    /// Never-fail policy: run a monitoring step and swallow anything it
    /// does, including panics. The observed request must proceed as if
    /// monitoring were absent.
    fn contained<F: FnOnce()>(&self, step: &str, f: F) {
        if catch_unwind(AssertUnwindSafe(f)).is_err() {
            debug!("monitor step '{}' failed; continuing", step);
        }
    }
}
