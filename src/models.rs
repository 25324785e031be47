use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
}

/// Monitoring thresholds and durations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Failed logins within the window that trigger escalation
    pub failed_login_threshold: u32,
    /// Failed-login observation window in seconds
    pub failed_login_window_seconds: u64,
    /// Soft per-IP request limit (alert only, never blocks)
    pub rate_limit_max_requests: u32,
    /// Request-rate observation window in seconds
    pub rate_limit_window_seconds: u64,
    /// Block duration for a critical threat in seconds
    pub block_duration_seconds: u64,
    /// Block duration after brute-force escalation in seconds
    pub brute_force_block_duration_seconds: u64,
    /// Request duration that logs a SLOW_REQUEST event, in milliseconds
    pub slow_request_ms: u64,
    /// Request duration that additionally raises a WARN alert, in milliseconds
    pub very_slow_request_ms: u64,
    /// Interval between sweeps of inactive windows and expired blocks
    pub sweep_interval_seconds: u64,
}

/// File sinks for persisted alerts and the security event log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON array of the most recent alerts, rewritten on each alert
    pub alerts_file: String,
    /// Newline-delimited JSON security event log, append-only
    pub security_log_file: String,
}

/// External notification configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Webhook receiving HIGH/CRITICAL alerts as JSON; disabled when unset
    #[serde(default)]
    pub webhook_url: Option<String>,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Monitoring configuration
    pub monitor: MonitorConfig,
    /// Storage configuration
    pub storage: StorageConfig,
    /// Notifier configuration
    #[serde(default)]
    pub notifier: NotifierConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            monitor: MonitorConfig::default(),
            storage: StorageConfig {
                alerts_file: "data/alerts.json".to_string(),
                security_log_file: "data/security_events.log".to_string(),
            },
            notifier: NotifierConfig { webhook_url: None },
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            failed_login_threshold: 5,
            failed_login_window_seconds: 300,
            rate_limit_max_requests: 100,
            rate_limit_window_seconds: 60,
            block_duration_seconds: 3600,
            brute_force_block_duration_seconds: 86400,
            slow_request_ms: 1000,
            very_slow_request_ms: 5000,
            sweep_interval_seconds: 300,
        }
    }
}

/// Narrow view of an inbound request, supplied by the web layer.
///
/// The monitor never touches the framework's request type directly;
/// whatever structured fields the caller has (body, query, route params)
/// arrive pre-merged in `payload`.
#[derive(Debug, Clone, Serialize)]
pub struct RequestSnapshot {
    pub method: String,
    pub path: String,
    /// Remote IP, already normalized (no IPv4-mapped-IPv6 prefix)
    pub ip: String,
    pub user_agent: String,
    /// Serializable view of body/query/route parameters for pattern scanning
    pub payload: serde_json::Value,
}

impl RequestSnapshot {
    /// Best-effort text the signature patterns are tested against.
    /// Serialization problems degrade to an empty payload view.
    pub fn scan_text(&self) -> String {
        let payload = serde_json::to_string(&self.payload).unwrap_or_default();
        format!("{} {}", self.path, payload)
    }
}

/// Threat signature categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatKind {
    SqlInjection,
    Xss,
    PathTraversal,
    CommandInjection,
}

/// Threat severity, ordered weakest to strongest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Medium,
    High,
    Critical,
}

/// One signature match against one request
#[derive(Debug, Clone, Serialize)]
pub struct ThreatEvent {
    pub kind: ThreatKind,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub path: String,
    pub ip: String,
    pub user_agent: String,
}

/// Alert level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    /// Informational, no action expected
    Warn,
    /// Needs operator attention
    High,
    /// Active attack or service risk
    Critical,
}

/// Operator-facing alert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Alert ID
    pub id: String,
    /// Alert level
    pub level: AlertLevel,
    /// Short summary
    pub title: String,
    /// Event-specific details
    pub details: String,
    /// Alert creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Record kinds written to the security event log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityEventKind {
    ThreatDetected,
    IpBlocked,
    IpUnblocked,
    BruteForceDetected,
    SlowRequest,
}
