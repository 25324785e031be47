//! Alert accumulation and persistence.
//!
//! Alerts live in a bounded in-memory list (newest appended, oldest
//! evicted past the cap) that backs the admin view. Each new alert also
//! rewrites the persisted alert file, and significant events append one
//! NDJSON record to the security event log. All I/O happens after the
//! list lock is released; persistence and notifier failures are logged
//! and otherwise ignored so alerting can never fail a request.

use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use log::warn;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Alert, AlertLevel, SecurityEventKind};

/// Maximum alerts retained in memory and in the persisted store.
pub const MAX_ALERTS: usize = 500;

/// Errors that can occur while persisting alerts or events
#[derive(Error, Debug)]
pub enum AlertStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// External receiver for HIGH/CRITICAL alerts. Implementations must not
/// let their own failures escape `notify`.
#[cfg_attr(test, mockall::automock)]
pub trait AlertNotifier: Send + Sync {
    fn notify(&self, alert: &Alert);
}

/// Bounded alert list plus the two file sinks.
pub struct AlertSink {
    alerts: Mutex<VecDeque<Alert>>,
    alerts_file: PathBuf,
    event_log: PathBuf,
    notifier: Option<Arc<dyn AlertNotifier>>,
}

impl AlertSink {
    pub fn new(
        alerts_file: impl Into<PathBuf>,
        event_log: impl Into<PathBuf>,
        notifier: Option<Arc<dyn AlertNotifier>>,
    ) -> Self {
        Self {
            alerts: Mutex::new(VecDeque::new()),
            alerts_file: alerts_file.into(),
            event_log: event_log.into(),
            notifier,
        }
    }

    /// Record a new alert: append in memory, rewrite the alert store,
    /// and dispatch HIGH/CRITICAL alerts to the notifier.
    pub fn raise(&self, level: AlertLevel, title: &str, details: &str) -> Alert {
        let alert = Alert {
            id: Uuid::new_v4().to_string(),
            level,
            title: title.to_string(),
            details: details.to_string(),
            created_at: Utc::now(),
        };

        let snapshot = {
            let mut alerts = self.alerts.lock().unwrap_or_else(|e| e.into_inner());
            alerts.push_back(alert.clone());
            while alerts.len() > MAX_ALERTS {
                alerts.pop_front();
            }
            // newest first, matching the admin view and the stored file
            alerts.iter().rev().cloned().collect::<Vec<_>>()
        };

        if let Err(e) = self.persist(&snapshot) {
            warn!("failed to persist alerts to {:?}: {}", self.alerts_file, e);
        }

        if level >= AlertLevel::High {
            if let Some(notifier) = &self.notifier {
                notifier.notify(&alert);
            }
        }

        alert
    }

    /// Append one record to the security event log. `fields` should be a
    /// JSON object; its entries are merged beside the timestamp and kind.
    pub fn log_event(&self, kind: SecurityEventKind, fields: serde_json::Value) {
        if let Err(e) = self.append_event(kind, fields) {
            warn!("failed to append event to {:?}: {}", self.event_log, e);
        }
    }

    /// Alerts currently retained, newest first.
    pub fn recent(&self) -> Vec<Alert> {
        let alerts = self.alerts.lock().unwrap_or_else(|e| e.into_inner());
        alerts.iter().rev().cloned().collect()
    }

    fn persist(&self, snapshot: &[Alert]) -> Result<(), AlertStoreError> {
        ensure_parent(&self.alerts_file)?;
        let json = serde_json::to_vec_pretty(snapshot)?;
        fs::write(&self.alerts_file, json)?;
        Ok(())
    }

    fn append_event(
        &self,
        kind: SecurityEventKind,
        fields: serde_json::Value,
    ) -> Result<(), AlertStoreError> {
        let mut record = serde_json::Map::new();
        record.insert("timestamp".into(), serde_json::json!(Utc::now().to_rfc3339()));
        record.insert("event".into(), serde_json::to_value(kind)?);
        if let serde_json::Value::Object(extra) = fields {
            record.extend(extra);
        }

        ensure_parent(&self.event_log)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.event_log)?;
        writeln!(file, "{}", serde_json::Value::Object(record))?;
        Ok(())
    }
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
