//! Threat signature matching.
//!
//! A fixed set of named regular-expression signatures is tested against a
//! serialized snapshot of the request. Matching is pure and infallible:
//! a signature that fails to compile or evaluate is simply a non-match,
//! and a snapshot that cannot be serialized scans as an empty string.

use chrono::Utc;
use regex::Regex;

use crate::models::{RequestSnapshot, Severity, ThreatEvent, ThreatKind};

struct Signature {
    kind: ThreatKind,
    severity: Severity,
    pattern: Regex,
}

/// Evaluates request snapshots against the attack signature set.
pub struct ThreatDetector {
    signatures: Vec<Signature>,
}

impl ThreatDetector {
    /// Build the detector with the fixed signature set.
    pub fn new() -> Self {
        let raw: [(ThreatKind, Severity, &str); 4] = [
            (
                ThreatKind::SqlInjection,
                Severity::Critical,
                r"(?i)(\b(union|select|insert|update|delete|drop|truncate)\b[\s\S]{0,40}?\b(from|into|table|where|set)\b)|(--\s*$|--\s)|('\s*(or|and)\s*'?\d*'?\s*=)",
            ),
            (
                ThreatKind::CommandInjection,
                Severity::Critical,
                r"(?i)([;&|]\s*(cat|ls|rm|curl|wget|nc|bash|sh|cmd|powershell|ping|whoami)\b)|\$\(|`[^`]+`",
            ),
            (
                ThreatKind::Xss,
                Severity::High,
                r"(?i)<\s*script|javascript\s*:|on(error|load|click|focus|mouseover)\s*=",
            ),
            (
                ThreatKind::PathTraversal,
                Severity::High,
                r"(?i)\.\.[/\\]|%2e%2e(%2f|%5c|/|\\)",
            ),
        ];

        // an invalid pattern degrades that one signature to "never matches"
        let signatures = raw
            .into_iter()
            .filter_map(|(kind, severity, pattern)| {
                Regex::new(pattern).ok().map(|pattern| Signature {
                    kind,
                    severity,
                    pattern,
                })
            })
            .collect();

        Self { signatures }
    }

    /// Test every signature against the snapshot; one event per match.
    /// Multiple signatures may match the same request.
    pub fn detect(&self, snapshot: &RequestSnapshot) -> Vec<ThreatEvent> {
        let text = snapshot.scan_text();
        self.signatures
            .iter()
            .filter(|sig| sig.pattern.is_match(&text))
            .map(|sig| ThreatEvent {
                kind: sig.kind,
                severity: sig.severity,
                timestamp: Utc::now(),
                method: snapshot.method.clone(),
                path: snapshot.path.clone(),
                ip: snapshot.ip.clone(),
                user_agent: snapshot.user_agent.clone(),
            })
            .collect()
    }
}

impl Default for ThreatDetector {
    fn default() -> Self {
        Self::new()
    }
}
