//! Core functionality of the security monitor.
//!
//! This module contains the building blocks — time source, sliding
//! windows, threat signatures, blocklist, brute-force tracking, alerting,
//! request stats — and the orchestrator that wires them together.

pub mod alerts;
pub mod blocklist;
pub mod brute_force;
pub mod clock;
pub mod monitor;
pub mod notifier;
pub mod sliding_window;
pub mod stats;
pub mod threat_patterns;

pub use alerts::{AlertNotifier, AlertSink};
pub use blocklist::Blocklist;
pub use brute_force::BruteForceTracker;
pub use clock::{Clock, SystemClock};
pub use monitor::{RequestContext, SecurityMonitor};
pub use notifier::WebhookNotifier;
pub use sliding_window::SlidingWindowCounter;
pub use stats::RequestStats;
pub use threat_patterns::ThreatDetector;
