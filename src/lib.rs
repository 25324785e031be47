//! Real-time request security monitoring.
//!
//! Inspects every inbound request for attack signatures and abusive
//! behavior, enforces temporary IP blocking, and emits bounded,
//! persisted alerts — without ever failing the request path it observes.

pub mod api;
pub mod config;
pub mod core;
pub mod middleware;
pub mod models;
pub mod utils;
