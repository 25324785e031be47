//! Configuration management for the security monitor.
//!
//! Options come from an optional TOML file layered under
//! `MONITOR_`-prefixed environment variables (nested keys separated by
//! `__`, e.g. `MONITOR_MONITOR__FAILED_LOGIN_THRESHOLD`). Every option
//! has a default; a configuration that fails to load or parse falls back
//! to the defaults with a warning instead of failing startup.

use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use log::warn;
use std::env;

use crate::models::Config;

/// Load configuration, falling back to defaults on any error.
pub fn load_config() -> Config {
    match try_load() {
        Ok(config) => config,
        Err(e) => {
            warn!("invalid configuration, using defaults: {}", e);
            Config::default()
        }
    }
}

fn try_load() -> Result<Config, ConfigError> {
    let config_file =
        env::var("CONFIG_FILE").unwrap_or_else(|_| "config/default.toml".to_string());

    let config = ConfigBuilder::builder()
        .add_source(File::with_name(&config_file).required(false))
        .add_source(
            Environment::with_prefix("MONITOR")
                .prefix_separator("_")
                .separator("__"),
        )
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 8080)?
        .set_default("monitor.failed_login_threshold", 5)?
        .set_default("monitor.failed_login_window_seconds", 300)?
        .set_default("monitor.rate_limit_max_requests", 100)?
        .set_default("monitor.rate_limit_window_seconds", 60)?
        .set_default("monitor.block_duration_seconds", 3600)?
        .set_default("monitor.brute_force_block_duration_seconds", 86400)?
        .set_default("monitor.slow_request_ms", 1000)?
        .set_default("monitor.very_slow_request_ms", 5000)?
        .set_default("monitor.sweep_interval_seconds", 300)?
        .set_default("storage.alerts_file", "data/alerts.json")?
        .set_default("storage.security_log_file", "data/security_events.log")?
        .build()?;

    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    // env mutation is process-global, so the scenarios share one test
    #[test]
    fn loads_defaults_overrides_and_falls_back_on_bad_values() {
        env::remove_var("CONFIG_FILE");

        let config = load_config();
        assert_eq!(config.monitor.failed_login_threshold, 5);
        assert_eq!(config.monitor.brute_force_block_duration_seconds, 86_400);
        assert_eq!(config.notifier.webhook_url, None);

        env::set_var("MONITOR_MONITOR__FAILED_LOGIN_THRESHOLD", "8");
        env::set_var("MONITOR_SERVER__PORT", "9090");
        let config = load_config();
        assert_eq!(config.monitor.failed_login_threshold, 8);
        assert_eq!(config.server.port, 9090);

        env::set_var("MONITOR_MONITOR__FAILED_LOGIN_THRESHOLD", "not-a-number");
        let config = load_config();
        assert_eq!(config.monitor.failed_login_threshold, 5);
        assert_eq!(config.server.port, 8080);

        env::remove_var("MONITOR_MONITOR__FAILED_LOGIN_THRESHOLD");
        env::remove_var("MONITOR_SERVER__PORT");
    }
}
