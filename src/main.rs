//! Request Security Monitor
//!
//! This is the main entry point for the service. It initializes the
//! monitor components, starts the periodic maintenance sweep, and runs
//! the web server with the security middleware applied.

use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use dotenv::dotenv;
use log::{info, warn};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::time::Duration;

use request_security_monitor::api::{self, ApiState};
use request_security_monitor::config;
use request_security_monitor::core::{AlertNotifier, SecurityMonitor, SystemClock, WebhookNotifier};
use request_security_monitor::middleware::SecurityGuard;

#[actix_web::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    env_logger::init();

    info!("Starting Request Security Monitor...");

    // Load configuration
    let config = config::load_config();

    // Install the Prometheus recorder for the /metrics endpoint
    let prometheus = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("failed to install metrics recorder: {}", e);
            None
        }
    };

    // Optional webhook for HIGH/CRITICAL alerts
    let notifier: Option<Arc<dyn AlertNotifier>> = config
        .notifier
        .webhook_url
        .clone()
        .map(|url| Arc::new(WebhookNotifier::new(url)) as Arc<dyn AlertNotifier>);

    // Initialize the monitor
    let monitor = Arc::new(SecurityMonitor::new(
        &config,
        Arc::new(SystemClock),
        notifier,
    ));

    // Periodic sweep of idle windows and expired blocks
    let sweep_monitor = monitor.clone();
    let sweep_interval = Duration::from_secs(config.monitor.sweep_interval_seconds.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        interval.tick().await;
        loop {
            interval.tick().await;
            sweep_monitor.sweep();
        }
    });

    // Create API state
    let state = web::Data::new(ApiState {
        monitor: monitor.clone(),
        prometheus,
    });

    info!(
        "Listening on {}:{}",
        config.server.host, config.server.port
    );

    // Start HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(SecurityGuard::new(monitor.clone()))
            .configure(api::config)
    })
    .bind((config.server.host.as_str(), config.server.port))
    .with_context(|| {
        format!(
            "failed to bind {}:{}",
            config.server.host, config.server.port
        )
    })?
    .run()
    .await?;

    Ok(())
}
