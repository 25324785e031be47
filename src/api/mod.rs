//! Admin API for the security monitor.
//!
//! This is the query surface an operator dashboard consumes: recent
//! alerts, currently blocked IPs, manual unblock, request stats, plus
//! the Prometheus render at /metrics.

use actix_web::{web, HttpResponse, Responder};
use chrono::{TimeZone, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;

use crate::core::SecurityMonitor;

pub struct ApiState {
    pub monitor: Arc<SecurityMonitor>,
    pub prometheus: Option<PrometheusHandle>,
}

/// API configuration function for Actix-web
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(web::resource("/health").route(web::get().to(health_check)))
            .service(web::resource("/alerts").route(web::get().to(get_alerts)))
            .service(web::resource("/blocked").route(web::get().to(get_blocked)))
            .service(web::resource("/blocked/{ip}").route(web::delete().to(unblock_ip)))
            .service(web::resource("/stats").route(web::get().to(get_stats))),
    )
    .service(web::resource("/metrics").route(web::get().to(render_metrics)));
}

/// Health check endpoint response
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// One currently blocked IP
#[derive(Serialize)]
struct BlockedIpResponse {
    ip: String,
    expires_at_ms: u64,
    expires_at: String,
}

#[derive(Serialize)]
struct UnblockResponse {
    ip: String,
    removed: bool,
}

/// Health check endpoint
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Recent alerts, newest first
async fn get_alerts(state: web::Data<ApiState>) -> impl Responder {
    HttpResponse::Ok().json(state.monitor.recent_alerts())
}

/// Currently blocked IPs with expiry
async fn get_blocked(state: web::Data<ApiState>) -> impl Responder {
    let blocked: Vec<BlockedIpResponse> = state
        .monitor
        .blocked_ips()
        .into_iter()
        .map(|(ip, expires_at_ms)| BlockedIpResponse {
            ip,
            expires_at_ms,
            expires_at: Utc
                .timestamp_millis_opt(expires_at_ms as i64)
                .single()
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
        })
        .collect();
    HttpResponse::Ok().json(blocked)
}

/// Manual unblock endpoint
async fn unblock_ip(state: web::Data<ApiState>, path: web::Path<String>) -> impl Responder {
    let ip = path.into_inner();
    let removed = state.monitor.unblock(&ip);
    if removed {
        HttpResponse::Ok().json(UnblockResponse { ip, removed })
    } else {
        HttpResponse::NotFound().json(UnblockResponse { ip, removed })
    }
}

/// Request counters and last observed duration
async fn get_stats(state: web::Data<ApiState>) -> impl Responder {
    HttpResponse::Ok().json(state.monitor.stats())
}

/// Prometheus exposition
async fn render_metrics(state: web::Data<ApiState>) -> impl Responder {
    match &state.prometheus {
        Some(handle) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(handle.render()),
        None => HttpResponse::NotFound().body("metrics recorder not installed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::SystemClock;
    use crate::models::{Config, RequestSnapshot};
    use actix_web::{test, App};
    use uuid::Uuid;

    fn test_state() -> web::Data<ApiState> {
        let dir = std::env::temp_dir().join(format!("api-test-{}", Uuid::new_v4()));
        let mut config = Config::default();
        config.storage.alerts_file = dir.join("alerts.json").to_string_lossy().into_owned();
        config.storage.security_log_file =
            dir.join("events.log").to_string_lossy().into_owned();

        let monitor = Arc::new(SecurityMonitor::new(
            &config,
            Arc::new(SystemClock),
            None,
        ));
        web::Data::new(ApiState {
            monitor,
            prometheus: None,
        })
    }

    fn attack_snapshot(ip: &str) -> RequestSnapshot {
        RequestSnapshot {
            method: "POST".into(),
            path: "/login".into(),
            ip: ip.into(),
            user_agent: "test".into(),
            payload: serde_json::json!({"user": "x'; DROP TABLE users; --"}),
        }
    }

    #[actix_web::test]
    async fn test_health_check() {
        let state = test_state();
        let app =
            test::init_service(App::new().app_data(state.clone()).configure(config)).await;

        let req = test::TestRequest::get().uri("/api/v1/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn test_alerts_listing() {
        let state = test_state();
        state.monitor.begin_request(&attack_snapshot("203.0.113.20"), None);

        let app =
            test::init_service(App::new().app_data(state.clone()).configure(config)).await;
        let req = test::TestRequest::get().uri("/api/v1/alerts").to_request();
        let alerts: Vec<serde_json::Value> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0]["level"], "CRITICAL");
    }

    #[actix_web::test]
    async fn test_blocked_listing_and_manual_unblock() {
        let state = test_state();
        state.monitor.begin_request(&attack_snapshot("203.0.113.21"), None);

        let app =
            test::init_service(App::new().app_data(state.clone()).configure(config)).await;

        let req = test::TestRequest::get().uri("/api/v1/blocked").to_request();
        let blocked: Vec<serde_json::Value> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0]["ip"], "203.0.113.21");

        let req = test::TestRequest::delete()
            .uri("/api/v1/blocked/203.0.113.21")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        // second delete finds nothing
        let req = test::TestRequest::delete()
            .uri("/api/v1/blocked/203.0.113.21")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_stats_endpoint() {
        let state = test_state();
        let snap = RequestSnapshot {
            method: "GET".into(),
            path: "/".into(),
            ip: "198.51.100.30".into(),
            user_agent: "test".into(),
            payload: serde_json::json!({}),
        };
        let ctx = state.monitor.begin_request(&snap, None);
        state.monitor.finish_request(&ctx, 200);

        let app =
            test::init_service(App::new().app_data(state.clone()).configure(config)).await;
        let req = test::TestRequest::get().uri("/api/v1/stats").to_request();
        let stats: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(stats["counters"]["requests_total"], 1);
    }
}
