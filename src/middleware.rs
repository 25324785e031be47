//! Actix middleware wiring the monitor into the request lifecycle.
//!
//! The guard consults the blocklist before anything else: a blocked IP
//! receives a fixed 403 rejection and is neither scanned nor counted.
//! Every other request is observed on the way in (`begin_request`) and
//! on the way out (`finish_request`) and is never failed or delayed by
//! the monitor itself.

use std::future::{ready, Future, Ready};
use std::pin::Pin;
use std::sync::Arc;

use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{HeaderName, HeaderValue, USER_AGENT};
use actix_web::{Error, HttpResponse};
use serde::Serialize;

use crate::core::SecurityMonitor;
use crate::models::RequestSnapshot;
use crate::utils::normalize_ip;

const REQUEST_ID_HEADER: &str = "x-request-id";

type LocalBoxFuture<T> = Pin<Box<dyn Future<Output = T> + 'static>>;

/// Fixed rejection body for blocked IPs
#[derive(Serialize)]
struct BlockedResponse {
    error: &'static str,
    message: &'static str,
}

/// Middleware factory, wrapped around the whole app.
pub struct SecurityGuard {
    monitor: Arc<SecurityMonitor>,
}

impl SecurityGuard {
    pub fn new(monitor: Arc<SecurityMonitor>) -> Self {
        Self { monitor }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SecurityGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = SecurityGuardMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SecurityGuardMiddleware {
            service,
            monitor: self.monitor.clone(),
        }))
    }
}

pub struct SecurityGuardMiddleware<S> {
    service: S,
    monitor: Arc<SecurityMonitor>,
}

impl<S, B> Service<ServiceRequest> for SecurityGuardMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let monitor = self.monitor.clone();
        let ip = client_ip(&req);

        if monitor.check_blocked(&ip) {
            let (req, _payload) = req.into_parts();
            let response = HttpResponse::Forbidden()
                .json(BlockedResponse {
                    error: "forbidden",
                    message: "access temporarily blocked",
                })
                .map_into_right_body();
            return Box::pin(async move { Ok(ServiceResponse::new(req, response)) });
        }

        let snapshot = RequestSnapshot {
            method: req.method().to_string(),
            path: req.path().to_string(),
            ip,
            user_agent: req
                .headers()
                .get(USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string(),
            payload: query_view(req.query_string()),
        };
        let inbound_id = req
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let ctx = monitor.begin_request(&snapshot, inbound_id.as_deref());

        let fut = self.service.call(req);
        Box::pin(async move {
            let mut res = fut.await?;
            monitor.finish_request(&ctx, res.status().as_u16());
            if let Ok(value) = HeaderValue::from_str(&ctx.request_id) {
                res.headers_mut()
                    .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
            }
            Ok(res.map_into_left_body())
        })
    }
}

/// Decoded query parameters as the snapshot's scannable payload view.
/// Encoded attack payloads (`%27`, `%3B`, ...) must be scanned in their
/// decoded form.
fn query_view(query: &str) -> serde_json::Value {
    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();
    serde_json::json!({ "query": pairs })
}

/// Client IP from connection info, with any port suffix and the
/// IPv4-mapped-IPv6 prefix stripped.
fn client_ip(req: &ServiceRequest) -> String {
    let conn = req.connection_info();
    let raw = conn.realip_remote_addr().unwrap_or("unknown");
    let host = match raw.parse::<std::net::SocketAddr>() {
        Ok(addr) => addr.ip().to_string(),
        Err(_) => raw.to_string(),
    };
    normalize_ip(&host).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::SystemClock;
    use crate::models::Config;
    // aliased so the built-in #[test] attribute stays visible for sync tests
    use actix_web::test as actix_test;
    use actix_web::{web, App};
    use std::net::SocketAddr;
    use uuid::Uuid;

    fn test_monitor() -> Arc<SecurityMonitor> {
        let dir = std::env::temp_dir().join(format!("middleware-{}", Uuid::new_v4()));
        let mut config = Config::default();
        config.storage.alerts_file = dir.join("alerts.json").to_string_lossy().into_owned();
        config.storage.security_log_file =
            dir.join("events.log").to_string_lossy().into_owned();
        Arc::new(SecurityMonitor::new(&config, Arc::new(SystemClock), None))
    }

    fn peer(ip: &str) -> SocketAddr {
        format!("{}:34567", ip).parse().unwrap()
    }

    macro_rules! app_with {
        ($monitor:expr) => {
            actix_test::init_service(
                App::new()
                    .wrap(SecurityGuard::new($monitor))
                    .route("/", web::get().to(|| async { HttpResponse::Ok().body("ok") }))
                    .route(
                        "/login",
                        web::post().to(|| async { HttpResponse::Unauthorized().finish() }),
                    ),
            )
            .await
        };
    }

    #[test]
    fn query_view_decodes_percent_encoding() {
        let view = query_view("q=1%27%3B%20DROP%20TABLE%20users%3B%20--");
        assert!(view.to_string().contains("DROP TABLE users"));
    }

    #[actix_web::test]
    async fn clean_requests_pass_and_get_a_request_id() {
        let monitor = test_monitor();
        let app = app_with!(monitor.clone());

        let req = actix_test::TestRequest::get()
            .uri("/")
            .peer_addr(peer("198.51.100.40"))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        assert!(resp.headers().contains_key(REQUEST_ID_HEADER));
        assert_eq!(monitor.stats().counters["requests_total"], 1);
    }

    #[actix_web::test]
    async fn inbound_request_id_is_echoed_back() {
        let monitor = test_monitor();
        let app = app_with!(monitor);

        let req = actix_test::TestRequest::get()
            .uri("/")
            .insert_header((REQUEST_ID_HEADER, "trace-42"))
            .peer_addr(peer("198.51.100.41"))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(
            resp.headers().get(REQUEST_ID_HEADER).unwrap(),
            "trace-42"
        );
    }

    #[actix_web::test]
    async fn attacking_query_string_blocks_subsequent_requests() {
        let monitor = test_monitor();
        let app = app_with!(monitor.clone());

        let req = actix_test::TestRequest::get()
            .uri("/?q=1%27%3B%20DROP%20TABLE%20users%3B%20--")
            .peer_addr(peer("203.0.113.50"))
            .to_request();
        // the observed request itself still completes
        let resp = actix_test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        assert!(monitor.check_blocked("203.0.113.50"));

        let req = actix_test::TestRequest::get()
            .uri("/")
            .peer_addr(peer("203.0.113.50"))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::FORBIDDEN);
        // other clients are unaffected
        let req = actix_test::TestRequest::get()
            .uri("/")
            .peer_addr(peer("198.51.100.42"))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn repeated_unauthorized_logins_get_blocked() {
        let monitor = test_monitor();
        let app = app_with!(monitor.clone());

        for _ in 0..5 {
            let req = actix_test::TestRequest::post()
                .uri("/login")
                .peer_addr(peer("203.0.113.51"))
                .to_request();
            let resp = actix_test::call_service(&app, req).await;
            assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);
        }

        let req = actix_test::TestRequest::get()
            .uri("/")
            .peer_addr(peer("203.0.113.51"))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::FORBIDDEN);
    }
}
