//! Request logging middleware for HTTP request/response tracking.
//!
//! Every request produces one completion event carrying method, path,
//! status, latency and client address. The event level follows the status
//! class, slow requests get an extra warning, and suspicious requests are
//! flagged separately.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::{Duration, Instant},
};

use actix_web::{
    Error,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
};
use futures::future::{Ready, ok};
use uuid::Uuid;

const SLOW_REQUEST_THRESHOLD: Duration = Duration::from_millis(2000);

#[derive(Clone, Default)]
pub struct RequestLoggingMiddleware;

impl RequestLoggingMiddleware {
    pub fn new() -> Self {
        Self
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequestLoggingMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestLoggingService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RequestLoggingService { service })
    }
}

pub struct RequestLoggingService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequestLoggingService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let request_id = Uuid::new_v4();

        let method = req.method().to_string();
        let path = req.path().to_string();
        let remote_addr = req
            .connection_info()
            .realip_remote_addr()
            .unwrap_or("unknown")
            .to_string();
        let user_agent = req
            .headers()
            .get("user-agent")
            .and_then(|h| h.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        tracing::debug!(%request_id, %method, %path, %remote_addr, "Request received");

        let fut = self.service.call(req);

        Box::pin(async move {
            let result = fut.await;
            let duration = start_time.elapsed();
            let status_code = match &result {
                Ok(response) => response.status().as_u16(),
                Err(e) => e.as_response_error().status_code().as_u16(),
            };
            let duration_ms = duration.as_millis() as u64;

            match status_code {
                500..=599 => tracing::error!(
                    %request_id, %method, %path, status_code, duration_ms, %remote_addr,
                    "Request failed"
                ),
                400..=499 => tracing::warn!(
                    %request_id, %method, %path, status_code, duration_ms, %remote_addr,
                    "Request rejected"
                ),
                _ => tracing::info!(
                    %request_id, %method, %path, status_code, duration_ms, %remote_addr,
                    "Request completed"
                ),
            }

            if duration > SLOW_REQUEST_THRESHOLD {
                tracing::warn!(
                    %request_id,
                    %method,
                    %path,
                    duration_ms,
                    threshold_ms = SLOW_REQUEST_THRESHOLD.as_millis() as u64,
                    "Slow request detected"
                );
            }

            if let Some(activity) = classify_suspicious_activity(&path, status_code, &user_agent) {
                tracing::warn!(
                    %request_id,
                    %method,
                    %path,
                    status_code,
                    %remote_addr,
                    %user_agent,
                    suspicious_activity = activity,
                    "Suspicious request pattern"
                );
            }

            result
        })
    }
}

/// Labels requests worth a security warning, or `None` for ordinary traffic.
fn classify_suspicious_activity(path: &str, status_code: u16, user_agent: &str) -> Option<&'static str> {
    if is_potential_attack_pattern(path) {
        Some("potential_injection_attempt")
    } else if status_code == 403 {
        Some("forbidden_access_attempt")
    } else if status_code == 404 && is_sensitive_path(path) {
        Some("sensitive_endpoint_probing")
    } else if is_suspicious_user_agent(user_agent) {
        Some("suspicious_user_agent")
    } else {
        None
    }
}

fn is_sensitive_path(path: &str) -> bool {
    ["/admin", "/.env", "/config", "/backup", "/database", "/.git"]
        .iter()
        .any(|pattern| path.contains(pattern))
}

fn is_suspicious_user_agent(user_agent: &str) -> bool {
    let ua = user_agent.to_lowercase();
    ["sqlmap", "nikto", "nmap", "masscan"]
        .iter()
        .any(|pattern| ua.contains(pattern))
}

fn is_potential_attack_pattern(path: &str) -> bool {
    let path = path.to_lowercase();
    ["../", "..\\", "union select", "<script", "javascript:"]
        .iter()
        .any(|pattern| path.contains(pattern))
}
