//! Per-client-IP request limiting for the `/api` scope.
//!
//! Built on a keyed `governor` limiter: each IP gets a bucket of
//! `max_requests` that refills evenly over `window`. Buckets are keyed by
//! the socket peer address; `X-Forwarded-For` / `Forwarded` are only
//! honoured when the limiter is told it sits behind a trusted proxy.

use std::{
    future::Future,
    num::NonZeroU32,
    pin::Pin,
    rc::Rc,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};

use actix_web::{
    Error,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
};
use futures::future::{Ready, ok};
use governor::{
    DefaultKeyedRateLimiter, Quota, RateLimiter,
    clock::{Clock, DefaultClock},
};

use crate::error::AppError;

pub type IpLimiter = Arc<DefaultKeyedRateLimiter<String>>;

/// Middleware factory. Cloning shares the underlying buckets.
#[derive(Clone)]
pub struct RateLimit {
    limiter: IpLimiter,
    trust_proxy: bool,
}

impl RateLimit {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        let burst = NonZeroU32::new(max_requests).unwrap_or(NonZeroU32::MIN);
        let period = window / burst.get();
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);

        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
            trust_proxy: false,
        }
    }

    /// Key buckets on the forwarded client address instead of the peer.
    /// Only enable behind a reverse proxy that overwrites those headers.
    pub fn trust_proxy(mut self, trust: bool) -> Self {
        self.trust_proxy = trust;
        self
    }

    /// Handle for periodic housekeeping.
    pub fn limiter(&self) -> IpLimiter {
        self.limiter.clone()
    }
}

fn client_key(req: &ServiceRequest, trust_proxy: bool) -> String {
    let addr = if trust_proxy {
        req.connection_info().realip_remote_addr().map(str::to_string)
    } else {
        req.peer_addr().map(|addr| addr.ip().to_string())
    };
    addr.unwrap_or_else(|| "unknown".to_string())
}

/// Drops buckets that have fully refilled.
pub fn prune(limiter: &IpLimiter) {
    limiter.retain_recent();
    limiter.shrink_to_fit();
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RateLimitService {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
            trust_proxy: self.trust_proxy,
        })
    }
}

pub struct RateLimitService<S> {
    service: Rc<S>,
    limiter: IpLimiter,
    trust_proxy: bool,
}

impl<S, B> Service<ServiceRequest> for RateLimitService<S>
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
        let ip = client_key(&req, self.trust_proxy);

        if let Err(not_until) = self.limiter.check_key(&ip) {
            let wait = not_until.wait_time_from(DefaultClock::default().now());
            let retry_after = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
            tracing::warn!(ip = %ip, retry_after, "Rate limit exceeded");
            return Box::pin(async move { Err(AppError::RateLimited { retry_after }.into()) });
        }

        let service = self.service.clone();
        Box::pin(async move { service.call(req).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_are_per_ip() {
        let limit = RateLimit::new(2, Duration::from_secs(60));
        let limiter = limit.limiter();

        assert!(limiter.check_key(&"10.0.0.1".to_string()).is_ok());
        assert!(limiter.check_key(&"10.0.0.1".to_string()).is_ok());
        assert!(limiter.check_key(&"10.0.0.1".to_string()).is_err());
        assert!(limiter.check_key(&"10.0.0.2".to_string()).is_ok());
    }

    #[test]
    fn forwarded_header_ignored_unless_trusted() {
        let peer: std::net::SocketAddr = "10.9.9.9:5000".parse().unwrap();
        let req = actix_web::test::TestRequest::default()
            .peer_addr(peer)
            .insert_header(("X-Forwarded-For", "1.2.3.4"))
            .to_srv_request();

        assert_eq!(client_key(&req, false), "10.9.9.9");
        assert_eq!(client_key(&req, true), "1.2.3.4");
    }

    #[test]
    fn zero_max_still_builds() {
        let limit = RateLimit::new(0, Duration::from_secs(60));
        assert!(limit.limiter().check_key(&"x".to_string()).is_ok());
    }
}
