//! Per-client quotas backed by governor keyed limiters (GCRA).
//!
//! Limits are checked from inside handlers rather than as a tower layer so
//! that the webhook quota is only consumed after signature verification.

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};
use governor::{clock::Clock, clock::DefaultClock, DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::RateLimitSpec;
use crate::error::AppError;

/// Shrink the keyed state store every N checks so idle clients are dropped.
const SHRINK_INTERVAL: u64 = 1000;

/// Key used when the peer address is not available.
pub const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Clone)]
pub struct RouteRateLimiter {
    limiter: Arc<DefaultKeyedRateLimiter<String>>,
    spec: RateLimitSpec,
    checks: Arc<AtomicU64>,
}

impl RouteRateLimiter {
    pub fn new(spec: RateLimitSpec) -> Self {
        let burst = NonZeroU32::new(spec.requests).unwrap_or(NonZeroU32::MIN);
        let period = spec.window.duration() / burst.get();
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);

        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
            spec,
            checks: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn spec(&self) -> RateLimitSpec {
        self.spec
    }

    pub fn check(&self, key: &str) -> Result<(), AppError> {
        let count = self.checks.fetch_add(1, Ordering::Relaxed);
        if count % SHRINK_INTERVAL == 0 && count > 0 {
            self.limiter.retain_recent();
        }

        match self.limiter.check_key(&key.to_string()) {
            Ok(()) => Ok(()),
            Err(not_until) => {
                let wait = not_until.wait_time_from(DefaultClock::default().now());
                let retry_after = wait.as_secs().max(1);
                tracing::warn!(
                    client = %key,
                    limit = self.spec.requests,
                    window = self.spec.window.as_str(),
                    retry_after,
                    "Rate limit exceeded"
                );
                Err(AppError::rate_limited(
                    self.spec.requests,
                    self.spec.window.as_str(),
                    retry_after,
                ))
            }
        }
    }
}

/// Rate-limit key for the calling client: the peer IP, or [`UNKNOWN_CLIENT`]
/// when the server was not started with connect info.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientKey(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for ClientKey
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let key = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());
        Ok(ClientKey(key))
    }
}
