//! Rate limiting middleware using token bucket algorithm
//!
//! Query routes call paid reasoning backends, so they share one global
//! bucket. Rejections are reported as [`AppError::RateLimited`].

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::QuantaClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use papermind_common::{config::RateLimitConfig, errors::AppError, metrics};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter using governor crate
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock>;

/// Shared limiter plus the configured rate for error reporting
#[derive(Clone)]
pub struct QueryLimiter {
    limiter: Arc<GlobalRateLimiter>,
    requests_per_second: u32,
}

impl QueryLimiter {
    /// Zero rates are clamped to one request per second
    pub fn new(config: &RateLimitConfig) -> Self {
        let rate = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst).unwrap_or(rate);

        Self {
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(rate).allow_burst(burst))),
            requests_per_second: rate.get(),
        }
    }
}

/// Rate limiting middleware
pub async fn rate_limit(
    State(limiter): State<QueryLimiter>,
    request: Request,
    next: Next,
) -> Response {
    match limiter.limiter.check() {
        Ok(_) => next.run(request).await,
        Err(_) => {
            metrics::record_rate_limited();
            AppError::RateLimited {
                limit: limiter.requests_per_second,
            }
            .into_response()
        }
    }
}
