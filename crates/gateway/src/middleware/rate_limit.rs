//! Rate limiting middleware using token bucket algorithm

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::QuantaClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use papervault_common::errors::AppError;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter using governor crate
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock>;

/// Limiter plus the configured rate, for error reporting
#[derive(Clone)]
pub struct LoginLimiter {
    pub limiter: Arc<GlobalRateLimiter>,
    pub requests_per_second: u32,
}

/// Create a new rate limiter. Zero values are raised to one.
pub fn create_rate_limiter(requests_per_second: u32, burst: u32) -> LoginLimiter {
    let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
    let quota = Quota::per_second(rate).allow_burst(burst);

    LoginLimiter {
        limiter: Arc::new(RateLimiter::direct(quota)),
        requests_per_second: rate.get(),
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(login): State<LoginLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    match login.limiter.check() {
        Ok(_) => Ok(next.run(request).await),
        Err(_) => {
            tracing::warn!(path = %request.uri().path(), "Rate limit exceeded");
            Err(AppError::RateLimited {
                limit: login.requests_per_second,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_creation() {
        let login = create_rate_limiter(100, 200);
        assert!(login.limiter.check().is_ok());
        assert_eq!(login.requests_per_second, 100);
    }

    #[test]
    fn test_burst_is_enforced() {
        let login = create_rate_limiter(1, 2);
        assert!(login.limiter.check().is_ok());
        assert!(login.limiter.check().is_ok());
        assert!(login.limiter.check().is_err());
    }

    #[test]
    fn test_zero_quota_is_clamped() {
        let login = create_rate_limiter(0, 0);
        assert_eq!(login.requests_per_second, 1);
        assert!(login.limiter.check().is_ok());
    }
}
