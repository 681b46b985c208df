use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::warn;

use crate::error::{AppError, AppResult};

/// Process-wide quota on run triggers. Each run fans out to every chain, so
/// the quota is global rather than per client.
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl RateLimitLayer {
    pub fn per_minute(requests: u32) -> AppResult<Self> {
        let burst = NonZeroU32::new(requests)
            .ok_or_else(|| AppError::Config("rate limit must be positive".to_string()))?;

        Ok(RateLimitLayer {
            limiter: Arc::new(RateLimiter::direct(Quota::per_minute(burst))),
        })
    }

    pub fn check(&self) -> AppResult<()> {
        self.limiter.check().map_err(|_| AppError::RateLimited)
    }
}

pub async fn rate_limit_middleware(
    State(limit): State<RateLimitLayer>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Err(e) = limit.check() {
        warn!(path = %req.uri().path(), "trigger rate limit exceeded");
        return Err(e);
    }
    Ok(next.run(req).await)
}
