//! # Middleware Module
//!
//! Per-profile rate limiting for the Stride HTTP API.
//!
//! Requests under `/profiles/{id}/...` are counted against a quota keyed by
//! `{id}`, so one noisy profile cannot starve the others. Other routes are
//! not limited.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::num::NonZeroU32;
use std::sync::Arc;

// =============================================================================
// RATE LIMITER
// =============================================================================

/// Rate limiter keyed by profile id.
pub type ProfileRateLimiter =
    Arc<RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>>;

/// Create a per-profile rate limiter.
///
/// Returns `None` when `requests_per_second` is 0, which disables limiting.
pub fn create_rate_limiter(requests_per_second: u32) -> Option<ProfileRateLimiter> {
    let rps = NonZeroU32::new(requests_per_second)?;
    Some(Arc::new(RateLimiter::keyed(Quota::per_second(rps))))
}

/// Extract the profile id segment of a `/profiles/{id}/...` path.
fn profile_key(path: &str) -> Option<&str> {
    let mut segments = path.trim_start_matches('/').split('/');
    match (segments.next(), segments.next()) {
        (Some("profiles"), Some(id)) if !id.is_empty() => Some(id),
        _ => None,
    }
}

/// Rate limiting middleware.
///
/// Returns 429 Too Many Requests once a profile exceeds its quota.
pub async fn rate_limit_middleware(
    State(limiter): State<ProfileRateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    let Some(profile) = profile_key(request.uri().path()).map(str::to_string) else {
        return Ok(next.run(request).await);
    };

    match limiter.check_key(&profile) {
        Ok(()) => Ok(next.run(request).await),
        Err(_) => {
            tracing::warn!(%profile, "Rate limit exceeded");
            Err((StatusCode::TOO_MANY_REQUESTS, "Too Many Requests"))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_disables_limiting() {
        assert!(create_rate_limiter(0).is_none());
    }

    #[test]
    fn quota_is_per_profile() {
        let limiter = create_rate_limiter(1).expect("limiter");
        assert!(limiter.check_key(&"ada".to_string()).is_ok());
        assert!(limiter.check_key(&"ada".to_string()).is_err());
        assert!(limiter.check_key(&"grace".to_string()).is_ok());
    }

    #[test]
    fn profile_key_extraction() {
        assert_eq!(profile_key("/profiles/ada/summary"), Some("ada"));
        assert_eq!(profile_key("/profiles/ada"), Some("ada"));
        assert_eq!(profile_key("/profiles/"), None);
        assert_eq!(profile_key("/health"), None);
        assert_eq!(profile_key("/badges"), None);
    }
}
