//! Session/admin gates and per-IP rate limiting.

use std::net::{IpAddr, Ipv6Addr};
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::{Quota, RateLimiter};
use lru::LruCache;
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;

use super::error::ApiError;
use super::types::ServerConfig;
use super::ServerState;

// ---------------------------------------------------------------------------
// Rate limiting
// ---------------------------------------------------------------------------

pub type IpRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

pub type RateLimiterCache = Mutex<LruCache<IpAddr, Arc<IpRateLimiter>>>;

/// Maximum number of per-IP rate limiter entries to keep in the LRU cache.
const MAX_RATE_LIMITER_ENTRIES: usize = 10_000;

/// Get or create a rate limiter for the given IP.
/// IPv6 addresses are masked to /64 to prevent per-address evasion.
pub async fn get_rate_limiter(
    config: &ServerConfig,
    rate_limiters: &RateLimiterCache,
    ip: IpAddr,
) -> Option<Arc<IpRateLimiter>> {
    let rpm = NonZeroU32::new(config.rate_limit_rpm)?;

    // Aggregate IPv6 addresses to /64 prefix
    let key = match ip {
        IpAddr::V4(_) => ip,
        IpAddr::V6(v6) => {
            let seg = v6.segments();
            IpAddr::V6(Ipv6Addr::new(seg[0], seg[1], seg[2], seg[3], 0, 0, 0, 0))
        }
    };

    let mut limiters = rate_limiters.lock().await;

    if let Some(limiter) = limiters.get(&key) {
        return Some(Arc::clone(limiter));
    }

    let limiter = Arc::new(RateLimiter::direct(Quota::per_minute(rpm)));
    limiters.push(key, Arc::clone(&limiter));

    Some(limiter)
}

pub fn new_rate_limiter_cache() -> RateLimiterCache {
    let cap = std::num::NonZeroUsize::new(MAX_RATE_LIMITER_ENTRIES).unwrap_or(std::num::NonZeroUsize::MIN);
    Mutex::new(LruCache::new(cap))
}

/// Reject with 429 once `ip` has spent its per-minute quota.
pub async fn check_rate_limit(state: &ServerState, ip: IpAddr) -> Result<(), ApiError> {
    if let Some(limiter) = get_rate_limiter(&state.config, &state.rate_limiters, ip).await {
        if limiter.check().is_err() {
            tracing::warn!(ip = %ip, "rate limit exceeded");
            return Err(ApiError::RateLimited(state.config.rate_limit_rpm));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Auth middleware
// ---------------------------------------------------------------------------

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Session token gate for predict and report.
///
/// When `require_token` is off every request passes. Otherwise the bearer
/// token must verify against the signing secret; its claims are attached as a
/// request extension.
pub async fn session_middleware(
    State(state): State<Arc<ServerState>>,
    mut request: Request,
    next: Next,
) -> Response {
    if !state.config.require_token {
        return next.run(request).await;
    }

    let verified = match bearer_token(request.headers()) {
        Some(token) => state.accounts.tokens().verify(token).map_err(ApiError::from),
        None => Err(ApiError::Authentication(
            "Missing Authorization header. Use: Authorization: Bearer <token>".into(),
        )),
    };

    match verified {
        Ok(claims) => {
            tracing::debug!(user_id = claims.user_id, "session verified");
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(e) => {
            state.usage.record_error();
            e.into_response()
        }
    }
}

/// Constant-time bearer check for the diagnostic user listing. Open when no
/// admin key is configured.
pub async fn admin_key_middleware(
    State(state): State<Arc<ServerState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(ref expected_key) = state.config.admin_key else {
        return next.run(request).await;
    };

    match bearer_token(request.headers()) {
        Some(token) if token.as_bytes().ct_eq(expected_key.as_bytes()).into() => {
            next.run(request).await
        }
        Some(_) => {
            state.usage.record_error();
            ApiError::Authentication("Invalid admin key".into()).into_response()
        }
        None => {
            state.usage.record_error();
            ApiError::Authentication(
                "Missing Authorization header. Use: Authorization: Bearer <admin_key>".into(),
            )
            .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limiter_disabled_at_zero() {
        let config = ServerConfig {
            rate_limit_rpm: 0,
            ..ServerConfig::default()
        };
        let cache = new_rate_limiter_cache();
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        assert!(get_rate_limiter(&config, &cache, ip).await.is_none());
    }

    #[tokio::test]
    async fn test_rate_limiter_exhausts_quota() {
        let config = ServerConfig {
            rate_limit_rpm: 2,
            ..ServerConfig::default()
        };
        let cache = new_rate_limiter_cache();
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        let limiter = get_rate_limiter(&config, &cache, ip).await.unwrap();
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }

    #[tokio::test]
    async fn test_ipv6_shares_limiter_per_64() {
        let config = ServerConfig::default();
        let cache = new_rate_limiter_cache();
        let a: IpAddr = "2001:db8:1:2::1".parse().unwrap();
        let b: IpAddr = "2001:db8:1:2:ffff::9".parse().unwrap();
        let c: IpAddr = "2001:db8:1:3::1".parse().unwrap();
        let la = get_rate_limiter(&config, &cache, a).await.unwrap();
        let lb = get_rate_limiter(&config, &cache, b).await.unwrap();
        let lc = get_rate_limiter(&config, &cache, c).await.unwrap();
        assert!(Arc::ptr_eq(&la, &lb));
        assert!(!Arc::ptr_eq(&la, &lc));
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert("authorization", "Bearer  abc ".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc"));
        headers.insert("authorization", "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
        headers.insert("authorization", "Bearer ".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }
}
