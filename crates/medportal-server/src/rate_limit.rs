//! Per-client fixed-window rate limiting.
//!
//! Two ceilings are configured: a general one applied to path prefixes and a
//! stricter one for exact sensitive paths. A request is counted against at
//! most one of them, the sensitive one taking precedence.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use medportal_api::ApiError;

use crate::config::{RateLimitConfig, RateWindowConfig};

const GENERAL_MESSAGE: &str = "Too many requests, please slow down.";
const SENSITIVE_MESSAGE: &str = "Too many authentication requests, try again later.";

const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

/// Outcome of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed {
        limit: u32,
        remaining: u32,
        reset_secs: u64,
    },
    Limited {
        limit: u32,
        reset_secs: u64,
    },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }

    fn write_headers(&self, headers: &mut HeaderMap) {
        let (limit, remaining, reset) = match *self {
            Self::Allowed {
                limit,
                remaining,
                reset_secs,
            } => (limit, remaining, reset_secs),
            Self::Limited { limit, reset_secs } => (limit, 0, reset_secs),
        };
        headers.insert(RATELIMIT_LIMIT, HeaderValue::from(limit));
        headers.insert(RATELIMIT_REMAINING, HeaderValue::from(remaining));
        headers.insert(RATELIMIT_RESET, HeaderValue::from(reset));
    }
}

struct Window {
    started: Instant,
    count: u32,
}

/// Counts requests per key in fixed windows.
pub struct FixedWindowLimiter {
    limit: u32,
    window: Duration,
    windows: DashMap<String, Window>,
}

impl FixedWindowLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: DashMap::new(),
        }
    }

    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.saturating_duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }
        let elapsed = now.saturating_duration_since(entry.started);
        let reset_secs = self.window.saturating_sub(elapsed).as_secs().max(1);

        if entry.count >= self.limit {
            return RateDecision::Limited {
                limit: self.limit,
                reset_secs,
            };
        }
        entry.count += 1;
        RateDecision::Allowed {
            limit: self.limit,
            remaining: self.limit - entry.count,
            reset_secs,
        }
    }

    /// Drops windows that have ended. Returns the number removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.windows.retain(|_, w| {
            if now.saturating_duration_since(w.started) >= self.window {
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    General,
    Sensitive,
}

/// The configured limiters and the paths they guard.
pub struct RateLimiter {
    enabled: bool,
    trust_forwarded_for: bool,
    general: FixedWindowLimiter,
    general_prefixes: Vec<String>,
    sensitive: FixedWindowLimiter,
    sensitive_paths: Vec<String>,
}

impl RateLimiter {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        fn limiter(w: &RateWindowConfig) -> FixedWindowLimiter {
            FixedWindowLimiter::new(w.max_requests, w.window())
        }
        Self {
            enabled: config.enabled,
            trust_forwarded_for: config.trust_forwarded_for,
            general: limiter(&config.general),
            general_prefixes: config.general.paths.clone(),
            sensitive: limiter(&config.sensitive),
            sensitive_paths: config.sensitive.paths.clone(),
        }
    }

    fn tier_for(&self, path: &str) -> Option<Tier> {
        if self.sensitive_paths.iter().any(|p| p == path) {
            return Some(Tier::Sensitive);
        }
        self.general_prefixes
            .iter()
            .any(|prefix| matches_prefix(path, prefix))
            .then_some(Tier::General)
    }

    fn client_key(&self, req: &Request<Body>) -> String {
        if self.trust_forwarded_for {
            let forwarded = req
                .headers()
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty());
            if let Some(ip) = forwarded {
                return ip.to_string();
            }
        }
        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub fn cleanup_expired(&self) -> usize {
        self.general.cleanup_expired() + self.sensitive.cleanup_expired()
    }

    /// Clients with an open window in either tier.
    pub fn tracked_clients(&self) -> usize {
        self.general.tracked_clients() + self.sensitive.tracked_clients()
    }
}

/// `/api` matches `/api` and `/api/...` but not `/apix`.
fn matches_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !limiter.enabled {
        return next.run(req).await;
    }
    let Some(tier) = limiter.tier_for(req.uri().path()) else {
        return next.run(req).await;
    };

    let key = limiter.client_key(&req);
    let (decision, message) = match tier {
        Tier::General => (limiter.general.check(&key), GENERAL_MESSAGE),
        Tier::Sensitive => (limiter.sensitive.check(&key), SENSITIVE_MESSAGE),
    };

    let mut res = match decision {
        RateDecision::Allowed { .. } => next.run(req).await,
        RateDecision::Limited { reset_secs, .. } => {
            tracing::warn!(
                client = %key,
                path = %req.uri().path(),
                tier = ?tier,
                "rate limit exceeded"
            );
            ApiError::too_many_requests(message, reset_secs).into_response()
        }
    };
    decision.write_headers(res.headers_mut());
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_allows_up_to_limit_then_resets() {
        let limiter = FixedWindowLimiter::new(2, Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(matches!(
            limiter.check_at("a", t0),
            RateDecision::Allowed { remaining: 1, .. }
        ));
        assert!(limiter.check_at("a", t0).is_allowed());
        assert!(matches!(
            limiter.check_at("a", t0 + Duration::from_secs(1)),
            RateDecision::Limited { limit: 2, reset_secs: 59 }
        ));
        // other clients are counted separately
        assert!(limiter.check_at("b", t0).is_allowed());
        // a new window starts after the old one ends
        assert!(limiter.check_at("a", t0 + Duration::from_secs(60)).is_allowed());
    }

    #[test]
    fn cleanup_drops_finished_windows() {
        let limiter = FixedWindowLimiter::new(5, Duration::from_millis(0));
        limiter.check("a");
        limiter.check("b");
        assert_eq!(limiter.cleanup_expired(), 2);
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[test]
    fn tracked_clients_span_both_tiers() {
        let limiter = RateLimiter::from_config(&RateLimitConfig::default());
        limiter.general.check("a");
        limiter.general.check("b");
        limiter.sensitive.check("a");
        assert_eq!(limiter.tracked_clients(), 3);
    }

    #[test]
    fn prefix_matching_respects_segments() {
        assert!(matches_prefix("/api", "/api"));
        assert!(matches_prefix("/api/reports/1", "/api"));
        assert!(!matches_prefix("/apis", "/api"));
        assert!(matches_prefix("/user/save-user", "/user/"));
    }

    #[test]
    fn tiers_follow_config() {
        let limiter = RateLimiter::from_config(&RateLimitConfig::default());
        assert_eq!(
            limiter.tier_for("/appointment/create-appointment"),
            Some(Tier::Sensitive)
        );
        assert_eq!(limiter.tier_for("/api/reports/upload"), Some(Tier::General));
        assert_eq!(limiter.tier_for("/record/getAllRecords"), Some(Tier::General));
        assert_eq!(limiter.tier_for("/blog/get-blogs"), None);
        assert_eq!(limiter.tier_for("/appointment/get-all-appointments"), None);
    }

    #[test]
    fn client_key_prefers_forwarded_for_only_when_trusted() {
        let mut config = RateLimitConfig::default();
        let req = || {
            let mut req = Request::builder()
                .uri("/api/health")
                .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
                .body(Body::empty())
                .unwrap();
            req.extensions_mut()
                .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
            req
        };
        assert_eq!(RateLimiter::from_config(&config).client_key(&req()), "127.0.0.1");
        config.trust_forwarded_for = true;
        assert_eq!(RateLimiter::from_config(&config).client_key(&req()), "203.0.113.7");
    }
}
