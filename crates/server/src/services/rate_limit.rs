//! Per-domain rate limiting using governor.
//!
//! Each tenant domain gets its own direct (unkeyed) limiter so tenants can
//! carry individual quota overrides; a shared keyed limiter would force one
//! quota on everyone. Limiter state lives in memory, so limits apply per
//! process.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};

use governor::clock::DefaultClock;
use governor::middleware::StateInformationMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tracing::debug;

use anchorchat_core::TenantDomain;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, StateInformationMiddleware>;

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Request may proceed; `remaining` burst capacity after this request.
    Allowed { remaining: u32 },
    /// Request exceeds the tenant's quota.
    Denied,
}

/// Per-domain request rate limiter.
pub struct RateLimitService {
    default_per_minute: u32,
    burst: u32,
    limiters: Mutex<HashMap<TenantDomain, (u32, Arc<DirectLimiter>)>>,
}

impl RateLimitService {
    /// Create a rate limit service with the given default quota.
    ///
    /// Zero values fall back to 1; a zero quota would reject every request.
    #[must_use]
    pub fn new(default_per_minute: u32, burst: u32) -> Self {
        Self {
            default_per_minute: default_per_minute.max(1),
            burst: burst.max(1),
            limiters: Mutex::new(HashMap::new()),
        }
    }

    /// Check whether a request for `domain` may proceed.
    ///
    /// `per_minute_override` is the tenant's configured quota, when set.
    /// A changed override replaces the domain's limiter, resetting its state.
    pub fn check(
        &self,
        domain: &TenantDomain,
        per_minute_override: Option<u32>,
    ) -> RateLimitDecision {
        let per_minute = per_minute_override
            .unwrap_or(self.default_per_minute)
            .max(1);

        let limiter = {
            let mut limiters = self.limiters.lock().unwrap_or_else(|e| e.into_inner());
            match limiters.get(domain) {
                Some((quota, limiter)) if *quota == per_minute => Arc::clone(limiter),
                _ => {
                    let limiter = Arc::new(self.build_limiter(per_minute));
                    limiters.insert(domain.clone(), (per_minute, Arc::clone(&limiter)));
                    limiter
                }
            }
        };

        match limiter.check() {
            Ok(snapshot) => RateLimitDecision::Allowed {
                remaining: snapshot.remaining_burst_capacity(),
            },
            Err(_) => {
                debug!(%domain, per_minute, "rate limit exceeded");
                RateLimitDecision::Denied
            }
        }
    }

    fn build_limiter(&self, per_minute: u32) -> DirectLimiter {
        let per_minute = NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(self.burst.min(per_minute.get())).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_minute(per_minute).allow_burst(burst);
        RateLimiter::direct(quota).with_middleware::<StateInformationMiddleware>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain(s: &str) -> TenantDomain {
        TenantDomain::parse(s).expect("valid domain")
    }

    #[test]
    fn test_allows_within_burst() {
        let service = RateLimitService::new(60, 3);
        let d = domain("shop.example.com");

        for _ in 0..3 {
            assert!(matches!(
                service.check(&d, None),
                RateLimitDecision::Allowed { .. }
            ));
        }
    }

    #[test]
    fn test_denies_beyond_burst() {
        let service = RateLimitService::new(60, 2);
        let d = domain("shop.example.com");

        assert!(matches!(
            service.check(&d, None),
            RateLimitDecision::Allowed { .. }
        ));
        assert!(matches!(
            service.check(&d, None),
            RateLimitDecision::Allowed { .. }
        ));
        assert_eq!(service.check(&d, None), RateLimitDecision::Denied);
    }

    #[test]
    fn test_domains_are_independent() {
        let service = RateLimitService::new(60, 1);
        let a = domain("a.example.com");
        let b = domain("b.example.com");

        assert!(matches!(
            service.check(&a, None),
            RateLimitDecision::Allowed { .. }
        ));
        assert_eq!(service.check(&a, None), RateLimitDecision::Denied);
        assert!(matches!(
            service.check(&b, None),
            RateLimitDecision::Allowed { .. }
        ));
    }

    #[test]
    fn test_remaining_counts_down() {
        let service = RateLimitService::new(60, 3);
        let d = domain("shop.example.com");

        let RateLimitDecision::Allowed { remaining: first } = service.check(&d, None) else {
            panic!("expected allowed");
        };
        let RateLimitDecision::Allowed { remaining: second } = service.check(&d, None) else {
            panic!("expected allowed");
        };
        assert!(second < first);
    }

    #[test]
    fn test_override_replaces_quota() {
        let service = RateLimitService::new(60, 1);
        let d = domain("shop.example.com");

        assert!(matches!(
            service.check(&d, None),
            RateLimitDecision::Allowed { .. }
        ));
        assert_eq!(service.check(&d, None), RateLimitDecision::Denied);

        // Override rebuilds the limiter with the tenant quota.
        assert!(matches!(
            service.check(&d, Some(120)),
            RateLimitDecision::Allowed { .. }
        ));
    }

    #[test]
    fn test_zero_quota_falls_back() {
        let service = RateLimitService::new(0, 0);
        let d = domain("shop.example.com");
        assert!(matches!(
            service.check(&d, None),
            RateLimitDecision::Allowed { .. }
        ));
    }
}
