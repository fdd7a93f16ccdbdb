//! Token bucket rate limiter keyed by `(origin, category)`. A denied
//! request always carries a `retry_after_ms`; it is never silently dropped.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct BucketParams {
    /// Tokens added per second.
    pub refill_rate: f64,
    /// Maximum tokens the bucket can hold.
    pub burst: u32,
}

struct Bucket {
    tokens: f64,
    last_refill_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LimitDecision {
    Allow,
    Throttle { retry_after_ms: u64 },
}

pub struct RateLimiter {
    buckets: HashMap<String, Bucket>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            buckets: HashMap::new(),
        }
    }

    fn key(origin: &str, category: &str) -> String {
        format!("{origin}:{category}")
    }

    pub fn try_acquire(
        &mut self,
        origin: &str,
        category: &str,
        params: BucketParams,
        now_ms: i64,
    ) -> LimitDecision {
        let bucket = self.buckets.entry(Self::key(origin, category)).or_insert_with(|| Bucket {
            tokens: params.burst as f64,
            last_refill_ms: now_ms,
        });

        let elapsed_s = ((now_ms - bucket.last_refill_ms).max(0) as f64) / 1000.0;
        bucket.tokens = (bucket.tokens + elapsed_s * params.refill_rate).min(params.burst as f64);
        bucket.last_refill_ms = now_ms;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            LimitDecision::Allow
        } else {
            let deficit = 1.0 - bucket.tokens;
            let wait_s = deficit / params.refill_rate.max(0.000_1);
            LimitDecision::Throttle {
                retry_after_ms: (wait_s * 1000.0).ceil() as u64,
            }
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denies_exactly_the_burst_plus_one_request() {
        let mut limiter = RateLimiter::new();
        let params = BucketParams {
            refill_rate: 1.0,
            burst: 3,
        };

        for _ in 0..3 {
            assert_eq!(
                limiter.try_acquire("api", "ai", params, 0),
                LimitDecision::Allow
            );
        }
        assert!(matches!(
            limiter.try_acquire("api", "ai", params, 0),
            LimitDecision::Throttle { .. }
        ));
    }

    #[test]
    fn allows_again_after_refill_interval() {
        let mut limiter = RateLimiter::new();
        let params = BucketParams {
            refill_rate: 1.0,
            burst: 1,
        };
        assert_eq!(
            limiter.try_acquire("api", "ai", params, 0),
            LimitDecision::Allow
        );
        assert!(matches!(
            limiter.try_acquire("api", "ai", params, 100),
            LimitDecision::Throttle { .. }
        ));
        assert_eq!(
            limiter.try_acquire("api", "ai", params, 1_000),
            LimitDecision::Allow
        );
    }
}
