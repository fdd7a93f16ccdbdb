//! Per-`(category, target)` circuit breaker: closed -> open -> half_open.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
pub struct BreakerParams {
    /// Failures within `window_ms` needed to trip the breaker.
    pub failure_threshold: u32,
    pub window_ms: i64,
    pub cooldown_ms: i64,
    pub cooldown_cap_ms: i64,
}

impl BreakerParams {
    /// Destructive categories get a tighter window, a lower threshold, and
    /// half the configured cooldown (floored at 1s).
    pub fn for_category(category: &str, base_failure_threshold: u32, base_cooldown_ms: u64) -> Self {
        let destructive = matches!(category, "exec" | "file");
        Self {
            failure_threshold: if destructive {
                base_failure_threshold.min(2).max(1)
            } else {
                base_failure_threshold
            },
            window_ms: if destructive { 10_000 } else { 60_000 },
            cooldown_ms: if destructive {
                (base_cooldown_ms / 2).max(1_000) as i64
            } else {
                base_cooldown_ms as i64
            },
            cooldown_cap_ms: 5 * 60_000,
        }
    }
}

struct BreakerEntry {
    state: BreakerState,
    failures: Vec<i64>,
    opened_at: i64,
    cooldown_ms: i64,
    probe_in_flight: bool,
}

impl BreakerEntry {
    fn new() -> Self {
        Self {
            state: BreakerState::Closed,
            failures: Vec::new(),
            opened_at: 0,
            cooldown_ms: 0,
            probe_in_flight: false,
        }
    }
}

/// Admission decision returned by `CircuitBreaker::admit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Pass,
    Probe,
    Deny,
}

pub struct CircuitBreaker {
    entries: HashMap<String, BreakerEntry>,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    fn key(category: &str, target: &str) -> String {
        format!("{category}:{target}")
    }

    pub fn admit(&mut self, category: &str, target: &str, params: BreakerParams, now_ms: i64) -> Admission {
        let entry = self
            .entries
            .entry(Self::key(category, target))
            .or_insert_with(BreakerEntry::new);
        if entry.cooldown_ms == 0 {
            entry.cooldown_ms = params.cooldown_ms;
        }

        match entry.state {
            BreakerState::Closed => Admission::Pass,
            BreakerState::Open => {
                if now_ms - entry.opened_at >= entry.cooldown_ms {
                    entry.state = BreakerState::HalfOpen;
                    entry.probe_in_flight = true;
                    Admission::Probe
                } else {
                    Admission::Deny
                }
            }
            BreakerState::HalfOpen => {
                if entry.probe_in_flight {
                    Admission::Deny
                } else {
                    entry.probe_in_flight = true;
                    Admission::Probe
                }
            }
        }
    }

    pub fn record_success(&mut self, category: &str, target: &str) {
        if let Some(entry) = self.entries.get_mut(&Self::key(category, target)) {
            entry.state = BreakerState::Closed;
            entry.failures.clear();
            entry.probe_in_flight = false;
        }
    }

    pub fn record_failure(&mut self, category: &str, target: &str, params: BreakerParams, now_ms: i64) {
        let entry = self
            .entries
            .entry(Self::key(category, target))
            .or_insert_with(BreakerEntry::new);

        if entry.state == BreakerState::HalfOpen {
            entry.probe_in_flight = false;
            entry.opened_at = now_ms;
            entry.cooldown_ms = (entry.cooldown_ms.max(params.cooldown_ms) * 2).min(params.cooldown_cap_ms);
            entry.state = BreakerState::Open;
            entry.failures.clear();
            return;
        }

        entry.failures.retain(|t| now_ms - *t < params.window_ms);
        entry.failures.push(now_ms);

        if entry.failures.len() as u32 >= params.failure_threshold {
            entry.state = BreakerState::Open;
            entry.opened_at = now_ms;
            entry.cooldown_ms = params.cooldown_ms;
            entry.failures.clear();
        }
    }

    pub fn state(&self, category: &str, target: &str) -> BreakerState {
        self.entries
            .get(&Self::key(category, target))
            .map(|e| e.state)
            .unwrap_or(BreakerState::Closed)
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> BreakerParams {
        BreakerParams {
            failure_threshold: 3,
            window_ms: 10_000,
            cooldown_ms: 5_000,
            cooldown_cap_ms: 60_000,
        }
    }

    #[test]
    fn trips_open_after_threshold_failures_in_window() {
        let mut breaker = CircuitBreaker::new();
        let p = params();
        breaker.record_failure("web", "example.com", p, 0);
        breaker.record_failure("web", "example.com", p, 100);
        assert_eq!(breaker.state("web", "example.com"), BreakerState::Closed);
        breaker.record_failure("web", "example.com", p, 200);
        assert_eq!(breaker.state("web", "example.com"), BreakerState::Open);
    }

    #[test]
    fn half_open_admits_exactly_one_probe() {
        let mut breaker = CircuitBreaker::new();
        let p = params();
        breaker.record_failure("web", "example.com", p, 0);
        breaker.record_failure("web", "example.com", p, 100);
        breaker.record_failure("web", "example.com", p, 200);
        assert_eq!(breaker.state("web", "example.com"), BreakerState::Open);

        // still within cooldown
        assert_eq!(breaker.admit("web", "example.com", p, 1_000), Admission::Deny);
        // cooldown elapsed: exactly one probe admitted
        assert_eq!(breaker.admit("web", "example.com", p, 5_200), Admission::Probe);
        assert_eq!(breaker.admit("web", "example.com", p, 5_250), Admission::Deny);
    }

    #[test]
    fn failed_probe_doubles_cooldown_up_to_cap() {
        let mut breaker = CircuitBreaker::new();
        let p = params();
        breaker.record_failure("web", "example.com", p, 0);
        breaker.record_failure("web", "example.com", p, 100);
        breaker.record_failure("web", "example.com", p, 200);
        breaker.admit("web", "example.com", p, 5_200); // half_open, probe taken
        breaker.record_failure("web", "example.com", p, 5_300); // probe fails
        assert_eq!(breaker.state("web", "example.com"), BreakerState::Open);
        // cooldown should now be 10s, so 6s later it is still denied
        assert_eq!(breaker.admit("web", "example.com", p, 11_300), Admission::Deny);
    }

    #[test]
    fn successful_probe_closes_breaker() {
        let mut breaker = CircuitBreaker::new();
        let p = params();
        breaker.record_failure("web", "example.com", p, 0);
        breaker.record_failure("web", "example.com", p, 100);
        breaker.record_failure("web", "example.com", p, 200);
        breaker.admit("web", "example.com", p, 5_200);
        breaker.record_success("web", "example.com");
        assert_eq!(breaker.state("web", "example.com"), BreakerState::Closed);
    }
}
