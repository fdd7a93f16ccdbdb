//! Aurora Monitor (C5): authorize, watch, protect, cut. Aurora never
//! executes steps; it gates the executor through the pre-gate, per-step
//! gate, and live gate described in §4.4.

pub mod anomaly;
pub mod authorize;
pub mod circuit_breaker;
pub mod collectors;
pub mod healer;
pub mod rate_limiter;
pub mod ring_buffer;
pub mod thresholds;

use crate::bus::EventBus;
use crate::config::Config;
use crate::events::{AuroraEvent, AuroraLevel};
use crate::types::{ExecutionId, Origin, PlanStep};
use authorize::{AuthorizationRequest, AuthorizationResponse, Decision};
use circuit_breaker::{Admission, BreakerParams, CircuitBreaker};
use collectors::{ChannelCollector, ExecutionCollector, ProcessCollector};
use rate_limiter::{BucketParams, LimitDecision, RateLimiter};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thresholds::Signal;
use tracing::warn;

/// Per-step gate verdict (§4.4 "Per-step gate").
#[derive(Debug, Clone, PartialEq)]
pub enum StepVerdict {
    Proceed,
    Deny(String),
    Throttle { delay_ms: u64 },
    RequireConfirmation(String),
}

/// Per-execution live-gate state the executor consults at every dispatch
/// boundary. `Running` permits dispatch; `Paused`/`Cut` do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveState {
    Running,
    Paused,
    Cut,
}

struct ExecutionState {
    live: LiveState,
    collector: ExecutionCollector,
}

/// The Aurora Monitor. Threshold evaluation is centralized under one lock
/// (`inner`) to guarantee a total order of state transitions, as required
/// by the concurrency model in §5.
pub struct AuroraMonitor {
    config: Arc<Config>,
    bus: Arc<EventBus>,
    inner: Mutex<Inner>,
}

struct Inner {
    breaker: CircuitBreaker,
    limiter: RateLimiter,
    process: ProcessCollector,
    channel: ChannelCollector,
    executions: HashMap<ExecutionId, ExecutionState>,
}

impl AuroraMonitor {
    pub fn new(config: Arc<Config>, bus: Arc<EventBus>) -> Arc<Self> {
        Arc::new(Self {
            config,
            bus,
            inner: Mutex::new(Inner {
                breaker: CircuitBreaker::new(),
                limiter: RateLimiter::new(),
                process: ProcessCollector::new(),
                channel: ChannelCollector::new(),
                executions: HashMap::new(),
            }),
        })
    }

    /// Pre-gate: authorize a freshly-planned execution (§4.3).
    pub fn authorize(&self, request: &AuthorizationRequest) -> AuthorizationResponse {
        let response = authorize::authorize(request);
        let mut inner = self.inner.lock().unwrap();
        inner.executions.entry(request.execution_id.clone()).or_insert_with(|| ExecutionState {
            live: LiveState::Running,
            collector: ExecutionCollector::new(),
        });
        drop(inner);

        if response.decision != Decision::Allowed {
            self.bus.publish_aurora(AuroraEvent::Alert {
                execution_id: Some(request.execution_id.clone()),
                reason: response.reason.clone(),
                level: response.level,
            });
        }
        response
    }

    /// Per-step gate: called before every step dispatch.
    pub fn pre_step(&self, execution_id: &ExecutionId, origin: Origin, step: &PlanStep, now_ms: i64) -> StepVerdict {
        let category = category_key(&step.action_type);
        let mut inner = self.inner.lock().unwrap();

        if let Some(state) = inner.executions.get(execution_id) {
            match state.live {
                LiveState::Cut => return StepVerdict::Deny("execution was cut by aurora".to_string()),
                LiveState::Paused => {
                    return StepVerdict::RequireConfirmation("execution is paused pending resume".to_string())
                }
                LiveState::Running => {}
            }
        }

        let breaker_params = BreakerParams::for_category(
            &category,
            self.config.safety_profile.breaker_failure_threshold(),
            self.config.aurora_cut_cooldown_ms,
        );
        let target = step.target.clone().unwrap_or_else(|| "default".to_string());
        match inner.breaker.admit(&category, &target, breaker_params, now_ms) {
            Admission::Deny => return StepVerdict::Deny(format!("circuit open for {category}:{target}")),
            Admission::Pass | Admission::Probe => {}
        }

        if matches!(category.as_str(), "file" | "exec") {
            if let Some(disk_pct) = inner.process.latest_disk_pct() {
                if matches!(thresholds::disk_signal(disk_pct), Signal::Cut) {
                    return StepVerdict::Deny("disk at or above 95%, write-class steps blocked".to_string());
                }
            }
        }

        let bucket_params = BucketParams {
            refill_rate: 5.0,
            burst: self.config.safety_profile.rate_limiter_burst(),
        };
        let origin_key = format!("{origin:?}");
        match inner.limiter.try_acquire(&origin_key, &category, bucket_params, now_ms) {
            LimitDecision::Throttle { retry_after_ms } => {
                drop(inner);
                self.bus.publish_aurora(AuroraEvent::Limit {
                    execution_id: Some(execution_id.clone()),
                    reason: format!("rate limit exceeded for {origin_key}:{category}"),
                    retry_after_ms,
                });
                return StepVerdict::Throttle { delay_ms: retry_after_ms };
            }
            LimitDecision::Allow => {}
        }

        let loop_signal = anomaly::LoopDetector::observe(
            inner
                .executions
                .entry(execution_id.clone())
                .or_insert_with(|| ExecutionState {
                    live: LiveState::Running,
                    collector: ExecutionCollector::new(),
                })
                .collector_mut(),
            &step.action_type,
            &step.params,
            now_ms,
        );
        drop(inner);

        match loop_signal {
            Signal::Cut => {
                self.cut(execution_id, "repeated action loop detected".to_string());
                StepVerdict::Deny("loop detected, execution cut".to_string())
            }
            Signal::Alert => {
                self.bus.publish_aurora(AuroraEvent::Alert {
                    execution_id: Some(execution_id.clone()),
                    reason: "repeated action approaching loop threshold".to_string(),
                    level: AuroraLevel::Yellow,
                });
                StepVerdict::Proceed
            }
            _ => StepVerdict::Proceed,
        }
    }

    /// Post-step gate: record the outcome and feed the circuit breaker,
    /// success-ratio, error-rate, and step-duration collectors.
    pub fn post_step(&self, execution_id: &ExecutionId, step: &PlanStep, success: bool, duration_ms: u64, now_ms: i64) {
        let category = category_key(&step.action_type);
        let target = step.target.clone().unwrap_or_else(|| "default".to_string());
        let mut inner = self.inner.lock().unwrap();

        let mut errors_per_minute = None;
        if success {
            inner.breaker.record_success(&category, &target);
        } else {
            let params = BreakerParams::for_category(
                &category,
                self.config.safety_profile.breaker_failure_threshold(),
                self.config.aurora_cut_cooldown_ms,
            );
            inner.breaker.record_failure(&category, &target, params, now_ms);
            let collector = inner
                .executions
                .entry(execution_id.clone())
                .or_insert_with(|| ExecutionState {
                    live: LiveState::Running,
                    collector: ExecutionCollector::new(),
                })
                .collector_mut();
            collector.record_error(now_ms);
            errors_per_minute = Some(collector.errors_per_minute(now_ms));
        }

        let state = inner
            .executions
            .entry(execution_id.clone())
            .or_insert_with(|| ExecutionState {
                live: LiveState::Running,
                collector: ExecutionCollector::new(),
            });
        state.collector.record_outcome(success);
        let ratio = state.collector.success_ratio();
        drop(inner);

        match thresholds::success_ratio_signal(ratio) {
            Signal::Pause => self.pause(execution_id, "success ratio dropped below 50%".to_string()),
            Signal::Alert => {
                self.bus.publish_aurora(AuroraEvent::Alert {
                    execution_id: Some(execution_id.clone()),
                    reason: "success ratio degrading".to_string(),
                    level: AuroraLevel::Yellow,
                });
            }
            _ => {}
        }

        if let Some(epm) = errors_per_minute {
            match thresholds::error_rate_signal(epm) {
                Signal::SafeMode => {
                    self.pause(execution_id, format!("error rate {epm:.1}/min entered safe mode"));
                    self.bus.publish_aurora(AuroraEvent::Alert {
                        execution_id: Some(execution_id.clone()),
                        reason: "error rate entered safe mode".to_string(),
                        level: AuroraLevel::Red,
                    });
                }
                Signal::Alert => {
                    self.bus.publish_aurora(AuroraEvent::Alert {
                        execution_id: Some(execution_id.clone()),
                        reason: format!("error rate elevated: {epm:.1}/min"),
                        level: AuroraLevel::Yellow,
                    });
                }
                _ => {}
            }
        }

        match thresholds::step_duration_signal(duration_ms, step.estimated_duration_ms) {
            Signal::Cut => self.cut(execution_id, "step duration far exceeded its estimate".to_string()),
            Signal::Alert => {
                self.bus.publish_aurora(AuroraEvent::Alert {
                    execution_id: Some(execution_id.clone()),
                    reason: "step duration exceeding its estimate".to_string(),
                    level: AuroraLevel::Yellow,
                });
            }
            _ => {}
        }
    }

    /// Feed a CPU sample and evaluate the CPU threshold (live gate).
    pub fn record_cpu_sample(&self, pct: f64, now_ms: i64) {
        let mut inner = self.inner.lock().unwrap();
        inner.process.record_cpu(now_ms, pct);
        let above80 = inner.process.cpu_seconds_above(80.0);
        let above90 = inner.process.cpu_seconds_above(90.0);
        drop(inner);

        match thresholds::cpu_signal(above80, above90) {
            Signal::Cut => self.cut_all("sustained CPU saturation".to_string()),
            Signal::Throttle => {
                self.bus.publish_aurora(AuroraEvent::Limit {
                    execution_id: None,
                    reason: "CPU above 80% for 60s+".to_string(),
                    retry_after_ms: 1_000,
                });
            }
            _ => {}
        }
    }

    /// Feed a RAM sample and evaluate the RAM threshold (live gate).
    pub fn record_ram_sample(&self, pct: f64, now_ms: i64) {
        let mut inner = self.inner.lock().unwrap();
        inner.process.record_ram(now_ms, pct);
        let trend = inner.process.ram_trend_pct(180_000);
        drop(inner);

        match thresholds::ram_signal(pct, trend) {
            Signal::Cut => self.cut_all("RAM saturation or leak signature".to_string()),
            Signal::Alert => {
                self.bus.publish_aurora(AuroraEvent::Alert {
                    execution_id: None,
                    reason: "RAM usage elevated".to_string(),
                    level: AuroraLevel::Yellow,
                });
            }
            _ => {}
        }
    }

    /// Feed a disk sample and evaluate the disk threshold (live gate).
    pub fn record_disk_sample(&self, pct: f64, now_ms: i64) {
        let mut inner = self.inner.lock().unwrap();
        inner.process.record_disk(now_ms, pct);
        let latest = inner.process.latest_disk_pct().unwrap_or(pct);
        drop(inner);

        match thresholds::disk_signal(latest) {
            Signal::Cut => {
                self.bus.publish_aurora(AuroraEvent::Alert {
                    execution_id: None,
                    reason: "disk at or above 95%, new writes blocked".to_string(),
                    level: AuroraLevel::Red,
                });
            }
            Signal::Alert => {
                self.bus.publish_aurora(AuroraEvent::Alert {
                    execution_id: None,
                    reason: "disk usage elevated".to_string(),
                    level: AuroraLevel::Yellow,
                });
            }
            _ => {}
        }
    }

    pub fn record_channel_disconnect(&self, origin: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.channel.record_disconnect(origin);
    }

    pub fn record_channel_latency(&self, origin: &str, latency_ms: f64, now_ms: i64) {
        let mut inner = self.inner.lock().unwrap();
        inner.channel.record_latency(origin, now_ms, latency_ms);
    }

    pub fn channel_disconnect_count(&self, origin: &str) -> u64 {
        self.inner.lock().unwrap().channel.disconnect_count(origin)
    }

    pub fn live_state(&self, execution_id: &ExecutionId) -> LiveState {
        self.inner
            .lock()
            .unwrap()
            .executions
            .get(execution_id)
            .map(|s| s.live)
            .unwrap_or(LiveState::Running)
    }

    pub fn pause(&self, execution_id: &ExecutionId, reason: String) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(state) = inner.executions.get_mut(execution_id) {
            state.live = LiveState::Paused;
        }
        drop(inner);
        warn!(execution_id, %reason, "aurora: pausing execution");
        self.bus.publish_aurora(AuroraEvent::Pause {
            execution_id: execution_id.clone(),
            reason,
        });
    }

    pub fn cut(&self, execution_id: &ExecutionId, reason: String) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(state) = inner.executions.get_mut(execution_id) {
            state.live = LiveState::Cut;
        }
        drop(inner);
        warn!(execution_id, %reason, "aurora: cutting execution");
        self.bus.publish_aurora(AuroraEvent::Cut {
            execution_id: execution_id.clone(),
            reason,
        });
    }

    fn cut_all(&self, reason: String) {
        let ids: Vec<ExecutionId> = {
            let inner = self.inner.lock().unwrap();
            inner
                .executions
                .iter()
                .filter(|(_, s)| s.live == LiveState::Running)
                .map(|(id, _)| id.clone())
                .collect()
        };
        for id in ids {
            self.cut(&id, reason.clone());
        }
    }

    pub fn resume(&self, execution_id: &ExecutionId) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(state) = inner.executions.get_mut(execution_id) {
            state.live = LiveState::Running;
        }
        drop(inner);
        self.bus.publish_aurora(AuroraEvent::Resume {
            execution_id: execution_id.clone(),
        });
    }
}

impl ExecutionState {
    fn collector_mut(&mut self) -> &mut ExecutionCollector {
        &mut self.collector
    }
}

fn category_key(action_type: &str) -> String {
    action_type.split('.').next().unwrap_or(action_type).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeclaredResources, RiskLevel};

    fn test_step(action_type: &str) -> PlanStep {
        PlanStep {
            step_id: "s1".into(),
            action_type: action_type.into(),
            target: Some("t".into()),
            params: serde_json::json!({}),
            description: "".into(),
            idempotent: true,
            declared_resources: DeclaredResources::default(),
            estimated_duration_ms: 1000,
            compensating_action: None,
            risk: RiskLevel::Low,
            optional: false,
        }
    }

    fn monitor() -> Arc<AuroraMonitor> {
        AuroraMonitor::new(Arc::new(Config::default()), EventBus::new())
    }

    #[test]
    fn pre_step_proceeds_by_default() {
        let monitor = monitor();
        let verdict = monitor.pre_step(&"e1".to_string(), Origin::Api, &test_step("ai.generate_text"), 0);
        assert_eq!(verdict, StepVerdict::Proceed);
    }

    #[test]
    fn cut_execution_denies_subsequent_dispatch() {
        let monitor = monitor();
        let execution_id = "e1".to_string();
        monitor.cut(&execution_id, "test".to_string());
        let verdict = monitor.pre_step(&execution_id, Origin::Api, &test_step("ai.generate_text"), 0);
        assert!(matches!(verdict, StepVerdict::Deny(_)));
    }

    #[test]
    fn sustained_loop_cuts_the_execution() {
        let monitor = monitor();
        let execution_id = "e1".to_string();
        let step = test_step("file.write");
        for i in 0..20 {
            monitor.pre_step(&execution_id, Origin::Api, &step, i * 100);
        }
        assert_eq!(monitor.live_state(&execution_id), LiveState::Cut);
    }
}
