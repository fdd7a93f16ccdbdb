//! Executor (C6): drives a Plan's steps, respecting Aurora's verdicts,
//! checkpointing, retrying, and surfacing events (§4.5).

use crate::aurora::{AuroraMonitor, StepVerdict};
use crate::bus::EventBus;
use crate::config::Config;
use crate::error::{ErrorCode, OperatorError, Result};
use crate::events::ExecutionEvent;
use crate::hub::{HubRegistry, IN_REFS_KEY, RESOLVED_INPUTS_KEY};
use crate::session::SessionStore;
use crate::skills::registry::Registry;
use crate::types::{
    Checkpoint, ExecutionId, ExecutionRecord, ExecutionStatus, Origin, Plan, PlanMode, PlanStep,
    StepResult, StepStatus,
};
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use uuid::Uuid;

const RETRY_BASE_MS: u64 = 250;
const RETRY_FACTOR: f64 = 2.0;
const RETRY_CAP_MS: u64 = 5_000;
const RETRY_JITTER: f64 = 0.2;

/// Cooperative cancellation flag. Cloned per execution so `cancel()` can be
/// called from another task without holding a lock on the executor.
#[derive(Clone)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Executor {
    registry: Arc<Registry>,
    hubs: Arc<HubRegistry>,
    aurora: Arc<AuroraMonitor>,
    session: Arc<SessionStore>,
    bus: Arc<EventBus>,
    /// Gates skills flagged `dangerous` to a small pool (§5), sized from
    /// `Config.max_concurrent_dangerous`.
    dangerous_gate: Arc<Semaphore>,
}

impl Executor {
    pub fn new(
        registry: Arc<Registry>,
        hubs: Arc<HubRegistry>,
        aurora: Arc<AuroraMonitor>,
        session: Arc<SessionStore>,
        bus: Arc<EventBus>,
        config: &Config,
    ) -> Self {
        Self {
            registry,
            hubs,
            aurora,
            session,
            bus,
            dangerous_gate: Arc::new(Semaphore::new(config.max_concurrent_dangerous.max(1))),
        }
    }

    /// Run an authorized Plan to completion, honoring cancellation and the
    /// live gate at every dispatch boundary.
    pub async fn run(
        &self,
        execution_id: ExecutionId,
        origin: Origin,
        mut plan: Plan,
        cancel: CancelToken,
    ) -> Result<ExecutionRecord> {
        let mut record = ExecutionRecord::new(execution_id.clone(), plan.plan_id.clone());
        record.status = ExecutionStatus::Running;
        self.session.append_execution(&record)?;

        // Hub steps expand into a concrete plan fragment before execution;
        // this happens once, up front, so checkpointing and retries treat
        // every step uniformly afterward.
        plan.steps = self.expand_hub_steps(&plan).await?;
        let dry_run = plan.mode == PlanMode::DryRun;
        let mut context: HashMap<String, serde_json::Value> = HashMap::new();

        for step in plan.steps.clone() {
            if cancel.is_cancelled() {
                return self.finish_cancelled(record);
            }
            match self.aurora.live_state(&execution_id) {
                crate::aurora::LiveState::Cut => return self.finish_cut(record),
                crate::aurora::LiveState::Paused => return self.finish_paused(record),
                crate::aurora::LiveState::Running => {}
            }

            let resolved_step = resolve_in_refs(&step, &context);
            let result = self
                .run_step(&execution_id, origin, &resolved_step, &mut record, &cancel, dry_run)
                .await;
            if let Some(output) = result.output.clone() {
                context.insert(step.step_id.clone(), output);
            }
            record.step_results.push(result.clone());

            if result.status == StepStatus::Failed && !step.optional {
                record.status = ExecutionStatus::Failed;
                record.error = result.error.clone();
                record.completed_at = Some(now_ms());
                self.session.append_execution(&record)?;
                self.bus.publish_execution(ExecutionEvent::Failed {
                    execution_id: execution_id.clone(),
                    reason: result.error.clone().unwrap_or_default(),
                });
                return Ok(record);
            }
        }

        record.status = ExecutionStatus::Completed;
        record.completed_at = Some(now_ms());
        self.session.append_execution(&record)?;
        self.bus.publish_execution(ExecutionEvent::Completed {
            execution_id: execution_id.clone(),
        });
        Ok(record)
    }

    async fn expand_hub_steps(&self, plan: &Plan) -> Result<Vec<PlanStep>> {
        let mut expanded = Vec::with_capacity(plan.steps.len());
        for step in &plan.steps {
            if let Some((hub_id, workflow_id)) = step.action_type.split_once("::") {
                let fragment = self.hubs.expand(hub_id, workflow_id, step.params.clone())?;
                expanded.extend(fragment);
            } else {
                expanded.push(step.clone());
            }
        }
        Ok(expanded)
    }

    async fn run_step(
        &self,
        execution_id: &ExecutionId,
        origin: Origin,
        step: &PlanStep,
        record: &mut ExecutionRecord,
        cancel: &CancelToken,
        dry_run: bool,
    ) -> StepResult {
        let mut attempts = 0u32;
        let started = now_ms();

        loop {
            attempts += 1;

            if cancel.is_cancelled() {
                return StepResult {
                    step_id: step.step_id.clone(),
                    status: StepStatus::Failed,
                    attempts,
                    duration_ms: (now_ms() - started) as u64,
                    output: None,
                    error: Some(ErrorCode::Cancelled.as_str().to_string()),
                    aurora_events: vec![],
                };
            }

            let verdict = self.aurora.pre_step(execution_id, origin, step, now_ms());
            match verdict {
                StepVerdict::Deny(reason) => {
                    self.bus.publish_execution(ExecutionEvent::BlockedByAurora {
                        execution_id: execution_id.clone(),
                        reason: reason.clone(),
                    });
                    return StepResult {
                        step_id: step.step_id.clone(),
                        status: StepStatus::Failed,
                        attempts,
                        duration_ms: (now_ms() - started) as u64,
                        output: None,
                        error: Some(reason),
                        aurora_events: vec!["deny".to_string()],
                    };
                }
                StepVerdict::RequireConfirmation(reason) => {
                    return StepResult {
                        step_id: step.step_id.clone(),
                        status: StepStatus::Failed,
                        attempts,
                        duration_ms: (now_ms() - started) as u64,
                        output: None,
                        error: Some(reason),
                        aurora_events: vec!["require_confirmation".to_string()],
                    };
                }
                StepVerdict::Throttle { delay_ms } => {
                    if attempts > 10 {
                        return StepResult {
                            step_id: step.step_id.clone(),
                            status: StepStatus::Failed,
                            attempts,
                            duration_ms: (now_ms() - started) as u64,
                            output: None,
                            error: Some("throttled past retry budget".to_string()),
                            aurora_events: vec!["throttle".to_string()],
                        };
                    }
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    continue;
                }
                StepVerdict::Proceed => {}
            }

            self.bus.publish_execution(ExecutionEvent::PreStepAllow {
                execution_id: execution_id.clone(),
                step_id: step.step_id.clone(),
            });

            let dispatch_started = now_ms();
            let dispatch_result = self.dispatch(step).await;
            let success = dispatch_result.is_ok();
            let dispatch_duration_ms = (now_ms() - dispatch_started) as u64;
            self.aurora.post_step(execution_id, step, success, dispatch_duration_ms, now_ms());

            match dispatch_result {
                Ok(outcome) => {
                    let result = StepResult {
                        step_id: step.step_id.clone(),
                        status: StepStatus::Success,
                        attempts,
                        duration_ms: (now_ms() - started) as u64,
                        output: outcome.data,
                        error: None,
                        aurora_events: vec![],
                    };

                    self.bus.publish_execution(ExecutionEvent::PostStep {
                        execution_id: execution_id.clone(),
                        step_id: step.step_id.clone(),
                        result: result.clone(),
                    });

                    // Dry runs persist the event log only (§9): no checkpoint
                    // blobs for a plan that never really touched anything.
                    // Checkpoint publishes after the success event so subscribers
                    // never see a commit without its matching result.
                    if !dry_run && (!step.idempotent || !step.declared_resources.external.is_empty()) {
                        let checkpoint = self.write_checkpoint(execution_id, step, record);
                        record.checkpoints.push(checkpoint.clone());
                        self.bus.publish_execution(ExecutionEvent::CheckpointCommitted {
                            execution_id: execution_id.clone(),
                            after_step_id: step.step_id.clone(),
                        });
                    }

                    return result;
                }
                Err(err) => {
                    let retriable = err.code().is_retriable();
                    if step.idempotent && retriable && attempts <= 5 {
                        let backoff = backoff_ms(attempts);
                        tokio::time::sleep(Duration::from_millis(backoff)).await;
                        continue;
                    }
                    let result = StepResult {
                        step_id: step.step_id.clone(),
                        status: StepStatus::Failed,
                        attempts,
                        duration_ms: (now_ms() - started) as u64,
                        output: None,
                        error: Some(err.message()),
                        aurora_events: vec![],
                    };
                    self.bus.publish_execution(ExecutionEvent::PostStep {
                        execution_id: execution_id.clone(),
                        step_id: step.step_id.clone(),
                        result: result.clone(),
                    });
                    return result;
                }
            }
        }
    }

    async fn dispatch(&self, step: &PlanStep) -> Result<crate::types::SkillOutcome> {
        let skill = self.registry.lookup(&step.action_type)?;
        let descriptor = skill.describe();
        let timeout_ms = descriptor.timeout_ms;
        let timeout = Duration::from_millis(timeout_ms);

        // Dangerous skills (exec.shell, file.write, ...) share a small
        // per-host pool (§5) instead of running unbounded.
        let _permit = if descriptor.dangerous {
            Some(
                self.dangerous_gate
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| OperatorError::Internal("dangerous skill gate closed".to_string()))?,
            )
        } else {
            None
        };

        match tokio::time::timeout(timeout, skill.run(step.params.clone())).await {
            Ok(result) => result,
            Err(_) => Err(OperatorError::Timeout(timeout_ms)),
        }
    }

    fn write_checkpoint(&self, execution_id: &ExecutionId, step: &PlanStep, record: &ExecutionRecord) -> Checkpoint {
        let checkpoint = Checkpoint {
            checkpoint_id: Uuid::new_v4().to_string(),
            execution_id: execution_id.clone(),
            after_step_id: step.step_id.clone(),
            state_blob: serde_json::json!({ "step_results_so_far": record.step_results.len() }),
            created_at: now_ms(),
        };
        let _ = self.session.append_checkpoint(&checkpoint);
        checkpoint
    }

    fn finish_cancelled(&self, mut record: ExecutionRecord) -> Result<ExecutionRecord> {
        record.status = ExecutionStatus::Cancelled;
        record.completed_at = Some(now_ms());
        self.session.append_execution(&record)?;
        self.bus.publish_execution(ExecutionEvent::Cancelled {
            execution_id: record.execution_id.clone(),
        });
        Ok(record)
    }

    fn finish_cut(&self, mut record: ExecutionRecord) -> Result<ExecutionRecord> {
        record.status = ExecutionStatus::Failed;
        record.error = Some("cut by aurora".to_string());
        record.completed_at = Some(now_ms());
        self.session.append_execution(&record)?;
        Ok(record)
    }

    fn finish_paused(&self, mut record: ExecutionRecord) -> Result<ExecutionRecord> {
        record.status = ExecutionStatus::Paused;
        self.session.append_execution(&record)?;
        Ok(record)
    }
}

/// Binds a hub step's declared `$in_refs` to the outputs of already-run
/// steps in this execution, exposing them under `$inputs` (§4.6's hand-off
/// contract). Steps without `$in_refs` pass through untouched.
fn resolve_in_refs(step: &PlanStep, context: &HashMap<String, serde_json::Value>) -> PlanStep {
    let refs = match step.params.get(IN_REFS_KEY).and_then(|v| v.as_array()) {
        Some(refs) => refs.clone(),
        None => return step.clone(),
    };

    let mut resolved = step.clone();
    let mut inputs = serde_json::Map::new();
    for r in refs {
        if let Some(step_id) = r.as_str() {
            if let Some(output) = context.get(step_id) {
                inputs.insert(step_id.to_string(), output.clone());
            }
        }
    }
    if let Some(obj) = resolved.params.as_object_mut() {
        obj.insert(RESOLVED_INPUTS_KEY.to_string(), serde_json::Value::Object(inputs));
    }
    resolved
}

fn backoff_ms(attempt: u32) -> u64 {
    let raw = (RETRY_BASE_MS as f64) * RETRY_FACTOR.powi(attempt as i32 - 1);
    let capped = raw.min(RETRY_CAP_MS as f64);
    let jitter_span = capped * RETRY_JITTER;
    let jitter = rand::thread_rng().gen_range(-jitter_span..=jitter_span);
    (capped + jitter).max(0.0) as u64
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_and_caps() {
        let first = backoff_ms(1);
        let second = backoff_ms(2);
        assert!(first <= 300); // base 250ms +/- 20%
        assert!(second > first / 2); // roughly doubled, allowing for jitter
        let late = backoff_ms(10);
        assert!(late <= (RETRY_CAP_MS as f64 * 1.2) as u64);
    }

    #[test]
    fn cancel_token_reflects_cancel_call() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn resolve_in_refs_binds_prior_step_output() {
        let mut context = HashMap::new();
        context.insert("produto.mvp_definition".to_string(), serde_json::json!({"scope": "crm"}));

        let step = PlanStep {
            step_id: "ux.flow_notes".into(),
            action_type: "ai.generate_text".into(),
            target: None,
            params: serde_json::json!({"prompt": "draft flows", "$in_refs": ["produto.mvp_definition"]}),
            description: "".into(),
            idempotent: false,
            declared_resources: crate::types::DeclaredResources::default(),
            estimated_duration_ms: 1000,
            compensating_action: None,
            risk: crate::types::RiskLevel::Low,
            optional: false,
        };

        let resolved = resolve_in_refs(&step, &context);
        let inputs = resolved.params.get(RESOLVED_INPUTS_KEY).unwrap();
        assert_eq!(inputs.get("produto.mvp_definition").unwrap()["scope"], "crm");
    }
}
