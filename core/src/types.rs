//! The shared data model: Intent, Plan, ExecutionRecord and friends.
//!
//! Kept as plain serde-friendly structs so every component (Aurora, the
//! executor, the session log, the gateway) can pass the same value without
//! layers of conversion.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type IntentId = String;
pub type PlanId = String;
pub type ExecutionId = String;
pub type StepId = String;
pub type SessionId = String;
pub type CheckpointId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Cockpit,
    Telegram,
    Api,
    Cli,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub intent_id: IntentId,
    pub origin: Origin,
    pub raw_input: String,
    pub timestamp: i64,
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl Intent {
    pub fn new(origin: Origin, raw_input: impl Into<String>) -> Self {
        Self {
            intent_id: uuid::Uuid::new_v4().to_string(),
            origin,
            raw_input: raw_input.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            metadata: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeclaredResources {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub repos: Vec<String>,
    #[serde(default)]
    pub external: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub step_id: StepId,
    pub action_type: String,
    pub target: Option<String>,
    pub params: serde_json::Value,
    pub description: String,
    pub idempotent: bool,
    #[serde(default)]
    pub declared_resources: DeclaredResources,
    pub estimated_duration_ms: u64,
    pub compensating_action: Option<String>,
    #[serde(default)]
    pub risk: RiskLevel,
    #[serde(default)]
    pub optional: bool,
}

impl Default for RiskLevel {
    fn default() -> Self {
        RiskLevel::Low
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanMode {
    DryRun,
    Real,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanLimits {
    pub max_time_ms: u64,
    pub max_retries: u32,
    pub max_files_changed: usize,
}

impl Default for PlanLimits {
    fn default() -> Self {
        Self {
            max_time_ms: 5 * 60_000,
            max_retries: 3,
            max_files_changed: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub plan_id: PlanId,
    pub intent_id: IntentId,
    pub steps: Vec<PlanStep>,
    pub risk_level: RiskLevel,
    pub permissions_needed: Vec<String>,
    pub limits: PlanLimits,
    pub mode: PlanMode,
    pub created_at: i64,
}

impl Plan {
    pub fn max_step_risk(&self) -> RiskLevel {
        self.steps
            .iter()
            .map(|s| s.risk)
            .max()
            .unwrap_or(RiskLevel::Low)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Authorized,
    Running,
    Paused,
    Completed,
    Failed,
    Blocked,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Failed,
    Skipped,
    Retried,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: StepId,
    pub status: StepStatus,
    pub attempts: u32,
    pub duration_ms: u64,
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
    #[serde(default)]
    pub aurora_events: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub checkpoint_id: CheckpointId,
    pub execution_id: ExecutionId,
    pub after_step_id: StepId,
    pub state_blob: serde_json::Value,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: ExecutionId,
    pub plan_id: PlanId,
    pub status: ExecutionStatus,
    pub step_results: Vec<StepResult>,
    pub checkpoints: Vec<Checkpoint>,
    pub started_at: i64,
    pub completed_at: Option<i64>,
    pub error: Option<String>,
}

impl ExecutionRecord {
    pub fn new(execution_id: ExecutionId, plan_id: PlanId) -> Self {
        Self {
            execution_id,
            plan_id,
            status: ExecutionStatus::Pending,
            step_results: Vec::new(),
            checkpoints: Vec::new(),
            started_at: chrono::Utc::now().timestamp_millis(),
            completed_at: None,
            error: None,
        }
    }

    pub fn last_checkpoint(&self) -> Option<&Checkpoint> {
        self.checkpoints.last()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub actor: Option<String>,
    pub execution_ids: Vec<ExecutionId>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Exec,
    Ai,
    File,
    Web,
    Browser,
    Comm,
    Util,
    Autopc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillDescriptor {
    pub name: String,
    pub description: String,
    pub category: Category,
    pub dangerous: bool,
    pub parameter_schema: serde_json::Value,
    pub timeout_ms: u64,
    pub retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillOutcome {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl SkillOutcome {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            metadata: HashMap::new(),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            metadata: HashMap::new(),
        }
    }
}
