//! Event bus payloads.
//!
//! `BusEvent` is the envelope travelling on the in-process pub/sub medium
//! described in the design notes: Aurora, the session log, and the gateway
//! are all consumers, none of them hold a direct reference to each other.

use crate::types::{ExecutionId, PlanId, StepId, StepResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuroraLevel {
    Green,
    Yellow,
    Orange,
    Red,
}

/// The union of safety signals Aurora may emit on the live gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuroraEvent {
    Health {
        execution_id: Option<ExecutionId>,
        metric: String,
        value: f64,
    },
    Alert {
        execution_id: Option<ExecutionId>,
        reason: String,
        level: AuroraLevel,
    },
    Limit {
        execution_id: Option<ExecutionId>,
        reason: String,
        retry_after_ms: u64,
    },
    Pause {
        execution_id: ExecutionId,
        reason: String,
    },
    Cut {
        execution_id: ExecutionId,
        reason: String,
    },
    Resume {
        execution_id: ExecutionId,
    },
}

impl AuroraEvent {
    pub fn execution_id(&self) -> Option<&ExecutionId> {
        match self {
            AuroraEvent::Health { execution_id, .. } => execution_id.as_ref(),
            AuroraEvent::Alert { execution_id, .. } => execution_id.as_ref(),
            AuroraEvent::Limit { execution_id, .. } => execution_id.as_ref(),
            AuroraEvent::Pause { execution_id, .. } => Some(execution_id),
            AuroraEvent::Cut { execution_id, .. } => Some(execution_id),
            AuroraEvent::Resume { execution_id } => Some(execution_id),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AuroraEvent::Health { .. } => "health",
            AuroraEvent::Alert { .. } => "alert",
            AuroraEvent::Limit { .. } => "limit",
            AuroraEvent::Pause { .. } => "pause",
            AuroraEvent::Cut { .. } => "cut",
            AuroraEvent::Resume { .. } => "resume",
        }
    }
}

/// A step-level lifecycle record, independent of its storage form in the
/// session log. `seq` is monotonically increasing per execution so
/// consumers can order events and detect gaps (see Gateway §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionEvent {
    PlanAuthorized {
        execution_id: ExecutionId,
        plan_id: PlanId,
    },
    PreStepAllow {
        execution_id: ExecutionId,
        step_id: StepId,
    },
    PostStep {
        execution_id: ExecutionId,
        step_id: StepId,
        result: StepResult,
    },
    CheckpointCommitted {
        execution_id: ExecutionId,
        after_step_id: StepId,
    },
    BlockedByAurora {
        execution_id: ExecutionId,
        reason: String,
    },
    Completed {
        execution_id: ExecutionId,
    },
    Failed {
        execution_id: ExecutionId,
        reason: String,
    },
    Cancelled {
        execution_id: ExecutionId,
    },
}

/// Top-level event envelope published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
pub enum BusEvent {
    Execution { seq: u64, event: ExecutionEvent },
    Aurora { seq: u64, event: AuroraEvent },
}
