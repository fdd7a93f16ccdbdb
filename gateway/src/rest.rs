//! REST /api/v1 handlers (§6). Every response is wrapped in the
//! `{success, data, error, meta}` envelope.

use crate::error::{ApiError, Envelope};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use operator_core::aurora::authorize::{AuthorizationRequest, Decision};
use operator_core::executor::CancelToken;
use operator_core::types::{Intent, Origin, PlanMode, RiskLevel};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

fn request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
    pub uptime_ms: i64,
    pub version: &'static str,
    pub hubs_available: usize,
    pub total_skills: usize,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Envelope<HealthBody>> {
    let start = Instant::now();
    let body = HealthBody {
        status: "ok",
        uptime_ms: state.uptime_ms(),
        version: env!("CARGO_PKG_VERSION"),
        hubs_available: state.hubs.list().len(),
        total_skills: state.registry.stats().total,
    };
    Json(Envelope::ok(body, request_id(), start.elapsed().as_millis() as u64))
}

#[derive(Debug, Serialize)]
pub struct StatusBody {
    pub health: &'static str,
    pub metrics: serde_json::Value,
    pub hubs: Vec<String>,
    pub active_executions: usize,
    pub running: bool,
}

pub async fn status(State(state): State<Arc<AppState>>) -> Result<Json<Envelope<StatusBody>>, ApiError> {
    let start = Instant::now();
    let executions = state.session.list()?;
    let active = executions
        .iter()
        .filter(|e| {
            matches!(
                e.status,
                operator_core::types::ExecutionStatus::Running
                    | operator_core::types::ExecutionStatus::Authorized
                    | operator_core::types::ExecutionStatus::Pending
            )
        })
        .count();

    let body = StatusBody {
        health: "ok",
        metrics: serde_json::json!({
            "total_executions": executions.len(),
            "ws_disconnects": state.aurora.channel_disconnect_count("ws"),
        }),
        hubs: state.hubs.list().iter().map(|m| m.id.clone()).collect(),
        active_executions: active,
        running: true,
    };
    Ok(Json(Envelope::ok(body, request_id(), start.elapsed().as_millis() as u64)))
}

#[derive(Debug, Deserialize)]
pub struct IntentRequest {
    pub message: String,
    #[serde(default)]
    pub origin: Option<Origin>,
    #[serde(default)]
    pub mode: Option<PlanMode>,
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct IntentResponse {
    pub execution_id: String,
    pub status: &'static str,
    pub plan: Option<operator_core::types::Plan>,
    pub authorization: operator_core::aurora::authorize::AuthorizationResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_prompt: Option<String>,
}

pub async fn submit_intent(
    State(state): State<Arc<AppState>>,
    Json(body): Json<IntentRequest>,
) -> Result<(StatusCode, Json<Envelope<IntentResponse>>), ApiError> {
    let start = Instant::now();
    let origin = body.origin.unwrap_or(Origin::Api);
    let mode = body.mode.unwrap_or(PlanMode::Real);

    let intent = Intent::new(origin, body.message.clone());
    let routed = state.router.route(&body.message);
    let plan = state.planner.plan_skill_call(&intent, &routed, mode);

    let execution_id = uuid::Uuid::new_v4().to_string();
    let authorization = state.aurora.authorize(&AuthorizationRequest {
        execution_id: execution_id.clone(),
        origin,
        plan: plan.clone(),
        mode,
        user_id: None,
        context: body.context,
    });

    let (status_code, status_label, confirmation_prompt) = match authorization.decision {
        Decision::Blocked => (StatusCode::FORBIDDEN, "blocked", None),
        Decision::RequiresConfirmation => (
            StatusCode::ACCEPTED,
            "requires_confirmation",
            Some(authorization.message.clone()),
        ),
        Decision::Allowed => {
            let executor = state.executor.clone();
            let plan_clone = plan.clone();
            let exec_id = execution_id.clone();
            tokio::spawn(async move {
                let _ = executor.run(exec_id, origin, plan_clone, CancelToken::new()).await;
            });
            (StatusCode::OK, "running", None)
        }
    };

    let response = IntentResponse {
        execution_id,
        status: status_label,
        plan: Some(plan),
        authorization,
        confirmation_prompt,
    };
    Ok((
        status_code,
        Json(Envelope::ok(response, request_id(), start.elapsed().as_millis() as u64)),
    ))
}

#[derive(Debug, Serialize)]
pub struct ExecutionListItem {
    pub id: String,
    pub status: operator_core::types::ExecutionStatus,
    pub created_at: i64,
    pub completed_at: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ExecutionListBody {
    pub executions: Vec<ExecutionListItem>,
    pub total: usize,
}

pub async fn list_executions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Envelope<ExecutionListBody>>, ApiError> {
    let start = Instant::now();
    let summaries = state.session.list()?;
    let executions: Vec<ExecutionListItem> = summaries
        .into_iter()
        .map(|s| ExecutionListItem {
            id: s.execution_id,
            status: s.status,
            created_at: s.created_at,
            completed_at: s.completed_at,
        })
        .collect();
    let total = executions.len();
    Ok(Json(Envelope::ok(
        ExecutionListBody { executions, total },
        request_id(),
        start.elapsed().as_millis() as u64,
    )))
}

pub async fn get_execution(
    State(state): State<Arc<AppState>>,
    Path(execution_id): Path<String>,
) -> Result<Json<Envelope<operator_core::types::ExecutionRecord>>, ApiError> {
    let start = Instant::now();
    let record = state
        .session
        .snapshot(&execution_id)?
        .ok_or_else(|| operator_core::error::OperatorError::NotFound(format!(
            "execution '{execution_id}' is not known"
        )))?;
    Ok(Json(Envelope::ok(record, request_id(), start.elapsed().as_millis() as u64)))
}

#[derive(Debug, Serialize)]
pub struct HubSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: &'static str,
    pub workflows: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HubListBody {
    pub hubs: Vec<HubSummary>,
    pub total_skills: usize,
}

pub async fn list_hubs(State(state): State<Arc<AppState>>) -> Json<Envelope<HubListBody>> {
    let start = Instant::now();
    let hubs = state
        .hubs
        .list()
        .into_iter()
        .map(|m| HubSummary {
            id: m.id.clone(),
            name: m.display_name.clone(),
            description: format!("{} v{}", m.display_name, m.version),
            status: "available",
            workflows: m.workflows.iter().map(|w| w.id.clone()).collect(),
        })
        .collect();
    Json(Envelope::ok(
        HubListBody {
            hubs,
            total_skills: state.registry.stats().total,
        },
        request_id(),
        start.elapsed().as_millis() as u64,
    ))
}

#[derive(Debug, Serialize)]
pub struct HubDetailBody {
    pub manifest: operator_core::hub::Manifest,
    pub workflows: Vec<String>,
    pub status: &'static str,
    pub config: serde_json::Value,
}

pub async fn get_hub(
    State(state): State<Arc<AppState>>,
    Path(hub_id): Path<String>,
) -> Result<Json<Envelope<HubDetailBody>>, ApiError> {
    let start = Instant::now();
    let manifest = state.hubs.manifest(&hub_id)?;
    let workflows = manifest.workflows.iter().map(|w| w.id.clone()).collect();
    Ok(Json(Envelope::ok(
        HubDetailBody {
            workflows,
            status: "available",
            config: serde_json::json!({"required_capabilities": manifest.required_capabilities}),
            manifest,
        },
        request_id(),
        start.elapsed().as_millis() as u64,
    )))
}

pub async fn get_hub_workflows(
    State(state): State<Arc<AppState>>,
    Path(hub_id): Path<String>,
) -> Result<Json<Envelope<Vec<operator_core::hub::Workflow>>>, ApiError> {
    let start = Instant::now();
    let manifest = state.hubs.manifest(&hub_id)?;
    Ok(Json(Envelope::ok(
        manifest.workflows,
        request_id(),
        start.elapsed().as_millis() as u64,
    )))
}

#[derive(Debug, Deserialize)]
pub struct HubExecuteRequest {
    pub workflow: String,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default)]
    pub mode: Option<PlanMode>,
}

#[derive(Debug, Serialize)]
pub struct HubExecuteResponse {
    pub execution_id: String,
    pub hub: String,
    pub workflow: String,
    pub status: operator_core::types::ExecutionStatus,
    pub output: Option<serde_json::Value>,
    pub step_results: Vec<operator_core::types::StepResult>,
    pub metrics: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn execute_hub_workflow(
    State(state): State<Arc<AppState>>,
    Path(hub_id): Path<String>,
    Json(body): Json<HubExecuteRequest>,
) -> Result<(StatusCode, Json<Envelope<HubExecuteResponse>>), ApiError> {
    let start = Instant::now();
    // Validates the hub/workflow pair exists, and that params satisfy the
    // workflow's own schema, before an execution record is ever created.
    let manifest = state.hubs.manifest(&hub_id)?;
    let workflow = manifest.workflow(&body.workflow).ok_or_else(|| {
        operator_core::error::OperatorError::Validation(format!(
            "hub '{hub_id}' has no workflow '{}'",
            body.workflow
        ))
    })?;
    let compiled = jsonschema::JSONSchema::compile(&workflow.parameter_schema).map_err(|e| {
        operator_core::error::OperatorError::Internal(format!("invalid workflow schema: {e}"))
    })?;
    if let Err(mut errors) = compiled.validate(&body.params) {
        let first = errors
            .next()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "schema validation failed".to_string());
        return Err(operator_core::error::OperatorError::Validation(first).into());
    }

    let mode = body.mode.unwrap_or(PlanMode::Real);
    let intent = Intent::new(Origin::Api, format!("hub:{hub_id}/{}", body.workflow));
    let plan = state.planner.plan_hub_call(
        &intent,
        &hub_id,
        &body.workflow,
        body.params,
        RiskLevel::Medium,
        mode,
    );

    let execution_id = uuid::Uuid::new_v4().to_string();
    let authorization = state.aurora.authorize(&AuthorizationRequest {
        execution_id: execution_id.clone(),
        origin: Origin::Api,
        plan: plan.clone(),
        mode,
        user_id: None,
        context: HashMap::new(),
    });

    if authorization.decision != Decision::Allowed {
        let status_code = if authorization.decision == Decision::Blocked {
            StatusCode::FORBIDDEN
        } else {
            StatusCode::ACCEPTED
        };
        let response = HubExecuteResponse {
            execution_id,
            hub: hub_id,
            workflow: body.workflow,
            status: operator_core::types::ExecutionStatus::Blocked,
            output: None,
            step_results: vec![],
            metrics: serde_json::json!({}),
            error: Some(authorization.message),
        };
        return Ok((status_code, Json(Envelope::ok(response, request_id(), start.elapsed().as_millis() as u64))));
    }

    let record = state
        .executor
        .run(execution_id.clone(), Origin::Api, plan, CancelToken::new())
        .await?;

    let status_code = if record.status == operator_core::types::ExecutionStatus::Completed {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    let response = HubExecuteResponse {
        execution_id,
        hub: hub_id,
        workflow: body.workflow,
        status: record.status,
        output: record.step_results.last().and_then(|r| r.output.clone()),
        step_results: record.step_results,
        metrics: serde_json::json!({}),
        error: record.error,
    };
    Ok((status_code, Json(Envelope::ok(response, request_id(), start.elapsed().as_millis() as u64))))
}
