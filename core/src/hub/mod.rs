//! Hub Orchestrator runtime (C7): domain packages exposing declarative
//! workflows that expand into concrete plan steps (§4.6).

pub mod enterprise;

use crate::error::{OperatorError, Result};
use crate::types::PlanStep;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One sub-step in a workflow's declared step graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepTemplate {
    pub step_id: String,
    pub persona: String,
    pub action_type: String,
    /// Prior step ids in this workflow whose outputs this step reads.
    #[serde(default)]
    pub in_refs: Vec<String>,
    pub out_schema: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub parameter_schema: serde_json::Value,
    pub step_template: Vec<StepTemplate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub id: String,
    pub display_name: String,
    pub version: String,
    pub workflows: Vec<Workflow>,
    pub required_capabilities: Vec<String>,
}

impl Manifest {
    pub fn workflow(&self, workflow_id: &str) -> Option<&Workflow> {
        self.workflows.iter().find(|w| w.id == workflow_id)
    }
}

/// Reserved params key a hub uses to declare which earlier step outputs a
/// step depends on. The executor resolves it into [`RESOLVED_INPUTS_KEY`]
/// right before dispatch, scoped to the running execution.
pub const IN_REFS_KEY: &str = "$in_refs";
pub const RESOLVED_INPUTS_KEY: &str = "$inputs";

pub trait Hub: Send + Sync {
    fn manifest(&self) -> Manifest;

    /// Expand one workflow invocation into a concrete, ordered plan
    /// fragment. Each returned step's `params` may carry `$in_refs`
    /// listing the step_ids (scoped to this fragment) it depends on.
    fn expand(&self, workflow_id: &str, params: serde_json::Value) -> Result<Vec<PlanStep>>;
}

/// Name -> Hub map, mirroring `skills::registry::Registry`'s shape.
pub struct HubRegistry {
    hubs: DashMap<String, Arc<dyn Hub>>,
}

impl HubRegistry {
    pub fn new() -> Self {
        Self {
            hubs: DashMap::new(),
        }
    }

    pub fn register(&self, id: impl Into<String>, hub: Arc<dyn Hub>) {
        self.hubs.insert(id.into(), hub);
    }

    pub fn manifest(&self, hub_id: &str) -> Result<Manifest> {
        self.hubs
            .get(hub_id)
            .map(|h| h.manifest())
            .ok_or_else(|| OperatorError::NotFound(format!("hub '{hub_id}' is not registered")))
    }

    pub fn list(&self) -> Vec<Manifest> {
        self.hubs.iter().map(|e| e.value().manifest()).collect()
    }

    pub fn expand(
        &self,
        hub_id: &str,
        workflow_id: &str,
        params: serde_json::Value,
    ) -> Result<Vec<PlanStep>> {
        let hub = self
            .hubs
            .get(hub_id)
            .ok_or_else(|| OperatorError::NotFound(format!("hub '{hub_id}' is not registered")))?;
        hub.expand(workflow_id, params)
    }
}

impl Default for HubRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::enterprise::EnterpriseHub;

    #[test]
    fn unknown_hub_is_not_found() {
        let registry = HubRegistry::new();
        let err = registry
            .expand("nope", "full", serde_json::json!({}))
            .unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::NotFound);
    }

    #[test]
    fn enterprise_full_workflow_expands_nine_persona_steps() {
        let registry = HubRegistry::new();
        registry.register("enterprise", Arc::new(EnterpriseHub));
        let steps = registry
            .expand("enterprise", "full", serde_json::json!({"brief": "build a CRM"}))
            .unwrap();
        assert_eq!(steps.len(), 9);
    }
}
