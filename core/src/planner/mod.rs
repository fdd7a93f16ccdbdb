//! Planner (C4): expand a routed intent into an ordered, typed, risk-scored
//! Plan. For a simple skill call the Plan is a single step; hub workflow
//! expansion happens inside the Hub Orchestrator (see `crate::hub`).

use crate::router::rules::Urgency;
use crate::router::RoutedIntent;
use crate::types::{
    DeclaredResources, Intent, Plan, PlanLimits, PlanMode, PlanStep, RiskLevel,
};
use uuid::Uuid;

/// Resource-class thresholds feeding the risk rule table (§4.3).
const MANY_FILES_THRESHOLD: usize = 200;

pub struct Planner;

impl Planner {
    pub fn new() -> Self {
        Self
    }

    /// Build a single-step Plan for a routed skill intent.
    pub fn plan_skill_call(&self, intent: &Intent, routed: &RoutedIntent, mode: PlanMode) -> Plan {
        let skill = routed
            .suggested_skill
            .clone()
            .unwrap_or_else(|| "unknown".to_string());

        let declared_resources = infer_resources(&routed.entities, &skill);
        let risk = self.assess_step_risk(&skill, &declared_resources, &routed.entities);

        let step = PlanStep {
            step_id: Uuid::new_v4().to_string(),
            action_type: skill,
            target: routed.entities.get("url").or(routed.entities.get("path")).cloned(),
            params: routed.prepared_input.clone(),
            description: format!("dispatch {}", routed.intent),
            idempotent: is_idempotent(&routed.intent),
            declared_resources,
            estimated_duration_ms: estimate_duration(routed.urgency),
            compensating_action: None,
            risk,
            optional: false,
        };

        self.finish_plan(intent, vec![step], mode)
    }

    /// Build a Plan whose sole step targets a hub workflow; the Hub
    /// Orchestrator runtime expands it into concrete sub-steps once the
    /// executor dispatches it.
    pub fn plan_hub_call(
        &self,
        intent: &Intent,
        hub_id: &str,
        workflow_id: &str,
        params: serde_json::Value,
        risk: RiskLevel,
        mode: PlanMode,
    ) -> Plan {
        let step = PlanStep {
            step_id: Uuid::new_v4().to_string(),
            action_type: format!("{hub_id}::{workflow_id}"),
            target: Some(hub_id.to_string()),
            params,
            description: format!("run hub workflow {hub_id}/{workflow_id}"),
            idempotent: false,
            declared_resources: DeclaredResources::default(),
            estimated_duration_ms: 60_000,
            compensating_action: None,
            risk,
            optional: false,
        };

        self.finish_plan(intent, vec![step], mode)
    }

    fn finish_plan(&self, intent: &Intent, steps: Vec<PlanStep>, mode: PlanMode) -> Plan {
        let risk_level = steps.iter().map(|s| s.risk).max().unwrap_or(RiskLevel::Low);
        let permissions_needed = steps
            .iter()
            .flat_map(|s| s.declared_resources.external.clone())
            .collect();

        Plan {
            plan_id: Uuid::new_v4().to_string(),
            intent_id: intent.intent_id.clone(),
            steps,
            risk_level,
            permissions_needed,
            limits: PlanLimits::default(),
            mode,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Risk rule table: touching secrets, external networks, or more than
    /// `MANY_FILES_THRESHOLD` files raises risk.
    fn assess_step_risk(
        &self,
        skill: &str,
        resources: &DeclaredResources,
        entities: &std::collections::HashMap<String, String>,
    ) -> RiskLevel {
        if skill == "exec.shell" {
            return RiskLevel::Critical;
        }
        if looks_like_credential(entities.values()) {
            return RiskLevel::Critical;
        }
        if resources.files.len() > MANY_FILES_THRESHOLD {
            return RiskLevel::High;
        }
        if !resources.external.is_empty() {
            return RiskLevel::Medium;
        }
        if skill == "file.write" {
            return RiskLevel::Medium;
        }
        RiskLevel::Low
    }
}

impl Default for Planner {
    fn default() -> Self {
        Self::new()
    }
}

fn is_idempotent(intent_name: &str) -> bool {
    !matches!(intent_name, "destructive_command" | "write_file" | "run_shell")
}

fn estimate_duration(urgency: Urgency) -> u64 {
    match urgency {
        Urgency::Critical => 2_000,
        Urgency::High => 5_000,
        Urgency::Medium => 10_000,
        Urgency::Low => 15_000,
    }
}

fn infer_resources(
    entities: &std::collections::HashMap<String, String>,
    skill: &str,
) -> DeclaredResources {
    let mut resources = DeclaredResources::default();
    if let Some(path) = entities.get("path") {
        resources.files.push(path.clone());
    }
    if let Some(url) = entities.get("url") {
        resources.external.push(url.clone());
    }
    if skill == "exec.shell" {
        resources.external.push("host-shell".to_string());
    }
    resources
}

fn looks_like_credential<'a>(mut values: impl Iterator<Item = &'a String>) -> bool {
    values.any(|v| {
        let lower = v.to_lowercase();
        lower.contains("password") || lower.contains("secret") || lower.contains("api_key")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Origin;

    #[test]
    fn skill_call_risk_is_max_of_step_risks() {
        let planner = Planner::new();
        let intent = Intent::new(Origin::Api, "execute rm -rf /");
        let routed = RoutedIntent {
            intent: "destructive_command".to_string(),
            confidence: 1.0,
            suggested_skill: Some("exec.shell".to_string()),
            alternatives: vec![],
            urgency: Urgency::Critical,
            category: None,
            entities: Default::default(),
            prepared_input: serde_json::json!({}),
        };
        let plan = planner.plan_skill_call(&intent, &routed, PlanMode::Real);
        assert_eq!(plan.risk_level, RiskLevel::Critical);
        assert_eq!(plan.risk_level, plan.max_step_risk());
    }

    #[test]
    fn benign_ai_call_is_low_risk() {
        let planner = Planner::new();
        let intent = Intent::new(Origin::Api, "Gerar um texto de teste");
        let routed = RoutedIntent {
            intent: "generate_content".to_string(),
            confidence: 0.8,
            suggested_skill: Some("ai.generate_text".to_string()),
            alternatives: vec![],
            urgency: Urgency::Low,
            category: None,
            entities: Default::default(),
            prepared_input: serde_json::json!({ "prompt": "Gerar um texto de teste" }),
        };
        let plan = planner.plan_skill_call(&intent, &routed, PlanMode::Real);
        assert_eq!(plan.risk_level, RiskLevel::Low);
        assert_eq!(plan.steps.len(), 1);
    }
}
