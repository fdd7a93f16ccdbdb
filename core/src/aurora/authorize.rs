//! Pre-gate authorization (§4.3): turns a Plan + context into a risk score,
//! an authorization level, and a decision — the whole point of Aurora.

use crate::events::AuroraLevel;
use crate::types::{Origin, Plan, PlanLimits, PlanMode, RiskLevel};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allowed,
    RequiresConfirmation,
    Blocked,
}

#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub execution_id: String,
    pub origin: Origin,
    pub plan: Plan,
    pub mode: PlanMode,
    pub user_id: Option<String>,
    /// Free-form context; recognized keys: `environment`, `production_confirmed`.
    pub context: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationResponse {
    pub decision: Decision,
    pub level: AuroraLevel,
    pub imposed_limits: Option<PlanLimits>,
    pub rules_triggered: Vec<String>,
    pub requires_confirmation: bool,
    pub message: String,
    pub reason: String,
    pub risk_score: u8,
}

const DESTRUCTIVE_PATTERNS: &[&str] = &["rm -rf /", "drop table", "drop schema", "delete database"];
const MANY_FILES_THRESHOLD: usize = 200;

pub fn authorize(request: &AuthorizationRequest) -> AuthorizationResponse {
    let mut rules_triggered = Vec::new();
    let base_score = base_score(request.plan.risk_level);

    let file_count: usize = request
        .plan
        .steps
        .iter()
        .map(|s| s.declared_resources.files.len())
        .sum();

    let destructive = request.plan.steps.iter().any(|s| {
        let haystack = format!("{} {}", s.action_type, s.params).to_lowercase();
        DESTRUCTIVE_PATTERNS.iter().any(|p| haystack.contains(p))
    });
    if destructive {
        rules_triggered.push("destructive_primitive".to_string());
    }

    let bulk_files = file_count > MANY_FILES_THRESHOLD;
    if bulk_files {
        rules_triggered.push("bulk_file_change".to_string());
    }

    let credential_leak = request.plan.steps.iter().any(|s| {
        let haystack = format!("{} {}", s.target.clone().unwrap_or_default(), s.params).to_lowercase();
        haystack.contains("password") || haystack.contains("secret") || haystack.contains("api_key")
    });
    if credential_leak {
        rules_triggered.push("credential_leak".to_string());
    }

    let is_production = request
        .context
        .get("environment")
        .and_then(|v| v.as_str())
        .map(|s| s == "production")
        .unwrap_or(false);
    let production_confirmed = request
        .context
        .get("production_confirmed")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let production_violation =
        is_production && !(request.mode == PlanMode::Real && production_confirmed);
    if production_violation {
        rules_triggered.push("production_guard".to_string());
    }

    let score = base_score.saturating_add((file_count.min(500) / 10) as u8);
    let mut level = level_for_score(score);
    let mut decision = decision_for_score(score);

    if destructive || credential_leak || production_violation {
        decision = Decision::Blocked;
        level = AuroraLevel::Red;
    } else if bulk_files && decision == Decision::Allowed {
        decision = Decision::RequiresConfirmation;
        if level < AuroraLevel::Orange {
            level = AuroraLevel::Orange;
        }
    }

    let imposed_limits = if level >= AuroraLevel::Yellow {
        let mut limits = request.plan.limits.clone();
        limits.max_time_ms = (limits.max_time_ms * 3) / 4;
        Some(limits)
    } else {
        None
    };

    let message = human_message(decision, &rules_triggered);
    let reason = if rules_triggered.is_empty() {
        format!("risk score {score} mapped to {level:?}")
    } else {
        format!("triggered rules: {}", rules_triggered.join(", "))
    };

    AuthorizationResponse {
        decision,
        level,
        imposed_limits,
        rules_triggered,
        requires_confirmation: decision == Decision::RequiresConfirmation,
        message,
        reason,
        risk_score: score,
    }
}

fn base_score(risk: RiskLevel) -> u8 {
    match risk {
        RiskLevel::Low => 15,
        RiskLevel::Medium => 45,
        RiskLevel::High => 70,
        RiskLevel::Critical => 90,
    }
}

fn level_for_score(score: u8) -> AuroraLevel {
    match score {
        0..=29 => AuroraLevel::Green,
        30..=59 => AuroraLevel::Yellow,
        60..=79 => AuroraLevel::Orange,
        _ => AuroraLevel::Red,
    }
}

fn decision_for_score(score: u8) -> Decision {
    match level_for_score(score) {
        AuroraLevel::Green | AuroraLevel::Yellow => Decision::Allowed,
        AuroraLevel::Orange => Decision::RequiresConfirmation,
        AuroraLevel::Red => Decision::Blocked,
    }
}

fn human_message(decision: Decision, rules: &[String]) -> String {
    match decision {
        Decision::Allowed => "Plan authorized.".to_string(),
        Decision::RequiresConfirmation => {
            format!("Plan requires human confirmation ({}).", rules.join(", "))
        }
        Decision::Blocked => format!("Plan blocked by aurora ({}).", rules.join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeclaredResources, Intent, PlanStep};

    fn step(action_type: &str, params: serde_json::Value, risk: RiskLevel) -> PlanStep {
        PlanStep {
            step_id: "s1".into(),
            action_type: action_type.into(),
            target: None,
            params,
            description: "".into(),
            idempotent: true,
            declared_resources: DeclaredResources::default(),
            estimated_duration_ms: 1000,
            compensating_action: None,
            risk,
            optional: false,
        }
    }

    fn base_request(steps: Vec<PlanStep>, risk_level: RiskLevel) -> AuthorizationRequest {
        let intent = Intent::new(Origin::Api, "test");
        AuthorizationRequest {
            execution_id: "e1".into(),
            origin: Origin::Api,
            plan: Plan {
                plan_id: "p1".into(),
                intent_id: intent.intent_id,
                steps,
                risk_level,
                permissions_needed: vec![],
                limits: PlanLimits::default(),
                mode: PlanMode::Real,
                created_at: 0,
            },
            mode: PlanMode::Real,
            user_id: None,
            context: HashMap::new(),
        }
    }

    #[test]
    fn low_risk_text_generation_is_allowed_green() {
        let req = base_request(
            vec![step("ai.generate_text", serde_json::json!({"prompt": "hi"}), RiskLevel::Low)],
            RiskLevel::Low,
        );
        let resp = authorize(&req);
        assert_eq!(resp.decision, Decision::Allowed);
        assert!(resp.risk_score <= 29);
    }

    #[test]
    fn destructive_command_is_blocked() {
        let req = base_request(
            vec![step("exec.shell", serde_json::json!({"command": "rm -rf /"}), RiskLevel::Critical)],
            RiskLevel::Critical,
        );
        let resp = authorize(&req);
        assert_eq!(resp.decision, Decision::Blocked);
        assert!(resp.rules_triggered.contains(&"destructive_primitive".to_string()));
    }

    #[test]
    fn bulk_file_change_requires_confirmation() {
        let mut s = step("file.write", serde_json::json!({"path": "a.txt"}), RiskLevel::Medium);
        s.declared_resources.files = (0..201).map(|i| format!("file-{i}.txt")).collect();
        let req = base_request(vec![s], RiskLevel::Medium);
        let resp = authorize(&req);
        assert_eq!(resp.decision, Decision::RequiresConfirmation);
    }

    #[test]
    fn production_without_confirmation_is_blocked() {
        let mut req = base_request(
            vec![step("ai.generate_text", serde_json::json!({}), RiskLevel::Low)],
            RiskLevel::Low,
        );
        req.context.insert("environment".to_string(), serde_json::json!("production"));
        let resp = authorize(&req);
        assert_eq!(resp.decision, Decision::Blocked);
    }
}
