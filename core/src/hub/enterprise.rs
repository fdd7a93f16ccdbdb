//! Reference Enterprise hub (§4.6): a nine-persona software-delivery
//! pipeline composed from `ai.generate_text` calls wired together by the
//! hand-off contract declared in each step template.

use super::{Hub, Manifest, StepTemplate, Workflow, IN_REFS_KEY};
use crate::error::{OperatorError, Result};
use crate::types::{DeclaredResources, PlanStep, RiskLevel};
use serde_json::json;

const PERSONAS: &[(&str, &str, &str)] = &[
    ("produto", "mvp_definition", "Define the MVP scope and success criteria for: {brief}"),
    ("ux", "flow_notes", "Draft flow and wireframe notes for the MVP defined above."),
    ("arquitetura", "system_design", "Propose a system design satisfying the UX flow above."),
    ("dados", "schema_design", "Design the data schema implied by the system design above."),
    ("backend", "api_implementation", "Implement the API surface implied by the schema above."),
    ("frontend", "ui_implementation", "Implement the UI consuming the API above."),
    ("qa", "test_plan", "Write and execute a test plan covering the implementation above."),
    ("devops", "deploy_plan", "Produce a deploy plan for the tested implementation above."),
    ("seguranca", "security_review", "Perform a security review of the implementation above."),
];

fn persona(name: &str) -> (&'static str, &'static str, &'static str) {
    PERSONAS
        .iter()
        .copied()
        .find(|(p, _, _)| *p == name)
        .unwrap_or_else(|| panic!("unknown persona '{name}'"))
}

pub struct EnterpriseHub;

impl EnterpriseHub {
    fn workflow_personas(workflow_id: &str) -> Option<Vec<&'static str>> {
        match workflow_id {
            "full" => Some(PERSONAS.iter().map(|(p, _, _)| *p).collect()),
            "mvp-only" => Some(vec!["produto", "ux", "arquitetura"]),
            "code-only" => Some(vec!["backend", "frontend"]),
            "test-only" => Some(vec!["qa"]),
            "incident-response" => Some(vec!["seguranca", "devops"]),
            "feature-add" => Some(vec!["arquitetura", "backend", "frontend", "qa"]),
            _ => None,
        }
    }

    fn step_templates(workflow_id: &str) -> Vec<StepTemplate> {
        let personas = Self::workflow_personas(workflow_id).unwrap_or_default();
        personas
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let (persona_name, subskill, _) = persona(name);
                let in_refs = if i == 0 {
                    vec![]
                } else {
                    let (prev_persona, prev_subskill, _) = persona(personas[i - 1]);
                    vec![format!("{prev_persona}.{prev_subskill}")]
                };
                StepTemplate {
                    step_id: format!("{persona_name}.{subskill}"),
                    persona: persona_name.to_string(),
                    action_type: "ai.generate_text".to_string(),
                    in_refs,
                    out_schema: json!({"type": "object"}),
                }
            })
            .collect()
    }
}

impl Hub for EnterpriseHub {
    fn manifest(&self) -> Manifest {
        const WORKFLOW_IDS: &[&str] = &[
            "full",
            "mvp-only",
            "code-only",
            "test-only",
            "incident-response",
            "feature-add",
        ];
        Manifest {
            id: "enterprise".to_string(),
            display_name: "Enterprise".to_string(),
            version: "1.0.0".to_string(),
            workflows: WORKFLOW_IDS
                .iter()
                .map(|id| Workflow {
                    id: id.to_string(),
                    parameter_schema: json!({
                        "type": "object",
                        "properties": {"brief": {"type": "string"}},
                        "required": ["brief"]
                    }),
                    step_template: Self::step_templates(id),
                })
                .collect(),
            required_capabilities: vec!["ai.generate_text".to_string()],
        }
    }

    fn expand(&self, workflow_id: &str, params: serde_json::Value) -> Result<Vec<PlanStep>> {
        let templates = Self::step_templates(workflow_id);
        if templates.is_empty() {
            return Err(OperatorError::NotFound(format!(
                "workflow '{workflow_id}' is not defined by the enterprise hub"
            )));
        }

        let brief = params
            .get("brief")
            .and_then(|v| v.as_str())
            .unwrap_or("(no brief provided)")
            .to_string();

        let mut steps = Vec::with_capacity(templates.len());
        for template in &templates {
            let (_, _, prompt_template) = persona(&template.persona);
            let prompt = prompt_template.replace("{brief}", &brief);
            let mut step_params = json!({"prompt": prompt, "persona": template.persona});
            if !template.in_refs.is_empty() {
                step_params[IN_REFS_KEY] = json!(template.in_refs);
            }
            steps.push(PlanStep {
                step_id: template.step_id.clone(),
                action_type: template.action_type.clone(),
                target: Some(template.persona.clone()),
                params: step_params,
                description: format!("{} persona step for workflow '{workflow_id}'", template.persona),
                idempotent: false,
                declared_resources: DeclaredResources::default(),
                estimated_duration_ms: 30_000,
                compensating_action: None,
                risk: RiskLevel::Low,
                optional: false,
            });
        }
        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mvp_only_runs_first_three_personas() {
        let hub = EnterpriseHub;
        let steps = hub.expand("mvp-only", json!({"brief": "a CRM"})).unwrap();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].step_id, "produto.mvp_definition");
        assert_eq!(steps[2].step_id, "arquitetura.system_design");
    }

    #[test]
    fn incident_response_runs_seguranca_then_devops() {
        let hub = EnterpriseHub;
        let steps = hub.expand("incident-response", json!({"brief": "outage"})).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].step_id, "seguranca.security_review");
        assert_eq!(steps[1].step_id, "devops.deploy_plan");
    }

    #[test]
    fn second_step_declares_in_ref_to_first() {
        let hub = EnterpriseHub;
        let steps = hub.expand("mvp-only", json!({"brief": "a CRM"})).unwrap();
        let refs = steps[1].params.get(IN_REFS_KEY).unwrap().as_array().unwrap();
        assert_eq!(refs[0], "produto.mvp_definition");
    }

    #[test]
    fn unknown_workflow_is_not_found() {
        let hub = EnterpriseHub;
        let err = hub.expand("bogus", json!({})).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::NotFound);
    }
}
