//! Intent Router (C3): classify raw input into a structured routing
//! decision. The router never fails — an unrecognized input is simply
//! routed to `unknown` with zero confidence.

pub mod rules;

use crate::types::Category;
use rules::{rule_table, Rule, Urgency};
use std::collections::HashMap;

/// Prefixes recognized as direct slash-commands, mapped straight to a
/// skill name. `/shell rm -rf /tmp/x` becomes `{skill: exec.shell, args:
/// "rm -rf /tmp/x"}` at confidence 1.0, bypassing rule scoring entirely.
const DIRECT_COMMANDS: &[(&str, &str)] = &[
    ("/shell", "exec.shell"),
    ("/ai", "ai.generate_text"),
    ("/fetch", "web.fetch"),
    ("/screenshot", "browser.screenshot"),
    ("/write", "file.write"),
    ("/notify", "comm.notify"),
];

#[derive(Debug, Clone)]
pub struct RoutedIntent {
    pub intent: String,
    pub confidence: f64,
    pub suggested_skill: Option<String>,
    pub alternatives: Vec<String>,
    pub urgency: Urgency,
    pub category: Option<Category>,
    pub entities: HashMap<String, String>,
    pub prepared_input: serde_json::Value,
}

pub struct IntentRouter {
    rules: Vec<Rule>,
}

impl IntentRouter {
    pub fn new() -> Self {
        Self {
            rules: rule_table(),
        }
    }

    pub fn route(&self, raw_input: &str) -> RoutedIntent {
        let trimmed = raw_input.trim();

        if let Some(routed) = self.direct_command(trimmed) {
            return routed;
        }

        let lower = trimmed.to_lowercase();
        let token_count = trimmed.split_whitespace().count();

        let mut best: Option<(usize, f64, &Rule, usize)> = None;
        for (idx, rule) in self.rules.iter().enumerate() {
            let matched = rule.matches(&lower);
            if matched == 0 {
                continue;
            }
            let entities = extract_entities(trimmed);
            let confidence = score(matched, token_count, !entities.is_empty());
            let better = match &best {
                None => true,
                // earlier rule wins on tie (strictly greater confidence required to replace)
                Some((_, best_conf, _, _)) => confidence > *best_conf,
            };
            if better {
                best = Some((idx, confidence, rule, matched));
            }
        }

        match best {
            Some((_, confidence, rule, _)) => {
                let entities = extract_entities(trimmed);
                let suggested = refine_skill(rule, trimmed);
                RoutedIntent {
                    intent: rule.name.to_string(),
                    confidence,
                    suggested_skill: Some(suggested),
                    alternatives: Vec::new(),
                    urgency: rule.base_urgency,
                    category: Some(rule.category),
                    entities: entities.clone(),
                    prepared_input: prepared_input(trimmed, &entities),
                }
            }
            None => self.fallback(trimmed),
        }
    }

    fn direct_command(&self, trimmed: &str) -> Option<RoutedIntent> {
        let mut parts = trimmed.splitn(2, char::is_whitespace);
        let head = parts.next()?;
        let rest = parts.next().unwrap_or("").to_string();

        DIRECT_COMMANDS
            .iter()
            .find(|(prefix, _)| *prefix == head)
            .map(|(_, skill)| RoutedIntent {
                intent: "direct_command".to_string(),
                confidence: 1.0,
                suggested_skill: Some(skill.to_string()),
                alternatives: Vec::new(),
                urgency: Urgency::Medium,
                category: None,
                entities: HashMap::new(),
                prepared_input: serde_json::json!({ "args": rest }),
            })
    }

    fn fallback(&self, trimmed: &str) -> RoutedIntent {
        if trimmed.ends_with('?') {
            RoutedIntent {
                intent: "ask_ai".to_string(),
                confidence: 0.5,
                suggested_skill: Some("ai.generate_text".to_string()),
                alternatives: Vec::new(),
                urgency: Urgency::Low,
                category: Some(Category::Ai),
                entities: HashMap::new(),
                prepared_input: serde_json::json!({ "prompt": trimmed }),
            }
        } else {
            RoutedIntent {
                intent: "unknown".to_string(),
                confidence: 0.0,
                suggested_skill: None,
                alternatives: Vec::new(),
                urgency: Urgency::Low,
                category: None,
                entities: HashMap::new(),
                prepared_input: serde_json::json!({ "raw_input": trimmed }),
            }
        }
    }
}

impl Default for IntentRouter {
    fn default() -> Self {
        Self::new()
    }
}

fn score(matched_patterns: usize, token_count: usize, entity_matched: bool) -> f64 {
    let mut confidence = 0.4
        + 0.2 * matched_patterns as f64
        + if token_count <= 5 { 0.1 } else { 0.0 }
        + if entity_matched { 0.05 } else { 0.0 };
    confidence = confidence.clamp(0.0, 1.0);
    confidence
}

fn extract_entities(input: &str) -> HashMap<String, String> {
    let mut entities = HashMap::new();
    if let Some(url) = rules::url_entity(input) {
        entities.insert("url".to_string(), url);
    }
    if let Some(path) = rules::path_entity(input) {
        entities.insert("path".to_string(), path);
    }
    entities
}

fn prepared_input(trimmed: &str, entities: &HashMap<String, String>) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    map.insert("raw_input".to_string(), serde_json::Value::String(trimmed.to_string()));
    for (k, v) in entities {
        map.insert(k.clone(), serde_json::Value::String(v.clone()));
    }
    serde_json::Value::Object(map)
}

/// Within the winning category, refine to a concrete sub-skill using a
/// small second pattern table (step 5 of the algorithm).
fn refine_skill(rule: &Rule, trimmed: &str) -> String {
    let lower = trimmed.to_lowercase();
    if rule.category == Category::Browser && lower.contains("screenshot") {
        return "browser.screenshot".to_string();
    }
    rule.default_skill.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_command_fast_path_has_full_confidence() {
        let router = IntentRouter::new();
        let routed = router.route("/shell rm -rf /tmp/build");
        assert_eq!(routed.confidence, 1.0);
        assert_eq!(routed.suggested_skill.as_deref(), Some("exec.shell"));
    }

    #[test]
    fn destructive_command_routes_to_exec_category() {
        let router = IntentRouter::new();
        let routed = router.route("execute rm -rf /");
        assert_eq!(routed.intent, "destructive_command");
        assert_eq!(routed.category, Some(Category::Exec));
    }

    #[test]
    fn trailing_question_mark_falls_back_to_ask_ai() {
        let router = IntentRouter::new();
        let routed = router.route("what is the weather today?");
        assert_eq!(routed.intent, "ask_ai");
        assert_eq!(routed.confidence, 0.5);
    }

    #[test]
    fn unrecognized_input_is_unknown_with_zero_confidence() {
        let router = IntentRouter::new();
        let routed = router.route("asdkjfh qwlekj");
        assert_eq!(routed.intent, "unknown");
        assert_eq!(routed.confidence, 0.0);
    }

    #[test]
    fn browse_web_refines_to_screenshot_subskill() {
        let router = IntentRouter::new();
        let routed = router.route("open the page and take a screenshot");
        assert_eq!(routed.suggested_skill.as_deref(), Some("browser.screenshot"));
    }

    #[test]
    fn earlier_rule_wins_on_confidence_tie() {
        // Both "generate_content" (earlier) and a hypothetical later rule could
        // match equally; ensure the earlier-declared rule is preferred when
        // match-derived confidence ties.
        let router = IntentRouter::new();
        let routed = router.route("gerar um texto de teste");
        assert_eq!(routed.intent, "generate_content");
    }
}
