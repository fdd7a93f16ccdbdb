//! The ordered rule table driving §4.2's rule-scoring step.

use crate::types::Category;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

pub struct Rule {
    pub name: &'static str,
    pub patterns: &'static [&'static str],
    pub category: Category,
    pub default_skill: &'static str,
    pub base_urgency: Urgency,
}

impl Rule {
    /// Number of patterns that match `input` (case-insensitive substring
    /// match on each pattern).
    pub fn matches(&self, input_lower: &str) -> usize {
        self.patterns
            .iter()
            .filter(|p| input_lower.contains(&p.to_lowercase()))
            .count()
    }
}

pub fn rule_table() -> Vec<Rule> {
    vec![
        Rule {
            name: "destructive_command",
            patterns: &["rm -rf", "drop table", "drop schema", "delete database"],
            category: Category::Exec,
            default_skill: "exec.shell",
            base_urgency: Urgency::Critical,
        },
        Rule {
            name: "generate_content",
            patterns: &["gerar", "generate", "write a", "escreva", "compose"],
            category: Category::Ai,
            default_skill: "ai.generate_text",
            base_urgency: Urgency::Low,
        },
        Rule {
            name: "browse_web",
            patterns: &["open ", "navigate", "screenshot", "browse"],
            category: Category::Browser,
            default_skill: "browser.screenshot",
            base_urgency: Urgency::Low,
        },
        Rule {
            name: "fetch_url",
            patterns: &["http://", "https://", "fetch", "download"],
            category: Category::Web,
            default_skill: "web.fetch",
            base_urgency: Urgency::Medium,
        },
        Rule {
            name: "write_file",
            patterns: &["save to", "write file", "create file"],
            category: Category::File,
            default_skill: "file.write",
            base_urgency: Urgency::Medium,
        },
        Rule {
            name: "notify",
            patterns: &["notify", "send a message", "tell the team"],
            category: Category::Comm,
            default_skill: "comm.notify",
            base_urgency: Urgency::Low,
        },
        Rule {
            name: "run_shell",
            patterns: &["execute", "run command", "shell"],
            category: Category::Exec,
            default_skill: "exec.shell",
            base_urgency: Urgency::High,
        },
    ]
}

/// URL capture used by entity extraction.
pub fn url_entity(input: &str) -> Option<String> {
    let re = Regex::new(r"https?://[^\s]+").unwrap();
    re.find(input).map(|m| m.as_str().to_string())
}

/// File path capture used by entity extraction (simple heuristic: a token
/// containing a path separator or a dot-extension).
pub fn path_entity(input: &str) -> Option<String> {
    input
        .split_whitespace()
        .find(|tok| tok.contains('/') || (tok.contains('.') && tok.len() > 2))
        .map(|s| s.trim_matches(|c: char| c.is_ascii_punctuation() && c != '/' && c != '.').to_string())
}
