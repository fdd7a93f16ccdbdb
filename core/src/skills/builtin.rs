//! Thin stub skills so the registry is never empty and the end-to-end
//! scenarios in the design have something real to dispatch. Real execution
//! backends (AI calls, shells, browsers) live outside this crate; these
//! stand in for them with deterministic canned output.

use super::Skill;
use crate::error::Result;
use crate::types::{Category, SkillDescriptor, SkillOutcome};
use async_trait::async_trait;
use serde_json::json;

fn schema(required: &[&str]) -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {},
        "required": required,
    })
}

pub struct GenerateTextSkill;

#[async_trait]
impl Skill for GenerateTextSkill {
    fn describe(&self) -> SkillDescriptor {
        SkillDescriptor {
            name: "ai.generate_text".into(),
            description: "Generate text from a prompt via the configured model".into(),
            category: Category::Ai,
            dangerous: false,
            parameter_schema: schema(&["prompt"]),
            timeout_ms: 30_000,
            retries: 2,
        }
    }

    async fn run(&self, params: serde_json::Value) -> Result<SkillOutcome> {
        self.validate(&params)?;
        let prompt = params
            .get("prompt")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        Ok(SkillOutcome::ok(json!({
            "text": format!("[stub generation for prompt of {} chars]", prompt.len()),
        })))
    }
}

pub struct WebFetchSkill;

#[async_trait]
impl Skill for WebFetchSkill {
    fn describe(&self) -> SkillDescriptor {
        SkillDescriptor {
            name: "web.fetch".into(),
            description: "Fetch a URL and return its body".into(),
            category: Category::Web,
            dangerous: false,
            parameter_schema: schema(&["url"]),
            timeout_ms: 15_000,
            retries: 2,
        }
    }

    async fn run(&self, params: serde_json::Value) -> Result<SkillOutcome> {
        self.validate(&params)?;
        let url = params.get("url").and_then(|v| v.as_str()).unwrap_or("");
        Ok(SkillOutcome::ok(json!({ "url": url, "status": 200, "body": "" })))
    }
}

pub struct BrowserScreenshotSkill;

#[async_trait]
impl Skill for BrowserScreenshotSkill {
    fn describe(&self) -> SkillDescriptor {
        SkillDescriptor {
            name: "browser.screenshot".into(),
            description: "Capture a screenshot of the current browser view".into(),
            category: Category::Browser,
            dangerous: false,
            parameter_schema: schema(&[]),
            timeout_ms: 20_000,
            retries: 1,
        }
    }

    async fn run(&self, _params: serde_json::Value) -> Result<SkillOutcome> {
        Ok(SkillOutcome::ok(json!({ "path": "stub-screenshot.png" })))
    }
}

pub struct ShellSkill;

#[async_trait]
impl Skill for ShellSkill {
    fn describe(&self) -> SkillDescriptor {
        SkillDescriptor {
            name: "exec.shell".into(),
            description: "Run a shell command on the host".into(),
            category: Category::Exec,
            dangerous: true,
            parameter_schema: schema(&["command"]),
            timeout_ms: 60_000,
            retries: 0,
        }
    }

    async fn run(&self, params: serde_json::Value) -> Result<SkillOutcome> {
        self.validate(&params)?;
        let command = params
            .get("command")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        Ok(SkillOutcome::ok(
            json!({ "command": command, "exit_code": 0, "stdout": "" }),
        ))
    }
}

pub struct FileWriteSkill;

#[async_trait]
impl Skill for FileWriteSkill {
    fn describe(&self) -> SkillDescriptor {
        SkillDescriptor {
            name: "file.write".into(),
            description: "Write content to a file path".into(),
            category: Category::File,
            dangerous: true,
            parameter_schema: schema(&["path", "content"]),
            timeout_ms: 10_000,
            retries: 1,
        }
    }

    async fn run(&self, params: serde_json::Value) -> Result<SkillOutcome> {
        self.validate(&params)?;
        let path = params.get("path").and_then(|v| v.as_str()).unwrap_or("");
        Ok(SkillOutcome::ok(json!({ "path": path, "bytes_written": 0 })))
    }
}

pub struct NotifySkill;

#[async_trait]
impl Skill for NotifySkill {
    fn describe(&self) -> SkillDescriptor {
        SkillDescriptor {
            name: "comm.notify".into(),
            description: "Send a notification to the originating channel".into(),
            category: Category::Comm,
            dangerous: false,
            parameter_schema: schema(&["message"]),
            timeout_ms: 5_000,
            retries: 2,
        }
    }

    async fn run(&self, params: serde_json::Value) -> Result<SkillOutcome> {
        self.validate(&params)?;
        Ok(SkillOutcome::ok(json!({ "delivered": true })))
    }
}

/// Register every built-in reference skill. Dangerous ones are silently
/// suppressed by the registry itself under a strict safety profile.
pub fn register_all(registry: &super::registry::Registry) -> Result<()> {
    use std::sync::Arc;
    registry.register(Arc::new(GenerateTextSkill))?;
    registry.register(Arc::new(WebFetchSkill))?;
    registry.register(Arc::new(BrowserScreenshotSkill))?;
    registry.register(Arc::new(ShellSkill))?;
    registry.register(Arc::new(FileWriteSkill))?;
    registry.register(Arc::new(NotifySkill))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SafetyProfile;
    use crate::skills::registry::Registry;

    #[tokio::test]
    async fn generate_text_rejects_missing_prompt() {
        let skill = GenerateTextSkill;
        let err = skill.run(json!({})).await.unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::Validation);
    }

    #[test]
    fn register_all_populates_registry_in_normal_profile() {
        let registry = Registry::new(SafetyProfile::Normal);
        register_all(&registry).unwrap();
        assert_eq!(registry.stats().total, 6);
    }
}
