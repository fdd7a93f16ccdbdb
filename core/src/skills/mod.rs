//! Uniform callable capability surface (C1) and its registry (C2).

pub mod builtin;
pub mod registry;

use crate::error::{OperatorError, Result};
use crate::types::{SkillDescriptor, SkillOutcome};
use async_trait::async_trait;

/// A `Skill` is an external collaborator reached through a narrow,
/// polymorphic interface. What it actually does (AI calls, shell, file
/// I/O, browser automation) is out of scope for this crate.
#[async_trait]
pub trait Skill: Send + Sync {
    fn describe(&self) -> SkillDescriptor;

    async fn run(&self, params: serde_json::Value) -> Result<SkillOutcome>;

    /// Validate `params` against `describe().parameter_schema` before
    /// dispatch. The default implementation uses `jsonschema`; skills with
    /// exotic schemas may override it.
    fn validate(&self, params: &serde_json::Value) -> Result<()> {
        let descriptor = self.describe();
        let compiled = jsonschema::JSONSchema::compile(&descriptor.parameter_schema)
            .map_err(|e| OperatorError::Internal(format!("invalid schema: {e}")))?;
        if let Err(mut errors) = compiled.validate(params) {
            let first = errors
                .next()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "schema validation failed".to_string());
            return Err(OperatorError::Validation(first));
        }
        Ok(())
    }
}

impl std::fmt::Debug for dyn Skill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Skill")
            .field("name", &self.describe().name)
            .finish()
    }
}
