//! Name -> capability map with category/danger-aware lookup.

use super::Skill;
use crate::config::SafetyProfile;
use crate::error::{OperatorError, Result};
use crate::types::Category;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Debug, Default, Clone, Copy)]
pub struct SkillFilter {
    pub category: Option<Category>,
    pub dangerous: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryStats {
    pub total: usize,
    pub dangerous: usize,
    pub suppressed: usize,
}

/// Registers skills by name. Registration is idempotent for an identical
/// descriptor and conflicts on a name collision with a different one.
/// Skills flagged `dangerous=true` are suppressed (not stored) when the
/// active safety profile forbids them.
pub struct Registry {
    skills: DashMap<String, Arc<dyn Skill>>,
    safety_profile: SafetyProfile,
    suppressed: DashMap<String, ()>,
}

impl Registry {
    pub fn new(safety_profile: SafetyProfile) -> Self {
        Self {
            skills: DashMap::new(),
            safety_profile,
            suppressed: DashMap::new(),
        }
    }

    pub fn register(&self, skill: Arc<dyn Skill>) -> Result<()> {
        let descriptor = skill.describe();

        if descriptor.dangerous && self.safety_profile.suppresses_dangerous() {
            self.suppressed.insert(descriptor.name.clone(), ());
            return Ok(());
        }

        if let Some(existing) = self.skills.get(&descriptor.name) {
            let existing_descriptor = existing.describe();
            if descriptor_eq(&existing_descriptor, &descriptor) {
                return Ok(());
            }
            return Err(OperatorError::Conflict(format!(
                "skill '{}' already registered with a different descriptor",
                descriptor.name
            )));
        }

        self.skills.insert(descriptor.name.clone(), skill);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<dyn Skill>> {
        self.skills
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                if self.suppressed.contains_key(name) {
                    OperatorError::NotFound(format!(
                        "skill '{name}' is disabled under the active safety profile"
                    ))
                } else {
                    OperatorError::NotFound(format!("skill '{name}' is not registered"))
                }
            })
    }

    pub fn list(&self, filter: SkillFilter) -> Vec<crate::types::SkillDescriptor> {
        self.skills
            .iter()
            .map(|entry| entry.value().describe())
            .filter(|d| filter.category.map(|c| c == d.category).unwrap_or(true))
            .filter(|d| filter.dangerous.map(|dg| dg == d.dangerous).unwrap_or(true))
            .collect()
    }

    pub fn stats(&self) -> RegistryStats {
        let total = self.skills.len();
        let dangerous = self
            .skills
            .iter()
            .filter(|e| e.value().describe().dangerous)
            .count();
        RegistryStats {
            total,
            dangerous,
            suppressed: self.suppressed.len(),
        }
    }
}

fn descriptor_eq(a: &crate::types::SkillDescriptor, b: &crate::types::SkillDescriptor) -> bool {
    a.name == b.name
        && a.description == b.description
        && a.category == b.category
        && a.dangerous == b.dangerous
        && a.parameter_schema == b.parameter_schema
        && a.timeout_ms == b.timeout_ms
        && a.retries == b.retries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::builtin::NotifySkill;

    #[test]
    fn double_register_identical_descriptor_is_noop() {
        let reg = Registry::new(SafetyProfile::Normal);
        reg.register(Arc::new(NotifySkill)).unwrap();
        reg.register(Arc::new(NotifySkill)).unwrap();
        assert_eq!(reg.stats().total, 1);
    }

    #[test]
    fn lookup_unknown_skill_is_not_found() {
        let reg = Registry::new(SafetyProfile::Normal);
        let err = reg.lookup("nope").unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::NotFound);
    }

    #[test]
    fn strict_profile_suppresses_dangerous_skills() {
        use crate::skills::builtin::ShellSkill;
        let reg = Registry::new(SafetyProfile::Strict);
        reg.register(Arc::new(ShellSkill)).unwrap();
        assert_eq!(reg.stats().total, 0);
        assert_eq!(reg.stats().suppressed, 1);
        let err = reg.lookup("exec.shell").unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::NotFound);
    }
}
