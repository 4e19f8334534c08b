//! Role and task templates.
//!
//! Templates are YAML maps keyed by name. The bundled set ships inside the
//! binary; a directory containing `agents.yaml` and `tasks.yaml` can replace
//! it. Either way the store is validated once, up front, against every name
//! the crews reference.

use crewroute_common::{CrewError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

const BUNDLED_AGENTS: &str = include_str!("../config/agents.yaml");
const BUNDLED_TASKS: &str = include_str!("../config/tasks.yaml");

/// A named persona template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleConfig {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    #[serde(default)]
    pub allow_delegation: bool,
}

/// A unit-of-work template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
    pub description: String,
    pub expected_output: String,
}

#[derive(Debug, Clone)]
pub struct TemplateStore {
    roles: BTreeMap<String, RoleConfig>,
    tasks: BTreeMap<String, TaskConfig>,
}

impl TemplateStore {
    /// The templates compiled into the binary.
    pub fn bundled() -> Result<Self> {
        Self::from_yaml(BUNDLED_AGENTS, BUNDLED_TASKS)
    }

    /// Load `agents.yaml` and `tasks.yaml` from `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let read = |name: &str| {
            let path = dir.join(name);
            std::fs::read_to_string(&path).map_err(|e| {
                CrewError::Template(format!("Failed to read {}: {}", path.display(), e))
            })
        };

        debug!(dir = %dir.display(), "Loading templates");
        Self::from_yaml(&read("agents.yaml")?, &read("tasks.yaml")?)
    }

    pub fn from_yaml(agents_yaml: &str, tasks_yaml: &str) -> Result<Self> {
        let roles: BTreeMap<String, RoleConfig> = serde_yaml::from_str(agents_yaml)
            .map_err(|e| CrewError::Template(format!("Invalid agents.yaml: {e}")))?;
        let tasks: BTreeMap<String, TaskConfig> = serde_yaml::from_str(tasks_yaml)
            .map_err(|e| CrewError::Template(format!("Invalid tasks.yaml: {e}")))?;

        Ok(Self { roles, tasks })
    }

    /// Check that every listed role and task exists and has non-empty text.
    pub fn validate<'a>(
        &self,
        roles: impl IntoIterator<Item = &'a str>,
        tasks: impl IntoIterator<Item = &'a str>,
    ) -> Result<()> {
        let mut problems = Vec::new();

        for name in roles {
            match self.roles.get(name) {
                None => problems.push(format!("missing role '{name}'")),
                Some(r) if r.role.trim().is_empty() => {
                    problems.push(format!("role '{name}' has an empty role"))
                }
                Some(r) if r.goal.trim().is_empty() => {
                    problems.push(format!("role '{name}' has an empty goal"))
                }
                Some(r) if r.backstory.trim().is_empty() => {
                    problems.push(format!("role '{name}' has an empty backstory"))
                }
                Some(_) => {}
            }
        }

        for name in tasks {
            match self.tasks.get(name) {
                None => problems.push(format!("missing task '{name}'")),
                Some(t) if t.description.trim().is_empty() => {
                    problems.push(format!("task '{name}' has an empty description"))
                }
                Some(t) if t.expected_output.trim().is_empty() => {
                    problems.push(format!("task '{name}' has an empty expected_output"))
                }
                Some(_) => {}
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            problems.dedup();
            Err(CrewError::Template(problems.join("; ")))
        }
    }

    pub fn role(&self, name: &str) -> Result<&RoleConfig> {
        self.roles
            .get(name)
            .ok_or_else(|| CrewError::Template(format!("missing role '{name}'")))
    }

    pub fn task(&self, name: &str) -> Result<&TaskConfig> {
        self.tasks
            .get(name)
            .ok_or_else(|| CrewError::Template(format!("missing task '{name}'")))
    }
}
