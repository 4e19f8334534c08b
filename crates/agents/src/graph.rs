//! The executable description of a crew.

use crewroute_common::{CrewError, Result, TeamLabel};
use serde::Serialize;
use std::fmt;

use crate::templates::{RoleConfig, TaskConfig};
use crate::tools::FileToolset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessMode {
    /// Tasks run in order, each seeing the outputs before it.
    Sequential,
    /// A manager model briefs each role and consolidates the result.
    Hierarchical,
}

impl fmt::Display for ProcessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessMode::Sequential => f.write_str("sequential"),
            ProcessMode::Hierarchical => f.write_str("hierarchical"),
        }
    }
}

/// One crew member: a role template instance bound to a model.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    /// Template name, e.g. `developer`.
    pub key: String,
    pub config: RoleConfig,
    pub model: String,
    /// `None` for members that work without file access.
    pub tools: Option<FileToolset>,
}

impl AgentSpec {
    pub fn new(key: impl Into<String>, config: RoleConfig, model: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            config,
            model: model.into(),
            tools: None,
        }
    }

    pub fn with_tools(mut self, tools: FileToolset) -> Self {
        self.tools = Some(tools);
        self
    }
}

/// One unit of work, bound to an agent by index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub name: String,
    pub description: String,
    pub expected_output: String,
    pub agent: usize,
}

impl TaskSpec {
    pub fn from_template(name: impl Into<String>, template: &TaskConfig, agent: usize) -> Self {
        Self {
            name: name.into(),
            description: template.description.clone(),
            expected_output: template.expected_output.clone(),
            agent,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentGraph {
    /// The team this graph was built for. `None` for ad-hoc graphs.
    pub team: Option<TeamLabel>,
    pub agents: Vec<AgentSpec>,
    pub tasks: Vec<TaskSpec>,
    pub process: ProcessMode,
    /// Model that manages a hierarchical run.
    pub manager_model: Option<String>,
}

impl AgentGraph {
    pub fn new(team: Option<TeamLabel>, process: ProcessMode) -> Self {
        Self {
            team,
            agents: Vec::new(),
            tasks: Vec::new(),
            process,
            manager_model: None,
        }
    }

    /// Add an agent and return its index.
    pub fn add_agent(&mut self, agent: AgentSpec) -> usize {
        self.agents.push(agent);
        self.agents.len() - 1
    }

    pub fn add_task(&mut self, task: TaskSpec) {
        self.tasks.push(task);
    }

    pub fn with_manager_model(mut self, model: impl Into<String>) -> Self {
        self.manager_model = Some(model.into());
        self
    }

    pub fn agent(&self, index: usize) -> Option<&AgentSpec> {
        self.agents.get(index)
    }

    pub fn agent_by_key(&self, key: &str) -> Option<&AgentSpec> {
        self.agents.iter().find(|a| a.key == key)
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name.as_str()).collect()
    }

    /// Structural checks run before execution.
    pub fn validate(&self) -> Result<()> {
        if self.tasks.is_empty() {
            return Err(CrewError::Agent("crew has no tasks".into()));
        }
        if let Some(task) = self.tasks.iter().find(|t| t.agent >= self.agents.len()) {
            return Err(CrewError::Agent(format!(
                "task '{}' is assigned to unknown agent #{}",
                task.name, task.agent
            )));
        }
        if self.process == ProcessMode::Hierarchical && self.manager_model.is_none() {
            return Err(CrewError::Agent(
                "hierarchical crew needs a manager model".into(),
            ));
        }
        Ok(())
    }
}
