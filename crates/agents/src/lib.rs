//! Crews for crewroute.
//!
//! This crate turns a team label into a runnable crew:
//!
//! - **Templates**: role and task templates loaded from YAML
//! - **Crews**: six static blueprints and the [`CrewFactory`] that builds them
//! - **Tools**: file tools confined to the working directory
//! - **Project size**: token estimate deciding model choice and summarization
//! - **Engine**: the [`ExecutionEngine`] seam and the built-in [`LlmEngine`]
//!
//! ```text
//! TeamLabel ──► CrewBlueprint ──► CrewFactory::build ──► AgentGraph ──► ExecutionEngine
//!                                     │
//!                                     ├── project_size::classify
//!                                     └── summarizer::summarize (medium projects)
//! ```

pub mod crews;
pub mod engine;
pub mod graph;
pub mod project_size;
pub mod summarizer;
pub mod templates;
pub mod tools;

pub use crews::{CrewBlueprint, CrewFactory, MemberBlueprint, TaskBlueprint};
pub use engine::{CrewOutput, ExecutionEngine, KickoffInputs, LlmEngine, StepResult};
pub use graph::{AgentGraph, AgentSpec, ProcessMode, TaskSpec};
pub use project_size::ProjectSize;
pub use templates::{RoleConfig, TaskConfig, TemplateStore};
pub use tools::{FileToolset, ToolCall, ToolKind};
