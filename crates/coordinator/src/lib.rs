//! Team routing and crew selection for crewroute.
//!
//! The selector is the entry point between the CLI and the crews:
//! 1. Decides which team handles a task (keywords or an LLM router)
//! 2. Builds that team's crew for the working directory
//! 3. Hands the crew to the execution engine
//!
//! # Architecture
//!
//! ```text
//! Task text
//!      │
//!      ▼
//! ┌─────────────────┐
//! │  CrewSelector   │  ◄── KeywordRouter | LlmRouter (falls back to standard)
//! └────────┬────────┘
//!          │ TeamLabel
//!          ▼
//!    CrewFactory::build ──► AgentGraph ──► ExecutionEngine
//! ```

pub mod config;
pub mod llm_router;
pub mod routing;
pub mod selector;

pub use config::{AppConfig, RouterMode};
pub use llm_router::{sanitize_label, LlmRouter};
pub use routing::{KeywordRouter, RouteDecision, RouteSource};
pub use selector::CrewSelector;
