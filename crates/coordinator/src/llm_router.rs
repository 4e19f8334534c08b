//! LLM-based team selection.
//!
//! A one-member crew with a single task is asked to answer with a team name.
//! The answer is whitelisted against the known labels. Anything unusable, and
//! any error on the way, ends in `standard`.

use std::sync::Arc;

use crewroute_agents::{
    AgentGraph, AgentSpec, ExecutionEngine, KickoffInputs, ProcessMode, RoleConfig, TaskSpec,
};
use crewroute_common::{CrewError, Result, TeamLabel};
use tracing::{debug, info, warn};

use crate::routing::{RouteDecision, RouteSource};

const ROUTER_ROLE: &str = "Team Router & Task Analyzer";
const ROUTER_GOAL: &str = "Analyse the task and pick the best team for it";
const ROUTER_KEY: &str = "router";
const ROUTING_TASK: &str = "routing_task";

/// Maximum task text length forwarded to the model.
const MAX_TASK_CHARS: usize = 10_000;

fn router_backstory(available: &[TeamLabel]) -> String {
    let mut teams = String::new();
    for (i, team) in available.iter().enumerate() {
        let d = team.descriptor();
        teams.push_str(&format!(
            "{}. **{}** - {} agents ({})\n   For: {}\n   Cost: {}\n\n",
            i + 1,
            team.as_str(),
            d.role_count,
            d.roles,
            d.use_for,
            d.approx_cost
        ));
    }

    let names: Vec<&str> = available.iter().map(|t| t.as_str()).collect();

    format!(
        "You are an expert at analysing tasks and picking the best team for them.\n\n\
         Available teams:\n\n{teams}\
         Your job: analyse the user's request and choose THE BEST team.\n\n\
         Answer format (only the team name, nothing else): {}",
        names.join(" OR ")
    )
}

fn routing_task_description(available: &[TeamLabel]) -> String {
    let names: Vec<&str> = available.iter().map(|t| t.as_str()).collect();
    format!(
        "Analyse this task and choose the best team:\n\n\"{{topic}}\"\n\n\
         Consider:\n\
         - How complex is the task?\n\
         - Which skills are needed?\n\
         - Is it a web application (fullstack)?\n\
         - Is it about security (security)?\n\
         - Should existing code be improved (refactoring)?\n\
         - Is it about performance (performance)?\n\
         - Is it small and simple (small)?\n\
         - Or a regular project (standard)?\n\n\
         Answer ONLY with the team name (one word): {}",
        names.join(", ")
    )
}

/// Turn a free-form answer into a label.
///
/// The trimmed, lowercased answer is accepted if it is a label. Otherwise the
/// first label (in [`TeamLabel::ALL`] order) found as a substring wins, so an
/// answer mentioning both "small" and "standard" resolves to `small`.
pub fn sanitize_label(raw: &str) -> Option<TeamLabel> {
    let answer = raw.trim().to_lowercase();
    if let Ok(team) = answer.parse::<TeamLabel>() {
        return Some(team);
    }
    TeamLabel::ALL
        .into_iter()
        .find(|team| answer.contains(team.as_str()))
}

/// Routes tasks by asking a model through an [`ExecutionEngine`].
pub struct LlmRouter {
    engine: Arc<dyn ExecutionEngine>,
    model: String,
}

impl LlmRouter {
    pub fn new(engine: Arc<dyn ExecutionEngine>, model: impl Into<String>) -> Self {
        Self {
            engine,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// The single-member graph used for one routing call.
    pub fn routing_graph(&self, available: &[TeamLabel]) -> AgentGraph {
        let mut graph = AgentGraph::new(None, ProcessMode::Sequential);
        let router = graph.add_agent(AgentSpec::new(
            ROUTER_KEY,
            RoleConfig {
                role: ROUTER_ROLE.to_string(),
                goal: ROUTER_GOAL.to_string(),
                backstory: router_backstory(available),
                allow_delegation: false,
            },
            self.model.clone(),
        ));
        graph.add_task(TaskSpec {
            name: ROUTING_TASK.to_string(),
            description: routing_task_description(available),
            expected_output: format!(
                "A single word: the name of the best team ({})",
                available
                    .iter()
                    .map(|t| t.as_str())
                    .collect::<Vec<_>>()
                    .join("/")
            ),
            agent: router,
        });
        graph
    }

    /// Ask the router model for a team among `available`.
    ///
    /// Engine failures and answers that name no offered team are
    /// [`CrewError::Routing`] errors.
    pub async fn try_classify(&self, task: &str, available: &[TeamLabel]) -> Result<TeamLabel> {
        let topic: String = task.chars().take(MAX_TASK_CHARS).collect();
        let graph = self.routing_graph(available);

        let output = self
            .engine
            .kickoff(&graph, &KickoffInputs::new(topic))
            .await
            .map_err(|e| CrewError::Routing(format!("Router failed: {e}")))?
            .final_output;

        debug!(answer = %output, "Router answer");

        match sanitize_label(&output) {
            Some(team) if available.contains(&team) => Ok(team),
            _ => Err(CrewError::Routing(format!(
                "Router answer is not a known team: '{}'",
                output.chars().take(200).collect::<String>()
            ))),
        }
    }

    /// Pick a team for `task` among `available`. Never fails.
    pub async fn classify(&self, task: &str, available: &[TeamLabel]) -> RouteDecision {
        let all = TeamLabel::ALL;
        let available = if available.is_empty() {
            &all[..]
        } else {
            available
        };

        match self.try_classify(task, available).await {
            Ok(team) => {
                info!(team = %team, "Router selected team");
                RouteDecision::new(team, RouteSource::Llm)
            }
            Err(e) => {
                warn!(error = %e, "Using standard team");
                RouteDecision::fallback()
            }
        }
    }
}
