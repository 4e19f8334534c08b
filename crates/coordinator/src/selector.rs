//! Team selection and crew dispatch.

use std::sync::Arc;

use crewroute_agents::{AgentGraph, CrewFactory, CrewOutput, ExecutionEngine, KickoffInputs};
use crewroute_common::{Result, TeamLabel, WorkDir};
use crewroute_llm::ModelSlot;
use tracing::info;

use crate::config::RouterMode;
use crate::llm_router::LlmRouter;
use crate::routing::{KeywordRouter, RouteDecision, RouteSource};

/// Picks a team for a task and builds its crew.
///
/// In [`RouterMode::Keyword`] no model is contacted for routing. In
/// [`RouterMode::Llm`] the router model decides, falling back to `standard`.
pub struct CrewSelector {
    mode: RouterMode,
    keyword: KeywordRouter,
    llm: LlmRouter,
    factory: CrewFactory,
    engine: Arc<dyn ExecutionEngine>,
}

impl CrewSelector {
    pub fn new(mode: RouterMode, factory: CrewFactory, engine: Arc<dyn ExecutionEngine>) -> Self {
        let router_model = factory.catalog().model(ModelSlot::Router).to_string();
        Self {
            mode,
            keyword: KeywordRouter::new(),
            llm: LlmRouter::new(engine.clone(), router_model),
            factory,
            engine,
        }
    }

    pub fn mode(&self) -> RouterMode {
        self.mode
    }

    pub fn factory(&self) -> &CrewFactory {
        &self.factory
    }

    /// Decide which team handles `task`.
    pub async fn route(&self, task: &str) -> RouteDecision {
        match self.mode {
            RouterMode::Keyword => {
                RouteDecision::new(self.keyword.classify(task), RouteSource::Keyword)
            }
            RouterMode::Llm => self.llm.classify(task, &TeamLabel::ALL).await,
        }
    }

    /// Route `task` and build the chosen crew in `work_dir`.
    pub async fn select(
        &self,
        task: &str,
        work_dir: &WorkDir,
    ) -> Result<(AgentGraph, RouteDecision)> {
        let decision = self.route(task).await;
        info!(team = %decision.team, source = %decision.source, "Team selected");
        let graph = self.factory.build(decision.team, work_dir).await?;
        Ok((graph, decision))
    }

    /// Build a manually chosen team without routing.
    pub async fn build(&self, team: TeamLabel, work_dir: &WorkDir) -> Result<AgentGraph> {
        info!(team = %team, source = %RouteSource::Manual, "Team selected");
        self.factory.build(team, work_dir).await
    }

    /// Run a built crew on `task`.
    pub async fn execute(&self, graph: &AgentGraph, task: &str) -> Result<CrewOutput> {
        self.engine.kickoff(graph, &KickoffInputs::new(task)).await
    }
}
