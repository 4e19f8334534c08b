//! The six crews and the factory that builds them.
//!
//! Each crew is a static [`CrewBlueprint`]: which role templates it uses, the
//! model slot per member, per-member overrides, the ordered tasks and the
//! process mode. [`CrewFactory`] turns a blueprint into an [`AgentGraph`] for
//! a concrete working directory, taking the project's size into account.

use std::collections::BTreeSet;
use std::sync::Arc;

use crewroute_common::{CrewError, Result, TeamLabel, WorkDir};
use crewroute_llm::{ModelCatalog, ModelProvider, ModelSlot};
use tracing::{debug, info, warn};

use crate::graph::{AgentGraph, AgentSpec, ProcessMode, TaskSpec};
use crate::project_size::{self, ProjectSize};
use crate::summarizer;
use crate::templates::TemplateStore;
use crate::tools::FileToolset;

/// Heading under which a project summary is appended to a backstory.
pub const SUMMARY_HEADING: &str = "# PROJECT SUMMARY";

#[derive(Debug, Clone, Copy)]
pub struct MemberBlueprint {
    /// Member name inside the crew.
    pub key: &'static str,
    /// Role template the member is instantiated from.
    pub template: &'static str,
    pub slot: ModelSlot,
    pub goal: Option<&'static str>,
    pub backstory_suffix: Option<&'static str>,
}

impl MemberBlueprint {
    const fn plain(template: &'static str, slot: ModelSlot) -> Self {
        Self {
            key: template,
            template,
            slot,
            goal: None,
            backstory_suffix: None,
        }
    }

    const fn with_goal(mut self, goal: &'static str) -> Self {
        self.goal = Some(goal);
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TaskBlueprint {
    pub template: &'static str,
    /// Index into [`CrewBlueprint::members`].
    pub member: usize,
}

const fn task(template: &'static str, member: usize) -> TaskBlueprint {
    TaskBlueprint { template, member }
}

#[derive(Debug)]
pub struct CrewBlueprint {
    pub team: TeamLabel,
    pub members: &'static [MemberBlueprint],
    pub tasks: &'static [TaskBlueprint],
    pub process: ProcessMode,
    /// Member whose backstory receives the project summary.
    pub summary_target: usize,
}

use ModelSlot as S;

static SMALL: CrewBlueprint = CrewBlueprint {
    team: TeamLabel::Small,
    members: &[
        MemberBlueprint::plain("developer", S::Developer),
        MemberBlueprint::plain("tester", S::Tester),
    ],
    tasks: &[task("coding_task", 0), task("testing_task", 1)],
    process: ProcessMode::Sequential,
    summary_target: 0,
};

static STANDARD: CrewBlueprint = CrewBlueprint {
    team: TeamLabel::Standard,
    members: &[
        MemberBlueprint::plain("orchestrator", S::Orchestrator),
        MemberBlueprint::plain("developer", S::Developer),
        MemberBlueprint::plain("tester", S::Tester),
        MemberBlueprint::plain("documenter", S::Documenter),
    ],
    tasks: &[
        task("planning_task", 0),
        task("coding_task", 1),
        task("testing_task", 2),
        task("documentation_task", 3),
    ],
    process: ProcessMode::Hierarchical,
    summary_target: 0,
};

static FULLSTACK: CrewBlueprint = CrewBlueprint {
    team: TeamLabel::Fullstack,
    members: &[
        MemberBlueprint::plain("orchestrator", S::Orchestrator),
        MemberBlueprint::plain("architect", S::Architect),
        MemberBlueprint::plain("database_expert", S::Architect),
        MemberBlueprint::plain("backend_developer", S::Backend),
        MemberBlueprint::plain("frontend_developer", S::Developer),
        MemberBlueprint::plain("tester", S::Tester),
        MemberBlueprint::plain("devops_engineer", S::Devops),
        MemberBlueprint::plain("documenter", S::Documenter),
    ],
    tasks: &[
        task("planning_task", 0),
        task("architecture_task", 1),
        task("database_design_task", 2),
        task("backend_task", 3),
        task("frontend_task", 4),
        task("testing_task", 5),
        task("devops_task", 6),
        task("documentation_task", 7),
    ],
    process: ProcessMode::Hierarchical,
    summary_target: 0,
};

static SECURITY: CrewBlueprint = CrewBlueprint {
    team: TeamLabel::Security,
    members: &[
        MemberBlueprint::plain("security_expert", S::Security),
        MemberBlueprint::plain("code_reviewer", S::Reviewer),
        MemberBlueprint {
            key: "penetration_tester",
            template: "tester",
            slot: S::Developer,
            goal: Some("Find security vulnerabilities through penetration testing"),
            backstory_suffix: Some("Specialized in security testing."),
        },
        MemberBlueprint::plain("developer", S::Developer).with_goal("Implement security fixes"),
        MemberBlueprint::plain("documenter", S::Documenter),
    ],
    tasks: &[
        task("security_audit_task", 0),
        task("code_review_task", 1),
        task("penetration_test_task", 2),
        task("security_fix_task", 3),
        task("security_documentation_task", 4),
    ],
    process: ProcessMode::Sequential,
    summary_target: 0,
};

static REFACTORING: CrewBlueprint = CrewBlueprint {
    team: TeamLabel::Refactoring,
    members: &[
        MemberBlueprint::plain("code_reviewer", S::Reviewer),
        MemberBlueprint::plain("refactoring_expert", S::Refactoring),
        MemberBlueprint::plain("tester", S::Tester)
            .with_goal("Write regression tests that make sure the refactoring breaks nothing"),
        MemberBlueprint::plain("documenter", S::Documenter),
    ],
    tasks: &[
        task("code_review_task", 0),
        task("refactoring_task", 1),
        task("regression_test_task", 2),
        task("refactoring_documentation_task", 3),
    ],
    process: ProcessMode::Sequential,
    summary_target: 0,
};

static PERFORMANCE: CrewBlueprint = CrewBlueprint {
    team: TeamLabel::Performance,
    members: &[
        MemberBlueprint::plain("performance_expert", S::Performance),
        MemberBlueprint::plain("developer", S::Developer)
            .with_goal("Implement performance optimizations"),
        MemberBlueprint::plain("tester", S::Tester)
            .with_goal("Benchmark before and after and make sure functionality is preserved"),
    ],
    tasks: &[
        task("performance_optimization_task", 0),
        task("performance_implementation_task", 1),
        task("benchmark_task", 2),
    ],
    process: ProcessMode::Sequential,
    summary_target: 0,
};

impl CrewBlueprint {
    pub fn for_team(team: TeamLabel) -> &'static CrewBlueprint {
        match team {
            TeamLabel::Small => &SMALL,
            TeamLabel::Standard => &STANDARD,
            TeamLabel::Fullstack => &FULLSTACK,
            TeamLabel::Security => &SECURITY,
            TeamLabel::Refactoring => &REFACTORING,
            TeamLabel::Performance => &PERFORMANCE,
        }
    }

    pub fn all() -> impl Iterator<Item = &'static CrewBlueprint> {
        TeamLabel::ALL.into_iter().map(Self::for_team)
    }

    fn model_for(&self, member: &MemberBlueprint, catalog: &ModelCatalog, size: ProjectSize) -> String {
        match (member.slot, size) {
            (ModelSlot::Orchestrator, ProjectSize::Large) => {
                catalog.model(ModelSlot::LargeContext).to_string()
            }
            (slot, _) => catalog.model(slot).to_string(),
        }
    }
}

/// Role template names referenced by any crew.
pub fn required_roles() -> BTreeSet<&'static str> {
    CrewBlueprint::all()
        .flat_map(|b| b.members.iter().map(|m| m.template))
        .collect()
}

/// Task template names referenced by any crew.
pub fn required_tasks() -> BTreeSet<&'static str> {
    CrewBlueprint::all()
        .flat_map(|b| b.tasks.iter().map(|t| t.template))
        .collect()
}

/// Builds [`AgentGraph`]s from blueprints.
pub struct CrewFactory {
    templates: TemplateStore,
    catalog: ModelCatalog,
    provider: Arc<dyn ModelProvider>,
}

impl CrewFactory {
    /// Create a factory. Fails if `templates` lacks anything a crew needs.
    pub fn new(
        templates: TemplateStore,
        catalog: ModelCatalog,
        provider: Arc<dyn ModelProvider>,
    ) -> Result<Self> {
        templates.validate(required_roles(), required_tasks())?;
        Ok(Self {
            templates,
            catalog,
            provider,
        })
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    pub fn provider(&self) -> &Arc<dyn ModelProvider> {
        &self.provider
    }

    /// Build the crew for `team` in `work_dir`.
    ///
    /// Medium projects are summarized first. A failed summary only means the
    /// crew starts without one.
    pub async fn build(&self, team: TeamLabel, work_dir: &WorkDir) -> Result<AgentGraph> {
        let root = work_dir.root().to_path_buf();
        let size = tokio::task::spawn_blocking(move || project_size::classify(&root))
            .await
            .map_err(|e| CrewError::Agent(format!("Project size estimation failed: {e}")))?;

        info!(team = %team, project_size = %size, "Building crew");

        let summary = match size {
            ProjectSize::Medium => self.summarize(work_dir).await,
            ProjectSize::Small | ProjectSize::Large => None,
        };

        self.assemble(team, work_dir, size, summary.as_deref())
    }

    async fn summarize(&self, work_dir: &WorkDir) -> Option<String> {
        let model = self.catalog.model(ModelSlot::Summarizer);
        match self.provider.client(model) {
            Ok(client) => Some(summarizer::summarize(work_dir.root(), client.as_ref()).await),
            Err(e) => {
                warn!(error = %e, "Could not create summarizer client, continuing without summary");
                None
            }
        }
    }

    /// Instantiate a blueprint for a known project size and optional summary.
    pub fn assemble(
        &self,
        team: TeamLabel,
        work_dir: &WorkDir,
        size: ProjectSize,
        summary: Option<&str>,
    ) -> Result<AgentGraph> {
        let blueprint = CrewBlueprint::for_team(team);
        let tools = FileToolset::new(work_dir.clone());
        let mut graph = AgentGraph::new(Some(team), blueprint.process);

        for (index, member) in blueprint.members.iter().enumerate() {
            let mut config = self.templates.role(member.template)?.clone();
            if let Some(goal) = member.goal {
                config.goal = goal.to_string();
            }
            if let Some(suffix) = member.backstory_suffix {
                config.backstory = format!("{}\n\n{}", config.backstory.trim_end(), suffix);
            }
            if index == blueprint.summary_target {
                if let Some(summary) = summary {
                    config.backstory = format!(
                        "{}\n\n{}\n{}",
                        config.backstory.trim_end(),
                        SUMMARY_HEADING,
                        summary
                    );
                }
            }

            let model = blueprint.model_for(member, &self.catalog, size);
            debug!(team = %team, member = member.key, model = %model, "Adding crew member");
            graph.add_agent(AgentSpec::new(member.key, config, model).with_tools(tools.clone()));
        }

        for t in blueprint.tasks {
            let template = self.templates.task(t.template)?;
            graph.add_task(TaskSpec::from_template(t.template, template, t.member));
        }

        if blueprint.process == ProcessMode::Hierarchical {
            let manager = blueprint
                .members
                .iter()
                .find(|m| m.slot == ModelSlot::Orchestrator)
                .map(|m| blueprint.model_for(m, &self.catalog, size))
                .unwrap_or_else(|| self.catalog.model(ModelSlot::Orchestrator).to_string());
            graph = graph.with_manager_model(manager);
        }

        graph.validate()?;
        Ok(graph)
    }
}
