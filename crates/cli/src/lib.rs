//! The `agents` command line.
//!
//! Usage:
//!   agents "Build a todo API"              # router picks the team
//!   agents --team security "Audit login"   # manual team
//!   agents --list                          # show all teams
//!
//! # Environment Variables
//!
//! - `OPENROUTER_API_KEY` - API key, required for task runs
//! - `USE_KEYWORD_ROUTER` - `1` selects offline keyword routing
//! - `RUST_LOG` - log filter (default: `warn`)

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use crewroute_agents::{CrewFactory, CrewOutput, LlmEngine};
use crewroute_common::{TeamLabel, WorkDir};
use crewroute_coordinator::{AppConfig, CrewSelector, RouterMode};
use crewroute_llm::{ModelProvider, OpenAiProvider};
use tracing::info;

/// Environment variable switching to keyword routing.
pub const KEYWORD_ROUTER_ENV: &str = "USE_KEYWORD_ROUTER";

const SEPARATOR_WIDTH: usize = 60;

const EXAMPLES: &str = "Examples:
  agents \"Create a FastAPI todo app\"
  agents \"Find security holes in my code\"
  agents \"Refactor main.py following clean code\"
  agents \"Optimize the performance of slow_function()\"
  agents --team small \"Fix the off-by-one in pagination\"

Teams (--team):
  small       fast and cheap (developer + tester)
  standard    balanced (orchestrator + developer + tester + documenter)
  fullstack   web applications (8 agents)
  security    security audits (5 agents)
  refactoring code quality (4 agents)
  performance performance work (3 agents)";

/// Multi-agent crews for software tasks
#[derive(Parser, Debug, Default)]
#[command(name = "agents")]
#[command(about = "Route a software task to the right multi-agent crew and run it")]
#[command(version, after_help = EXAMPLES)]
pub struct Cli {
    /// Use this team instead of routing (case-insensitive)
    #[arg(short, long, value_name = "NAME")]
    pub team: Option<String>,

    /// List all teams
    #[arg(short, long)]
    pub list: bool,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Working directory (default: current directory)
    #[arg(short, long, value_name = "PATH")]
    pub dir: Option<PathBuf>,

    /// The task, as one or more words
    #[arg(value_name = "TASK", trailing_var_arg = true)]
    pub task: Vec<String>,
}

/// What an invocation asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    List,
    Run(RunArgs),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArgs {
    pub task: String,
    pub team: Option<TeamLabel>,
    pub dir: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

impl Cli {
    fn is_empty(&self) -> bool {
        self.task.is_empty()
            && self.team.is_none()
            && !self.list
            && self.config.is_none()
            && self.dir.is_none()
    }

    /// Validate the arguments into a [`Command`].
    pub fn command(&self) -> Result<Command> {
        if self.is_empty() {
            return Ok(Command::Help);
        }
        if self.list {
            return Ok(Command::List);
        }

        let task = self.task.join(" ").trim().to_string();
        if task.is_empty() {
            bail!("No task given. Usage: agents \"your task\"");
        }

        let team = match &self.team {
            Some(name) => Some(
                name.parse::<TeamLabel>()
                    .with_context(|| format!("Unknown team '{name}'. See: agents --list"))?,
            ),
            None => None,
        };

        Ok(Command::Run(RunArgs {
            task,
            team,
            dir: self.dir.clone(),
            config: self.config.clone(),
        }))
    }
}

pub fn help_text() -> String {
    let mut cmd = <Cli as clap::CommandFactory>::command();
    cmd.render_long_help().to_string()
}

/// One line per team.
pub fn team_listing() -> String {
    let mut out = String::from("Available teams:\n\n");
    for team in TeamLabel::ALL {
        let d = team.descriptor();
        out.push_str(&format!(
            "  {:<12} {} [{} cost, {}]\n",
            team.as_str(),
            d.summary_line(),
            d.cost_tier,
            d.approx_cost
        ));
    }
    out.push_str("\nUsage: agents --team <name> \"your task\"\n");
    out
}

pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(AppConfig::default()),
    }
}

/// Fill in the API key from the environment unless the config has one.
pub fn resolve_api_key(
    config: &mut AppConfig,
    lookup: impl Fn(&str) -> Option<String>,
    work_dir: &Path,
) -> Result<()> {
    let from_config = config
        .provider
        .api_key
        .as_ref()
        .is_some_and(|k| !k.trim().is_empty());
    if from_config {
        return Ok(());
    }

    let var = config.provider.api_key_env.clone();
    match lookup(&var).filter(|k| !k.trim().is_empty()) {
        Some(key) => {
            config.provider.api_key = Some(key);
            Ok(())
        }
        None => bail!(
            "{var} is not set.\nCreate {} containing:\n  {var}=your-key",
            work_dir.join(".env").display()
        ),
    }
}

/// Wire templates, factory, engine and router together.
pub fn build_selector(
    config: &AppConfig,
    provider: Arc<dyn ModelProvider>,
    mode: RouterMode,
) -> Result<CrewSelector> {
    let templates = config
        .load_templates()
        .context("Failed to load role and task templates")?;
    let factory = CrewFactory::new(templates, config.models.clone(), provider.clone())
        .context("Templates do not cover every crew")?;
    let engine = Arc::new(LlmEngine::new(provider).with_temperature(config.provider.temperature));
    Ok(CrewSelector::new(mode, factory, engine))
}

fn separator(out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "{}", "-".repeat(SEPARATOR_WIDTH))
}

/// Select or build the crew, print what was chosen, run it and print the result.
pub async fn execute(
    selector: &CrewSelector,
    args: &RunArgs,
    work_dir: &WorkDir,
    out: &mut impl Write,
) -> Result<CrewOutput> {
    writeln!(out, "Working directory: {}", work_dir.root().display())?;
    writeln!(out, "Task: {}", args.task)?;
    separator(out)?;

    let graph = match args.team {
        Some(team) => {
            writeln!(out, "Manually selected: {}", team.descriptor().summary_line())?;
            selector.build(team, work_dir).await?
        }
        None => {
            writeln!(out, "Router is analysing the task...")?;
            let (graph, decision) = selector.select(&args.task, work_dir).await?;
            writeln!(
                out,
                "Router selected: {}",
                decision.team.descriptor().summary_line()
            )?;
            graph
        }
    };
    separator(out)?;
    out.flush()?;

    info!(team = ?graph.team, agents = graph.agents.len(), "Crew built");
    let output = selector
        .execute(&graph, &args.task)
        .await
        .context("Crew execution failed")?;

    writeln!(out)?;
    separator(out)?;
    writeln!(out, "Done.")?;
    separator(out)?;
    writeln!(out, "{}", output.final_output)?;
    Ok(output)
}

/// Run a validated task end to end with the real provider.
pub async fn run_task(
    args: &RunArgs,
    lookup: impl Fn(&str) -> Option<String>,
    out: &mut impl Write,
) -> Result<CrewOutput> {
    let dir = match &args.dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Cannot determine the current directory")?,
    };
    let work_dir = WorkDir::new(&dir)?;

    let mut config = load_config(args.config.as_deref())?;
    resolve_api_key(&mut config, &lookup, work_dir.root())?;

    let mode = RouterMode::from_toggle(lookup(KEYWORD_ROUTER_ENV).as_deref());
    let provider = Arc::new(OpenAiProvider::new(config.provider.clone())?);
    let selector = build_selector(&config, provider, mode)?;

    execute(&selector, args, &work_dir, out).await
}
