//! Tests for the `agents` binary and the run pipeline behind it.

use async_trait::async_trait;
use crewroute_cli::{build_selector, execute, RunArgs};
use crewroute_common::{CrewError, Result, TeamLabel, WorkDir};
use crewroute_coordinator::{AppConfig, RouterMode};
use crewroute_llm::{LlmClient, LlmRequest, LlmResponse, ModelProvider};
use std::collections::VecDeque;
use std::process::Command;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ============================================================================
// Binary
// ============================================================================

fn agents(dir: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_agents"));
    cmd.current_dir(dir.path())
        .env_remove("OPENROUTER_API_KEY")
        .env_remove("USE_KEYWORD_ROUTER")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn no_arguments_prints_help() {
    let dir = TempDir::new().unwrap();
    let output = agents(&dir).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--team"));
    assert!(stdout.contains("Examples:"));
}

#[test]
fn list_shows_all_teams() {
    let dir = TempDir::new().unwrap();
    let output = agents(&dir).arg("--list").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for team in TeamLabel::ALL {
        assert!(stdout.contains(team.as_str()), "missing {team}");
    }
}

#[test]
fn unknown_team_exits_with_failure() {
    let dir = TempDir::new().unwrap();
    let output = agents(&dir)
        .args(["--team", "marketing", "write a slogan"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unknown team 'marketing'"));
    assert!(stderr.contains("agents --list"));
}

#[test]
fn missing_task_exits_with_failure() {
    let dir = TempDir::new().unwrap();
    let output = agents(&dir).args(["--team", "small"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("No task given"));
}

#[test]
fn missing_api_key_exits_with_hint() {
    let dir = TempDir::new().unwrap();
    let output = agents(&dir).arg("fix the login bug").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("OPENROUTER_API_KEY is not set"));
    assert!(stderr.contains(".env"));
}

// ============================================================================
// Run pipeline
// ============================================================================

struct ScriptedClient {
    model: String,
    replies: Arc<Mutex<VecDeque<String>>>,
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn complete(&self, _request: LlmRequest) -> Result<LlmResponse> {
        let content = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| CrewError::Llm("no scripted reply left".into()))?;
        Ok(LlmResponse {
            content,
            model: self.model.clone(),
            usage: None,
            finish_reason: None,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

struct ScriptedProvider(Arc<Mutex<VecDeque<String>>>);

impl ScriptedProvider {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self(Arc::new(Mutex::new(
            replies.iter().map(|r| r.to_string()).collect(),
        ))))
    }
}

impl ModelProvider for ScriptedProvider {
    fn client(&self, model: &str) -> Result<Arc<dyn LlmClient>> {
        Ok(Arc::new(ScriptedClient {
            model: model.to_string(),
            replies: self.0.clone(),
        }))
    }
}

fn run_args(task: &str, team: Option<TeamLabel>) -> RunArgs {
    RunArgs {
        task: task.to_string(),
        team,
        dir: None,
        config: None,
    }
}

#[tokio::test]
async fn keyword_routed_run_prints_selection_and_result() {
    let dir = TempDir::new().unwrap();
    let wd = WorkDir::new(dir.path()).unwrap();
    let provider = ScriptedProvider::new(&["Fixed the parser", "All tests pass"]);
    let selector = build_selector(&AppConfig::default(), provider, RouterMode::Keyword).unwrap();

    let mut out = Vec::new();
    let output = execute(&selector, &run_args("fix bug in parser", None), &wd, &mut out)
        .await
        .unwrap();

    assert_eq!(output.team, Some(TeamLabel::Small));
    assert_eq!(output.final_output, "All tests pass");

    let printed = String::from_utf8(out).unwrap();
    assert!(printed.contains("Task: fix bug in parser"));
    assert!(printed.contains(&format!(
        "Router selected: {}",
        TeamLabel::Small.descriptor().summary_line()
    )));
    assert!(printed.contains("Done."));
    assert!(printed.trim_end().ends_with("All tests pass"));
}

#[tokio::test]
async fn manual_team_skips_the_router() {
    let dir = TempDir::new().unwrap();
    let wd = WorkDir::new(dir.path()).unwrap();
    // In LLM mode a router call would consume the first reply.
    let provider = ScriptedProvider::new(&["Profiled", "Optimised", "Benchmarked"]);
    let selector = build_selector(&AppConfig::default(), provider, RouterMode::Llm).unwrap();

    let mut out = Vec::new();
    let output = execute(
        &selector,
        &run_args("speed it up", Some(TeamLabel::Performance)),
        &wd,
        &mut out,
    )
    .await
    .unwrap();

    assert_eq!(output.steps.len(), 3);
    assert_eq!(output.final_output, "Benchmarked");
    let printed = String::from_utf8(out).unwrap();
    assert!(printed.contains("Manually selected: Performance"));
    assert!(!printed.contains("Router selected"));
}

#[tokio::test]
async fn crew_failure_is_reported() {
    let dir = TempDir::new().unwrap();
    let wd = WorkDir::new(dir.path()).unwrap();
    let provider = ScriptedProvider::new(&["only one reply"]);
    let selector = build_selector(&AppConfig::default(), provider, RouterMode::Keyword).unwrap();

    let mut out = Vec::new();
    let err = execute(&selector, &run_args("fix typo", None), &wd, &mut out)
        .await
        .unwrap_err();
    assert!(format!("{err:?}").contains("Crew execution failed"));
    assert!(!String::from_utf8(out).unwrap().contains("Done."));
}
