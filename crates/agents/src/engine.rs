//! Crew execution.
//!
//! [`ExecutionEngine`] is the seam between crew construction and whatever
//! runs the crew. [`LlmEngine`] is the built-in runner:
//!
//! - Sequential: tasks run in order, each receiving the previous outputs as
//!   context
//! - Hierarchical: the manager model writes a brief before each task and
//!   consolidates the final answer after the last one
//!
//! A member with tools may answer with a single JSON object
//! `{"tool": "...", "args": {...}}`; the tool runs and its result is sent
//! back, up to [`MAX_TOOL_ROUNDS`] times per task. Any model error aborts the
//! run.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use crewroute_common::{CrewError, Result, TeamLabel};
use crewroute_llm::{ChatMessage, LlmClient, LlmRequest, ModelProvider};
use tracing::{debug, info, warn};

use crate::graph::{AgentGraph, AgentSpec, ProcessMode, TaskSpec};
use crate::tools::ToolCall;

/// Tool calls allowed per task before a final answer is demanded.
pub const MAX_TOOL_ROUNDS: usize = 8;

const CONTEXT_HEADER: &str = "--- Previous Agent Output ---";
const BRIEF_HEADER: &str = "--- Manager Brief ---";

/// Runs an [`AgentGraph`] to completion.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    async fn kickoff(&self, graph: &AgentGraph, inputs: &KickoffInputs) -> Result<CrewOutput>;
}

/// Values interpolated into templates at kickoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KickoffInputs {
    pub topic: String,
}

impl KickoffInputs {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
        }
    }

    /// Replace every `{topic}` placeholder in `text`.
    pub fn interpolate(&self, text: &str) -> String {
        text.replace("{topic}", &self.topic)
    }
}

/// Output of a single task.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub task: String,
    /// Key of the member that ran the task.
    pub agent: String,
    pub output: String,
    pub tool_calls: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone)]
pub struct CrewOutput {
    pub team: Option<TeamLabel>,
    pub steps: Vec<StepResult>,
    /// The crew's answer: the last task's output, or the manager's
    /// consolidation for hierarchical runs.
    pub final_output: String,
    pub duration_ms: u64,
}

impl fmt::Display for CrewOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.final_output)
    }
}

/// Parse a reply that consists of nothing but a tool call object. A single
/// surrounding code fence is tolerated.
pub fn parse_tool_call(reply: &str) -> Option<ToolCall> {
    let mut text = reply.trim();
    if let Some(inner) = text.strip_prefix("```") {
        let inner = inner.strip_prefix("json").unwrap_or(inner);
        text = inner.strip_suffix("```")?.trim();
    }
    if !(text.starts_with('{') && text.ends_with('}')) {
        return None;
    }
    serde_json::from_str::<ToolCall>(text)
        .ok()
        .filter(|call| !call.tool.trim().is_empty())
}

/// [`ExecutionEngine`] that talks to models through a [`ModelProvider`].
pub struct LlmEngine {
    provider: Arc<dyn ModelProvider>,
    temperature: Option<f32>,
}

impl LlmEngine {
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            provider,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    fn client_for(
        &self,
        cache: &mut HashMap<String, Arc<dyn LlmClient>>,
        model: &str,
    ) -> Result<Arc<dyn LlmClient>> {
        if let Some(client) = cache.get(model) {
            return Ok(client.clone());
        }
        let client = self
            .provider
            .client(model)
            .map_err(|e| CrewError::Engine(format!("No client for model '{model}': {e}")))?;
        cache.insert(model.to_string(), client.clone());
        Ok(client)
    }

    async fn ask(&self, client: &dyn LlmClient, mut request: LlmRequest) -> Result<String> {
        request.temperature = self.temperature;
        let response = client
            .complete(request)
            .await
            .map_err(|e| CrewError::Engine(format!("{} failed: {}", client.model_name(), e)))?;
        Ok(response.content)
    }

    fn system_prompt(agent: &AgentSpec, inputs: &KickoffInputs) -> String {
        let mut prompt = format!(
            "You are {}.\n{}\n\nYour personal goal is: {}",
            inputs.interpolate(&agent.config.role),
            inputs.interpolate(agent.config.backstory.trim_end()),
            inputs.interpolate(agent.config.goal.trim_end()),
        );

        if let Some(tools) = &agent.tools {
            prompt.push_str(&format!(
                "\n\nYou work in the directory {} and can use these tools:\n{}\n\n\
                 To use a tool, reply with ONLY a JSON object of the form \
                 {{\"tool\": \"<name>\", \"args\": {{...}}}}. You will receive the tool \
                 result and can continue. When you are done, reply with your final answer \
                 as plain text.",
                tools.work_dir().root().display(),
                tools.describe()
            ));
        }

        prompt
    }

    fn task_prompt(
        task: &TaskSpec,
        inputs: &KickoffInputs,
        brief: Option<&str>,
        context: Option<&str>,
    ) -> String {
        let mut prompt = format!(
            "Current task: {}\n\nThis is the expected criteria for your final answer: {}",
            inputs.interpolate(task.description.trim_end()),
            inputs.interpolate(task.expected_output.trim_end()),
        );
        if let Some(brief) = brief {
            prompt.push_str(&format!("\n\n{BRIEF_HEADER}\n{brief}"));
        }
        if let Some(context) = context {
            prompt.push_str(&format!("\n\n{CONTEXT_HEADER}\n{context}"));
        }
        prompt
    }

    /// Run one task to its final answer, serving tool calls along the way.
    async fn run_task(
        &self,
        client: &dyn LlmClient,
        agent: &AgentSpec,
        task: &TaskSpec,
        inputs: &KickoffInputs,
        brief: Option<&str>,
        context: Option<&str>,
    ) -> Result<(String, usize)> {
        let system = Self::system_prompt(agent, inputs);
        let mut messages = vec![ChatMessage::user(Self::task_prompt(
            task, inputs, brief, context,
        ))];
        let mut tool_calls = 0;

        loop {
            let request = LlmRequest {
                system_prompt: Some(system.clone()),
                messages: messages.clone(),
                ..Default::default()
            };
            let reply = self.ask(client, request).await?;

            let call = match (&agent.tools, parse_tool_call(&reply)) {
                (Some(tools), Some(call)) if tool_calls < MAX_TOOL_ROUNDS => Some((tools, call)),
                (Some(_), Some(_)) => {
                    warn!(task = %task.name, agent = %agent.key, "Tool round limit reached");
                    messages.push(ChatMessage::assistant(reply));
                    messages.push(ChatMessage::user(
                        "Tool limit reached. Reply with your final answer now, without calling tools.",
                    ));
                    let request = LlmRequest {
                        system_prompt: Some(system.clone()),
                        messages: messages.clone(),
                        ..Default::default()
                    };
                    return Ok((self.ask(client, request).await?, tool_calls));
                }
                _ => None,
            };

            let Some((tools, call)) = call else {
                return Ok((reply, tool_calls));
            };

            tool_calls += 1;
            let toolset = tools.clone();
            let request = call.clone();
            let result = tokio::task::spawn_blocking(move || toolset.dispatch(&request))
                .await
                .map_err(|e| {
                    CrewError::Engine(format!("Tool '{}' did not complete: {e}", call.tool))
                })?;
            debug!(
                task = %task.name,
                agent = %agent.key,
                tool = %call.tool,
                round = tool_calls,
                "Tool call served"
            );
            messages.push(ChatMessage::assistant(reply));
            messages.push(ChatMessage::user(format!("Tool result:\n{result}")));
        }
    }

    fn roster(graph: &AgentGraph, inputs: &KickoffInputs) -> String {
        graph
            .agents
            .iter()
            .map(|a| {
                format!(
                    "- {}: {}",
                    inputs.interpolate(&a.config.role),
                    inputs.interpolate(a.config.goal.trim())
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn progress(steps: &[StepResult], graph: &AgentGraph) -> String {
        if steps.is_empty() {
            return "Nothing has been done yet.".to_string();
        }
        steps
            .iter()
            .map(|s| {
                let role = graph
                    .agent_by_key(&s.agent)
                    .map(|a| a.config.role.as_str())
                    .unwrap_or(s.agent.as_str());
                format!("## {} ({})\n{}", s.task, role, s.output)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[async_trait]
impl ExecutionEngine for LlmEngine {
    async fn kickoff(&self, graph: &AgentGraph, inputs: &KickoffInputs) -> Result<CrewOutput> {
        graph.validate()?;
        let start = Instant::now();
        let mut clients: HashMap<String, Arc<dyn LlmClient>> = HashMap::new();

        info!(
            team = ?graph.team,
            process = %graph.process,
            task_count = graph.tasks.len(),
            "Starting crew"
        );

        let manager = match (graph.process, &graph.manager_model) {
            (ProcessMode::Hierarchical, Some(model)) => Some(self.client_for(&mut clients, model)?),
            _ => None,
        };
        let manager_system = manager.as_ref().map(|_| {
            format!(
                "You are the manager of a crew working on: {}\n\nYour crew:\n{}\n\n\
                 You do not do the work yourself. You brief each member precisely and \
                 judge the combined result.",
                inputs.topic,
                Self::roster(graph, inputs)
            )
        });

        let mut steps: Vec<StepResult> = Vec::new();

        for (i, task) in graph.tasks.iter().enumerate() {
            let step_start = Instant::now();
            let agent = graph.agent(task.agent).ok_or_else(|| {
                CrewError::Engine(format!("task '{}' has no agent", task.name))
            })?;
            let client = self.client_for(&mut clients, &agent.model)?;

            info!(
                step = i + 1,
                task = %task.name,
                agent = %agent.key,
                model = %agent.model,
                "Executing task"
            );

            let brief = match (&manager, &manager_system) {
                (Some(manager), Some(system)) => {
                    let prompt = format!(
                        "Progress so far:\n{}\n\nNext task for {}:\n{}\n\nWrite a short, concrete \
                         brief telling {} exactly what to do for this task.",
                        Self::progress(&steps, graph),
                        inputs.interpolate(&agent.config.role),
                        inputs.interpolate(task.description.trim_end()),
                        inputs.interpolate(&agent.config.role),
                    );
                    let request = LlmRequest::single_turn(Some(system.clone()), prompt);
                    Some(self.ask(manager.as_ref(), request).await?)
                }
                _ => None,
            };

            let context = if steps.is_empty() {
                None
            } else {
                Some(
                    steps
                        .iter()
                        .map(|s| s.output.as_str())
                        .collect::<Vec<_>>()
                        .join(format!("\n\n{CONTEXT_HEADER}\n").as_str()),
                )
            };

            let (output, tool_calls) = self
                .run_task(
                    client.as_ref(),
                    agent,
                    task,
                    inputs,
                    brief.as_deref(),
                    context.as_deref(),
                )
                .await
                .map_err(|e| match e {
                    CrewError::Engine(msg) => {
                        CrewError::Engine(format!("Task '{}' failed: {}", task.name, msg))
                    }
                    other => other,
                })?;

            debug!(
                step = i + 1,
                task = %task.name,
                output_len = output.len(),
                tool_calls,
                "Task completed"
            );

            steps.push(StepResult {
                task: task.name.clone(),
                agent: agent.key.clone(),
                output,
                tool_calls,
                duration_ms: step_start.elapsed().as_millis() as u64,
            });
        }

        let final_output = match (&manager, &manager_system) {
            (Some(manager), Some(system)) => {
                let prompt = format!(
                    "All tasks are done.\n\n{}\n\nWrite the final answer for the request \"{}\": \
                     combine the results, list the files that were created or changed and \
                     mention open issues.",
                    Self::progress(&steps, graph),
                    inputs.topic
                );
                let request = LlmRequest::single_turn(Some(system.clone()), prompt);
                self.ask(manager.as_ref(), request).await?
            }
            _ => steps.last().map(|s| s.output.clone()).unwrap_or_default(),
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(team = ?graph.team, steps = steps.len(), duration_ms, "Crew finished");

        Ok(CrewOutput {
            team: graph.team,
            steps,
            final_output,
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::RoleConfig;
    use crate::tools::FileToolset;
    use crewroute_common::WorkDir;
    use crewroute_llm::LlmResponse;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Replies from a script, records every request.
    #[derive(Default)]
    struct ScriptedClient {
        replies: Mutex<VecDeque<Result<String>>>,
        requests: Mutex<Vec<LlmRequest>>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<&str>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().map(|r| Ok(r.to_string())).collect()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn last_user(&self, index: usize) -> String {
            let requests = self.requests.lock().unwrap();
            requests[index].messages.last().unwrap().content.clone()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
            self.requests.lock().unwrap().push(request);
            let next = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(CrewError::Llm("script exhausted".into())))?;
            Ok(LlmResponse {
                content: next,
                model: "scripted".into(),
                usage: None,
                finish_reason: None,
            })
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    struct SharedProvider(Arc<ScriptedClient>);

    impl ModelProvider for SharedProvider {
        fn client(&self, _model: &str) -> Result<Arc<dyn LlmClient>> {
            Ok(self.0.clone())
        }
    }

    fn role(name: &str) -> RoleConfig {
        RoleConfig {
            role: name.into(),
            goal: "Work on {topic}".into(),
            backstory: "Experienced".into(),
            allow_delegation: false,
        }
    }

    fn task(name: &str, agent: usize) -> TaskSpec {
        TaskSpec {
            name: name.into(),
            description: format!("Do {name} for {{topic}}"),
            expected_output: "A result".into(),
            agent,
        }
    }

    fn two_step_graph(process: ProcessMode, tools: Option<FileToolset>) -> AgentGraph {
        let mut graph = AgentGraph::new(Some(TeamLabel::Small), process);
        let mut dev = AgentSpec::new("developer", role("Developer"), "dev-model");
        dev.tools = tools;
        let dev = graph.add_agent(dev);
        let tester = graph.add_agent(AgentSpec::new("tester", role("Tester"), "test-model"));
        graph.add_task(task("coding_task", dev));
        graph.add_task(task("testing_task", tester));
        if process == ProcessMode::Hierarchical {
            graph = graph.with_manager_model("manager-model");
        }
        graph
    }

    #[test]
    fn interpolates_topic() {
        let inputs = KickoffInputs::new("a CSV parser");
        assert_eq!(
            inputs.interpolate("Build {topic}, then test {topic}"),
            "Build a CSV parser, then test a CSV parser"
        );
    }

    #[test]
    fn tool_call_must_be_the_whole_reply() {
        let call = parse_tool_call(r#" {"tool": "read_file", "args": {"filename": "a.py"}} "#).unwrap();
        assert_eq!(call.tool, "read_file");

        let fenced = "```json\n{\"tool\": \"read_directory\"}\n```";
        assert_eq!(parse_tool_call(fenced).unwrap().tool, "read_directory");

        assert!(parse_tool_call(r#"I will call {"tool": "read_file"}"#).is_none());
        assert!(parse_tool_call(r#"{"answer": 42}"#).is_none());
        assert!(parse_tool_call("Done. All files written.").is_none());
    }

    #[tokio::test]
    async fn sequential_passes_previous_output() {
        let client = ScriptedClient::new(vec!["wrote parser.py", "tests pass"]);
        let engine = LlmEngine::new(Arc::new(SharedProvider(client.clone())));
        let graph = two_step_graph(ProcessMode::Sequential, None);

        let output = engine
            .kickoff(&graph, &KickoffInputs::new("a CSV parser"))
            .await
            .unwrap();

        assert_eq!(output.final_output, "tests pass");
        assert_eq!(output.steps.len(), 2);
        assert_eq!(output.steps[0].agent, "developer");

        let first = client.last_user(0);
        assert!(first.contains("Do coding_task for a CSV parser"));
        assert!(!first.contains(CONTEXT_HEADER));

        let second = client.last_user(1);
        assert!(second.contains(&format!("{CONTEXT_HEADER}\nwrote parser.py")));

        let system = client.requests.lock().unwrap()[1].system_prompt.clone().unwrap();
        assert!(system.contains("Your personal goal is: Work on a CSV parser"));
        assert!(!system.contains("tools"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn tool_calls_are_served_inside_the_work_dir() {
        let dir = TempDir::new().unwrap();
        let tools = FileToolset::new(WorkDir::new(dir.path()).unwrap());
        let client = ScriptedClient::new(vec![
            r#"{"tool": "write_file", "args": {"filename": "src/app.py", "content": "print(1)"}}"#,
            r#"{"tool": "write_file", "args": {"filename": "../escape.py", "content": "x"}}"#,
            "Created src/app.py",
            "Looks good",
        ]);
        let engine = LlmEngine::new(Arc::new(SharedProvider(client.clone())));
        let graph = two_step_graph(ProcessMode::Sequential, Some(tools));

        let output = engine.kickoff(&graph, &KickoffInputs::new("app")).await.unwrap();

        assert_eq!(output.steps[0].output, "Created src/app.py");
        assert_eq!(output.steps[0].tool_calls, 2);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("src/app.py")).unwrap(),
            "print(1)"
        );
        assert!(!dir.path().parent().unwrap().join("escape.py").exists());

        assert!(client.last_user(1).starts_with("Tool result:\nFile saved: src/app.py"));
        assert!(client
            .last_user(2)
            .starts_with("Tool result:\nError: files may only be written"));
    }

    #[tokio::test]
    async fn tool_rounds_are_capped() {
        let dir = TempDir::new().unwrap();
        let tools = FileToolset::new(WorkDir::new(dir.path()).unwrap());
        let call = r#"{"tool": "read_directory", "args": {}}"#;
        let mut script = vec![call; MAX_TOOL_ROUNDS + 1];
        script.push("final answer");
        script.push("tested");
        let client = ScriptedClient::new(script);
        let engine = LlmEngine::new(Arc::new(SharedProvider(client.clone())));
        let graph = two_step_graph(ProcessMode::Sequential, Some(tools));

        let output = engine.kickoff(&graph, &KickoffInputs::new("x")).await.unwrap();

        assert_eq!(output.steps[0].tool_calls, MAX_TOOL_ROUNDS);
        assert_eq!(output.steps[0].output, "final answer");
        assert!(client
            .last_user(MAX_TOOL_ROUNDS + 1)
            .starts_with("Tool limit reached"));
    }

    #[tokio::test]
    async fn hierarchical_run_is_briefed_and_consolidated() {
        let client = ScriptedClient::new(vec![
            "Brief: write the parser",
            "parser written",
            "Brief: test the parser",
            "tests written",
            "Final: parser and tests delivered",
        ]);
        let engine = LlmEngine::new(Arc::new(SharedProvider(client.clone())));
        let graph = two_step_graph(ProcessMode::Hierarchical, None);

        let output = engine
            .kickoff(&graph, &KickoffInputs::new("a parser"))
            .await
            .unwrap();

        assert_eq!(output.final_output, "Final: parser and tests delivered");
        assert_eq!(output.steps.len(), 2);
        assert!(client.last_user(0).contains("Nothing has been done yet."));
        assert!(client
            .last_user(1)
            .contains(&format!("{BRIEF_HEADER}\nBrief: write the parser")));
        assert!(client.last_user(2).contains("## coding_task (Developer)\nparser written"));
        assert!(client.last_user(4).starts_with("All tasks are done."));

        let manager_system = client.requests.lock().unwrap()[0].system_prompt.clone().unwrap();
        assert!(manager_system.contains("- Developer: Work on a parser"));
    }

    #[tokio::test]
    async fn model_failure_aborts_the_run() {
        let client = ScriptedClient::new(vec!["only one reply"]);
        let engine = LlmEngine::new(Arc::new(SharedProvider(client)));
        let graph = two_step_graph(ProcessMode::Sequential, None);

        let err = engine.kickoff(&graph, &KickoffInputs::new("x")).await.unwrap_err();
        match err {
            CrewError::Engine(msg) => {
                assert!(msg.contains("Task 'testing_task' failed"));
                assert!(msg.contains("script exhausted"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn temperature_is_forwarded() {
        let client = ScriptedClient::new(vec!["a", "b"]);
        let engine =
            LlmEngine::new(Arc::new(SharedProvider(client.clone()))).with_temperature(Some(0.2));
        let graph = two_step_graph(ProcessMode::Sequential, None);

        engine.kickoff(&graph, &KickoffInputs::new("x")).await.unwrap();
        assert_eq!(client.requests.lock().unwrap()[0].temperature, Some(0.2));
    }
}
