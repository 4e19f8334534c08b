use std::sync::Arc;
use std::time::Duration;

use crewroute_common::{CrewError, Result};
use serde::{Deserialize, Serialize};

use crate::client::LlmClient;
use crate::openai::OpenAiClient;

/// Connection settings shared by every model the crews talk to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL. Defaults to OpenRouter.
    #[serde(default)]
    pub api_url: Option<String>,
    /// Resolved API key. Usually filled in from the environment by the CLI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable the CLI reads the key from.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub temperature: Option<f32>,
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_key: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            temperature: None,
        }
    }
}

/// Named model assignments. Crews refer to slots, never to model ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSlot {
    Orchestrator,
    LargeContext,
    Summarizer,
    Router,
    Developer,
    Backend,
    Tester,
    Documenter,
    Refactoring,
    Architect,
    Security,
    Reviewer,
    Performance,
    Devops,
}

/// Model id per slot. Every field has a default, so a config file only
/// needs to name the slots it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelCatalog {
    pub orchestrator: String,
    /// Used instead of `orchestrator` for large projects (200k+ context).
    pub large_context: String,
    pub summarizer: String,
    pub router: String,
    pub developer: String,
    pub backend: String,
    pub tester: String,
    pub documenter: String,
    pub refactoring: String,
    pub architect: String,
    pub security: String,
    pub reviewer: String,
    pub performance: String,
    pub devops: String,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self {
            orchestrator: "openai/gpt-5-nano".into(),
            large_context: "moonshotai/kimi-k2.5".into(),
            summarizer: "google/gemini-2.5-flash-lite".into(),
            router: "openai/gpt-5-nano".into(),
            developer: "qwen/qwen3-coder".into(),
            backend: "mistralai/codestral-2508".into(),
            tester: "google/gemini-2.5-flash-lite".into(),
            documenter: "google/gemini-2.5-flash-lite".into(),
            refactoring: "moonshotai/kimi-k2.5".into(),
            architect: "deepseek/deepseek-v3.2".into(),
            security: "deepseek/deepseek-v3.2".into(),
            reviewer: "deepseek/deepseek-v3.2".into(),
            performance: "openai/gpt-5-mini".into(),
            devops: "mistralai/codestral-2508".into(),
        }
    }
}

impl ModelCatalog {
    pub fn model(&self, slot: ModelSlot) -> &str {
        match slot {
            ModelSlot::Orchestrator => &self.orchestrator,
            ModelSlot::LargeContext => &self.large_context,
            ModelSlot::Summarizer => &self.summarizer,
            ModelSlot::Router => &self.router,
            ModelSlot::Developer => &self.developer,
            ModelSlot::Backend => &self.backend,
            ModelSlot::Tester => &self.tester,
            ModelSlot::Documenter => &self.documenter,
            ModelSlot::Refactoring => &self.refactoring,
            ModelSlot::Architect => &self.architect,
            ModelSlot::Security => &self.security,
            ModelSlot::Reviewer => &self.reviewer,
            ModelSlot::Performance => &self.performance,
            ModelSlot::Devops => &self.devops,
        }
    }
}

/// Hands out a client for a model id.
pub trait ModelProvider: Send + Sync {
    fn client(&self, model: &str) -> Result<Arc<dyn LlmClient>>;
}

/// [`ModelProvider`] backed by [`OpenAiClient`].
pub struct OpenAiProvider {
    config: LlmConfig,
    api_key: String,
}

impl OpenAiProvider {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                CrewError::Config(format!(
                    "API key missing. Set {} in the environment or a .env file.",
                    config.api_key_env
                ))
            })?;

        Ok(Self { config, api_key })
    }
}

impl ModelProvider for OpenAiProvider {
    fn client(&self, model: &str) -> Result<Arc<dyn LlmClient>> {
        let client = OpenAiClient::new(
            self.config.api_url.clone(),
            model,
            self.api_key.clone(),
            Duration::from_secs(self.config.timeout_secs),
        )?;
        Ok(Arc::new(client))
    }
}
