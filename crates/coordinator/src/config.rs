//! Application configuration.
//!
//! Every field has a default, so running without a config file is the normal
//! case. A config file is TOML:
//!
//! ```toml
//! templates_dir = "./my-templates"
//!
//! [provider]
//! api_url = "https://openrouter.ai/api/v1"
//! timeout_secs = 300
//!
//! [models]
//! developer = "anthropic/claude-sonnet-4"
//! ```
//!
//! On Unix the file must not be world-writable, and must not be
//! world-readable if it holds an API key.

use std::path::{Path, PathBuf};

use crewroute_agents::TemplateStore;
use crewroute_common::{CrewError, Result};
use crewroute_llm::{LlmConfig, ModelCatalog};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: LlmConfig,
    pub models: ModelCatalog,
    /// Directory with `agents.yaml` and `tasks.yaml` replacing the bundled templates.
    pub templates_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from a TOML file, checking its permissions first.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        #[cfg(unix)]
        validate_config_file_permissions(path)?;

        Self::from_file_unchecked(path).inspect(|config| {
            if config.provider.api_key.is_some() {
                warn!(
                    "API key found in config file '{}'. Prefer the {} environment variable.",
                    path.display(),
                    config.provider.api_key_env
                );
            }
        })
    }

    /// Load configuration without permission checks.
    pub fn from_file_unchecked(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CrewError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
            .map_err(|e| CrewError::Config(format!("Invalid config file '{}': {}", path.display(), e)))
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// The configured templates, or the bundled ones.
    pub fn load_templates(&self) -> Result<TemplateStore> {
        match &self.templates_dir {
            Some(dir) => {
                info!(dir = %dir.display(), "Using custom templates");
                TemplateStore::from_dir(dir)
            }
            None => TemplateStore::bundled(),
        }
    }
}

/// How tasks are routed to teams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RouterMode {
    /// Ask a model.
    #[default]
    Llm,
    /// Offline keyword scoring.
    Keyword,
}

impl RouterMode {
    /// Interpret the `USE_KEYWORD_ROUTER` toggle: exactly `"1"` selects
    /// keyword routing, anything else (including unset) LLM routing.
    pub fn from_toggle(value: Option<&str>) -> Self {
        match value {
            Some("1") => RouterMode::Keyword,
            _ => RouterMode::Llm,
        }
    }
}

#[cfg(unix)]
fn validate_config_file_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(path).map_err(|e| {
        CrewError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
    })?;

    if !metadata.is_file() {
        return Err(CrewError::Config(format!(
            "Config path '{}' is not a regular file",
            path.display()
        )));
    }

    let permission_bits = metadata.permissions().mode() & 0o777;

    if permission_bits & 0o002 != 0 {
        return Err(CrewError::Config(format!(
            "Config file '{}' is world-writable (mode {:04o}). Fix with: chmod o-w {}",
            path.display(),
            permission_bits,
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path).unwrap_or_default();
    let has_api_key = content
        .lines()
        .map(str::trim_start)
        .any(|line| line.starts_with("api_key") && !line.starts_with("api_key_env"));

    if has_api_key && permission_bits & 0o004 != 0 {
        return Err(CrewError::Config(format!(
            "Config file '{}' contains an API key but is world-readable (mode {:04o}). Fix with: chmod 600 {}",
            path.display(),
            permission_bits,
            path.display()
        )));
    }

    if has_api_key && permission_bits & 0o040 != 0 {
        warn!(
            "Config file '{}' contains an API key and is group-readable (mode {:04o}). \
             Consider: chmod 600 {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    Ok(())
}
