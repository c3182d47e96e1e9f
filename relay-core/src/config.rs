//! Configuration management for Relay
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (RELAY_*)
//! 3. Config file (~/.config/relay/config.toml)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::workflow::{RetryPolicy, TurnLimits};
use crate::{Error, Result};

/// Repository to review
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// `owner/repo` or a GitHub URL
    pub repo: Option<String>,
}

/// Which decision backend plays the agents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeciderKind {
    /// OpenAI-compatible chat completions
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    /// Deterministic offline policy
    Heuristic,
}

impl std::str::FromStr for DeciderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "model" => Ok(DeciderKind::OpenAi),
            "heuristic" | "offline" => Ok(DeciderKind::Heuristic),
            _ => Err(format!("Unknown decider: {}", s)),
        }
    }
}

/// Model-related configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    pub decider: DeciderKind,

    /// Base URL of the chat completions API
    pub api_base: String,

    /// Model name
    pub model: String,

    pub temperature: f32,

    /// HTTP timeout per completion request
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            decider: DeciderKind::OpenAi,
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub github: GitHubConfig,
    pub model: ModelConfig,
    /// Turn ceiling and step bound
    pub workflow: TurnLimits,
    /// Backoff for retryable tools
    pub retry: RetryPolicy,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::default_config_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/relay/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("relay").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - RELAY_REPO: repository to review
    /// - RELAY_DECIDER: `openai` or `heuristic`
    /// - RELAY_MODEL: model name
    /// - RELAY_API_BASE: chat completions base URL
    /// - RELAY_MAX_TURNS: turn ceiling
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(repo) = std::env::var("RELAY_REPO") {
            self.github.repo = Some(repo);
        }

        if let Ok(decider) = std::env::var("RELAY_DECIDER") {
            match decider.parse() {
                Ok(kind) => self.model.decider = kind,
                Err(e) => warn!(error = %e, "Ignoring RELAY_DECIDER"),
            }
        }

        if let Ok(model) = std::env::var("RELAY_MODEL") {
            self.model.model = model;
        }

        if let Ok(api_base) = std::env::var("RELAY_API_BASE") {
            self.model.api_base = api_base;
        }

        if let Ok(max_turns) = std::env::var("RELAY_MAX_TURNS") {
            match max_turns.parse() {
                Ok(n) => self.workflow.max_turns = n,
                Err(e) => warn!(error = %e, value = %max_turns, "Ignoring RELAY_MAX_TURNS"),
            }
        }

        self
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(
        mut self,
        repo: Option<String>,
        max_turns: Option<u32>,
        offline: bool,
    ) -> Self {
        if let Some(repo) = repo {
            self.github.repo = Some(repo);
        }

        if let Some(n) = max_turns {
            self.workflow.max_turns = n;
        }

        if offline {
            self.model.decider = DeciderKind::Heuristic;
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(
        repo: Option<String>,
        max_turns: Option<u32>,
        offline: bool,
    ) -> Result<Self> {
        Ok(Self::load()?
            .with_env_overrides()
            .with_cli_overrides(repo, max_turns, offline))
    }

    /// Render as TOML, for `relay config`
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(format!("Failed to render config: {}", e)))
    }
}
