//! Credentials for the code host and the model API
//!
//! Kept apart from `config.toml` so the config can be shared safely. The
//! file lives at `~/.config/relay/secrets.toml` and must be readable by its
//! owner only (0600 on Unix). `GITHUB_TOKEN` and `OPENAI_API_KEY` take
//! precedence over the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Error, Result};

const TEMPLATE: &str = r#"# Relay secrets
# Do not share or commit this file. It must stay chmod 600.

[github]
# Personal access token with pull request read/write access
# Create at: https://github.com/settings/tokens
token = ""

[openai]
# API key for the chat completions endpoint (not needed with --offline)
api_key = ""
"#;

/// Secrets structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Secrets {
    pub github: GitHubSecrets,
    pub openai: ModelSecrets,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GitHubSecrets {
    /// GitHub personal access token
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelSecrets {
    pub api_key: Option<String>,
}

/// Pick the env value if set and non-empty, else the file value
fn resolve(env_var: &str, from_file: Option<&String>) -> Option<String> {
    if let Ok(value) = std::env::var(env_var) {
        let value = value.trim();
        if !value.is_empty() {
            debug!(source = env_var, "Using credential from environment");
            return Some(value.to_string());
        }
    }
    from_file
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl Secrets {
    /// Load secrets from the default location
    ///
    /// Returns empty secrets if the file doesn't exist
    pub fn load() -> Result<Self> {
        match Self::default_secrets_path() {
            Some(path) if path.exists() => Self::load_from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load secrets from a file, refusing group- or world-readable files
    pub fn load_from_file(path: &Path) -> Result<Self> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mode = std::fs::metadata(path)?.permissions().mode();
            if mode & 0o077 != 0 {
                return Err(Error::Config(format!(
                    "Secrets file {} has insecure permissions {:o}. Please run: chmod 600 {}",
                    path.display(),
                    mode & 0o777,
                    path.display()
                )));
            }
        }

        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse secrets: {}", e)))
    }

    /// Get the default secrets file path
    pub fn default_secrets_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("relay").join("secrets.toml"))
    }

    /// GitHub token; `GITHUB_TOKEN` wins over the file
    pub fn github_token(&self) -> Option<String> {
        resolve("GITHUB_TOKEN", self.github.token.as_ref())
    }

    /// Model API key; `OPENAI_API_KEY` wins over the file
    pub fn model_api_key(&self) -> Option<String> {
        resolve("OPENAI_API_KEY", self.openai.api_key.as_ref())
    }

    /// Create a template secrets file at the default location
    pub fn create_template() -> Result<PathBuf> {
        let path = Self::default_secrets_path()
            .ok_or_else(|| Error::Config("Could not determine secrets path".to_string()))?;
        Self::create_template_at(&path)?;
        Ok(path)
    }

    /// Write the template to `path` with owner-only permissions
    ///
    /// Never overwrites an existing file.
    pub fn create_template_at(path: &Path) -> Result<()> {
        if path.exists() {
            return Err(Error::Config(format!(
                "Secrets file already exists at {}",
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, TEMPLATE)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        warn!(path = %path.display(), "Created secrets template - edit it to add your credentials");
        Ok(())
    }
}
