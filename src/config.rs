//! Client configuration loaded from TOML. Resolution order for each
//! setting: CLI flag / env var, then project config (./.gather), then
//! user config (~/.gather), then the built-in default.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::validate::ValidationError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api/v1";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Backend base URL, including the API prefix
    #[serde(default)]
    pub base_url: Option<String>,

    /// Directory holding the persisted session (token and user)
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default paths, later files overriding
    /// earlier ones. Missing files are fine; unreadable TOML is an error.
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".gather").join("config.toml");
            if user_config.exists() {
                config.merge(Self::load_from(&user_config)?);
            }
        }

        let project_config = Path::new(".gather").join("config.toml");
        if project_config.exists() {
            config.merge(Self::load_from(&project_config)?);
        }

        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    fn merge(&mut self, other: Config) {
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.data_dir.is_some() {
            self.data_dir = other.data_dir;
        }
    }

    pub fn validate(&self) -> std::result::Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Some(url) = &self.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                errors.push(ValidationError {
                    field: "base_url".to_string(),
                    message: format!("must start with http:// or https://, got '{url}'"),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Final base URL after applying a CLI/env override.
    pub fn resolve_base_url(&self, override_url: Option<&str>) -> String {
        override_url
            .map(str::to_string)
            .or_else(|| self.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    /// Final session data directory after applying a CLI/env override.
    /// Defaults to ~/.gather.
    pub fn resolve_data_dir(&self, override_dir: Option<&Path>) -> Result<PathBuf> {
        if let Some(dir) = override_dir {
            return Ok(dir.to_path_buf());
        }
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        let home = dirs::home_dir().context("could not determine home directory")?;
        Ok(home.join(".gather"))
    }
}
