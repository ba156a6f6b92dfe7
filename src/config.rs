//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.smartops.toml` files.

use crate::agent::AgentSubmission;
use crate::models::Category;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".smartops.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Per-agent form defaults.
    #[serde(default)]
    pub agents: AgentsConfig,

    /// Execution settings.
    #[serde(default)]
    pub run: RunConfig,

    /// Display settings.
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the SmartOps server.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds. Requests never time out when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: None,
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

/// Form defaults of one agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentForm {
    /// File uploaded with the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// Instruction sent as the `prompt` field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl From<&AgentForm> for AgentSubmission {
    fn from(form: &AgentForm) -> Self {
        Self {
            file: form.file.clone(),
            prompt: form.prompt.clone(),
        }
    }
}

/// Form defaults of every agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentsConfig {
    #[serde(default)]
    pub quality: AgentForm,
    #[serde(default)]
    pub process: AgentForm,
    #[serde(default)]
    pub maintenance: AgentForm,
    #[serde(default)]
    pub eco: AgentForm,
}

impl AgentsConfig {
    pub fn form(&self, category: Category) -> &AgentForm {
        match category {
            Category::Quality => &self.quality,
            Category::Process => &self.process,
            Category::Maintenance => &self.maintenance,
            Category::Eco => &self.eco,
        }
    }

    pub fn form_mut(&mut self, category: Category) -> &mut AgentForm {
        match category {
            Category::Quality => &mut self.quality,
            Category::Process => &mut self.process,
            Category::Maintenance => &mut self.maintenance,
            Category::Eco => &mut self.eco,
        }
    }
}

/// Execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Maximum agent requests in flight. Keep at 1 to stay clear of HTTP 429.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
        }
    }
}

fn default_max_in_flight() -> usize {
    1
}

/// Display settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Scores below this value are flagged.
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: u8,

    /// Where the theme preference is stored.
    #[serde(default = "default_prefs_path")]
    pub prefs_path: PathBuf,

    /// Colored pills in terminal output.
    #[serde(default = "default_true")]
    pub color: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            pass_threshold: default_pass_threshold(),
            prefs_path: default_prefs_path(),
            color: true,
        }
    }
}

fn default_pass_threshold() -> u8 {
    70
}

fn default_prefs_path() -> PathBuf {
    PathBuf::from(crate::prefs::DEFAULT_PREFS_FILE)
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref base_url) = args.base_url {
            self.server.base_url = base_url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.server.timeout_seconds = Some(timeout);
        }

        for category in Category::ALL {
            if let Some(file) = args.file_for(category) {
                self.agents.form_mut(category).file = Some(file.clone());
            }
        }
        if let Some(ref prompt) = args.prompt {
            for category in args.selected_categories() {
                self.agents.form_mut(category).prompt = Some(prompt.clone());
            }
        }

        if let Some(max_in_flight) = args.max_in_flight {
            self.run.max_in_flight = max_in_flight;
        }

        if let Some(ref prefs) = args.prefs {
            self.display.prefs_path = prefs.clone();
        }
        if args.no_color {
            self.display.color = false;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.base_url, "http://127.0.0.1:5000");
        assert_eq!(config.server.timeout_seconds, None);
        assert_eq!(config.run.max_in_flight, 1);
        assert_eq!(config.display.pass_threshold, 70);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[server]
base_url = "http://smartops.local:8080"
timeout_seconds = 600

[agents.quality]
file = "data/quality.csv"

[agents.maintenance]
file = "logs/system.log"
prompt = "Analyze logs/system.log using kb/maintenance_rules.yaml"

[display]
pass_threshold = 80
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.server.base_url, "http://smartops.local:8080");
        assert_eq!(config.server.timeout_seconds, Some(600));
        assert_eq!(
            config.agents.form(Category::Quality).file,
            Some(PathBuf::from("data/quality.csv"))
        );
        assert!(config.agents.form(Category::Eco).file.is_none());

        let submission = AgentSubmission::from(config.agents.form(Category::Maintenance));
        assert_eq!(submission.file, Some(PathBuf::from("logs/system.log")));
        assert!(submission.prompt.unwrap().starts_with("Analyze"));

        assert_eq!(config.display.pass_threshold, 80);
        assert!(config.display.color);
        assert_eq!(config.run.max_in_flight, 1);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[run]"));
        assert!(toml_str.contains("[display]"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.run.max_in_flight, 1);
    }
}
