//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::Category;
use crate::prefs::Theme;
use clap::Parser;
use std::path::PathBuf;

/// SmartOps - terminal dashboard for the SmartOps analysis agents
///
/// Submits data files to the quality, process, maintenance and eco agents,
/// scores their reports and renders KPIs, tables, charts and history.
///
/// Examples:
///   smartops --all --quality-file data/quality.csv --eco-file data/eco.csv
///   smartops --agent maintenance --maintenance-file logs/system.log
///   smartops --agent quality --score-file reports/quality.txt
///   smartops --all --output dashboard.md --fail-on-error
///   smartops --toggle-theme
///   smartops --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Agent to run (repeatable)
    #[arg(short, long = "agent", value_name = "AGENT", conflicts_with = "all")]
    pub agents: Vec<Category>,

    /// Run all agents sequentially: quality, process, maintenance, eco
    #[arg(long)]
    pub all: bool,

    /// File uploaded to the quality agent
    #[arg(long, value_name = "FILE")]
    pub quality_file: Option<PathBuf>,

    /// File uploaded to the process agent
    #[arg(long, value_name = "FILE")]
    pub process_file: Option<PathBuf>,

    /// File uploaded to the maintenance agent
    #[arg(long, value_name = "FILE")]
    pub maintenance_file: Option<PathBuf>,

    /// File uploaded to the eco agent
    #[arg(long, value_name = "FILE")]
    pub eco_file: Option<PathBuf>,

    /// Instruction sent to the selected agents
    #[arg(long, value_name = "TEXT")]
    pub prompt: Option<String>,

    /// SmartOps server URL
    #[arg(long, value_name = "URL", env = "SMARTOPS_URL")]
    pub base_url: Option<String>,

    /// Request timeout in seconds (no timeout by default)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Maximum agent requests in flight
    #[arg(long, value_name = "NUM")]
    pub max_in_flight: Option<usize>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .smartops.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Save the dashboard report to this file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Report format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Score a local report file instead of calling the agent
    ///
    /// Requires exactly one --agent.
    #[arg(long, value_name = "FILE", conflicts_with = "all")]
    pub score_file: Option<PathBuf>,

    /// Set and save the color theme
    #[arg(long, value_name = "THEME", conflicts_with = "toggle_theme")]
    pub theme: Option<Theme>,

    /// Switch between light and dark theme and save the choice
    #[arg(long)]
    pub toggle_theme: bool,

    /// Preferences file holding the theme
    #[arg(long, value_name = "FILE")]
    pub prefs: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Print the raw report history at the end
    #[arg(long)]
    pub history: bool,

    /// Exit with code 2 if any agent ended in error
    #[arg(long)]
    pub fail_on_error: bool,

    /// Exit with code 2 if a score is below this value or alerts were raised
    #[arg(long, value_name = "SCORE")]
    pub min_score: Option<u8>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .smartops.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Categories to run, in run-all order, without duplicates.
    pub fn selected_categories(&self) -> Vec<Category> {
        if self.all {
            return Category::ALL.to_vec();
        }
        Category::ALL
            .iter()
            .copied()
            .filter(|c| self.agents.contains(c))
            .collect()
    }

    /// Upload file given on the command line for a category.
    pub fn file_for(&self, category: Category) -> Option<&PathBuf> {
        match category {
            Category::Quality => self.quality_file.as_ref(),
            Category::Process => self.process_file.as_ref(),
            Category::Maintenance => self.maintenance_file.as_ref(),
            Category::Eco => self.eco_file.as_ref(),
        }
    }

    /// Whether only the theme preference is being changed.
    pub fn theme_only(&self) -> bool {
        (self.theme.is_some() || self.toggle_theme) && !self.all && self.agents.is_empty()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config || self.theme_only() {
            return Ok(());
        }

        if !self.all && self.agents.is_empty() {
            return Err("Select agents with --agent or use --all".to_string());
        }

        if self.score_file.is_some() && self.agents.len() != 1 {
            return Err("--score-file requires exactly one --agent".to_string());
        }

        if let Some(ref url) = self.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Server URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(min_score) = self.min_score {
            if min_score > 100 {
                return Err("Minimum score must be between 0 and 100".to_string());
            }
        }

        if self.max_in_flight == Some(0) {
            return Err("Max in flight must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        let uploads = Category::ALL.iter().filter_map(|c| self.file_for(*c));
        for path in uploads.chain(self.score_file.iter()) {
            if !path.is_file() {
                return Err(format!("File does not exist: {}", path.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
