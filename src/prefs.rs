//! Persisted user preferences.
//!
//! Only the theme survives between sessions. It is stored under the
//! `theme` key of a small TOML file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Default location of the preferences file.
pub const DEFAULT_PREFS_FILE: &str = ".smartops_prefs.toml";

/// Terminal color theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// Preferences persisted between sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub theme: Theme,
}

impl Preferences {
    /// Read preferences, falling back to defaults when the file is missing or unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            debug!("No preferences at {}, using defaults", path.display());
            return Self::default();
        }

        match Self::load(path) {
            Ok(prefs) => prefs,
            Err(e) => {
                warn!("Ignoring preferences: {:#}", e);
                Self::default()
            }
        }
    }

    fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read preferences: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse preferences: {}", path.display()))
    }

    /// Write preferences to disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string(self).context("Failed to serialize preferences")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write preferences: {}", path.display()))
    }
}
