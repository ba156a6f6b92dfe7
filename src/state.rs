//! Dashboard state and its update functions.
//!
//! The whole session lives in one [`DashboardState`] value. Invocations go
//! through three transitions, each a plain function of the state:
//! [`DashboardState::begin`], [`DashboardState::complete`] and
//! [`DashboardState::fail`]. Renderers only read the state.

use crate::models::{
    Category, HistoryEntry, Metric, Pill, PillTone, ScoreResult, Snapshot, VizPayload,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Shown while a category is running.
pub const RUNNING_OUTPUT: &str = "⏳ Running...";

/// Shown when an agent returned a blank report.
pub const EMPTY_REPORT_OUTPUT: &str = "(empty report)";

/// Lifecycle of a category panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryStatus {
    #[default]
    Idle,
    Running,
    Done,
    Error,
}

impl std::fmt::Display for CategoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CategoryStatus::Idle => write!(f, "idle"),
            CategoryStatus::Running => write!(f, "running…"),
            CategoryStatus::Done => write!(f, "done"),
            CategoryStatus::Error => write!(f, "error"),
        }
    }
}

/// Headline value of a category on the overview.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KpiTile {
    /// Last present value, e.g. `67/100` or `3`.
    pub value: Option<String>,
    pub note: Option<String>,
}

/// Everything shown in one category panel.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CategoryPanel {
    pub status: CategoryStatus,
    pub output: String,
    pub kpi: KpiTile,
    /// Mini-KPI pills: the metric label then the note.
    pub pills: Vec<String>,
    pub last_result: Option<ScoreResult>,
    /// Current render of the agent's tables and charts.
    pub viz: Option<VizPayload>,
    /// Generation of the newest invocation.
    #[serde(skip)]
    pub generation: u64,
}

/// Result of applying a completion to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The state now reflects the completion.
    Current,
    /// A newer invocation was started; the completion was dropped.
    Stale,
}

/// Session state of the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardState {
    pub panels: BTreeMap<Category, CategoryPanel>,
    /// Most recent first.
    pub snapshots: Vec<Snapshot>,
    /// Most recent first.
    pub history: Vec<HistoryEntry>,
    /// Log area of the run-all action.
    pub run_all_log: Vec<String>,
    /// Scores below this value get a bad pill.
    pub pass_threshold: u8,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new(70)
    }
}

impl DashboardState {
    pub fn new(pass_threshold: u8) -> Self {
        Self {
            panels: Category::ALL
                .iter()
                .map(|c| (*c, CategoryPanel::default()))
                .collect(),
            snapshots: Vec::new(),
            history: Vec::new(),
            run_all_log: Vec::new(),
            pass_threshold,
        }
    }

    pub fn panel(&self, category: Category) -> &CategoryPanel {
        // every category is inserted in new()
        &self.panels[&category]
    }

    fn panel_mut(&mut self, category: Category) -> &mut CategoryPanel {
        self.panels.entry(category).or_default()
    }

    /// Mark a category as running and return the generation of this invocation.
    pub fn begin(&mut self, category: Category) -> u64 {
        let panel = self.panel_mut(category);
        panel.generation += 1;
        panel.status = CategoryStatus::Running;
        panel.output = RUNNING_OUTPUT.to_string();
        debug!("{} generation {} running", category, panel.generation);
        panel.generation
    }

    fn is_current(&self, category: Category, generation: u64) -> bool {
        self.panel(category).generation == generation
    }

    /// Apply a successful response.
    pub fn complete(
        &mut self,
        category: Category,
        generation: u64,
        report: &str,
        result: ScoreResult,
        viz: Option<VizPayload>,
        at: DateTime<Utc>,
    ) -> Applied {
        if !self.is_current(category, generation) {
            debug!("{} dropping stale generation {}", category, generation);
            return Applied::Stale;
        }

        let threshold = self.pass_threshold;
        let panel = self.panel_mut(category);

        panel.output = if report.is_empty() {
            EMPTY_REPORT_OUTPUT.to_string()
        } else {
            report.to_string()
        };

        match result.metric {
            Metric::Score(Some(v)) => panel.kpi.value = Some(format!("{}/100", v)),
            Metric::Alerts(Some(n)) => panel.kpi.value = Some(n.to_string()),
            _ => {}
        }
        panel.kpi.note = Some(result.note.clone());

        panel.pills = vec![result.metric.label(), result.note.clone()];
        panel.viz = viz;
        panel.status = CategoryStatus::Done;
        panel.last_result = Some(result.clone());

        self.snapshots.insert(
            0,
            Snapshot {
                category,
                timestamp: at,
                pill: Pill::for_result(&result, threshold),
            },
        );
        self.history.insert(
            0,
            HistoryEntry {
                category,
                timestamp: at,
                raw_report: report.to_string(),
            },
        );

        Applied::Current
    }

    /// Apply a failed invocation: only the output and status change.
    pub fn fail(&mut self, category: Category, generation: u64, message: &str) -> Applied {
        if !self.is_current(category, generation) {
            debug!("{} dropping stale failure of generation {}", category, generation);
            return Applied::Stale;
        }

        let panel = self.panel_mut(category);
        panel.output = format!("❌ {}", message);
        panel.status = CategoryStatus::Error;
        Applied::Current
    }

    /// Categories whose last invocation ended in error.
    pub fn failed_categories(&self) -> Vec<Category> {
        self.panels
            .iter()
            .filter(|(_, p)| p.status == CategoryStatus::Error)
            .map(|(c, _)| *c)
            .collect()
    }

    /// Number of snapshots with a bad pill.
    pub fn bad_snapshot_count(&self) -> usize {
        self.snapshots
            .iter()
            .filter(|s| s.pill.tone == PillTone::Bad)
            .count()
    }
}
