//! Data models for the SmartOps dashboard.
//!
//! This module contains the core data structures shared by the scorer,
//! the agent runner and the renderers: categories, score results, history
//! entries and the visualization payload returned by the agents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// One backend analysis agent.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Quality,
    Process,
    Maintenance,
    Eco,
}

impl Category {
    /// All categories in run-all order.
    pub const ALL: [Category; 4] = [
        Category::Quality,
        Category::Process,
        Category::Maintenance,
        Category::Eco,
    ];

    /// Name used in endpoint paths and container ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Quality => "quality",
            Category::Process => "process",
            Category::Maintenance => "maintenance",
            Category::Eco => "eco",
        }
    }

    /// Human-readable section title.
    pub fn title(&self) -> &'static str {
        match self {
            Category::Quality => "Quality",
            Category::Process => "Process",
            Category::Maintenance => "Maintenance",
            Category::Eco => "Environment",
        }
    }

    /// Container receiving the rendered tables of this category.
    pub fn table_container(&self) -> String {
        format!("tbl-{}", self.as_str())
    }

    /// Container receiving the rendered charts of this category.
    pub fn chart_container(&self) -> String {
        format!("chr-{}", self.as_str())
    }

    /// Whether this category reports alerts rather than a 0-100 score.
    pub fn counts_alerts(&self) -> bool {
        matches!(self, Category::Maintenance)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The numeric signal derived from a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "value")]
pub enum Metric {
    /// Compliance score in `0..=100`.
    Score(Option<u8>),
    /// Number of maintenance alerts.
    Alerts(Option<u32>),
}

impl Metric {
    /// Short label such as `67/100` or `3 alerts`, with `–` for absent values.
    pub fn label(&self) -> String {
        match self {
            Metric::Score(Some(v)) => format!("{}/100", v),
            Metric::Score(None) => "–/100".to_string(),
            Metric::Alerts(Some(n)) => format!("{} alerts", n),
            Metric::Alerts(None) => "– alerts".to_string(),
        }
    }
}

/// Output of a scoring strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub metric: Metric,
    pub note: String,
}

impl ScoreResult {
    pub fn score(score: Option<u8>, note: impl Into<String>) -> Self {
        Self {
            metric: Metric::Score(score),
            note: note.into(),
        }
    }

    pub fn alerts(alerts: Option<u32>, note: impl Into<String>) -> Self {
        Self {
            metric: Metric::Alerts(alerts),
            note: note.into(),
        }
    }

    /// Score value, if this is a score result with a value.
    pub fn score_value(&self) -> Option<u8> {
        match self.metric {
            Metric::Score(v) => v,
            Metric::Alerts(_) => None,
        }
    }

    /// Alert count, if this is an alerts result with a value.
    pub fn alerts_value(&self) -> Option<u32> {
        match self.metric {
            Metric::Alerts(v) => v,
            Metric::Score(_) => None,
        }
    }
}

/// Classification of a pill badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PillTone {
    Ok,
    Bad,
}

/// A small badge summarizing a score or alert count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pill {
    pub label: String,
    pub tone: PillTone,
}

impl Pill {
    /// Snapshot pill for a score result.
    ///
    /// Maintenance is bad as soon as one alert is raised; score categories
    /// are bad below `threshold`. Absent scores are shown as `–`.
    pub fn for_result(result: &ScoreResult, threshold: u8) -> Self {
        match result.metric {
            Metric::Alerts(alerts) => {
                let n = alerts.unwrap_or(0);
                if n > 0 {
                    Pill {
                        label: format!("{} alerts", n),
                        tone: PillTone::Bad,
                    }
                } else {
                    Pill {
                        label: "0 alerts".to_string(),
                        tone: PillTone::Ok,
                    }
                }
            }
            Metric::Score(None) => Pill {
                label: "–".to_string(),
                tone: PillTone::Ok,
            },
            Metric::Score(Some(v)) => Pill {
                label: format!("{}/100", v),
                tone: if v < threshold {
                    PillTone::Bad
                } else {
                    PillTone::Ok
                },
            },
        }
    }
}

/// Raw report kept in the session history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub category: Category,
    pub timestamp: DateTime<Utc>,
    pub raw_report: String,
}

/// Compact history entry shown in the overview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub category: Category,
    pub timestamp: DateTime<Utc>,
    pub pill: Pill,
}

/// Reads an explicit `null` as the default value.
///
/// Agents send `null` for empty visualization parts; `#[serde(default)]`
/// alone only covers missing fields.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A table returned by an agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub columns: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl TableSpec {
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Table")
    }
}

/// One data series of a chart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,
    /// `None` marks a missing point.
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Vec<Option<f64>>,
}

/// A chart returned by an agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "type", default)]
    pub chart_type: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub datasets: Vec<Dataset>,
}

impl ChartSpec {
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Chart")
    }

    pub fn kind(&self) -> &str {
        self.chart_type.as_deref().unwrap_or("bar")
    }
}

/// Optional structured visualization attached to an agent response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VizPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    pub tables: Vec<TableSpec>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub charts: Vec<ChartSpec>,
}

/// JSON body returned by `POST /api/run/{agent}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viz: Option<VizPayload>,
}
