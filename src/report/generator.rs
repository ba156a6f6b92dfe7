//! Markdown and JSON dashboard reports.
//!
//! This module turns a session's [`DashboardState`] into a document that
//! can be saved next to the analyzed files.

use crate::models::{Category, ChartSpec, PillTone, TableSpec};
use crate::state::{CategoryPanel, CategoryStatus, DashboardState};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Metadata about the session.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// Backend base URL.
    pub server: String,
    pub generated_at: DateTime<Utc>,
    /// Categories invoked in this session.
    pub categories_run: Vec<Category>,
    /// Categories whose last invocation failed.
    pub categories_failed: Vec<Category>,
    pub duration_seconds: f64,
}

/// A complete dashboard report.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport<'a> {
    pub metadata: ReportMetadata,
    pub dashboard: &'a DashboardState,
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &DashboardReport<'_>) -> String {
    let state = report.dashboard;
    let mut output = String::new();

    output.push_str("# SmartOps Dashboard Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_table_of_contents(state));
    output.push_str(&generate_overview_section(state));

    for category in Category::ALL {
        let panel = state.panel(category);
        if panel.status != CategoryStatus::Idle {
            output.push_str(&generate_panel_section(category, panel));
        }
    }

    output.push_str(&generate_history_section(state));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Server:** {}\n", metadata.server));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    let run: Vec<_> = metadata.categories_run.iter().map(|c| c.as_str()).collect();
    section.push_str(&format!("- **Agents Run:** {}\n", run.join(", ")));
    if !metadata.categories_failed.is_empty() {
        let failed: Vec<_> = metadata.categories_failed.iter().map(|c| c.as_str()).collect();
        section.push_str(&format!("- **Agents Failed:** {}\n", failed.join(", ")));
    }
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

fn anchor(category: Category) -> String {
    category.title().to_lowercase()
}

/// Generate the table of contents.
fn generate_table_of_contents(state: &DashboardState) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");
    toc.push_str("- [Overview](#overview)\n");
    for category in Category::ALL {
        if state.panel(category).status != CategoryStatus::Idle {
            toc.push_str(&format!(
                "- [{}](#{})\n",
                category.title(),
                anchor(category)
            ));
        }
    }
    toc.push_str("- [History](#history)\n\n");

    toc
}

/// Generate the KPI overview and the snapshot list.
fn generate_overview_section(state: &DashboardState) -> String {
    let mut section = String::new();

    section.push_str("## Overview\n\n");
    section.push_str("| Agent | KPI | Note | Status |\n");
    section.push_str("|:---|:---:|:---|:---:|\n");
    for category in Category::ALL {
        let panel = state.panel(category);
        section.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            category.title(),
            panel.kpi.value.as_deref().unwrap_or("–"),
            panel.kpi.note.as_deref().unwrap_or(""),
            panel.status
        ));
    }
    section.push('\n');

    if !state.snapshots.is_empty() {
        section.push_str("### Snapshots\n\n");
        for snapshot in &state.snapshots {
            let marker = match snapshot.pill.tone {
                PillTone::Ok => "🟢",
                PillTone::Bad => "🔴",
            };
            section.push_str(&format!(
                "- **{}** {} {} {}\n",
                snapshot.category.as_str().to_uppercase(),
                snapshot.timestamp.format("%Y-%m-%d %H:%M:%S"),
                marker,
                snapshot.pill.label
            ));
        }
        section.push('\n');
    }

    section
}

/// Generate the section of one category.
fn generate_panel_section(category: Category, panel: &CategoryPanel) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", category.title()));
    section.push_str(&format!("*Status: {}*", panel.status));
    if !panel.pills.is_empty() {
        let pills: Vec<String> = panel.pills.iter().map(|p| format!("`{}`", p)).collect();
        section.push_str(&format!(" | {}", pills.join(" ")));
    }
    section.push_str("\n\n");

    section.push_str("```\n");
    section.push_str(&panel.output);
    section.push_str("\n```\n\n");

    if let Some(ref viz) = panel.viz {
        for table in &viz.tables {
            section.push_str(&generate_table_block(table));
        }
        for chart in &viz.charts {
            section.push_str(&generate_chart_block(chart));
        }
    }

    section
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

/// Generate a Markdown table from an agent table.
fn generate_table_block(table: &TableSpec) -> String {
    let mut block = String::new();

    block.push_str(&format!("### {}\n\n", table.display_title()));
    if table.columns.is_empty() {
        return block;
    }

    let header: Vec<String> = table.columns.iter().map(|c| escape_cell(c)).collect();
    block.push_str(&format!("| {} |\n", header.join(" | ")));
    block.push_str(&format!("|{}\n", ":---|".repeat(table.columns.len())));

    for row in &table.rows {
        let cells: Vec<String> = row
            .iter()
            .map(|v| match v {
                serde_json::Value::String(s) => escape_cell(s),
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            })
            .collect();
        block.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    block.push('\n');

    block
}

/// Generate a chart as a label × dataset table.
fn generate_chart_block(chart: &ChartSpec) -> String {
    let mut block = String::new();

    block.push_str(&format!(
        "### {} ({} chart)\n\n",
        chart.display_title(),
        chart.kind()
    ));
    if chart.datasets.is_empty() {
        return block;
    }

    let series: Vec<String> = chart.datasets.iter().map(|d| escape_cell(&d.label)).collect();
    block.push_str(&format!("| Label | {} |\n", series.join(" | ")));
    block.push_str(&format!("|:---|{}\n", ":---:|".repeat(chart.datasets.len())));

    let points = chart
        .datasets
        .iter()
        .map(|d| d.data.len())
        .max()
        .unwrap_or(0)
        .max(chart.labels.len());

    for i in 0..points {
        let label = chart.labels.get(i).cloned().unwrap_or_else(|| i.to_string());
        let values: Vec<String> = chart
            .datasets
            .iter()
            .map(|d| {
                d.data
                    .get(i)
                    .copied()
                    .flatten()
                    .map(|v| v.to_string())
                    .unwrap_or_default()
            })
            .collect();
        block.push_str(&format!("| {} | {} |\n", escape_cell(&label), values.join(" | ")));
    }
    block.push('\n');

    block
}

/// Generate the session history.
fn generate_history_section(state: &DashboardState) -> String {
    let mut section = String::new();

    section.push_str("## History\n\n");
    if state.history.is_empty() {
        section.push_str("No agent has completed in this session.\n\n");
        return section;
    }

    for entry in &state.history {
        section.push_str(&format!(
            "### {} — {}\n\n```\n{}\n```\n\n",
            entry.category.as_str().to_uppercase(),
            entry.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            entry.raw_report
        ));
    }

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by SmartOps*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &DashboardReport<'_>) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Dataset, ScoreResult, VizPayload};
    use serde_json::json;

    fn create_test_state() -> DashboardState {
        let mut state = DashboardState::default();

        let gen = state.begin(Category::Quality);
        state.complete(
            Category::Quality,
            gen,
            "Batch 1 ok. Batch 2 Non-compliant. Batch 3 ok.",
            ScoreResult::score(Some(67), "3 batches"),
            Some(VizPayload {
                tables: vec![TableSpec {
                    title: Some("Batch Measurements".to_string()),
                    columns: vec!["Batch".to_string(), "Status".to_string()],
                    rows: vec![vec![json!(2), json!("NON-CONFORM")]],
                }],
                charts: vec![ChartSpec {
                    title: Some("Deviations".to_string()),
                    chart_type: Some("bar".to_string()),
                    labels: vec!["1".to_string(), "2".to_string()],
                    datasets: vec![Dataset {
                        label: "Humidity".to_string(),
                        data: vec![Some(0.0), Some(1.5)],
                    }],
                }],
            }),
            Utc::now(),
        );

        let gen = state.begin(Category::Process);
        state.fail(Category::Process, gen, "quota exceeded");

        state
    }

    fn metadata() -> ReportMetadata {
        ReportMetadata {
            server: "http://127.0.0.1:5000".to_string(),
            generated_at: Utc::now(),
            categories_run: vec![Category::Quality, Category::Process],
            categories_failed: vec![Category::Process],
            duration_seconds: 4.2,
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let state = create_test_state();
        let report = DashboardReport {
            metadata: metadata(),
            dashboard: &state,
        };
        let markdown = generate_markdown_report(&report);

        assert!(markdown.contains("# SmartOps Dashboard Report"));
        assert!(markdown.contains("- **Agents Failed:** process"));
        assert!(markdown.contains("| Quality | 67/100 | 3 batches | done |"));
        assert!(markdown.contains("## Process"));
        assert!(markdown.contains("❌ quota exceeded"));
        assert!(!markdown.contains("## Maintenance"));
        assert!(markdown.contains("## History"));
    }

    #[test]
    fn test_generate_table_block() {
        let table = TableSpec {
            title: None,
            columns: vec!["Level".to_string(), "Message".to_string()],
            rows: vec![vec![json!("WARN"), json!("drift | sensor 3")]],
        };

        let block = generate_table_block(&table);
        assert!(block.starts_with("### Table"));
        assert!(block.contains("| Level | Message |"));
        assert!(block.contains("| WARN | drift \\| sensor 3 |"));
    }

    #[test]
    fn test_generate_chart_block() {
        let chart = ChartSpec {
            title: Some("Per-batch Metrics".to_string()),
            chart_type: None,
            labels: vec!["7".to_string(), "8".to_string()],
            datasets: vec![
                Dataset {
                    label: "Energy kWh".to_string(),
                    data: vec![Some(12.5), Some(8.0)],
                },
                Dataset {
                    label: "Waste kg".to_string(),
                    data: vec![Some(3.0), None],
                },
            ],
        };

        let block = generate_chart_block(&chart);
        assert!(block.contains("### Per-batch Metrics (bar chart)"));
        assert!(block.contains("| Label | Energy kWh | Waste kg |"));
        assert!(block.contains("| 7 | 12.5 | 3 |"));
        assert!(block.contains("| 8 | 8 |  |"));
    }

    #[test]
    fn test_generate_json_report() {
        let state = create_test_state();
        let report = DashboardReport {
            metadata: metadata(),
            dashboard: &state,
        };
        let json = generate_json_report(&report).unwrap();

        assert!(json.contains("\"metadata\""));
        assert!(json.contains("\"history\""));
        assert!(json.contains("\"quality\""));
        assert!(json.contains("\"status\": \"error\""));
    }
}
