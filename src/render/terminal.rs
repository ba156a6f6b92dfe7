//! Plain-text renderer for the terminal.
//!
//! Tables are drawn as aligned columns, charts as horizontal bars. The
//! overview (KPI tiles and snapshots), the category panels and the history
//! are projections of [`DashboardState`].

use super::RenderPort;
use crate::models::{Category, ChartSpec, Pill, PillTone, TableSpec};
use crate::prefs::Theme;
use crate::state::{CategoryPanel, DashboardState};
use std::collections::BTreeMap;
use std::sync::Mutex;

const BAR_WIDTH: usize = 30;
const RESET: &str = "\x1b[0m";

/// Renders the dashboard as text.
pub struct TerminalRenderer {
    theme: Theme,
    color: bool,
    containers: Mutex<BTreeMap<String, Vec<String>>>,
}

impl TerminalRenderer {
    pub fn new(theme: Theme, color: bool) -> Self {
        Self {
            theme,
            color,
            containers: Mutex::new(BTreeMap::new()),
        }
    }

    /// Current contents of a container.
    pub fn container(&self, container_id: &str) -> String {
        self.containers
            .lock()
            .map(|c| c.get(container_id).map(|b| b.join("\n")).unwrap_or_default())
            .unwrap_or_default()
    }

    fn push(&self, container_id: &str, block: String) {
        if let Ok(mut containers) = self.containers.lock() {
            containers
                .entry(container_id.to_string())
                .or_default()
                .push(block);
        }
    }

    fn paint(&self, text: &str, tone: PillTone) -> String {
        if !self.color {
            return format!("[{}]", text);
        }
        let code = match (self.theme, tone) {
            (Theme::Dark, PillTone::Ok) => "\x1b[92m",
            (Theme::Dark, PillTone::Bad) => "\x1b[91m",
            (Theme::Light, PillTone::Ok) => "\x1b[32m",
            (Theme::Light, PillTone::Bad) => "\x1b[31m",
        };
        format!("{}[{}]{}", code, text, RESET)
    }

    /// KPI tiles and snapshot list.
    pub fn overview(&self, state: &DashboardState) -> String {
        let mut out = String::new();
        out.push_str("== Overview ==\n\n");

        for category in Category::ALL {
            let kpi = &state.panel(category).kpi;
            out.push_str(&format!(
                "  {:<12} {:>8}   {}\n",
                category.title(),
                kpi.value.as_deref().unwrap_or("–"),
                kpi.note.as_deref().unwrap_or("")
            ));
        }

        if !state.snapshots.is_empty() {
            out.push_str("\n  Snapshots:\n");
            for snapshot in &state.snapshots {
                out.push_str(&format!(
                    "    {:<12} {}  {}\n",
                    snapshot.category.as_str().to_uppercase(),
                    snapshot.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    self.paint(&snapshot.pill.label, snapshot.pill.tone)
                ));
            }
        }

        out
    }

    /// One category panel: status, pills, output and rendered visuals.
    pub fn panel(&self, state: &DashboardState, category: Category) -> String {
        let panel: &CategoryPanel = state.panel(category);
        let mut out = String::new();
        out.push_str(&format!("== {} ({}) ==\n", category.title(), panel.status));

        if !panel.pills.is_empty() {
            let tone = panel
                .last_result
                .as_ref()
                .map(|r| Pill::for_result(r, state.pass_threshold).tone)
                .unwrap_or(PillTone::Ok);
            let pills: Vec<String> = panel.pills.iter().map(|p| self.paint(p, tone)).collect();
            out.push_str(&pills.join(" "));
            out.push('\n');
        }

        if !panel.output.is_empty() {
            out.push('\n');
            out.push_str(&panel.output);
            out.push('\n');
        }

        for container_id in [category.table_container(), category.chart_container()] {
            let rendered = self.container(&container_id);
            if !rendered.is_empty() {
                out.push('\n');
                out.push_str(&rendered);
                out.push('\n');
            }
        }

        out
    }

    /// Raw reports of the session, most recent first.
    pub fn history(&self, state: &DashboardState) -> String {
        let mut out = String::new();
        out.push_str("== History ==\n");

        if state.history.is_empty() {
            out.push_str("\n  (empty)\n");
            return out;
        }

        for entry in &state.history {
            out.push_str(&format!(
                "\n{} — {}\n{}\n",
                entry.category.as_str().to_uppercase(),
                entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                entry.raw_report
            ));
        }

        out
    }
}

impl RenderPort for TerminalRenderer {
    fn render_table(&self, container_id: &str, table: &TableSpec) {
        self.push(container_id, format_table(table));
    }

    fn render_chart(&self, container_id: &str, chart: &ChartSpec) {
        self.push(container_id, format_chart(chart));
    }

    fn clear(&self, container_id: &str) {
        if let Ok(mut containers) = self.containers.lock() {
            containers.remove(container_id);
        }
    }
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Format a table as aligned text columns.
pub fn format_table(table: &TableSpec) -> String {
    let rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|r| r.iter().map(cell_text).collect())
        .collect();

    let columns = rows
        .iter()
        .map(|r| r.len())
        .chain(std::iter::once(table.columns.len()))
        .max()
        .unwrap_or(0);

    let mut widths = vec![0usize; columns];
    for (i, header) in table.columns.iter().enumerate() {
        widths[i] = widths[i].max(header.chars().count());
    }
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| -> String {
        let padded: Vec<String> = (0..columns)
            .map(|i| {
                let cell = cells.get(i).map(String::as_str).unwrap_or("");
                format!("{:<width$}", cell, width = widths[i])
            })
            .collect();
        padded.join(" | ").trim_end().to_string()
    };

    let mut out = String::new();
    out.push_str(&format!("### {}\n", table.display_title()));
    if !table.columns.is_empty() {
        out.push_str(&line(&table.columns));
        out.push('\n');
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        out.push_str(&rule.join("-+-"));
        out.push('\n');
    }
    for row in &rows {
        out.push_str(&line(row));
        out.push('\n');
    }
    out
}

/// Format a chart as one group of horizontal bars per dataset.
pub fn format_chart(chart: &ChartSpec) -> String {
    let mut out = String::new();
    out.push_str(&format!("### {} ({})\n", chart.display_title(), chart.kind()));

    let max = chart
        .datasets
        .iter()
        .flat_map(|d| d.data.iter().flatten())
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let label_width = chart
        .labels
        .iter()
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(0);

    for dataset in &chart.datasets {
        out.push_str(&format!("{}\n", dataset.label));
        for (i, value) in dataset.data.iter().enumerate() {
            let label = chart.labels.get(i).cloned().unwrap_or_else(|| i.to_string());
            let Some(value) = value else {
                // gap
                out.push_str(&format!("  {:<width$} –\n", label, width = label_width));
                continue;
            };
            let len = if max > 0.0 {
                ((value.abs() / max) * BAR_WIDTH as f64).round() as usize
            } else {
                0
            };
            out.push_str(&format!(
                "  {:<width$} {} {}\n",
                label,
                "█".repeat(len),
                value,
                width = label_width
            ));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Dataset, ScoreResult};
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn test_format_table() {
        let table = TableSpec {
            title: Some("Batch Measurements".to_string()),
            columns: vec!["Batch".to_string(), "Status".to_string()],
            rows: vec![vec![json!(1), json!("OK")], vec![json!(12), json!("NON-CONFORM")]],
        };

        let text = format_table(&table);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "### Batch Measurements");
        assert_eq!(lines[1], "Batch | Status");
        assert_eq!(lines[3], "1     | OK");
        assert_eq!(lines[4], "12    | NON-CONFORM");
    }

    #[test]
    fn test_format_chart_scales_bars() {
        let chart = ChartSpec {
            title: Some("Fault Counters".to_string()),
            chart_type: None,
            labels: vec!["overheat".to_string(), "WARN".to_string()],
            datasets: vec![Dataset {
                label: "Count".to_string(),
                data: vec![Some(4.0), Some(2.0)],
            }],
        };

        let text = format_chart(&chart);
        assert!(text.starts_with("### Fault Counters (bar)"));
        assert!(text.contains(&format!("overheat {} 4", "█".repeat(BAR_WIDTH))));
        assert!(text.contains(&format!("WARN     {} 2", "█".repeat(BAR_WIDTH / 2))));
    }

    #[test]
    fn test_format_chart_missing_point_is_a_gap() {
        let chart = ChartSpec {
            labels: vec!["b1".to_string(), "b2".to_string(), "b3".to_string()],
            datasets: vec![Dataset {
                label: "Energy".to_string(),
                data: vec![Some(10.0), None, Some(5.0)],
            }],
            ..Default::default()
        };

        let text = format_chart(&chart);
        assert!(text.contains(&format!("b1 {} 10", "█".repeat(BAR_WIDTH))));
        assert!(text.contains("  b2 –\n"));
        assert!(text.contains(&format!("b3 {} 5", "█".repeat(BAR_WIDTH / 2))));
    }

    #[test]
    fn test_clear_replaces_previous_render() {
        let renderer = TerminalRenderer::new(Theme::Dark, false);
        renderer.render_chart("chr-eco", &ChartSpec::default());
        renderer.render_chart("chr-eco", &ChartSpec::default());
        assert_eq!(renderer.container("chr-eco").matches("### Chart").count(), 2);

        renderer.clear("chr-eco");
        assert!(renderer.container("chr-eco").is_empty());
    }

    #[test]
    fn test_overview_and_history() {
        let mut state = DashboardState::default();
        let gen = state.begin(Category::Quality);
        state.complete(
            Category::Quality,
            gen,
            "Batch 1 Non-compliant",
            ScoreResult::score(Some(0), "1 batches"),
            None,
            Utc::now(),
        );

        let renderer = TerminalRenderer::new(Theme::Light, false);
        let overview = renderer.overview(&state);
        assert!(overview.contains("0/100"));
        assert!(overview.contains("QUALITY"));
        assert!(overview.contains("[0/100]"));

        let history = renderer.history(&state);
        assert!(history.contains("Batch 1 Non-compliant"));

        let panel = renderer.panel(&state, Category::Quality);
        assert!(panel.contains("Quality (done)"));
        assert!(panel.contains("[1 batches]"));
    }

    #[test]
    fn test_color_follows_theme() {
        let dark = TerminalRenderer::new(Theme::Dark, true);
        let light = TerminalRenderer::new(Theme::Light, true);
        assert!(dark.paint("x", PillTone::Bad).starts_with("\x1b[91m"));
        assert!(light.paint("x", PillTone::Ok).starts_with("\x1b[32m"));
    }
}
