//! Rendering of tables and charts.
//!
//! The runner never draws anything itself. It projects the state of a panel
//! onto a [`RenderPort`], which owns the actual output surface.

pub mod terminal;

pub use terminal::TerminalRenderer;

use crate::models::{Category, ChartSpec, TableSpec};
use crate::state::CategoryPanel;

/// Output surface addressed by container id (`tbl-{agent}`, `chr-{agent}`).
pub trait RenderPort: Send + Sync {
    /// Append a table to a container.
    fn render_table(&self, container_id: &str, table: &TableSpec);

    /// Append a chart to a container.
    fn render_chart(&self, container_id: &str, chart: &ChartSpec);

    /// Remove everything previously rendered into a container.
    fn clear(&self, container_id: &str);
}

/// Redraw the tables and charts of one category from its panel.
///
/// Both containers are always cleared first, so a response without a
/// visualization leaves no stale output behind.
pub fn project_panel(port: &dyn RenderPort, category: Category, panel: &CategoryPanel) {
    let tables_id = category.table_container();
    let charts_id = category.chart_container();

    port.clear(&tables_id);
    port.clear(&charts_id);

    if let Some(ref viz) = panel.viz {
        for table in &viz.tables {
            port.render_table(&tables_id, table);
        }
        for chart in &viz.charts {
            port.render_chart(&charts_id, chart);
        }
    }
}
