//! Tab-separated rendering of metric tables for terminal and spreadsheet use.

use std::collections::HashMap;

use crate::table::{Column, MetricTable, MetricValue, Unit};

/// Display labels for person columns, keyed by stable identity key.
/// Keys without a label render as the raw key.
#[derive(Debug, Default)]
pub struct ColumnLabels {
    labels: HashMap<String, String>,
}

impl ColumnLabels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, label: &str) {
        self.labels.insert(key.to_string(), label.to_string());
    }

    fn label(&self, column: &Column, merged: bool) -> String {
        match column {
            // A single-source table is a team view; a merged table spans
            // sources and the first column is the cross-source rollup.
            Column::Overall if merged => "OVERALL".to_string(),
            Column::Overall => "TEAM".to_string(),
            Column::Source(name) => name.clone(),
            Column::Person(key) => self
                .labels
                .get(key)
                .cloned()
                .unwrap_or_else(|| key.clone()),
        }
    }
}

/// Render a value with its unit suffix. NA always renders as `N/A` so
/// spreadsheet formulas do not silently average in zeros.
pub fn format_value(value: MetricValue, unit: Unit) -> String {
    let Some(v) = value.as_f64() else {
        return "N/A".to_string();
    };
    match unit {
        Unit::Count => format!("{:.0}", v),
        Unit::Days => format!("{:.2}d", v),
        Unit::PerDay => format!("{:.2}/d", v),
        Unit::Percent => format!("{:.1}%", v),
        Unit::Times => format!("{:.2}x", v),
    }
}

/// Render a table as TSV: a header row of column labels, then one row per
/// metric in table order.
pub fn render_table(table: &MetricTable, labels: &ColumnLabels) -> String {
    let columns = table.columns();
    let merged = columns
        .iter()
        .any(|c| matches!(c, Column::Source(_)));

    let mut out = String::new();
    out.push_str("Metric");
    for column in &columns {
        out.push('\t');
        out.push_str(&labels.label(column, merged));
    }
    out.push('\n');

    for row in &table.rows {
        out.push_str(&row.name);
        for column in &columns {
            out.push('\t');
            out.push_str(&format_value(row.get(column), row.unit));
        }
        out.push('\n');
    }
    out
}
