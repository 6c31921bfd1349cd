//! The logical metric table exchanged between cohort aggregation and
//! cross-source merging, and the fixed rule catalog that governs merging.
//!
//! A table is an ordered list of metric rows; each row carries a value per
//! column. Values are either a number or NA — NA is a first-class "no basis
//! to compute" marker, never a disguised zero.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A metric value: a number, or not-applicable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Na,
}

impl MetricValue {
    pub fn as_f64(self) -> Option<f64> {
        match self {
            MetricValue::Number(n) => Some(n),
            MetricValue::Na => None,
        }
    }

    pub fn is_na(self) -> bool {
        matches!(self, MetricValue::Na)
    }

    /// NA reads as 0 in summation contexts (and only there).
    pub fn sum_or_zero(self) -> f64 {
        self.as_f64().unwrap_or(0.0)
    }
}

impl From<Option<f64>> for MetricValue {
    fn from(v: Option<f64>) -> Self {
        match v {
            Some(n) => MetricValue::Number(n),
            None => MetricValue::Na,
        }
    }
}

/// A column of a metric table.
///
/// `Overall` doubles as the TEAM column of a single-source table and the
/// OVERALL column of a merged one; it always sorts first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Column {
    Overall,
    Source(String),
    Person(String),
}

impl From<Column> for String {
    fn from(c: Column) -> String {
        match c {
            Column::Overall => "OVERALL".to_string(),
            Column::Source(s) => format!("source:{s}"),
            Column::Person(k) => format!("person:{k}"),
        }
    }
}

impl TryFrom<String> for Column {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, String> {
        if s == "OVERALL" {
            Ok(Column::Overall)
        } else if let Some(rest) = s.strip_prefix("source:") {
            Ok(Column::Source(rest.to_string()))
        } else if let Some(rest) = s.strip_prefix("person:") {
            Ok(Column::Person(rest.to_string()))
        } else {
            Err(format!("unrecognized column id: {s}"))
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Column::Overall => write!(f, "OVERALL"),
            Column::Source(s) => write!(f, "{s}"),
            Column::Person(k) => write!(f, "{k}"),
        }
    }
}

/// How a metric combines across sources. Declared per metric name in the
/// catalog, never inferred from data or naming conventions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum CombinationRule {
    /// OVERALL is the plain sum (NA contributes 0).
    Sum,
    /// OVERALL is the average weighted by `weight_metric` from the same
    /// source; NA values and zero weights contribute nothing.
    WeightedAverage { weight_metric: String },
}

/// Display unit for a metric, used only by the formatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Count,
    Days,
    PerDay,
    Percent,
    Times,
}

/// One row of a metric table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRow {
    pub name: String,
    pub rule: CombinationRule,
    pub unit: Unit,
    pub values: BTreeMap<Column, MetricValue>,
}

impl MetricRow {
    pub fn get(&self, column: &Column) -> MetricValue {
        self.values.get(column).copied().unwrap_or(MetricValue::Na)
    }
}

/// An ordered metric table for one source and one phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricTable {
    pub source: String,
    pub phase: String,
    pub rows: Vec<MetricRow>,
}

impl MetricTable {
    pub fn row(&self, name: &str) -> Option<&MetricRow> {
        self.rows.iter().find(|r| r.name == name)
    }

    pub fn get(&self, name: &str, column: &Column) -> MetricValue {
        self.row(name).map(|r| r.get(column)).unwrap_or(MetricValue::Na)
    }

    /// Every column that appears in any row, in column order.
    pub fn columns(&self) -> Vec<Column> {
        let mut cols: Vec<Column> = self
            .rows
            .iter()
            .flat_map(|r| r.values.keys().cloned())
            .collect();
        cols.sort();
        cols.dedup();
        cols
    }
}

/// What a catalog entry measures. Report building matches on this instead of
/// parsing metric names back apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricKind {
    TotalItems,
    AvgClosureTime,
    MaxClosureTime,
    Throughput,
    ThroughputSkipLeave,
    ThroughputCapacity,
    ThroughputBoth,
    StateAvgTime { state: String },
    StateReentry { state: String },
    TypePercentage { item_type: String },
}

/// One catalog entry: metric name, what it measures, combination rule,
/// display unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub kind: MetricKind,
    pub rule: CombinationRule,
    pub unit: Unit,
}

/// The fixed, ordered metric catalog shared by every source in a run.
///
/// Report building emits rows in catalog order; merging refuses tables whose
/// row names or declared rules disagree with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub entries: Vec<CatalogEntry>,
}

pub const TOTAL_ITEMS: &str = "Total Items";
pub const AVG_CLOSURE_TIME: &str = "Average Closure Time";
pub const MAX_CLOSURE_TIME: &str = "Longest Closure Time";
pub const THROUGHPUT: &str = "Daily Throughput";
pub const THROUGHPUT_SKIP_LEAVE: &str = "Daily Throughput (excl. leave)";
pub const THROUGHPUT_CAPACITY: &str = "Daily Throughput (per capacity)";
pub const THROUGHPUT_BOTH: &str = "Daily Throughput (per capacity, excl. leave)";

impl Catalog {
    /// The standard issue-flow catalog: core closure/throughput metrics plus
    /// one avg-time and one re-entry row per workflow state and one
    /// percentage row per item type.
    pub fn standard(states: &[String], item_types: &[String]) -> Self {
        // Every averaged metric is weighted by the source's item volume.
        let weighted = || CombinationRule::WeightedAverage {
            weight_metric: TOTAL_ITEMS.to_string(),
        };

        let mut entries = vec![
            CatalogEntry {
                name: TOTAL_ITEMS.to_string(),
                kind: MetricKind::TotalItems,
                rule: CombinationRule::Sum,
                unit: Unit::Count,
            },
            CatalogEntry {
                name: AVG_CLOSURE_TIME.to_string(),
                kind: MetricKind::AvgClosureTime,
                rule: weighted(),
                unit: Unit::Days,
            },
            CatalogEntry {
                name: MAX_CLOSURE_TIME.to_string(),
                kind: MetricKind::MaxClosureTime,
                rule: weighted(),
                unit: Unit::Days,
            },
            CatalogEntry {
                name: THROUGHPUT.to_string(),
                kind: MetricKind::Throughput,
                rule: weighted(),
                unit: Unit::PerDay,
            },
            CatalogEntry {
                name: THROUGHPUT_SKIP_LEAVE.to_string(),
                kind: MetricKind::ThroughputSkipLeave,
                rule: weighted(),
                unit: Unit::PerDay,
            },
            CatalogEntry {
                name: THROUGHPUT_CAPACITY.to_string(),
                kind: MetricKind::ThroughputCapacity,
                rule: weighted(),
                unit: Unit::PerDay,
            },
            CatalogEntry {
                name: THROUGHPUT_BOTH.to_string(),
                kind: MetricKind::ThroughputBoth,
                rule: weighted(),
                unit: Unit::PerDay,
            },
        ];
        for state in states {
            entries.push(CatalogEntry {
                name: state_avg_time_metric(state),
                kind: MetricKind::StateAvgTime {
                    state: state.clone(),
                },
                rule: weighted(),
                unit: Unit::Days,
            });
            entries.push(CatalogEntry {
                name: state_reentry_metric(state),
                kind: MetricKind::StateReentry {
                    state: state.clone(),
                },
                rule: weighted(),
                unit: Unit::Times,
            });
        }
        for item_type in item_types {
            entries.push(CatalogEntry {
                name: type_percentage_metric(item_type),
                kind: MetricKind::TypePercentage {
                    item_type: item_type.clone(),
                },
                rule: weighted(),
                unit: Unit::Percent,
            });
        }
        Catalog { entries }
    }

    pub fn entry(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Verify a table's rows match this catalog exactly (names, order,
    /// declared rules). Any disagreement is a fatal configuration error.
    pub fn validate(&self, table: &MetricTable) -> Result<()> {
        if table.rows.len() != self.entries.len() {
            return Err(Error::Config(format!(
                "source '{}' has {} metric rows, catalog declares {}",
                table.source,
                table.rows.len(),
                self.entries.len()
            )));
        }
        for (row, entry) in table.rows.iter().zip(&self.entries) {
            if row.name != entry.name {
                return Err(Error::Config(format!(
                    "source '{}': metric '{}' where catalog declares '{}'",
                    table.source, row.name, entry.name
                )));
            }
            if row.rule != entry.rule {
                return Err(Error::Config(format!(
                    "source '{}': combination rule mismatch for metric '{}'",
                    table.source, row.name
                )));
            }
        }
        Ok(())
    }
}

pub fn state_avg_time_metric(state: &str) -> String {
    format!("{state} State Avg Time")
}

pub fn state_reentry_metric(state: &str) -> String {
    format!("{state} Re-entry Rate")
}

pub fn type_percentage_metric(item_type: &str) -> String {
    format!("{item_type} Percentage")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_value_na_vs_zero() {
        assert_eq!(MetricValue::Na.sum_or_zero(), 0.0);
        assert!(MetricValue::Na.as_f64().is_none());
        assert_eq!(MetricValue::Number(0.0).as_f64(), Some(0.0));
        assert!(!MetricValue::Number(0.0).is_na());
    }

    #[test]
    fn test_metric_value_serde_na_is_null() {
        let json = serde_json::to_string(&MetricValue::Na).unwrap();
        assert_eq!(json, "null");
        let back: MetricValue = serde_json::from_str("null").unwrap();
        assert!(back.is_na());
        let n: MetricValue = serde_json::from_str("1.5").unwrap();
        assert_eq!(n.as_f64(), Some(1.5));
    }

    #[test]
    fn test_column_ordering_overall_first() {
        let mut cols = vec![
            Column::Person("zed@example.com".to_string()),
            Column::Source("beta".to_string()),
            Column::Overall,
            Column::Person("amy@example.com".to_string()),
        ];
        cols.sort();
        assert_eq!(cols[0], Column::Overall);
        assert!(matches!(cols[1], Column::Source(_)));
        assert_eq!(cols[2], Column::Person("amy@example.com".to_string()));
    }

    #[test]
    fn test_column_string_round_trip() {
        for col in [
            Column::Overall,
            Column::Source("proj-a".to_string()),
            Column::Person("alice@example.com".to_string()),
        ] {
            let s: String = col.clone().into();
            assert_eq!(Column::try_from(s).unwrap(), col);
        }
    }

    #[test]
    fn test_standard_catalog_shape() {
        let states = vec!["New".to_string(), "In Progress".to_string()];
        let types = vec!["Bug".to_string()];
        let catalog = Catalog::standard(&states, &types);

        assert_eq!(catalog.entries[0].name, TOTAL_ITEMS);
        assert_eq!(catalog.entries[0].rule, CombinationRule::Sum);
        assert!(catalog.entry("In Progress State Avg Time").is_some());
        assert!(catalog.entry("In Progress Re-entry Rate").is_some());
        assert!(catalog.entry("Bug Percentage").is_some());
        assert_eq!(catalog.entries.len(), 7 + 2 * 2 + 1);
    }

    #[test]
    fn test_validate_rejects_rule_mismatch() {
        let catalog = Catalog::standard(&[], &[]);
        let mut rows: Vec<MetricRow> = catalog
            .entries
            .iter()
            .map(|e| MetricRow {
                name: e.name.clone(),
                rule: e.rule.clone(),
                unit: e.unit,
                values: BTreeMap::new(),
            })
            .collect();
        let table_ok = MetricTable {
            source: "a".to_string(),
            phase: "p".to_string(),
            rows: rows.clone(),
        };
        assert!(catalog.validate(&table_ok).is_ok());

        rows[1].rule = CombinationRule::Sum;
        let table_bad = MetricTable {
            source: "a".to_string(),
            phase: "p".to_string(),
            rows,
        };
        assert!(matches!(
            catalog.validate(&table_bad),
            Err(Error::Config(_))
        ));
    }
}
