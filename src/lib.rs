pub mod aggregate;
pub mod cohort;
pub mod config;
pub mod date_util;
pub mod error;
pub mod format;
pub mod identity;
pub mod item;
pub mod report;
pub mod table;
pub mod timeline;

pub use aggregate::merge_tables;
pub use cohort::{CohortMetrics, CohortWindow, ThroughputVariants};
pub use config::{MemberConfig, PhaseConfig, ReportConfig};
pub use error::{Error, Result};
pub use format::{render_table, ColumnLabels};
pub use identity::{normalize_key, Identity, IdentityResolver};
pub use item::{analyze_item, ItemMetrics, ItemRecord};
pub use report::{build_source_report, PhaseSummary, SourceReport};
pub use table::{Catalog, Column, CombinationRule, MetricTable, MetricValue};
pub use timeline::{reconstruct_intervals, StateInterval, StatusEvent};
