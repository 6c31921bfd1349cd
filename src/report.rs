//! Build one source's metric tables: a TEAM column from the whole in-window
//! item set plus one column per roster member, one table per phase.

use std::collections::BTreeMap;
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cohort::{analyze_items, compute_cohort_metrics, CohortMetrics};
use crate::config::ReportConfig;
use crate::error::Result;
use crate::identity::normalize_key;
use crate::item::ItemRecord;
use crate::table::{Catalog, Column, MetricKind, MetricRow, MetricTable, MetricValue};

/// One source's full run output: a table per phase plus the bookkeeping a
/// caller needs to report exclusions. This is the unit exchanged with the
/// cross-source aggregator (serialized as JSON at the CLI boundary).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceReport {
    pub source: String,
    pub tables: Vec<MetricTable>,
    pub summaries: Vec<PhaseSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseSummary {
    pub phase: String,
    pub total_items: u64,
    pub excluded_items: u64,
}

/// Build the full report for one source.
///
/// Phase membership is by resolution date: an item belongs to the phases
/// whose window contains its `resolved_at` date, matching how the source
/// systems scope "completed in period" queries. Unresolved items belong to
/// no phase.
pub fn build_source_report(
    config: &ReportConfig,
    records: &[ItemRecord],
    now: DateTime<Utc>,
) -> Result<SourceReport> {
    config.validate()?;
    let catalog = Catalog::standard(&config.states, &config.item_types);

    let roster: HashSet<&str> = config.members.iter().map(|m| m.key.as_str()).collect();

    let mut tables = Vec::with_capacity(config.phases.len());
    let mut summaries = Vec::with_capacity(config.phases.len());

    for (phase_idx, phase) in config.phases.iter().enumerate() {
        let in_window: Vec<&ItemRecord> = records
            .iter()
            .filter(|r| {
                r.resolved_at
                    .map(|t| {
                        let d = t.date_naive();
                        d >= phase.start_date && d <= phase.end_date
                    })
                    .unwrap_or(false)
            })
            .collect();

        // Team scope: the roster's items, or everything when no roster is
        // configured.
        let team_records: Vec<ItemRecord> = in_window
            .iter()
            .filter(|r| {
                roster.is_empty()
                    || r.assignee
                        .as_deref()
                        .map(|a| roster.contains(normalize_key(a).as_str()))
                        .unwrap_or(false)
            })
            .map(|r| (*r).clone())
            .collect();

        let team_outcome = analyze_items(&team_records, now);
        let team_metrics = compute_cohort_metrics(
            &team_outcome.items,
            team_outcome.excluded.len() as u64,
            &config.team_window(phase_idx),
        )?;

        let mut member_metrics: Vec<(String, CohortMetrics)> = Vec::new();
        for member in &config.members {
            let member_records: Vec<ItemRecord> = in_window
                .iter()
                .filter(|r| {
                    r.assignee
                        .as_deref()
                        .map(|a| normalize_key(a) == member.key)
                        .unwrap_or(false)
                })
                .map(|r| (*r).clone())
                .collect();
            let outcome = analyze_items(&member_records, now);
            let metrics = compute_cohort_metrics(
                &outcome.items,
                outcome.excluded.len() as u64,
                &config.member_window(member, phase_idx),
            )?;
            member_metrics.push((member.key.clone(), metrics));
        }

        let rows = catalog
            .entries
            .iter()
            .map(|entry| {
                let mut values: BTreeMap<Column, MetricValue> = BTreeMap::new();
                values.insert(Column::Overall, metric_value(&team_metrics, &entry.kind));
                for (key, metrics) in &member_metrics {
                    values.insert(
                        Column::Person(key.clone()),
                        metric_value(metrics, &entry.kind),
                    );
                }
                MetricRow {
                    name: entry.name.clone(),
                    rule: entry.rule.clone(),
                    unit: entry.unit,
                    values,
                }
            })
            .collect();

        summaries.push(PhaseSummary {
            phase: phase.name.clone(),
            total_items: team_metrics.total_items,
            excluded_items: team_metrics.excluded_items,
        });
        tables.push(MetricTable {
            source: config.source.clone(),
            phase: phase.name.clone(),
            rows,
        });
    }

    Ok(SourceReport {
        source: config.source.clone(),
        tables,
        summaries,
    })
}

/// Look one scalar metric out of a cohort reduction. Absence maps to NA.
pub fn metric_value(metrics: &CohortMetrics, kind: &MetricKind) -> MetricValue {
    match kind {
        MetricKind::TotalItems => MetricValue::Number(metrics.total_items as f64),
        MetricKind::AvgClosureTime => metrics.closure.avg_days.into(),
        MetricKind::MaxClosureTime => metrics.closure.max_days.into(),
        MetricKind::Throughput => metrics.throughput.baseline.into(),
        MetricKind::ThroughputSkipLeave => metrics.throughput.skip_leave.into(),
        MetricKind::ThroughputCapacity => metrics.throughput.per_capacity.into(),
        MetricKind::ThroughputBoth => metrics.throughput.both.into(),
        MetricKind::StateAvgTime { state } => metrics.state_avg_days(state).into(),
        MetricKind::StateReentry { state } => metrics.reentry_rate(state).into(),
        MetricKind::TypePercentage { item_type } => metrics.type_percentage(item_type).into(),
    }
}
