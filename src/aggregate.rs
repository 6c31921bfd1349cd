//! Cross-source merging: combine per-source metric tables for one phase
//! into a single table with OVERALL, per-source, and per-person columns.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::table::{Catalog, Column, CombinationRule, MetricRow, MetricTable, MetricValue};

/// Merge one phase's per-source tables.
///
/// Every input must match the shared catalog (same metric names, same
/// order, same declared rules) and carry the same phase name; anything else
/// is a configuration error, not a best-effort partial merge. Person columns
/// merge on equal stable keys; a person present in a single source keeps
/// their column.
pub fn merge_tables(tables: &[MetricTable], catalog: &Catalog) -> Result<MetricTable> {
    if tables.is_empty() {
        return Err(Error::Config("no tables to merge".to_string()));
    }
    for table in tables {
        catalog.validate(table)?;
    }
    check_catalog_weights(catalog)?;

    let phase = &tables[0].phase;
    if let Some(t) = tables.iter().find(|t| &t.phase != phase) {
        return Err(Error::Config(format!(
            "cannot merge phase '{}' with phase '{}'",
            phase, t.phase
        )));
    }
    let mut sources: Vec<&str> = tables.iter().map(|t| t.source.as_str()).collect();
    sources.sort_unstable();
    sources.dedup();
    if sources.len() != tables.len() {
        return Err(Error::Config(
            "duplicate source identifiers in merge input".to_string(),
        ));
    }

    // Union of person columns across all sources, merged on stable key.
    let mut persons: Vec<String> = tables
        .iter()
        .flat_map(|t| {
            t.columns().into_iter().filter_map(|c| match c {
                Column::Person(key) => Some(key),
                _ => None,
            })
        })
        .collect();
    persons.sort();
    persons.dedup();

    let rows = catalog
        .entries
        .iter()
        .map(|entry| {
            let mut values: BTreeMap<Column, MetricValue> = BTreeMap::new();

            // Each source column keeps its own team value unchanged.
            for table in tables {
                values.insert(
                    Column::Source(table.source.clone()),
                    table.get(&entry.name, &Column::Overall),
                );
            }

            match &entry.rule {
                CombinationRule::Sum => {
                    let overall: f64 = tables
                        .iter()
                        .map(|t| t.get(&entry.name, &Column::Overall).sum_or_zero())
                        .sum();
                    values.insert(Column::Overall, MetricValue::Number(overall));

                    for person in &persons {
                        values.insert(
                            Column::Person(person.clone()),
                            sum_person(tables, &entry.name, person),
                        );
                    }
                }
                CombinationRule::WeightedAverage { weight_metric } => {
                    let overall = weighted_average(tables.iter().map(|t| {
                        (
                            t.get(&entry.name, &Column::Overall),
                            t.get(weight_metric, &Column::Overall),
                        )
                    }));
                    values.insert(Column::Overall, overall);

                    for person in &persons {
                        let column = Column::Person(person.clone());
                        let contributions: Vec<(MetricValue, MetricValue)> = tables
                            .iter()
                            .filter(|t| !t.get(&entry.name, &column).is_na())
                            .map(|t| (t.get(&entry.name, &column), t.get(weight_metric, &column)))
                            .collect();
                        let merged = match contributions.as_slice() {
                            [] => MetricValue::Na,
                            // Single-source person: value passes through.
                            [(value, _)] => *value,
                            many => weighted_average(many.iter().copied()),
                        };
                        values.insert(column, merged);
                    }
                }
            }

            MetricRow {
                name: entry.name.clone(),
                rule: entry.rule.clone(),
                unit: entry.unit,
                values,
            }
        })
        .collect();

    Ok(MetricTable {
        source: "OVERALL".to_string(),
        phase: phase.clone(),
        rows,
    })
}

/// Sum a person's contributions across sources. NA only when the person has
/// no numeric entry anywhere.
fn sum_person(tables: &[MetricTable], metric: &str, person: &str) -> MetricValue {
    let column = Column::Person(person.to_string());
    let numbers: Vec<f64> = tables
        .iter()
        .filter_map(|t| t.get(metric, &column).as_f64())
        .collect();
    if numbers.is_empty() {
        MetricValue::Na
    } else {
        MetricValue::Number(numbers.iter().sum())
    }
}

/// `Σ(value·weight) / Σ(weight)` over the pairs where the value is numeric
/// and the weight positive; NA when nothing qualifies.
fn weighted_average(pairs: impl Iterator<Item = (MetricValue, MetricValue)>) -> MetricValue {
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (value, weight) in pairs {
        let (Some(v), Some(w)) = (value.as_f64(), weight.as_f64()) else {
            continue;
        };
        if w > 0.0 {
            numerator += v * w;
            denominator += w;
        }
    }
    if denominator > 0.0 {
        MetricValue::Number(numerator / denominator)
    } else {
        MetricValue::Na
    }
}

/// Every declared weight metric must itself be a catalog row, or weighted
/// rows could never find their volumes.
fn check_catalog_weights(catalog: &Catalog) -> Result<()> {
    for entry in &catalog.entries {
        if let CombinationRule::WeightedAverage { weight_metric } = &entry.rule {
            if catalog.entry(weight_metric).is_none() {
                return Err(Error::Config(format!(
                    "metric '{}' is weighted by undeclared metric '{}'",
                    entry.name, weight_metric
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{self, CatalogEntry, MetricKind, Unit};

    fn catalog() -> Catalog {
        Catalog {
            entries: vec![
                CatalogEntry {
                    name: table::TOTAL_ITEMS.to_string(),
                    kind: MetricKind::TotalItems,
                    rule: CombinationRule::Sum,
                    unit: Unit::Count,
                },
                CatalogEntry {
                    name: table::AVG_CLOSURE_TIME.to_string(),
                    kind: MetricKind::AvgClosureTime,
                    rule: CombinationRule::WeightedAverage {
                        weight_metric: table::TOTAL_ITEMS.to_string(),
                    },
                    unit: Unit::Days,
                },
            ],
        }
    }

    fn source_table(
        source: &str,
        total: MetricValue,
        avg: MetricValue,
        persons: &[(&str, MetricValue, MetricValue)],
    ) -> MetricTable {
        let mut total_values = BTreeMap::new();
        let mut avg_values = BTreeMap::new();
        total_values.insert(Column::Overall, total);
        avg_values.insert(Column::Overall, avg);
        for (key, person_total, person_avg) in persons {
            total_values.insert(Column::Person(key.to_string()), *person_total);
            avg_values.insert(Column::Person(key.to_string()), *person_avg);
        }
        MetricTable {
            source: source.to_string(),
            phase: "Phase 1".to_string(),
            rows: vec![
                MetricRow {
                    name: table::TOTAL_ITEMS.to_string(),
                    rule: CombinationRule::Sum,
                    unit: Unit::Count,
                    values: total_values,
                },
                MetricRow {
                    name: table::AVG_CLOSURE_TIME.to_string(),
                    rule: CombinationRule::WeightedAverage {
                        weight_metric: table::TOTAL_ITEMS.to_string(),
                    },
                    unit: Unit::Days,
                    values: avg_values,
                },
            ],
        }
    }

    fn n(v: f64) -> MetricValue {
        MetricValue::Number(v)
    }

    #[test]
    fn test_sum_and_weighted_average_reference_values() {
        // 45 issues averaging 10d, 30 issues averaging 20d.
        let a = source_table("proj-a", n(45.0), n(10.0), &[]);
        let b = source_table("proj-b", n(30.0), n(20.0), &[]);
        let merged = merge_tables(&[a, b], &catalog()).unwrap();

        assert_eq!(
            merged.get(table::TOTAL_ITEMS, &Column::Overall),
            n(75.0)
        );
        assert_eq!(
            merged.get(table::AVG_CLOSURE_TIME, &Column::Overall),
            n(14.0)
        );
        // Source columns keep their own values.
        assert_eq!(
            merged.get(table::TOTAL_ITEMS, &Column::Source("proj-a".to_string())),
            n(45.0)
        );
        assert_eq!(
            merged.get(table::AVG_CLOSURE_TIME, &Column::Source("proj-b".to_string())),
            n(20.0)
        );
    }

    #[test]
    fn test_sum_treats_na_as_zero() {
        let a = source_table("proj-a", n(45.0), MetricValue::Na, &[]);
        let b = source_table("proj-b", MetricValue::Na, n(20.0), &[]);
        let merged = merge_tables(&[a, b], &catalog()).unwrap();
        assert_eq!(merged.get(table::TOTAL_ITEMS, &Column::Overall), n(45.0));
        // Weighted average skips the NA value and the zero-weight source.
        assert!(merged
            .get(table::AVG_CLOSURE_TIME, &Column::Overall)
            .is_na());
    }

    #[test]
    fn test_weighted_average_na_when_all_weights_zero() {
        let a = source_table("proj-a", n(0.0), n(10.0), &[]);
        let b = source_table("proj-b", n(0.0), n(20.0), &[]);
        let merged = merge_tables(&[a, b], &catalog()).unwrap();
        assert!(merged
            .get(table::AVG_CLOSURE_TIME, &Column::Overall)
            .is_na());
    }

    #[test]
    fn test_overall_within_source_value_bounds() {
        let a = source_table("proj-a", n(10.0), n(5.0), &[]);
        let b = source_table("proj-b", n(90.0), n(8.0), &[]);
        let merged = merge_tables(&[a, b], &catalog()).unwrap();
        let overall = merged
            .get(table::AVG_CLOSURE_TIME, &Column::Overall)
            .as_f64()
            .unwrap();
        assert!(overall >= 5.0 && overall <= 8.0);
    }

    #[test]
    fn test_person_merging_across_sources() {
        let a = source_table(
            "proj-a",
            n(10.0),
            n(4.0),
            &[("alice", n(6.0), n(3.0)), ("bob", n(4.0), n(5.0))],
        );
        let b = source_table(
            "proj-b",
            n(20.0),
            n(10.0),
            &[("alice", n(2.0), n(7.0)), ("carol", n(18.0), n(11.0))],
        );
        let merged = merge_tables(&[a, b], &catalog()).unwrap();

        let alice = Column::Person("alice".to_string());
        let bob = Column::Person("bob".to_string());
        let carol = Column::Person("carol".to_string());

        // SUM: contributions add up across sources.
        assert_eq!(merged.get(table::TOTAL_ITEMS, &alice), n(8.0));
        assert_eq!(merged.get(table::TOTAL_ITEMS, &bob), n(4.0));
        assert_eq!(merged.get(table::TOTAL_ITEMS, &carol), n(18.0));

        // WEIGHTED_AVERAGE: single-source people pass through; alice is
        // averaged over her own entries: (3*6 + 7*2) / (6+2) = 4.0.
        assert_eq!(merged.get(table::AVG_CLOSURE_TIME, &alice), n(4.0));
        assert_eq!(merged.get(table::AVG_CLOSURE_TIME, &bob), n(5.0));
        assert_eq!(merged.get(table::AVG_CLOSURE_TIME, &carol), n(11.0));
    }

    #[test]
    fn test_person_absent_everywhere_is_na_not_dropped() {
        let a = source_table("proj-a", n(10.0), n(4.0), &[("alice", n(6.0), MetricValue::Na)]);
        let b = source_table("proj-b", n(20.0), n(10.0), &[]);
        let merged = merge_tables(&[a, b], &catalog()).unwrap();
        let alice = Column::Person("alice".to_string());
        assert!(merged.columns().contains(&alice));
        assert!(merged.get(table::AVG_CLOSURE_TIME, &alice).is_na());
    }

    #[test]
    fn test_phase_mismatch_is_fatal() {
        let a = source_table("proj-a", n(1.0), n(1.0), &[]);
        let mut b = source_table("proj-b", n(1.0), n(1.0), &[]);
        b.phase = "Phase 2".to_string();
        assert!(matches!(
            merge_tables(&[a, b], &catalog()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_rule_mismatch_is_fatal() {
        let a = source_table("proj-a", n(1.0), n(1.0), &[]);
        let mut b = source_table("proj-b", n(1.0), n(1.0), &[]);
        b.rows[1].rule = CombinationRule::Sum;
        assert!(matches!(
            merge_tables(&[a, b], &catalog()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_duplicate_sources_are_fatal() {
        let a = source_table("proj-a", n(1.0), n(1.0), &[]);
        let b = source_table("proj-a", n(2.0), n(2.0), &[]);
        assert!(matches!(
            merge_tables(&[a, b], &catalog()),
            Err(Error::Config(_))
        ));
    }
}
