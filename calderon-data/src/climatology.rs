//! Monthly normals and the summaries built on them.

use crate::completeness::CompletenessRecord;
use crate::validity::ValidityPolicy;
use calderon_api::observation::Observation;
use calderon_api::payload::{ColumnarSeries, MultiannualTable};
use calderon_utils::dates::{month_key, MONTH_LABELS};
use calderon_utils::numbers::{mean, percentage};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyClimatology {
    pub month: u32,
    pub label: &'static str,
    /// Mean of the valid values for this calendar month across all years.
    pub average: Option<f64>,
    pub valid_count: usize,
}

impl MonthlyClimatology {
    fn from_values(month0: usize, values: &[f64]) -> Self {
        MonthlyClimatology {
            month: month0 as u32 + 1,
            label: MONTH_LABELS[month0],
            average: mean(values),
            valid_count: values.len(),
        }
    }
}

/// Twelve entries, January first. Months without valid data have no average.
pub fn climatology(observations: &[Observation], policy: ValidityPolicy) -> Vec<MonthlyClimatology> {
    let mut buckets: [Vec<f64>; 12] = Default::default();
    for obs in observations {
        if let Some(v) = policy.valid_value(obs.value) {
            buckets[obs.month() as usize - 1].push(v);
        }
    }
    buckets
        .iter()
        .enumerate()
        .map(|(idx, values)| MonthlyClimatology::from_values(idx, values))
        .collect()
}

/// Same as [`climatology`], over the month columns of a multiannual table.
pub fn table_climatology(table: &MultiannualTable, policy: ValidityPolicy) -> Vec<MonthlyClimatology> {
    (0..12)
        .map(|idx| {
            let values: Vec<f64> = table
                .rows
                .iter()
                .filter_map(|row| policy.valid_value(row.months[idx]))
                .collect();
            MonthlyClimatology::from_values(idx, &values)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Anomaly {
    pub date: NaiveDate,
    pub value: f64,
    pub climatology: f64,
    /// `value - climatology`
    pub anomaly: f64,
}

/// Departure of each valid observation from its month's normal.
/// Observations whose month has no normal are left out.
pub fn anomalies_against(
    observations: &[Observation],
    normals: &[MonthlyClimatology],
    policy: ValidityPolicy,
) -> Vec<Anomaly> {
    let by_month: BTreeMap<u32, f64> = normals
        .iter()
        .filter_map(|c| c.average.map(|avg| (c.month, avg)))
        .collect();
    observations
        .iter()
        .filter_map(|obs| {
            let value = policy.valid_value(obs.value)?;
            let climatology = *by_month.get(&obs.month())?;
            Some(Anomaly {
                date: obs.date,
                value,
                climatology,
                anomaly: value - climatology,
            })
        })
        .collect()
}

/// Anomalies against the normals of the same observations.
pub fn anomalies(observations: &[Observation], policy: ValidityPolicy) -> Vec<Anomaly> {
    anomalies_against(observations, &climatology(observations, policy), policy)
}

/// Completeness of each table row over its twelve month slots.
pub fn completeness_by_year(table: &MultiannualTable, policy: ValidityPolicy) -> Vec<CompletenessRecord<i32>> {
    table
        .rows
        .iter()
        .map(|row| {
            let valid: Vec<f64> = row
                .months
                .iter()
                .filter_map(|v| policy.valid_value(*v))
                .collect();
            let valid_sum = valid.iter().sum();
            CompletenessRecord {
                period: row.year,
                total_count: row.months.len(),
                valid_count: valid.len(),
                percentage: percentage(valid.len(), row.months.len()),
                valid_sum,
                average: mean(&valid),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnnualAverage {
    pub year: i32,
    pub average: Option<f64>,
}

/// Mean of the valid monthly values of each year, in table order.
pub fn annual_trend(table: &MultiannualTable, policy: ValidityPolicy) -> Vec<AnnualAverage> {
    completeness_by_year(table, policy)
        .into_iter()
        .map(|record| AnnualAverage {
            year: record.period,
            average: record.average,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthComparison {
    pub month: u32,
    pub label: &'static str,
    pub climatology: Option<f64>,
    pub actual: Option<f64>,
}

/// The twelve months of `year` next to the normals. Empty when the table has
/// no such year.
pub fn year_vs_climatology(
    table: &MultiannualTable,
    year: i32,
    policy: ValidityPolicy,
) -> Vec<MonthComparison> {
    let Some(row) = table.row(year) else {
        return Vec::new();
    };
    table_climatology(table, policy)
        .into_iter()
        .zip(row.months)
        .map(|(normal, actual)| MonthComparison {
            month: normal.month,
            label: normal.label,
            climatology: normal.average,
            actual: policy.valid_value(actual),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationMonthlyMeans {
    /// Two-digit month, `"01"`..`"12"`.
    pub month: String,
    /// One mean per station, in station order.
    pub means: Vec<(String, Option<f64>)>,
}

/// Mean of each station per calendar month. Only months that appear on the
/// date axis are emitted, ascending.
pub fn station_monthly_means(series: &ColumnarSeries, policy: ValidityPolicy) -> Vec<StationMonthlyMeans> {
    let mut rows_by_month: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (idx, date) in series.dates.iter().enumerate() {
        rows_by_month.entry(date.month()).or_default().push(idx);
    }
    rows_by_month
        .into_iter()
        .filter_map(|(_, rows)| {
            let first = *rows.first()?;
            let means = series
                .stations
                .iter()
                .map(|station| {
                    let values: Vec<f64> = rows
                        .iter()
                        .filter_map(|idx| policy.valid_value(station.values.get(*idx).copied().flatten()))
                        .collect();
                    (station.id.clone(), mean(&values))
                })
                .collect();
            Some(StationMonthlyMeans {
                month: month_key(&series.dates[first]),
                means,
            })
        })
        .collect()
}
