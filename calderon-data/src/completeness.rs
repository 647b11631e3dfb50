//! Per-period completeness: how many observations a period holds, how many of
//! them are valid, and what the valid ones add up to.

use crate::validity::ValidityPolicy;
use calderon_api::observation::Observation;
use calderon_api::payload::{ColumnarSeries, YearlyRecords};
use calderon_utils::dates::month_label;
use calderon_utils::numbers::percentage;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Grouping key for the built-in period groupings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum PeriodKey {
    Year(i32),
    /// Calendar month (1..=12) across every year.
    Month(u32),
    YearMonth(i32, u32),
    All,
}

impl PeriodKey {
    pub fn year(obs: &Observation) -> Self {
        PeriodKey::Year(obs.year())
    }

    pub fn month(obs: &Observation) -> Self {
        PeriodKey::Month(obs.month())
    }

    pub fn year_month(obs: &Observation) -> Self {
        PeriodKey::YearMonth(obs.year(), obs.month())
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodKey::Year(year) => write!(f, "{year}"),
            PeriodKey::Month(month) => match month_label(*month) {
                Some(label) => write!(f, "{label}"),
                None => write!(f, "{month:02}"),
            },
            PeriodKey::YearMonth(year, month) => write!(f, "{year}-{month:02}"),
            PeriodKey::All => write!(f, "all"),
        }
    }
}

/// Counts for one period. `percentage` is rounded to one decimal and is 0
/// when the period is empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletenessRecord<K> {
    pub period: K,
    pub total_count: usize,
    pub valid_count: usize,
    pub percentage: f64,
    /// Sum of the valid values.
    pub valid_sum: f64,
    /// Mean of the valid values.
    pub average: Option<f64>,
}

#[derive(Debug, Default)]
struct Tally {
    total: usize,
    valid: usize,
    sum: f64,
}

impl Tally {
    fn push(&mut self, value: Option<f64>, policy: ValidityPolicy) {
        self.total += 1;
        if let Some(v) = policy.valid_value(value) {
            self.valid += 1;
            self.sum += v;
        }
    }

    fn into_record<K>(self, period: K) -> CompletenessRecord<K> {
        CompletenessRecord {
            period,
            total_count: self.total,
            valid_count: self.valid,
            percentage: percentage(self.valid, self.total),
            valid_sum: self.sum,
            average: (self.valid > 0).then(|| self.sum / self.valid as f64),
        }
    }
}

/// Group `observations` by `key` and tally each group.
///
/// Only groups that received at least one observation are emitted, so the
/// total counts always add up to `observations.len()`.
pub fn aggregate<K, F>(
    observations: &[Observation],
    policy: ValidityPolicy,
    key: F,
    order: SortOrder,
) -> Vec<CompletenessRecord<K>>
where
    K: Ord,
    F: Fn(&Observation) -> K,
{
    let mut groups: BTreeMap<K, Tally> = BTreeMap::new();
    for obs in observations {
        groups.entry(key(obs)).or_default().push(obs.value, policy);
    }
    let mut records: Vec<_> = groups
        .into_iter()
        .map(|(period, tally)| tally.into_record(period))
        .collect();
    if order == SortOrder::Descending {
        records.reverse();
    }
    records
}

pub fn by_year(
    observations: &[Observation],
    policy: ValidityPolicy,
    order: SortOrder,
) -> Vec<CompletenessRecord<PeriodKey>> {
    aggregate(observations, policy, PeriodKey::year, order)
}

/// Calendar months across all years; only months that occur are emitted.
pub fn by_calendar_month(
    observations: &[Observation],
    policy: ValidityPolicy,
    order: SortOrder,
) -> Vec<CompletenessRecord<PeriodKey>> {
    aggregate(observations, policy, PeriodKey::month, order)
}

pub fn by_year_month(
    observations: &[Observation],
    policy: ValidityPolicy,
    order: SortOrder,
) -> Vec<CompletenessRecord<PeriodKey>> {
    aggregate(observations, policy, PeriodKey::year_month, order)
}

/// One record over everything. Unlike the groupings this always returns a
/// record, with zero counts when the input is empty.
pub fn global(observations: &[Observation], policy: ValidityPolicy) -> CompletenessRecord<PeriodKey> {
    let mut tally = Tally::default();
    for obs in observations {
        tally.push(obs.value, policy);
    }
    tally.into_record(PeriodKey::All)
}

/// Completeness per payload year of a long-form dataset.
///
/// Counts every record under its year key, including records whose date
/// string does not parse, so the totals match what the backend sent.
pub fn by_payload_year(
    records: &YearlyRecords,
    policy: ValidityPolicy,
    order: SortOrder,
) -> Vec<CompletenessRecord<i32>> {
    let mut out: Vec<_> = records
        .0
        .iter()
        .map(|(year, daily)| {
            let mut tally = Tally::default();
            for record in daily {
                tally.push(record.valor, policy);
            }
            tally.into_record(*year)
        })
        .filter(|record| record.total_count > 0)
        .collect();
    if order == SortOrder::Descending {
        out.reverse();
    }
    out
}

/// Completeness per station of a columnar dataset, measured against the
/// shared date axis. Stations keep document order.
pub fn by_station(series: &ColumnarSeries, policy: ValidityPolicy) -> Vec<CompletenessRecord<String>> {
    let total = series.len();
    series
        .stations
        .iter()
        .map(|station| {
            let mut tally = Tally::default();
            for value in station.values.iter().take(total) {
                tally.push(*value, policy);
            }
            // the axis length is authoritative even if a column is short
            tally.total = total;
            tally.into_record(station.id.clone())
        })
        .collect()
}
