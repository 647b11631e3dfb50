//! Trailing-window accumulation over valid readings.

use crate::validity::{Reading, ValidityPolicy};
use calderon_api::observation::Observation;
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_ROLLING_WINDOW: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RollingStatistic {
    #[default]
    Sum,
    Mean,
}

impl fmt::Display for RollingStatistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollingStatistic::Sum => write!(f, "sum"),
            RollingStatistic::Mean => write!(f, "mean"),
        }
    }
}

impl FromStr for RollingStatistic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" => Ok(RollingStatistic::Sum),
            "mean" | "avg" | "average" => Ok(RollingStatistic::Mean),
            other => Err(format!("unknown statistic {other:?} (expected \"sum\" or \"mean\")")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RollingPoint {
    pub date: NaiveDate,
    pub value: f64,
    /// Number of readings that went into `value`.
    pub window_len: usize,
}

/// Valid readings of `observations`, sorted ascending by date.
pub fn chronological_readings(observations: &[Observation], policy: ValidityPolicy) -> Vec<Reading> {
    let mut readings = policy.readings(observations);
    readings.sort_by_key(|r| r.date);
    readings
}

/// One point per reading, computed over the trailing `window` readings ending
/// at it. The first `window - 1` points use the shorter windows available
/// rather than padding. A window of 0 behaves like 1.
///
/// `readings` must already be sorted by date.
pub fn rolling(readings: &[Reading], window: usize, statistic: RollingStatistic) -> Vec<RollingPoint> {
    let window = window.max(1);
    readings
        .iter()
        .enumerate()
        .map(|(i, reading)| {
            let start = (i + 1).saturating_sub(window);
            let slice = &readings[start..=i];
            let sum: f64 = slice.iter().map(|r| r.value).sum();
            let value = match statistic {
                RollingStatistic::Sum => sum,
                RollingStatistic::Mean => sum / slice.len() as f64,
            };
            RollingPoint {
                date: reading.date,
                value,
                window_len: slice.len(),
            }
        })
        .collect()
}

/// Filter, sort and accumulate in one step.
pub fn rolling_observations(
    observations: &[Observation],
    policy: ValidityPolicy,
    window: usize,
    statistic: RollingStatistic,
) -> Vec<RollingPoint> {
    rolling(&chronological_readings(observations, policy), window, statistic)
}
