//! Pearson correlation between date-aligned station series.

use crate::validity::ValidityPolicy;
use calderon_api::payload::ColumnarSeries;
use chrono::NaiveDate;
use log::debug;
use serde::Serialize;

/// Positions where both series hold a valid value, as `(x, y)` pairs.
/// Series are aligned by index; positions past the shorter one are absent.
pub fn paired_valid(x: &[Option<f64>], y: &[Option<f64>], policy: ValidityPolicy) -> Vec<(f64, f64)> {
    x.iter()
        .zip(y)
        .filter_map(|(a, b)| Some((policy.valid_value(*a)?, policy.valid_value(*b)?)))
        .collect()
}

/// Pearson coefficient over the positions valid in both series.
///
/// `None` with fewer than two pairs or when either side is constant over the
/// pairs. The result is symmetric in its arguments.
pub fn pearson(x: &[Option<f64>], y: &[Option<f64>], policy: ValidityPolicy) -> Option<f64> {
    let pairs = paired_valid(x, y, policy);
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(a, _)| a).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, b)| b).sum::<f64>() / n;

    let (mut num, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in &pairs {
        let dx = a - mean_x;
        let dy = b - mean_y;
        num += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let den = (sxx * syy).sqrt();
    if den == 0.0 || !den.is_finite() {
        return None;
    }
    Some((num / den).clamp(-1.0, 1.0))
}

/// Correlation of a series with itself: exactly 1 once it has a valid value.
pub fn self_correlation(x: &[Option<f64>], policy: ValidityPolicy) -> Option<f64> {
    x.iter().any(|v| policy.is_valid(*v)).then_some(1.0)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub ids: Vec<String>,
    /// Row-major; `values[i][j]` is the coefficient between `ids[i]` and `ids[j]`.
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    /// Build the matrix for every station of `series`, in document order.
    pub fn from_series(series: &ColumnarSeries, policy: ValidityPolicy) -> Self {
        let n = series.stations.len();
        debug!("correlating {n} stations over {} dates", series.len());
        let mut values = vec![vec![None; n]; n];
        for (i, a) in series.stations.iter().enumerate() {
            values[i][i] = self_correlation(&a.values, policy);
            for (j, b) in series.stations.iter().enumerate().skip(i + 1) {
                let r = pearson(&a.values, &b.values, policy);
                values[i][j] = r;
                values[j][i] = r;
            }
        }
        CorrelationMatrix {
            ids: series.stations.iter().map(|s| s.id.clone()).collect(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.ids.iter().position(|id| id == a)?;
        let j = self.ids.iter().position(|id| id == b)?;
        self.values[i][j]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub date: NaiveDate,
    pub x: f64,
    pub y: f64,
}

/// Dates on which both stations hold a valid value. Empty when either
/// station is unknown.
pub fn scatter_pairs(
    series: &ColumnarSeries,
    x_id: &str,
    y_id: &str,
    policy: ValidityPolicy,
) -> Vec<ScatterPoint> {
    let (Some(x), Some(y)) = (series.station(x_id), series.station(y_id)) else {
        return Vec::new();
    };
    series
        .dates
        .iter()
        .zip(x.values.iter().zip(&y.values))
        .filter_map(|(date, (a, b))| {
            Some(ScatterPoint {
                date: *date,
                x: policy.valid_value(*a)?,
                y: policy.valid_value(*b)?,
            })
        })
        .collect()
}
