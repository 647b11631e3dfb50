use calderon_api::observation::Observation;
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Decides whether a value counts as present.
///
/// The monthly completeness charts treat a literal zero as missing, while the
/// comparison and multiannual views count it. Zero precipitation is a real
/// measurement, so `PresentOnly` is the default and `NonZero` must be asked
/// for explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ValidityPolicy {
    /// Invalid only when absent or NaN.
    #[default]
    PresentOnly,
    /// Also invalid when exactly zero.
    NonZero,
}

impl ValidityPolicy {
    pub fn is_valid(self, value: Option<f64>) -> bool {
        match value {
            None => false,
            Some(v) if v.is_nan() => false,
            Some(v) => match self {
                ValidityPolicy::PresentOnly => true,
                ValidityPolicy::NonZero => v != 0.0,
            },
        }
    }

    /// The value itself when valid.
    pub fn valid_value(self, value: Option<f64>) -> Option<f64> {
        if self.is_valid(value) {
            value
        } else {
            None
        }
    }

    /// Keep only the valid observations, in input order.
    pub fn readings(self, observations: &[Observation]) -> Vec<Reading> {
        observations
            .iter()
            .filter_map(|obs| {
                self.valid_value(obs.value).map(|value| Reading {
                    date: obs.date,
                    value,
                })
            })
            .collect()
    }
}

impl fmt::Display for ValidityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidityPolicy::PresentOnly => write!(f, "present"),
            ValidityPolicy::NonZero => write!(f, "non-zero"),
        }
    }
}

impl FromStr for ValidityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" | "present-only" | "not-null" => Ok(ValidityPolicy::PresentOnly),
            "non-zero" | "nonzero" => Ok(ValidityPolicy::NonZero),
            other => Err(format!(
                "unknown validity policy {other:?} (expected \"present\" or \"non-zero\")"
            )),
        }
    }
}

/// An observation already known to be valid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    pub date: NaiveDate,
    pub value: f64,
}
