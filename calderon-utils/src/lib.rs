//! Shared utility functions for Calderón crates.

/// Date utility functions
pub mod dates {
    use chrono::{Datelike, NaiveDate};

    /// ISO date format used by the columnar payloads: "YYYY-MM-DD"
    pub const ISO_FORMAT: &str = "%Y-%m-%d";

    /// Slash date format used by the long-form payloads: "YYYY/MM/DD"
    pub const SLASH_FORMAT: &str = "%Y/%m/%d";

    /// Short Spanish month labels, January first.
    pub const MONTH_LABELS: [&str; 12] = [
        "Ene", "Feb", "Mar", "Abr", "May", "Jun", "Jul", "Ago", "Sep", "Oct", "Nov", "Dic",
    ];

    /// Month column keys of the multiannual tables, January first.
    pub const MONTH_KEYS: [&str; 12] = [
        "ENE", "FEB", "MAR", "ABR", "MAY", "JUN", "JUL", "AGO", "SEP", "OCT", "NOV", "DIC",
    ];

    /// Format a NaiveDate as "YYYY-MM-DD"
    pub fn format_date(date: &NaiveDate) -> String {
        date.format(ISO_FORMAT).to_string()
    }

    /// Parse a date string in "YYYY-MM-DD" format
    pub fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
        Ok(NaiveDate::parse_from_str(s, ISO_FORMAT)?)
    }

    /// Parse a date string in "YYYY/MM/DD" format
    pub fn parse_slash_date(s: &str) -> anyhow::Result<NaiveDate> {
        Ok(NaiveDate::parse_from_str(s, SLASH_FORMAT)?)
    }

    /// Parse any of the date shapes the backend emits.
    ///
    /// Accepts "YYYY-MM-DD", "YYYY/MM/DD", a trailing time part
    /// ("YYYY-MM-DD HH:MM:SS" or "YYYY-MM-DDTHH:MM:SS"), and the month-only
    /// forms "YYYY-MM" / "YYYY/MM", which resolve to the first of the month.
    pub fn parse_flexible(s: &str) -> anyhow::Result<NaiveDate> {
        let trimmed = s.trim();
        let date_part = trimmed
            .split(|c: char| c == ' ' || c == 'T')
            .next()
            .unwrap_or(trimmed);
        if let Ok(date) = parse_date(date_part) {
            return Ok(date);
        }
        if let Ok(date) = parse_slash_date(date_part) {
            return Ok(date);
        }
        let normalized = date_part.replace('/', "-");
        let mut parts = normalized.split('-');
        if let (Some(y), Some(m), None) = (parts.next(), parts.next(), parts.next()) {
            let year: i32 = y.parse()?;
            let month: u32 = m.parse()?;
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, 1) {
                return Ok(date);
            }
        }
        Err(crate::error::DateError(format!("unrecognised date: {trimmed:?}")).into())
    }

    /// Year-month key "YYYY-MM" for a date.
    pub fn year_month_key(date: &NaiveDate) -> String {
        format!("{:04}-{:02}", date.year(), date.month())
    }

    /// Two-digit month key "MM" for a date.
    pub fn month_key(date: &NaiveDate) -> String {
        format!("{:02}", date.month())
    }

    /// Spanish label for a 1-based month number.
    pub fn month_label(month: u32) -> Option<&'static str> {
        match month {
            1..=12 => Some(MONTH_LABELS[(month - 1) as usize]),
            _ => None,
        }
    }

}

/// Numeric helpers
pub mod numbers {
    /// Round to a fixed number of decimal places, half away from zero.
    pub fn round_to(value: f64, decimals: u32) -> f64 {
        let factor = 10f64.powi(decimals as i32);
        (value * factor).round() / factor
    }

    /// Percentage of `part` over `whole`, rounded to one decimal.
    /// Returns 0 when `whole` is zero.
    pub fn percentage(part: usize, whole: usize) -> f64 {
        if whole == 0 {
            return 0.0;
        }
        round_to(100.0 * part as f64 / whole as f64, 1)
    }

    /// Mean of a slice, `None` when empty.
    pub fn mean(values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_round_to() {
            assert_eq!(round_to(66.666, 1), 66.7);
            assert_eq!(round_to(12.34, 0), 12.0);
            assert_eq!(round_to(-1.25, 1), -1.3);
        }

        #[test]
        fn test_percentage() {
            assert_eq!(percentage(3, 4), 75.0);
            assert_eq!(percentage(1, 3), 33.3);
            assert_eq!(percentage(2, 3), 66.7);
            assert_eq!(percentage(0, 0), 0.0);
            assert_eq!(percentage(5, 5), 100.0);
        }

        #[test]
        fn test_mean() {
            assert_eq!(mean(&[]), None);
            assert_eq!(mean(&[1.0, 2.0, 6.0]), Some(3.0));
        }
    }
}

/// Error types
pub mod error {
    use std::fmt;

    #[derive(Debug)]
    pub struct DateError(pub String);

    impl fmt::Display for DateError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "Date error: {}", self.0)
        }
    }

    impl std::error::Error for DateError {}
}
