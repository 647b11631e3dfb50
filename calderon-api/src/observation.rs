use calderon_utils::dates::parse_flexible;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A single dated measurement.
///
/// `value` is `None` when the backend sent `null` (or nothing usable).
/// A NaN value is kept as `Some(NaN)`; whether it counts is decided by the
/// validity policy of the caller, not here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

impl Observation {
    pub fn new(date: NaiveDate, value: Option<f64>) -> Self {
        Observation { date, value }
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }

    pub fn month(&self) -> u32 {
        self.date.month()
    }
}

/// One row of the long-form daily payload:
/// `{ "fecha": "YYYY/MM/DD", "valor": 12.5, "completo_mediciones": .., "completo_umbral": .. }`.
///
/// The two `completo_*` flags are produced upstream and carried through
/// untouched for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub fecha: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub valor: Option<f64>,
    #[serde(default)]
    pub completo_mediciones: Value,
    #[serde(default)]
    pub completo_umbral: Value,
}

impl DailyRecord {
    /// Parsed date of the record, `None` when `fecha` is not a date.
    pub fn date(&self) -> Option<NaiveDate> {
        parse_flexible(&self.fecha).ok()
    }

    /// Convert into an [`Observation`]; records with an unusable date are
    /// dropped rather than given a synthetic one.
    pub fn observation(&self) -> Option<Observation> {
        self.date().map(|date| Observation::new(date, self.valor))
    }
}

/// Interpret a JSON scalar as a measurement.
///
/// Numbers map to themselves, numeric strings (with either `.` or `,` as
/// decimal separator) are parsed, and everything else is absent.
pub fn number_from_json(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// Parse a textual measurement, treating the backend's missing-value
/// markers ("", "NaN", "nan", "--") as absent. Infinities, spelled out or
/// overflowing, are absent too.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    match trimmed {
        "" | "NaN" | "nan" | "--" => None,
        s => s
            .replace(',', ".")
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite()),
    }
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number_from_json(&value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_daily_record_deserialize() {
        let record: DailyRecord = serde_json::from_value(json!({
            "fecha": "2019/03/04",
            "valor": 4.2,
            "completo_mediciones": 1,
            "completo_umbral": "SI"
        }))
        .unwrap();
        assert_eq!(record.valor, Some(4.2));
        assert_eq!(record.completo_umbral, json!("SI"));
        let obs = record.observation().unwrap();
        assert_eq!(obs.date, NaiveDate::from_ymd_opt(2019, 3, 4).unwrap());
        assert_eq!(obs.year(), 2019);
        assert_eq!(obs.month(), 3);
    }

    #[test]
    fn test_daily_record_null_and_missing_value() {
        let null_value: DailyRecord =
            serde_json::from_value(json!({ "fecha": "2019/03/04", "valor": null })).unwrap();
        assert_eq!(null_value.valor, None);
        assert_eq!(null_value.completo_mediciones, Value::Null);

        let missing: DailyRecord = serde_json::from_value(json!({ "fecha": "2019/03/04" })).unwrap();
        assert_eq!(missing.valor, None);
    }

    #[test]
    fn test_daily_record_bad_date_has_no_observation() {
        let record: DailyRecord =
            serde_json::from_value(json!({ "fecha": "sin fecha", "valor": 3 })).unwrap();
        assert!(record.observation().is_none());
    }

    #[test]
    fn test_number_from_json() {
        assert_eq!(number_from_json(&json!(3)), Some(3.0));
        assert_eq!(number_from_json(&json!(2.5)), Some(2.5));
        assert_eq!(number_from_json(&json!("7,25")), Some(7.25));
        assert_eq!(number_from_json(&json!("--")), None);
        assert_eq!(number_from_json(&json!(null)), None);
        assert_eq!(number_from_json(&json!(true)), None);
        assert_eq!(parse_number(" NaN "), None);
    }

    #[test]
    fn test_infinite_numbers_are_missing() {
        for raw in ["inf", "-inf", "Infinity", "1e400", "-1e400"] {
            assert_eq!(parse_number(raw), None, "{raw}");
        }
        assert_eq!(number_from_json(&json!("infinity")), None);
        assert_eq!(parse_number("1e300"), Some(1e300));
    }
}
