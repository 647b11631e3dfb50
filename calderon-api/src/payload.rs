//! Decoding of the dataset payloads served by the backend.
//!
//! Three shapes arrive over the wire:
//!
//! - **Columnar** (`/precipitation/data3/{file}`): `{ "Fecha": [...], "<station>": [...] }`,
//!   one column per station sharing the `Fecha` axis.
//! - **Long-form** (`/precipitation/csv/{dir}/{file}`): either grouped by year,
//!   `{ "<year>": [ { fecha, valor, completo_mediciones, completo_umbral }, ... ] }`,
//!   or the same four fields as parallel columns.
//! - **Multiannual** (`/precipitation/xlsx/{dir}/{file}`): `{ "AÑO": [...], "ENE": [...], ..., "DIC": [...] }`.
//!
//! Every dataset response wraps its payload as `{ filename, directory, data }`.

use crate::error::PayloadError;
use crate::observation::{number_from_json, parse_number, DailyRecord, Observation};
use calderon_utils::dates::{parse_flexible, MONTH_KEYS};
use chrono::{Datelike, NaiveDate};
use csv::ReaderBuilder;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::io::Read;

/// Date axis column of the columnar payload.
pub const DATE_FIELD: &str = "Fecha";

/// Year column of the multiannual payload.
pub const YEAR_FIELD: &str = "AÑO";

/// `{ filename, directory, data }` wrapper around every dataset response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetEnvelope<T> {
    pub filename: String,
    #[serde(default)]
    pub directory: Option<String>,
    pub data: T,
}

impl DatasetEnvelope<Value> {
    /// Decode the raw `data` member with one of the payload decoders.
    pub fn decode<T, F>(self, decoder: F) -> Result<DatasetEnvelope<T>, PayloadError>
    where
        F: FnOnce(&Value) -> Result<T, PayloadError>,
    {
        let data = decoder(&self.data)?;
        Ok(DatasetEnvelope {
            filename: self.filename,
            directory: self.directory,
            data,
        })
    }
}

/// Strip the dataset envelope if present, so saved responses and bare
/// payloads can be fed to the same decoders.
pub fn unwrap_data(value: Value) -> Value {
    match value {
        Value::Object(mut object) if object.contains_key("filename") && object.contains_key("data") => {
            object.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// `{ "files": [...] }` listing of a backend data directory.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<String>,
}

/// One station column of a [`ColumnarSeries`], index-aligned with its dates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationSeries {
    pub id: String,
    pub values: Vec<Option<f64>>,
}

/// Several stations sharing one date axis.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ColumnarSeries {
    pub dates: Vec<NaiveDate>,
    pub stations: Vec<StationSeries>,
}

impl ColumnarSeries {
    /// Decode a columnar payload.
    ///
    /// `Fecha` is required. Rows whose date cannot be parsed are dropped from
    /// every column so the stations stay aligned. Station columns keep
    /// document order; a column shorter than the date axis reads as absent
    /// past its end, and a member that is not an array is skipped.
    pub fn from_value(value: &Value) -> Result<Self, PayloadError> {
        let object = value
            .as_object()
            .ok_or(PayloadError::NotAnObject("columnar series"))?;
        let raw_dates = object
            .get(DATE_FIELD)
            .ok_or_else(|| PayloadError::MissingField(DATE_FIELD.to_string()))?
            .as_array()
            .ok_or_else(|| PayloadError::ExpectedArray(DATE_FIELD.to_string()))?;

        let mut kept_rows = Vec::with_capacity(raw_dates.len());
        let mut dates = Vec::with_capacity(raw_dates.len());
        for (idx, raw) in raw_dates.iter().enumerate() {
            match raw.as_str().and_then(|s| parse_flexible(s).ok()) {
                Some(date) => {
                    kept_rows.push(idx);
                    dates.push(date);
                }
                None => warn!("dropping row {idx}: unusable date {raw}"),
            }
        }

        let stations = object
            .iter()
            .filter(|(key, _)| key.as_str() != DATE_FIELD)
            .filter_map(|(key, column)| match column.as_array() {
                Some(cells) => Some(StationSeries {
                    id: key.clone(),
                    values: kept_rows
                        .iter()
                        .map(|&idx| cells.get(idx).and_then(number_from_json))
                        .collect(),
                }),
                None => {
                    warn!("skipping column {key:?}: not an array");
                    None
                }
            })
            .collect();

        Ok(ColumnarSeries { dates, stations })
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn station_ids(&self) -> Vec<&str> {
        self.stations.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn station(&self, id: &str) -> Option<&StationSeries> {
        self.stations.iter().find(|s| s.id == id)
    }

    /// Observations of one station; empty when the station is unknown.
    pub fn observations(&self, id: &str) -> Vec<Observation> {
        match self.station(id) {
            Some(station) => self
                .dates
                .iter()
                .zip(&station.values)
                .map(|(date, value)| Observation::new(*date, *value))
                .collect(),
            None => Vec::new(),
        }
    }
}

/// Long-form daily records grouped by calendar year.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct YearlyRecords(pub BTreeMap<i32, Vec<DailyRecord>>);

#[derive(Debug, Deserialize)]
struct CsvRow {
    fecha: String,
    #[serde(default)]
    valor: String,
    #[serde(default)]
    completo_mediciones: String,
    #[serde(default)]
    completo_umbral: String,
}

impl YearlyRecords {
    /// Decode a long-form payload, either grouped by year or as parallel
    /// `fecha`/`valor`/`completo_*` columns.
    pub fn from_value(value: &Value) -> Result<Self, PayloadError> {
        let object = value
            .as_object()
            .ok_or(PayloadError::NotAnObject("long-form series"))?;
        if object.get("fecha").is_some_and(Value::is_array) {
            return Ok(Self::from_columns(object));
        }

        let mut by_year = BTreeMap::new();
        for (key, rows) in object {
            let year: i32 = key
                .trim()
                .parse()
                .map_err(|_| PayloadError::InvalidYear(key.clone()))?;
            let rows = rows
                .as_array()
                .ok_or_else(|| PayloadError::ExpectedArray(key.clone()))?;
            let records = rows
                .iter()
                .map(|row| {
                    DailyRecord::deserialize(row).map_err(|e| PayloadError::InvalidRecord {
                        year,
                        message: e.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            by_year.insert(year, records);
        }
        Ok(YearlyRecords(by_year))
    }

    fn from_columns(object: &Map<String, Value>) -> Self {
        let column = |name: &str| object.get(name).and_then(Value::as_array);
        let cell = |name: &str, idx: usize| {
            column(name)
                .and_then(|cells| cells.get(idx))
                .cloned()
                .unwrap_or(Value::Null)
        };
        let mut by_year: BTreeMap<i32, Vec<DailyRecord>> = BTreeMap::new();
        for (idx, fecha) in column("fecha").into_iter().flatten().enumerate() {
            let Some(fecha) = fecha.as_str() else {
                warn!("dropping row {idx}: missing fecha");
                continue;
            };
            let record = DailyRecord {
                fecha: fecha.to_string(),
                valor: number_from_json(&cell("valor", idx)),
                completo_mediciones: cell("completo_mediciones", idx),
                completo_umbral: cell("completo_umbral", idx),
            };
            match record.date() {
                Some(date) => by_year.entry(date.year()).or_default().push(record),
                None => warn!("dropping row {idx}: unusable date {fecha:?}"),
            }
        }
        YearlyRecords(by_year)
    }

    /// Read a local CSV with header `fecha,valor,completo_mediciones,completo_umbral`.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, PayloadError> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let mut by_year: BTreeMap<i32, Vec<DailyRecord>> = BTreeMap::new();
        for (idx, row) in rdr.deserialize::<CsvRow>().enumerate() {
            let row = row.map_err(|e| PayloadError::Csv(e.to_string()))?;
            let record = DailyRecord {
                fecha: row.fecha.trim().to_string(),
                valor: parse_number(&row.valor),
                completo_mediciones: flag_from_text(&row.completo_mediciones),
                completo_umbral: flag_from_text(&row.completo_umbral),
            };
            match record.date() {
                Some(date) => by_year.entry(date.year()).or_default().push(record),
                None => warn!("dropping CSV row {}: unusable date {:?}", idx + 1, record.fecha),
            }
        }
        Ok(YearlyRecords(by_year))
    }

    /// Years present, most recent first.
    pub fn years_descending(&self) -> Vec<i32> {
        self.0.keys().rev().copied().collect()
    }

    pub fn records(&self, year: i32) -> &[DailyRecord] {
        self.0.get(&year).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn total_records(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    /// All records of every year as observations. Records whose `fecha`
    /// is not a date are left out.
    pub fn observations(&self) -> Vec<Observation> {
        self.0
            .values()
            .flatten()
            .filter_map(DailyRecord::observation)
            .collect()
    }
}

fn flag_from_text(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Some(n) = trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }
    Value::String(trimmed.to_string())
}

/// One year of the multiannual table: a value per calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiannualRow {
    pub year: i32,
    pub months: [Option<f64>; 12],
}

/// Monthly values by year, as produced from the `AÑO, ENE..DIC` spreadsheets.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MultiannualTable {
    pub rows: Vec<MultiannualRow>,
}

impl MultiannualTable {
    /// Decode a multiannual payload. `AÑO` is required; missing month
    /// columns read as absent. Rows without a usable year are skipped.
    pub fn from_value(value: &Value) -> Result<Self, PayloadError> {
        let object = value
            .as_object()
            .ok_or(PayloadError::NotAnObject("multiannual table"))?;
        let years = object
            .get(YEAR_FIELD)
            .ok_or_else(|| PayloadError::MissingField(YEAR_FIELD.to_string()))?
            .as_array()
            .ok_or_else(|| PayloadError::ExpectedArray(YEAR_FIELD.to_string()))?;
        let month_columns = MONTH_KEYS.map(|key| object.get(key).and_then(Value::as_array));

        let rows = years
            .iter()
            .enumerate()
            .filter_map(|(idx, raw_year)| {
                let year = year_from_json(raw_year)?;
                let months = std::array::from_fn(|m| {
                    month_columns[m]
                        .and_then(|cells| cells.get(idx))
                        .and_then(number_from_json)
                });
                Some(MultiannualRow { year, months })
            })
            .collect();
        Ok(MultiannualTable { rows })
    }

    pub fn years(&self) -> Vec<i32> {
        self.rows.iter().map(|row| row.year).collect()
    }

    pub fn row(&self, year: i32) -> Option<&MultiannualRow> {
        self.rows.iter().find(|row| row.year == year)
    }
}

fn year_from_json(value: &Value) -> Option<i32> {
    let year = match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => i,
            None => {
                let f = n.as_f64()?;
                if f.fract() != 0.0 {
                    return None;
                }
                f as i64
            }
        },
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    match i32::try_from(year) {
        Ok(0) | Err(_) => None,
        Ok(y) => Some(y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_columnar_keeps_station_order_and_alignment() {
        let payload = json!({
            "Fecha": ["2020-01-01", "2020-02-01", "2020-03-01"],
            "P34-Papallacta": [10.0, null, 30.5],
            "C05-Bellavista": [1, 2],
        });
        let series = ColumnarSeries::from_value(&payload).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.station_ids(), vec!["P34-Papallacta", "C05-Bellavista"]);
        assert_eq!(
            series.station("P34-Papallacta").unwrap().values,
            vec![Some(10.0), None, Some(30.5)]
        );
        // shorter column pads with absent values, never synthesized
        assert_eq!(
            series.station("C05-Bellavista").unwrap().values,
            vec![Some(1.0), Some(2.0), None]
        );
        let obs = series.observations("C05-Bellavista");
        assert_eq!(obs[1], Observation::new(date(2020, 2, 1), Some(2.0)));
        assert!(series.observations("missing").is_empty());
    }

    #[test]
    fn test_columnar_drops_undated_rows_from_every_column() {
        let payload = json!({
            "Fecha": ["2020-01-01", null, "2020-03-01"],
            "A": [1, 2, 3],
            "B": [4, 5, 6],
            "meta": "not a column",
        });
        let series = ColumnarSeries::from_value(&payload).unwrap();
        assert_eq!(series.dates, vec![date(2020, 1, 1), date(2020, 3, 1)]);
        assert_eq!(series.station("A").unwrap().values, vec![Some(1.0), Some(3.0)]);
        assert_eq!(series.station("B").unwrap().values, vec![Some(4.0), Some(6.0)]);
        assert!(series.station("meta").is_none());
    }

    #[test]
    fn test_columnar_requires_fecha() {
        let err = ColumnarSeries::from_value(&json!({ "A": [1] })).unwrap_err();
        assert_eq!(err, PayloadError::MissingField("Fecha".to_string()));
        let err = ColumnarSeries::from_value(&json!({ "Fecha": "2020-01-01" })).unwrap_err();
        assert_eq!(err, PayloadError::ExpectedArray("Fecha".to_string()));
        let err = ColumnarSeries::from_value(&json!([1, 2])).unwrap_err();
        assert_eq!(err, PayloadError::NotAnObject("columnar series"));
    }

    #[test]
    fn test_yearly_records_grouped_by_year() {
        let payload = json!({
            "2019": [
                { "fecha": "2019/12/30", "valor": 1.5, "completo_mediciones": 1, "completo_umbral": 1 },
                { "fecha": "2019/12/31", "valor": null, "completo_mediciones": 0, "completo_umbral": 0 }
            ],
            "2020": [
                { "fecha": "2020/01/01", "valor": 0.0, "completo_mediciones": 1, "completo_umbral": 1 }
            ]
        });
        let records = YearlyRecords::from_value(&payload).unwrap();
        assert_eq!(records.years_descending(), vec![2020, 2019]);
        assert_eq!(records.records(2019).len(), 2);
        assert!(records.records(1990).is_empty());
        assert_eq!(records.total_records(), 3);
        let obs = records.observations();
        assert_eq!(obs.len(), 3);
        assert_eq!(obs[0].date, date(2019, 12, 30));
        assert_eq!(obs[1].value, None);
    }

    #[test]
    fn test_yearly_records_rejects_bad_shapes() {
        let err = YearlyRecords::from_value(&json!({ "dos mil": [] })).unwrap_err();
        assert_eq!(err, PayloadError::InvalidYear("dos mil".to_string()));
        let err = YearlyRecords::from_value(&json!({ "2020": {} })).unwrap_err();
        assert_eq!(err, PayloadError::ExpectedArray("2020".to_string()));
        let err = YearlyRecords::from_value(&json!({ "2020": [ { "valor": 1 } ] })).unwrap_err();
        assert!(matches!(err, PayloadError::InvalidRecord { year: 2020, .. }));
    }

    #[test]
    fn test_yearly_records_from_parallel_columns() {
        let payload = json!({
            "fecha": ["2018/05/01", "2019/05/01", "bad"],
            "valor": [2.0, null, 3.0],
            "completo_mediciones": [1, 0, 1],
            "completo_umbral": ["SI", "NO", "SI"]
        });
        let records = YearlyRecords::from_value(&payload).unwrap();
        assert_eq!(records.years_descending(), vec![2019, 2018]);
        assert_eq!(records.records(2018)[0].valor, Some(2.0));
        assert_eq!(records.records(2019)[0].completo_umbral, json!("NO"));
        assert_eq!(records.total_records(), 2);
    }

    #[test]
    fn test_yearly_records_from_csv() {
        let csv_data = "\
fecha,valor,completo_mediciones,completo_umbral
2021/01/01,3.5,1,1
2021/01/02,,0,0
2021/01/03,NaN,0,SI
2021/01/04,inf,1,1
2022/02/01,--,1,
";
        let records = YearlyRecords::from_csv_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(records.years_descending(), vec![2022, 2021]);
        let year = records.records(2021);
        assert_eq!(year[0].valor, Some(3.5));
        assert_eq!(year[0].completo_mediciones, json!(1));
        assert_eq!(year[1].valor, None);
        assert_eq!(year[2].valor, None);
        assert_eq!(year[2].completo_umbral, json!("SI"));
        assert_eq!(year[3].valor, None);
        assert_eq!(records.records(2022)[0].completo_umbral, Value::Null);
    }

    #[test]
    fn test_multiannual_table() {
        let payload = json!({
            "AÑO": [2001, null, "2003", 2004.0],
            "ENE": [10.0, 1.0, 12.0, null],
            "FEB": ["8,5", 1.0, null, 4.0],
        });
        let table = MultiannualTable::from_value(&payload).unwrap();
        assert_eq!(table.years(), vec![2001, 2003, 2004]);
        let first = table.row(2001).unwrap();
        assert_eq!(first.months[0], Some(10.0));
        assert_eq!(first.months[1], Some(8.5));
        assert_eq!(first.months[2], None);
        // row index alignment survives the skipped null year
        assert_eq!(table.row(2003).unwrap().months[0], Some(12.0));
        assert_eq!(table.row(2004).unwrap().months[1], Some(4.0));
        assert!(table.row(2002).is_none());

        let err = MultiannualTable::from_value(&json!({ "ENE": [] })).unwrap_err();
        assert_eq!(err, PayloadError::MissingField("AÑO".to_string()));
    }

    #[test]
    fn test_envelope_decode_and_unwrap() {
        let raw = json!({
            "filename": "Precipitacion_Mensual_C05.csv",
            "directory": "data3",
            "data": { "Fecha": ["2020-01-01"], "C05": [1.0] }
        });
        let envelope: DatasetEnvelope<Value> = serde_json::from_value(raw.clone()).unwrap();
        let decoded = envelope.decode(ColumnarSeries::from_value).unwrap();
        assert_eq!(decoded.filename, "Precipitacion_Mensual_C05.csv");
        assert_eq!(decoded.directory.as_deref(), Some("data3"));
        assert_eq!(decoded.data.station_ids(), vec!["C05"]);

        let bare = unwrap_data(raw);
        assert!(bare.get("Fecha").is_some());
        let untouched = unwrap_data(json!({ "data": 1 }));
        assert_eq!(untouched, json!({ "data": 1 }));
    }

    #[test]
    fn test_file_list() {
        let list: FileList = serde_json::from_value(json!({ "files": ["a.csv", "b.csv"] })).unwrap();
        assert_eq!(list.files.len(), 2);
        let empty: FileList = serde_json::from_value(json!({})).unwrap();
        assert!(empty.files.is_empty());
    }
}
