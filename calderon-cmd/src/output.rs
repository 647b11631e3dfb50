//! CSV output of derived tables, to a file or to stdout.

use anyhow::Context;
use calderon_data::completeness::CompletenessRecord;
use log::warn;
use serde::Serialize;
use std::fmt::Display;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

fn writer(output: Option<&Path>) -> anyhow::Result<csv::Writer<Box<dyn Write>>> {
    let sink: Box<dyn Write> = match output {
        Some(path) => Box::new(
            std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    Ok(csv::Writer::from_writer(sink))
}

/// Serialize flat rows with a header taken from the field names.
///
/// The header comes from the first row, so an empty table produces no
/// output at all; that case is logged.
pub fn write_rows<S: Serialize>(rows: &[S], output: Option<&Path>) -> anyhow::Result<()> {
    if rows.is_empty() {
        match output {
            Some(path) => warn!("no rows to write, {} left empty", path.display()),
            None => warn!("no rows to write"),
        }
    }
    let mut wtr = writer(output)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write an explicit header and string rows, for tables whose columns are
/// only known at runtime (one per station).
pub fn write_table(header: &[String], rows: &[Vec<String>], output: Option<&Path>) -> anyhow::Result<()> {
    let mut wtr = writer(output)?;
    wtr.write_record(header)?;
    for row in rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Destination of one table among several: `<dir>/<name>.csv`, or stdout
/// under a `# title` line.
pub fn section(dir: Option<&Path>, name: &str, title: &str) -> anyhow::Result<Option<PathBuf>> {
    match dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
            Ok(Some(dir.join(format!("{name}.csv"))))
        }
        None => {
            println!("# {title}");
            Ok(None)
        }
    }
}

pub fn format_optional(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.4}")).unwrap_or_default()
}

/// Flat CSV row of a completeness record.
#[derive(Debug, Serialize)]
pub struct CompletenessRow {
    pub period: String,
    pub total_count: usize,
    pub valid_count: usize,
    pub percentage: f64,
    pub valid_sum: f64,
    pub average: Option<f64>,
}

impl<K: Display> From<&CompletenessRecord<K>> for CompletenessRow {
    fn from(record: &CompletenessRecord<K>) -> Self {
        CompletenessRow {
            period: record.period.to_string(),
            total_count: record.total_count,
            valid_count: record.valid_count,
            percentage: record.percentage,
            valid_sum: record.valid_sum,
            average: record.average,
        }
    }
}

pub fn completeness_rows<K: Display>(records: &[CompletenessRecord<K>]) -> Vec<CompletenessRow> {
    records.iter().map(CompletenessRow::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use calderon_data::completeness::PeriodKey;

    #[test]
    fn test_write_rows_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let records = vec![CompletenessRecord {
            period: PeriodKey::YearMonth(2020, 2),
            total_count: 4,
            valid_count: 3,
            percentage: 75.0,
            valid_sum: 6.0,
            average: Some(2.0),
        }];
        write_rows(&completeness_rows(&records), Some(&path)).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("period,total_count,valid_count,percentage,valid_sum,average")
        );
        assert_eq!(lines.next(), Some("2020-02,4,3,75.0,6.0,2.0"));
    }

    #[test]
    fn test_write_rows_empty_still_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        write_rows::<CompletenessRow>(&[], Some(&path)).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_write_table_and_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = section(Some(dir.path()), "correlation", "Correlation").unwrap().unwrap();
        assert!(path.ends_with("correlation.csv"));
        let header = vec!["station".to_string(), "a".to_string()];
        let rows = vec![vec!["a".to_string(), format_optional(Some(1.0))]];
        write_table(&header, &rows, Some(&path)).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "station,a\na,1.0000\n");
        assert_eq!(format_optional(None), "");
    }
}
