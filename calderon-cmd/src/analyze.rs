//! Analytics commands: load a dataset, derive tables, write them as CSV.

use anyhow::bail;
use calderon_api::client::ApiClient;
use calderon_api::payload::{ColumnarSeries, YearlyRecords};
use calderon_data::climatology::{
    annual_trend, anomalies, completeness_by_year, station_monthly_means, table_climatology,
    year_vs_climatology,
};
use calderon_data::completeness::{self, SortOrder};
use calderon_data::correlation::{pearson, scatter_pairs, CorrelationMatrix};
use calderon_data::rolling::{rolling_observations, RollingStatistic};
use calderon_data::table::{filter_records, paginate, ITEMS_PER_PAGE};
use calderon_data::validity::ValidityPolicy;
use clap::ValueEnum;
use log::info;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

use crate::output::{completeness_rows, CompletenessRow, format_optional, section, write_rows, write_table};
use crate::session::{ComparisonSelection, MonthlySelection, MultiannualSelection};
use crate::source::{
    load_columnar, load_multiannual, load_yearly, ComparisonSourceArgs, SourceArgs,
    MONTHLY_DIRECTORY,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Grouping {
    Year,
    Month,
    YearMonth,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Order {
    Asc,
    Desc,
}

impl From<Order> for SortOrder {
    fn from(order: Order) -> Self {
        match order {
            Order::Asc => SortOrder::Ascending,
            Order::Desc => SortOrder::Descending,
        }
    }
}

/// Completeness of a daily series grouped by period.
pub fn completeness_table(
    records: &YearlyRecords,
    by: Grouping,
    policy: ValidityPolicy,
    order: SortOrder,
) -> Vec<CompletenessRow> {
    let observations = records.observations();
    match by {
        // payload years count every record, even ones with unusable dates
        Grouping::Year => completeness_rows(&completeness::by_payload_year(records, policy, order)),
        Grouping::Month => completeness_rows(&completeness::by_calendar_month(&observations, policy, order)),
        Grouping::YearMonth => completeness_rows(&completeness::by_year_month(&observations, policy, order)),
        Grouping::Global => completeness_rows(&[completeness::global(&observations, policy)]),
    }
}

pub async fn run_completeness(
    client: &ApiClient,
    source: &SourceArgs,
    by: Grouping,
    policy: ValidityPolicy,
    order: Order,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let dataset = load_yearly(source, client).await?;
    info!(
        "Computing {by:?} completeness of {} ({} records, policy {policy})",
        dataset.name,
        dataset.data.total_records()
    );
    let rows = completeness_table(&dataset.data, by, policy, order.into());
    write_rows(&rows, output)
}

/// Station-by-station matrix as CSV cells, header first.
pub fn correlation_table(matrix: &CorrelationMatrix) -> (Vec<String>, Vec<Vec<String>>) {
    let mut header = vec!["station".to_string()];
    header.extend(matrix.ids.iter().cloned());
    let rows = matrix
        .ids
        .iter()
        .zip(&matrix.values)
        .map(|(id, values)| {
            let mut row = vec![id.clone()];
            row.extend(values.iter().map(|v| format_optional(*v)));
            row
        })
        .collect();
    (header, rows)
}

fn monthly_means_table(series: &ColumnarSeries, policy: ValidityPolicy) -> (Vec<String>, Vec<Vec<String>>) {
    let mut header = vec!["month".to_string()];
    header.extend(series.station_ids().into_iter().map(str::to_string));
    let rows = station_monthly_means(series, policy)
        .into_iter()
        .map(|month| {
            let mut row = vec![month.month];
            row.extend(month.means.iter().map(|(_, mean)| format_optional(*mean)));
            row
        })
        .collect();
    (header, rows)
}

pub async fn run_compare(
    client: &ApiClient,
    source: &ComparisonSourceArgs,
    policy: ValidityPolicy,
    output_dir: Option<&Path>,
) -> anyhow::Result<()> {
    let dataset = load_columnar(source, client).await?;
    let series = &dataset.data;
    info!(
        "Comparing {} stations over {} dates from {}",
        series.stations.len(),
        series.len(),
        dataset.name
    );

    let path = section(output_dir, "station_completeness", "Completeness by station")?;
    write_rows(
        &completeness_rows(&completeness::by_station(series, policy)),
        path.as_deref(),
    )?;

    let (header, rows) = correlation_table(&CorrelationMatrix::from_series(series, policy));
    let path = section(output_dir, "correlation", "Pearson correlation")?;
    write_table(&header, &rows, path.as_deref())?;

    let (header, rows) = monthly_means_table(series, policy);
    let path = section(output_dir, "monthly_means", "Monthly mean by station")?;
    write_table(&header, &rows, path.as_deref())
}

pub async fn run_scatter(
    client: &ApiClient,
    source: &ComparisonSourceArgs,
    x: Option<String>,
    y: Option<String>,
    policy: ValidityPolicy,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let dataset = load_columnar(source, client).await?;
    let series = &dataset.data;

    let mut selection = ComparisonSelection::default();
    selection.select_file(dataset.name.as_str());
    selection.x = x;
    selection.y = y;
    selection.default_pair(&series.station_ids());
    let (Some(x), Some(y)) = (selection.x.as_deref(), selection.y.as_deref()) else {
        bail!("{} needs at least two stations to plot", dataset.name);
    };
    for id in [x, y] {
        if series.station(id).is_none() {
            bail!("unknown station {id:?} (available: {})", series.station_ids().join(", "));
        }
    }

    let points = scatter_pairs(series, x, y, policy);
    let r = match (series.station(x), series.station(y)) {
        (Some(a), Some(b)) => pearson(&a.values, &b.values, policy),
        _ => None,
    };
    eprintln!(
        "{x} vs {y}: {} paired points, r = {}",
        points.len(),
        r.map_or_else(|| "n/a".to_string(), |r| format!("{r:.4}"))
    );
    write_rows(&points, output)
}

pub async fn run_climatology(
    client: &ApiClient,
    source: &SourceArgs,
    year: Option<i32>,
    policy: ValidityPolicy,
    output_dir: Option<&Path>,
) -> anyhow::Result<()> {
    let dataset = load_multiannual(source, client).await?;
    let table = &dataset.data;

    let mut selection = MultiannualSelection::default();
    selection.select_file(dataset.name.as_str());
    selection.year = year;
    selection.default_year(&table.years());
    info!("Multiannual summary of {} ({} years)", dataset.name, table.rows.len());

    let path = section(output_dir, "climatology", "Monthly climatology")?;
    write_rows(&table_climatology(table, policy), path.as_deref())?;

    let path = section(output_dir, "completeness_by_year", "Completeness by year")?;
    write_rows(&completeness_rows(&completeness_by_year(table, policy)), path.as_deref())?;

    let path = section(output_dir, "annual_trend", "Annual average")?;
    write_rows(&annual_trend(table, policy), path.as_deref())?;

    if let Some(year) = selection.year {
        let rows = year_vs_climatology(table, year, policy);
        if rows.is_empty() {
            bail!("{} has no row for year {year}", dataset.name);
        }
        let path = section(output_dir, &format!("year_{year}"), &format!("{year} vs climatology"))?;
        write_rows(&rows, path.as_deref())?;
    }
    Ok(())
}

pub async fn run_anomaly(
    client: &ApiClient,
    source: &SourceArgs,
    policy: ValidityPolicy,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let dataset = load_yearly(source, client).await?;
    let rows = anomalies(&dataset.data.observations(), policy);
    info!("{} anomalies from {}", rows.len(), dataset.name);
    write_rows(&rows, output)
}

pub async fn run_rolling(
    client: &ApiClient,
    source: &SourceArgs,
    window: usize,
    statistic: RollingStatistic,
    policy: ValidityPolicy,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let dataset = load_yearly(source, client).await?;
    let points = rolling_observations(&dataset.data.observations(), policy, window, statistic);
    info!(
        "Rolling {statistic} over {window} readings: {} points from {}",
        points.len(),
        dataset.name
    );
    write_rows(&points, output)
}

/// One line of the daily detail table.
#[derive(Debug, Serialize)]
pub struct DailyRow {
    pub fecha: String,
    pub valor: Option<f64>,
    pub completo_mediciones: String,
    pub completo_umbral: String,
}

fn flag_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub struct TableQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub page: usize,
}

pub async fn run_table(
    client: &ApiClient,
    source: &SourceArgs,
    query: TableQuery,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let dataset = load_yearly(source, client).await?;
    let records = &dataset.data;

    let mut selection =
        MonthlySelection::new(source.directory.as_deref().unwrap_or(MONTHLY_DIRECTORY));
    selection.select_file(dataset.name.as_str());
    selection.select_year(query.year.or_else(|| records.years_descending().first().copied()));
    selection.select_month(query.month);
    selection.select_day(query.day);
    selection.set_page(query.page);

    let Some(year) = selection.year else {
        bail!("{} has no data", dataset.name);
    };
    let filtered = filter_records(records, year, selection.month, selection.day);
    let page = paginate(&filtered, selection.page, ITEMS_PER_PAGE);
    eprintln!(
        "{year}: page {} of {} ({} records)",
        page.number, page.total_pages, page.total_items
    );
    let rows: Vec<DailyRow> = page
        .items
        .iter()
        .map(|record| DailyRow {
            fecha: record.fecha.clone(),
            valor: record.valor,
            completo_mediciones: flag_text(&record.completo_mediciones),
            completo_umbral: flag_text(&record.completo_umbral),
        })
        .collect();
    write_rows(&rows, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use calderon_api::payload::StationSeries;
    use serde_json::json;

    fn yearly() -> YearlyRecords {
        YearlyRecords::from_value(&json!({
            "2020": [
                {"fecha": "2020/01/01", "valor": 10.0},
                {"fecha": "2020/01/02", "valor": null},
                {"fecha": "2020/02/01", "valor": 20.0},
                {"fecha": "2020/02/02", "valor": 30.0}
            ],
            "2021": [
                {"fecha": "2021/01/01", "valor": 0.0}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_completeness_table_by_year() {
        let rows = completeness_table(&yearly(), Grouping::Year, ValidityPolicy::PresentOnly, SortOrder::Descending);
        assert_eq!(rows[0].period, "2021");
        assert_eq!(rows[0].percentage, 100.0);
        assert_eq!(rows[1].period, "2020");
        assert_eq!(rows[1].percentage, 75.0);

        let rows = completeness_table(&yearly(), Grouping::Year, ValidityPolicy::NonZero, SortOrder::Ascending);
        assert_eq!(rows[1].percentage, 0.0);
    }

    #[test]
    fn test_completeness_table_other_groupings() {
        let records = yearly();
        let months = completeness_table(&records, Grouping::Month, ValidityPolicy::PresentOnly, SortOrder::Ascending);
        assert_eq!(months.len(), 2);
        assert_eq!(months[0].period, "Ene");
        assert_eq!(months[0].total_count, 3);
        let global = completeness_table(&records, Grouping::Global, ValidityPolicy::PresentOnly, SortOrder::Ascending);
        assert_eq!(global.len(), 1);
        assert_eq!(global[0].percentage, 80.0);
        let ym = completeness_table(&records, Grouping::YearMonth, ValidityPolicy::PresentOnly, SortOrder::Ascending);
        assert_eq!(ym.iter().map(|r| r.period.as_str()).collect::<Vec<_>>(), vec!["2020-01", "2020-02", "2021-01"]);
    }

    #[test]
    fn test_correlation_table() {
        let d = |day| chrono::NaiveDate::from_ymd_opt(2020, 1, day).unwrap();
        let series = ColumnarSeries {
            dates: vec![d(1), d(2), d(3)],
            stations: vec![
                StationSeries { id: "a".to_string(), values: vec![Some(1.0), Some(2.0), Some(3.0)] },
                StationSeries { id: "b".to_string(), values: vec![None, None, None] },
            ],
        };
        let matrix = CorrelationMatrix::from_series(&series, ValidityPolicy::PresentOnly);
        let (header, rows) = correlation_table(&matrix);
        assert_eq!(header, vec!["station", "a", "b"]);
        assert_eq!(rows[0], vec!["a", "1.0000", ""]);
        assert_eq!(rows[1], vec!["b", "", ""]);

        let (header, rows) = monthly_means_table(&series, ValidityPolicy::PresentOnly);
        assert_eq!(header, vec!["month", "a", "b"]);
        assert_eq!(rows, vec![vec!["01".to_string(), "2.0000".to_string(), String::new()]]);
    }

    #[test]
    fn test_flag_text() {
        assert_eq!(flag_text(&Value::Null), "");
        assert_eq!(flag_text(&json!(true)), "true");
        assert_eq!(flag_text(&json!("Sí")), "Sí");
    }
}
