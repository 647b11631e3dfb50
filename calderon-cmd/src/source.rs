//! Where a dataset comes from: a saved payload on disk or the backend.

use anyhow::{anyhow, bail, Context};
use calderon_api::client::ApiClient;
use calderon_api::error::ApiError;
use calderon_api::payload::{unwrap_data, ColumnarSeries, MultiannualTable, YearlyRecords};
use clap::Args;
use log::info;
use serde_json::Value;
use std::fs::File;
use std::future::Future;
use std::path::{Path, PathBuf};

use crate::session::{Outcome, ViewSession};

/// Directory of the long-form daily files.
pub const MONTHLY_DIRECTORY: &str = "data";
/// Directory of the monthly-by-year spreadsheets.
pub const MULTIANNUAL_DIRECTORY: &str = "data2";
/// Directory of the multi-station comparison files.
pub const COMPARISON_DIRECTORY: &str = "data3";

#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Saved JSON payload (or CSV for daily series) to read instead of fetching
    #[arg(short, long, conflicts_with_all = ["directory", "file"])]
    pub input: Option<PathBuf>,

    /// Backend directory to read from
    #[arg(long)]
    pub directory: Option<String>,

    /// File inside the directory; defaults to the first one listed
    #[arg(long)]
    pub file: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ComparisonSourceArgs {
    /// Saved JSON payload to read instead of fetching
    #[arg(short, long, conflicts_with = "file")]
    pub input: Option<PathBuf>,

    /// Comparison file; defaults to the first one listed
    #[arg(long)]
    pub file: Option<String>,
}

/// A decoded dataset and the name it was loaded under.
#[derive(Debug)]
pub struct Dataset<T> {
    pub name: String,
    pub data: T,
}

/// Run one request through a fresh view session, returning the applied
/// data or the recorded error.
///
/// Each call issues a single ticket, so a one-shot command never sees a
/// stale response here. Overlapping requests only occur when a caller keeps
/// one `ViewSession` across several `begin` calls.
pub async fn fetch<T, F>(what: &str, request: F) -> anyhow::Result<T>
where
    F: Future<Output = Result<T, ApiError>>,
{
    let mut session = ViewSession::new();
    let ticket = session.begin();
    match session.complete(ticket, request.await) {
        Outcome::Applied => session
            .into_data()
            .ok_or_else(|| anyhow!("{what}: no data applied")),
        Outcome::Stale => bail!("{what}: response superseded"),
        Outcome::Failed(message) => bail!("{what}: {message}"),
    }
}

/// Parse a saved payload, accepting either the backend envelope or its bare
/// `data` member.
pub fn read_json_input(path: &Path) -> anyhow::Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let value: Value =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(unwrap_data(value))
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

async fn resolve_file(client: &ApiClient, directory: &str, file: Option<&str>) -> anyhow::Result<String> {
    if let Some(file) = file {
        return Ok(file.to_string());
    }
    let listing = fetch("listing files", client.list_files(directory)).await?;
    match listing.files.into_iter().next() {
        Some(first) => {
            info!("No file given, using {first} from {directory}");
            Ok(first)
        }
        None => bail!("no files available in {directory}"),
    }
}

/// Long-form daily series, from a CSV or JSON file or from the backend.
pub async fn load_yearly(source: &SourceArgs, client: &ApiClient) -> anyhow::Result<Dataset<YearlyRecords>> {
    if let Some(path) = &source.input {
        let data = if is_csv(path) {
            let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            YearlyRecords::from_csv_reader(file)?
        } else {
            YearlyRecords::from_value(&read_json_input(path)?)?
        };
        return Ok(Dataset {
            name: file_label(path),
            data,
        });
    }
    let directory = source.directory.as_deref().unwrap_or(MONTHLY_DIRECTORY);
    let file = resolve_file(client, directory, source.file.as_deref()).await?;
    let envelope = fetch("loading daily series", client.precipitation_csv(directory, &file)).await?;
    Ok(Dataset {
        name: envelope.filename,
        data: envelope.data,
    })
}

/// Monthly-by-year table, from a JSON file or from the backend.
pub async fn load_multiannual(
    source: &SourceArgs,
    client: &ApiClient,
) -> anyhow::Result<Dataset<MultiannualTable>> {
    if let Some(path) = &source.input {
        return Ok(Dataset {
            name: file_label(path),
            data: MultiannualTable::from_value(&read_json_input(path)?)?,
        });
    }
    let directory = source.directory.as_deref().unwrap_or(MULTIANNUAL_DIRECTORY);
    let file = resolve_file(client, directory, source.file.as_deref()).await?;
    let envelope = fetch("loading multiannual table", client.precipitation_xlsx(directory, &file)).await?;
    Ok(Dataset {
        name: envelope.filename,
        data: envelope.data,
    })
}

/// Multi-station columnar series, from a JSON file or from the backend.
pub async fn load_columnar(
    source: &ComparisonSourceArgs,
    client: &ApiClient,
) -> anyhow::Result<Dataset<ColumnarSeries>> {
    if let Some(path) = &source.input {
        return Ok(Dataset {
            name: file_label(path),
            data: ColumnarSeries::from_value(&read_json_input(path)?)?,
        });
    }
    let file = resolve_file(client, COMPARISON_DIRECTORY, source.file.as_deref()).await?;
    let envelope = fetch("loading station comparison", client.station_comparison(&file)).await?;
    Ok(Dataset {
        name: envelope.filename,
        data: envelope.data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use calderon_api::endpoints::ApiConfig;
    use std::io::Write;

    fn offline_client() -> ApiClient {
        ApiClient::new(ApiConfig::new("http://127.0.0.1:9", 500)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_applies_data_and_reports_failure() {
        let data = fetch("listing", async { Ok::<_, ApiError>(vec![1, 2]) }).await.unwrap();
        assert_eq!(data, vec![1, 2]);

        let err = fetch("listing", async {
            Err::<Vec<u32>, _>(ApiError::Http {
                status: 404,
                message: "Archivo no encontrado".to_string(),
            })
        })
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "listing: Archivo no encontrado");
    }

    #[tokio::test]
    async fn test_load_yearly_from_csv() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "fecha,valor,completo_mediciones,completo_umbral").unwrap();
        writeln!(file, "2020/01/01,1.5,true,false").unwrap();
        writeln!(file, "2020/01/02,,true,false").unwrap();
        writeln!(file, "2021/01/01,3,true,true").unwrap();
        file.flush().unwrap();

        let source = SourceArgs {
            input: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let dataset = load_yearly(&source, &offline_client()).await.unwrap();
        assert_eq!(dataset.data.years_descending(), vec![2021, 2020]);
        assert_eq!(dataset.data.total_records(), 3);
        assert!(dataset.name.ends_with(".csv"));
    }

    #[tokio::test]
    async fn test_infinite_csv_cell_is_missing() {
        use calderon_data::completeness::global;
        use calderon_data::rolling::{rolling_observations, RollingStatistic};
        use calderon_data::validity::ValidityPolicy;

        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "fecha,valor,completo_mediciones,completo_umbral").unwrap();
        writeln!(file, "2021/01/01,1,1,1").unwrap();
        writeln!(file, "2021/01/02,inf,1,1").unwrap();
        writeln!(file, "2021/01/03,2,1,1").unwrap();
        file.flush().unwrap();

        let source = SourceArgs {
            input: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let dataset = load_yearly(&source, &offline_client()).await.unwrap();
        let observations = dataset.data.observations();
        let record = global(&observations, ValidityPolicy::PresentOnly);
        assert_eq!(record.total_count, 3);
        assert_eq!(record.valid_count, 2);
        assert_eq!(record.valid_sum, 3.0);
        let sums: Vec<f64> =
            rolling_observations(&observations, ValidityPolicy::PresentOnly, 2, RollingStatistic::Sum)
                .iter()
                .map(|p| p.value)
                .collect();
        assert_eq!(sums, vec![1.0, 3.0]);
    }

    #[tokio::test]
    async fn test_load_columnar_from_envelope() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        let payload = serde_json::json!({
            "filename": "comparacion.csv",
            "data": {
                "Fecha": ["2020-01-01", "2020-01-02"],
                "M1094": [1.0, null],
                "M0024": [2.0, 3.0]
            }
        });
        write!(file, "{payload}").unwrap();
        file.flush().unwrap();

        let source = ComparisonSourceArgs {
            input: Some(file.path().to_path_buf()),
            file: None,
        };
        let dataset = load_columnar(&source, &offline_client()).await.unwrap();
        assert_eq!(dataset.data.len(), 2);
        assert_eq!(dataset.data.station_ids(), vec!["M1094", "M0024"]);
    }

    #[tokio::test]
    async fn test_load_multiannual_from_bare_data() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        let payload = serde_json::json!({
            "AÑO": [2019, 2020],
            "ENE": [10.0, 12.0],
            "FEB": [null, 4.0]
        });
        write!(file, "{payload}").unwrap();
        file.flush().unwrap();

        let source = SourceArgs {
            input: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let dataset = load_multiannual(&source, &offline_client()).await.unwrap();
        assert_eq!(dataset.data.years(), vec![2019, 2020]);
    }

    #[tokio::test]
    async fn test_missing_input_file_is_an_error() {
        let source = SourceArgs {
            input: Some(PathBuf::from("/nonexistent/payload.json")),
            ..Default::default()
        };
        let err = load_multiannual(&source, &offline_client()).await.unwrap_err();
        assert!(err.to_string().contains("reading"));
    }

    #[tokio::test]
    async fn test_fetch_surfaces_failure() {
        let err = fetch::<u8, _>("loading", async {
            Err(ApiError::InvalidRequest("nope".to_string()))
        })
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "loading: invalid request: nope");
    }
}
