//! Commands that talk to the backend and print what it returns.

use anyhow::{bail, Context};
use calderon_api::client::ApiClient;
use calderon_api::models::{
    ChatModel, ChatRequest, CompareRequest, EmailRequest, ForecastRequest, InterpretationModel,
    InterpretationRequest, PdfEmailRequest, PredictItem, PredictRequest, ReportEnvelope,
    ReportKind, WaterDataQuery,
};
use clap::{Args, Subcommand, ValueEnum};
use log::info;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::output::{write_rows, write_table};
use crate::source::{fetch, read_json_input};

#[derive(Args, Debug, Clone)]
pub struct ForecastArgs {
    /// Number of months to forecast
    #[arg(long, default_value_t = 12)]
    pub months_ahead: u32,

    /// First forecast year (backend default: after the last known month)
    #[arg(long)]
    pub start_year: Option<i32>,

    /// First forecast month, 1-12
    #[arg(long)]
    pub start_month: Option<u32>,

    /// Estimated population
    #[arg(long)]
    pub population: Option<f64>,

    /// Average monthly precipitation in mm
    #[arg(long)]
    pub precipitation: Option<f64>,
}

impl From<&ForecastArgs> for ForecastRequest {
    fn from(args: &ForecastArgs) -> Self {
        ForecastRequest {
            months_ahead: args.months_ahead,
            start_year: args.start_year,
            start_month: args.start_month,
            poblacion_estimada: args.population,
            precipitacion_promedio: args.precipitation,
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum WaterCommand {
    /// Historical monthly consumption
    Data {
        #[arg(long)]
        year_from: Option<i32>,

        #[arg(long)]
        year_to: Option<i32>,

        /// Months to keep, e.g. 1,2,12
        #[arg(long, value_delimiter = ',')]
        months: Vec<u32>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Predict consumption for explicit inputs
    Predict {
        /// YYYY-MM:PRECIPITATION_MM:POPULATION, repeatable
        #[arg(long = "item", required = true, value_parser = parse_predict_item)]
        items: Vec<PredictItem>,
    },

    /// Real vs predicted consumption with error metrics
    Compare {
        #[arg(long)]
        year_from: Option<i32>,

        #[arg(long)]
        year_to: Option<i32>,

        #[arg(long, value_delimiter = ',')]
        months: Vec<u32>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Forecast the coming months
    Forecast {
        #[command(flatten)]
        forecast: ForecastArgs,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Csv,
    Pdf,
}

impl From<KindArg> for ReportKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Csv => ReportKind::Csv,
            KindArg::Pdf => ReportKind::Pdf,
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum ReportCommand {
    /// Generate a forecast report on the backend
    Generate {
        #[arg(value_enum)]
        kind: KindArg,

        #[command(flatten)]
        forecast: ForecastArgs,
    },

    /// Generate a PDF report and email it
    Email {
        /// Recipient address
        #[arg(long)]
        to: String,

        #[arg(long)]
        subject: Option<String>,

        #[arg(long)]
        body: Option<String>,

        #[command(flatten)]
        forecast: ForecastArgs,
    },

    /// List generated reports
    History {
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
    },

    /// Download a generated report
    Download {
        #[arg(value_enum)]
        kind: KindArg,

        filename: String,

        /// Destination path (defaults to the file name)
        #[arg(short, long)]
        dest: Option<PathBuf>,
    },

    /// Check the backend's mail configuration
    TestEmail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelArg {
    Openai,
    Zephyr,
    Gemini,
}

impl From<ModelArg> for ChatModel {
    fn from(model: ModelArg) -> Self {
        match model {
            ModelArg::Openai => ChatModel::Openai,
            ModelArg::Zephyr => ChatModel::Zephyr,
            ModelArg::Gemini => ChatModel::Gemini,
        }
    }
}

/// Parse `YYYY-MM:PRECIPITATION:POPULATION`.
pub fn parse_predict_item(raw: &str) -> Result<PredictItem, String> {
    let parts: Vec<&str> = raw.split(':').map(str::trim).collect();
    let [period, precipitation, population] = parts.as_slice() else {
        return Err(format!("expected YYYY-MM:PRECIPITATION:POPULATION, got {raw:?}"));
    };
    let (year, month) = period
        .split_once('-')
        .ok_or_else(|| format!("expected YYYY-MM, got {period:?}"))?;
    let number = |s: &str, what: &str| s.parse::<f64>().map_err(|_| format!("invalid {what} {s:?}"));
    Ok(PredictItem {
        anio: year.parse().map_err(|_| format!("invalid year {year:?}"))?,
        mes: month.parse().map_err(|_| format!("invalid month {month:?}"))?,
        precipitacion_mm: number(*precipitation, "precipitation")?,
        poblacion: number(*population, "population")?,
    })
}

/// Columns in first-seen order across all rows.
pub fn json_rows_table(rows: &[Map<String, Value>]) -> (Vec<String>, Vec<Vec<String>>) {
    let mut header: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !header.contains(key) {
                header.push(key.clone());
            }
        }
    }
    let cells = rows
        .iter()
        .map(|row| {
            header
                .iter()
                .map(|key| match row.get(key) {
                    None | Some(Value::Null) => String::new(),
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                })
                .collect()
        })
        .collect();
    (header, cells)
}

fn print_envelope(envelope: &ReportEnvelope) -> anyhow::Result<()> {
    if !envelope.message.is_empty() {
        println!("{}", envelope.message);
    }
    if !envelope.data.is_null() {
        println!("{}", serde_json::to_string_pretty(&envelope.data)?);
    }
    Ok(())
}

pub async fn run_files(client: &ApiClient, directory: &str) -> anyhow::Result<()> {
    let listing = fetch("listing files", client.list_files(directory)).await?;
    info!("{} files in {directory}", listing.files.len());
    for file in listing.files {
        println!("{file}");
    }
    Ok(())
}

pub async fn run_download(
    client: &ApiClient,
    directory: &str,
    file: &str,
    dest: Option<&Path>,
) -> anyhow::Result<()> {
    let dest = dest.map_or_else(|| PathBuf::from(file), Path::to_path_buf);
    let bytes = fetch("downloading file", client.download_file(directory, file, &dest)).await?;
    println!("{} ({bytes} bytes)", dest.display());
    Ok(())
}

pub async fn run_water(client: &ApiClient, command: WaterCommand) -> anyhow::Result<()> {
    match command {
        WaterCommand::Data {
            year_from,
            year_to,
            months,
            output,
        } => {
            let query = WaterDataQuery {
                year_from,
                year_to,
                months,
            };
            let response = fetch("loading consumption", client.water_data(&query)).await?;
            let (header, rows) = json_rows_table(&response.rows);
            write_table(&header, &rows, output.as_deref())
        }
        WaterCommand::Predict { items } => {
            let request = PredictRequest { items };
            let response = fetch("predicting", client.predict(&request)).await?;
            for (item, prediction) in request.items.iter().zip(&response.predictions) {
                println!("{}-{:02}: {prediction:.2}", item.anio, item.mes);
            }
            Ok(())
        }
        WaterCommand::Compare {
            year_from,
            year_to,
            months,
            output,
        } => {
            let request = CompareRequest {
                year_from,
                year_to,
                months: (!months.is_empty()).then_some(months),
            };
            let response = fetch("comparing", client.compare(&request)).await?;
            for (name, value) in &response.metrics {
                eprintln!("{name}: {value:.4}");
            }
            write_rows(&response.rows, output.as_deref())
        }
        WaterCommand::Forecast { forecast, output } => {
            let response = fetch("forecasting", client.forecast(&(&forecast).into())).await?;
            write_rows(&response.rows, output.as_deref())
        }
    }
}

pub async fn run_report(client: &ApiClient, command: ReportCommand) -> anyhow::Result<()> {
    match command {
        ReportCommand::Generate { kind, forecast } => {
            let envelope = fetch(
                "generating report",
                client.generate_report(kind.into(), &(&forecast).into()),
            )
            .await?;
            print_envelope(&envelope)
        }
        ReportCommand::Email {
            to,
            subject,
            body,
            forecast,
        } => {
            let mut email_request = EmailRequest::new(to);
            if let Some(subject) = subject {
                email_request.subject = subject;
            }
            if let Some(body) = body {
                email_request.body = body;
            }
            let request = PdfEmailRequest {
                forecast_request: (&forecast).into(),
                email_request,
            };
            let envelope = fetch("emailing report", client.generate_pdf_and_email(&request)).await?;
            print_envelope(&envelope)
        }
        ReportCommand::History { kind } => {
            let envelope = fetch("loading report history", client.report_history(kind.map(Into::into))).await?;
            print_envelope(&envelope)
        }
        ReportCommand::Download { kind, filename, dest } => {
            let dest = dest.unwrap_or_else(|| PathBuf::from(&filename));
            let bytes = fetch(
                "downloading report",
                client.download_report(kind.into(), &filename, &dest),
            )
            .await?;
            println!("{} ({bytes} bytes)", dest.display());
            Ok(())
        }
        ReportCommand::TestEmail => {
            let envelope = fetch("testing email", client.test_email_config()).await?;
            print_envelope(&envelope)
        }
    }
}

pub async fn run_chat(client: &ApiClient, model: ModelArg, question: &[String]) -> anyhow::Result<()> {
    let request = ChatRequest {
        pregunta: question.join(" "),
        modelo: model.into(),
    };
    let response = fetch("asking", client.chat(&request)).await?;
    info!("answered by {:?} at {}", response.modelo, response.timestamp);
    println!("{}", response.respuesta);
    Ok(())
}

/// Chart points to interpret: a JSON array, bare or under `data`.
pub fn interpretation_points(path: &Path) -> anyhow::Result<Vec<Value>> {
    match read_json_input(path)? {
        Value::Array(points) if !points.is_empty() => Ok(points),
        Value::Array(_) => bail!("{} holds no data points", path.display()),
        _ => bail!("{} must hold a JSON array of data points", path.display()),
    }
}

pub async fn run_interpret(client: &ApiClient, title: &str, kind: &str, input: &Path) -> anyhow::Result<()> {
    let request = InterpretationRequest {
        modelo: InterpretationModel::Gemini,
        titulo: title.to_string(),
        tipo_dato: kind.to_string(),
        datos: interpretation_points(input).context("reading chart data")?,
    };
    let response = fetch("interpreting", client.interpret(&request)).await?;
    match response.text() {
        Some(text) => println!("{text}"),
        None => println!("{}", serde_json::to_string_pretty(&response.interpretacion)?),
    }
    if !response.analisis_estadistico.is_null() {
        println!("{}", serde_json::to_string_pretty(&response.analisis_estadistico)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_parse_predict_item() {
        let item = parse_predict_item("2025-03:120.5:48000").unwrap();
        assert_eq!(item.anio, 2025);
        assert_eq!(item.mes, 3);
        assert_eq!(item.precipitacion_mm, 120.5);
        assert_eq!(item.poblacion, 48000.0);
        assert!(parse_predict_item("2025-03:120.5").is_err());
        assert!(parse_predict_item("2025:1:2").is_err());
        assert!(parse_predict_item("2025-03:x:2").is_err());
    }

    #[test]
    fn test_json_rows_table_unions_columns() {
        let rows: Vec<Map<String, Value>> = serde_json::from_value(json!([
            {"anio": 2020, "mes": 1, "consumo": 10.5},
            {"anio": 2020, "mes": 2, "nota": "estimado", "consumo": null}
        ]))
        .unwrap();
        let (header, cells) = json_rows_table(&rows);
        assert_eq!(header, vec!["anio", "mes", "consumo", "nota"]);
        assert_eq!(cells[0], vec!["2020", "1", "10.5", ""]);
        assert_eq!(cells[1], vec!["2020", "2", "", "estimado"]);
    }

    #[test]
    fn test_forecast_args_into_request() {
        let args = ForecastArgs {
            months_ahead: 6,
            start_year: Some(2026),
            start_month: Some(1),
            population: None,
            precipitation: Some(80.0),
        };
        let request: ForecastRequest = (&args).into();
        assert_eq!(request.months_ahead, 6);
        assert_eq!(request.precipitacion_promedio, Some(80.0));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_interpretation_points() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "{}", json!({"filename": "x", "data": [{"fecha": "2025-01", "valor": 1.5}]})).unwrap();
        file.flush().unwrap();
        assert_eq!(interpretation_points(file.path()).unwrap().len(), 1);

        let mut empty = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(empty, "[]").unwrap();
        empty.flush().unwrap();
        assert!(interpretation_points(empty.path()).is_err());
    }
}
