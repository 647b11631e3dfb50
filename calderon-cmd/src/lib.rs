//! Command implementations for the Calderón CLI.
//!
//! Analytics subcommands load a dataset (from the backend or a saved
//! payload), derive tables with `calderon-data` and write them as CSV.
//! The remaining subcommands pass requests through to the backend.

use calderon_api::client::ApiClient;
use calderon_data::rolling::{RollingStatistic, DEFAULT_ROLLING_WINDOW};
use calderon_data::validity::ValidityPolicy;
use clap::Subcommand;
use std::path::PathBuf;

pub mod analyze;
pub mod output;
pub mod remote;
pub mod session;
pub mod source;

use analyze::{Grouping, Order, TableQuery};
use remote::{ModelArg, ReportCommand, WaterCommand};
use source::{ComparisonSourceArgs, SourceArgs};

pub use calderon_api::endpoints::{ApiConfig, BASE_URL_ENV, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_MS};

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List the files the backend serves from a directory
    Files {
        /// Directory name, e.g. data, data2 or data3
        directory: String,
    },

    /// Download a raw data file
    Download {
        directory: String,

        file: String,

        /// Destination path (defaults to the file name)
        #[arg(long)]
        dest: Option<PathBuf>,
    },

    /// Completeness of a daily series by period
    Completeness {
        #[command(flatten)]
        source: SourceArgs,

        /// Period to group by
        #[arg(long, value_enum, default_value_t = Grouping::Year)]
        by: Grouping,

        /// Which values count as present: present or non-zero
        #[arg(long, default_value_t)]
        policy: ValidityPolicy,

        #[arg(long, value_enum, default_value_t = Order::Asc)]
        order: Order,

        /// Output CSV path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Station completeness, correlation matrix and monthly means
    Compare {
        #[command(flatten)]
        source: ComparisonSourceArgs,

        #[arg(long, default_value_t)]
        policy: ValidityPolicy,

        /// Write one CSV per table into this directory
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Paired values of two stations
    Scatter {
        #[command(flatten)]
        source: ComparisonSourceArgs,

        /// Station on the x axis (defaults to the first station)
        #[arg(short, long)]
        x: Option<String>,

        /// Station on the y axis (defaults to the next station)
        #[arg(short, long)]
        y: Option<String>,

        #[arg(long, default_value_t)]
        policy: ValidityPolicy,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Climatology, yearly completeness and annual trend of a multiannual table
    Climatology {
        #[command(flatten)]
        source: SourceArgs,

        /// Year to compare against the climatology (defaults to the latest)
        #[arg(long)]
        year: Option<i32>,

        #[arg(long, default_value_t)]
        policy: ValidityPolicy,

        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Departure of each daily value from its monthly mean
    Anomaly {
        #[command(flatten)]
        source: SourceArgs,

        #[arg(long, default_value_t)]
        policy: ValidityPolicy,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Trailing-window sum or mean of the valid daily values
    Rolling {
        #[command(flatten)]
        source: SourceArgs,

        #[arg(short, long, default_value_t = DEFAULT_ROLLING_WINDOW)]
        window: usize,

        /// sum or mean
        #[arg(long, default_value_t)]
        stat: RollingStatistic,

        #[arg(long, default_value_t)]
        policy: ValidityPolicy,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Page through the daily records of one year
    Table {
        #[command(flatten)]
        source: SourceArgs,

        /// Year to show (defaults to the latest)
        #[arg(long)]
        year: Option<i32>,

        #[arg(long)]
        month: Option<u32>,

        #[arg(long)]
        day: Option<u32>,

        #[arg(short, long, default_value_t = 1)]
        page: usize,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Consumption data, predictions and forecasts
    Water {
        #[command(subcommand)]
        command: WaterCommand,
    },

    /// Forecast reports
    Report {
        #[command(subcommand)]
        command: ReportCommand,
    },

    /// Ask the assistant a question
    Chat {
        #[arg(short, long, value_enum, default_value_t = ModelArg::Openai)]
        model: ModelArg,

        #[arg(required = true)]
        question: Vec<String>,
    },

    /// Natural-language reading of chart data
    Interpret {
        #[arg(long)]
        title: String,

        /// Kind of data, e.g. precipitacion or consumo
        #[arg(long)]
        kind: String,

        /// JSON array of data points
        #[arg(short, long)]
        input: PathBuf,
    },
}

pub async fn run(command: Command, config: ApiConfig) -> anyhow::Result<()> {
    let client = ApiClient::new(config)?;
    match command {
        Command::Files { directory } => remote::run_files(&client, &directory).await,
        Command::Download {
            directory,
            file,
            dest,
        } => remote::run_download(&client, &directory, &file, dest.as_deref()).await,
        Command::Completeness {
            source,
            by,
            policy,
            order,
            output,
        } => analyze::run_completeness(&client, &source, by, policy, order, output.as_deref()).await,
        Command::Compare {
            source,
            policy,
            output_dir,
        } => analyze::run_compare(&client, &source, policy, output_dir.as_deref()).await,
        Command::Scatter {
            source,
            x,
            y,
            policy,
            output,
        } => analyze::run_scatter(&client, &source, x, y, policy, output.as_deref()).await,
        Command::Climatology {
            source,
            year,
            policy,
            output_dir,
        } => analyze::run_climatology(&client, &source, year, policy, output_dir.as_deref()).await,
        Command::Anomaly {
            source,
            policy,
            output,
        } => analyze::run_anomaly(&client, &source, policy, output.as_deref()).await,
        Command::Rolling {
            source,
            window,
            stat,
            policy,
            output,
        } => analyze::run_rolling(&client, &source, window, stat, policy, output.as_deref()).await,
        Command::Table {
            source,
            year,
            month,
            day,
            page,
            output,
        } => {
            let query = TableQuery {
                year,
                month,
                day,
                page,
            };
            analyze::run_table(&client, &source, query, output.as_deref()).await
        }
        Command::Water { command } => remote::run_water(&client, command).await,
        Command::Report { command } => remote::run_report(&client, command).await,
        Command::Chat { model, question } => remote::run_chat(&client, model, &question).await,
        Command::Interpret { title, kind, input } => {
            remote::run_interpret(&client, &title, &kind, &input).await
        }
    }
}
