//! Calderón CLI - explore precipitation, consumption and climate data served
//! by the Calderón prediction API.

use calderon_cmd::{ApiConfig, Command};
use clap::Parser;

#[derive(Parser)]
#[command(
    name = "calderon",
    version,
    about = "Hydro-climatic data toolkit for the Calderón municipality"
)]
struct Cli {
    /// Base URL of the prediction API
    #[arg(
        long,
        global = true,
        env = calderon_cmd::BASE_URL_ENV,
        default_value = calderon_cmd::DEFAULT_BASE_URL
    )]
    base_url: String,

    /// Request timeout in milliseconds
    #[arg(long, global = true, default_value_t = calderon_cmd::DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = ApiConfig::new(cli.base_url, cli.timeout_ms);
    calderon_cmd::run(cli.command, config).await
}
