mod api_client;
mod config;
mod data;
mod entity;
mod error;
mod runner;
mod server;
mod warehouse;

use api_client::ApiClient;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use config::Config;
use error::Error;
use log::{error, info};
use runner::{RunResult, RunStatus};
use server::AppState;
use std::sync::Arc;
use warehouse::BigQueryClient;

#[derive(Parser)]
struct Args {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the trigger endpoint.
    Serve {
        #[arg(long, env = "PORT", default_value_t = 8080)]
        port: u16,
    },
    /// Load the daily stats report once.
    Run {
        #[arg(long, help = "Date should be in the form YYYY-MM-DD, defaults to yesterday", value_parser = validate_date)]
        date: Option<NaiveDate>,
    },
    /// Load ads, ad groups and campaigns once.
    UpdateMeta {
        #[arg(long, help = "Date should be in the form YYYY-MM-DD, defaults to yesterday", value_parser = validate_date)]
        date: Option<NaiveDate>,
    },
}

// Same parser serde uses for `?date=` on the trigger endpoint.
fn validate_date(s: &str) -> Result<NaiveDate, String> {
    s.parse::<NaiveDate>()
        .map_err(|_| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

fn exit_on_failure(result: &RunResult) {
    match result.status {
        RunStatus::Success => info!("{}", result.message),
        _ => {
            error!("run finished with {:?}: {}", result.status, result.message);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let api = ApiClient::new(&args.config)?;
    let warehouse = BigQueryClient::new(&args.config);

    match args.command {
        Command::Serve { port } => {
            let state = AppState {
                api: Arc::new(api),
                warehouse: Arc::new(warehouse),
                config: Arc::new(args.config),
            };
            if let Err(err) = server::serve(state, port).await {
                error!("server stopped: {}", err);
                std::process::exit(1);
            }
        }
        Command::Run { date } => {
            let date = date.unwrap_or_else(runner::yesterday);
            let result = runner::run_stats(&api, &warehouse, &args.config, &date).await;
            exit_on_failure(&result);
        }
        Command::UpdateMeta { date } => {
            let date = date.unwrap_or_else(runner::yesterday);
            let result = runner::update_meta(&api, &warehouse, &args.config, &date).await;
            exit_on_failure(&result);
        }
    };

    Ok(())
}
