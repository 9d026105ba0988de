//! smhiwx - SMHI weather for Swedish cities
//!
//! Resolves a city to an SMHI observation station with data and prints
//! forecasts and observations streamed from the SMHI open-data APIs.

use std::process::ExitCode;

use clap::Parser;
use tokio::runtime::Handle;
use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use smhiwx::cli::{self, Cli};

/// Sets up compact logging to stderr; `RUST_LOG` overrides `-v`.
fn init_logging(verbose: u8) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli::log_filter(verbose)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    debug!(command = ?cli.command, "Starting");

    // The front end is synchronous and blocks on network reads
    let runtime = Handle::current();
    let result = tokio::task::spawn_blocking(move || cli::run(&cli, runtime)).await;

    match result {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(e)) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
