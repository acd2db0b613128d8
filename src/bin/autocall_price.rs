//! Command-line entry point for autocallable note pricing.
//!
//! Usage: `autocall-price [config.json]`. Loads a JSON run configuration (default
//! `data/mip_autocallable.json`), prices the note and prints the report as JSON on
//! stdout. Logs go to stderr and follow `RUST_LOG` (default `info`).

use std::error::Error;
use std::process::ExitCode;

use autocall_mc::config::PricingConfig;
use autocall_mc::mc::AutocallableSimulation;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "data/mip_autocallable.json";

type AppResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> AppResult<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    info!(%path, "loading pricing configuration");

    let config = PricingConfig::from_path(&path)?;
    let simulation = AutocallableSimulation::from_config(&config)?;
    let report = simulation.compute(&config.run)?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "pricing run failed");
            ExitCode::FAILURE
        }
    }
}
