//! Headless hexweave simulator.
//!
//! Registers the configured custom tiles, generates every simulated instance
//! concurrently, and prints the resulting layouts.
//!
//! Run with: `cargo run -p hexweave-sim -- --seed 7 --instances 4`

mod authority;
mod sim_host;
mod simulation;

use std::process::ExitCode;

use clap::Parser;
use hexweave_config::{CliArgs, Config};
use hexweave_gen::GenerationOutcome;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    // Resolve config directory
    let config_dir = match args.config.clone().map_or_else(Config::default_dir, Ok) {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("Failed to resolve config directory: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    hexweave_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    info!(
        instances = config.sim.instances,
        slots = config.sim.slots,
        authoritative = config.sim.authoritative,
        seed = ?config.scheduler.seed,
        "hexweave simulator"
    );

    let runs = simulation::run(&config).await;

    let mut failed = 0;
    for run in &runs {
        println!("{:?} layout", run.layout);
        print!("{}", run.host.render());
        match &run.outcome {
            GenerationOutcome::Completed(report) => {
                println!("  pool: {:?}", report.pool.iter().map(|t| t.0).collect::<Vec<_>>());
            }
            GenerationOutcome::Failed(reason) => {
                error!(layout = ?run.layout, %reason, "Generation failed");
                failed += 1;
            }
            GenerationOutcome::Cancelled => {
                error!(layout = ?run.layout, "Generation was cancelled");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        error!(failed, total = runs.len(), "Some instances did not generate");
        ExitCode::FAILURE
    } else {
        info!(total = runs.len(), "All instances generated");
        ExitCode::SUCCESS
    }
}
