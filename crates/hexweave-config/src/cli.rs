//! Command-line argument parsing for the hexweave simulator.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// hexweave command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug)]
#[command(name = "hexweave-sim", about = "Headless tile map generation simulator")]
pub struct CliArgs {
    /// Fixed generation seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of simulated host instances.
    #[arg(long)]
    pub instances: Option<u32>,

    /// Run as a peer without network authority.
    #[arg(long)]
    pub non_authoritative: bool,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(seed) = args.seed {
            self.scheduler.seed = Some(seed);
        }
        if let Some(n) = args.instances {
            self.sim.instances = n;
        }
        if args.non_authoritative {
            self.sim.authoritative = false;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
