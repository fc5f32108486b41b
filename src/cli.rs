use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "meterbox")]
#[command(about = "Meter telemetry collector with store-and-forward delivery", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $METERBOX_CONFIG or config/meterbox.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll devices on the configured interval until interrupted
    Run,
    /// Run a single poll-deliver-prune cycle and exit
    Cycle,
    /// Print reading store statistics
    Stats,
}
