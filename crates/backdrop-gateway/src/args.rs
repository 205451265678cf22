//! CLI argument definitions.

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "backdrop")]
#[command(about = "Keeps a generated background image fresh", long_about = None)]
pub struct Cli {
    /// Config file (default: $BACKDROP_CONFIG, then ./backdrop.toml).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub cmd: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Generate a new image if one is due (default).
    Run,

    /// Show image and schedule status without generating.
    Status {
        /// Print the status as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Run a cycle every few minutes until interrupted.
    Daemon {
        /// Seconds between due checks.
        #[arg(long, default_value_t = 300)]
        tick_secs: u64,
    },

    /// Serve the image and the polling endpoint over HTTP.
    Serve,
}
