//! CLI interface for martingale-bot
//!
//! Provides subcommands for:
//! - `run`: Serve the control channel and trade on command
//! - `config`: Show the effective configuration
//! - `status`: Show static defaults

mod run;

pub use run::RunArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "martingale-bot")]
#[command(about = "Martingale binary-options bot for the Deriv WebSocket API")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the control channel and run the engine
    Run(RunArgs),
    /// Show the effective configuration
    Config,
    /// Show current state
    Status,
}
