//! CLI interface for optrack
//!
//! Provides subcommands for:
//! - `serve`: run the registry, HTTP API, and health monitor
//! - `config`: show the effective configuration

mod serve;

pub use serve::ServeArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "optrack")]
#[command(about = "Pull-based operations tracking service for long-running research jobs")]
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
    /// Run the operations service
    Serve(ServeArgs),
    /// Show the effective configuration
    Config,
}
