//! jottasync CLI - Mirror a local directory tree into JottaCloud
//!
//! Provides commands for:
//! - Reconciling a local tree with its remote mirror (`scan`)
//! - Showing what differs without touching the remote (`diff`)
//! - Viewing and editing configuration (`config`)

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use jottasync_core::config::Config;
use tracing_subscriber::EnvFilter;

mod commands;
mod errorfile;
mod output;

use commands::{config::ConfigCommand, diff::DiffCommand, scan::ScanCommand, Context};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "jottasync",
    version,
    about = "Mirror a local directory into JottaCloud"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Upload new and changed files, prune remote-only entries
    Scan(ScanCommand),
    /// Show how a local tree differs from its remote mirror
    Diff(DiffCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Picks the log filter: `RUST_LOG`, then `-v`, then `--quiet`, then the config file
fn log_filter(verbose: u8, quiet: bool, configured: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = match (verbose, quiet) {
        (0, true) => "warn",
        (0, false) => configured,
        (1, _) => "debug",
        _ => "trace",
    };
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load_or_default(&config_path);

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose, cli.quiet, &config.logging.level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let ctx = Context {
        format: if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        },
        quiet: cli.quiet,
        config_path,
    };

    match cli.command {
        Commands::Scan(cmd) => cmd.execute(&ctx).await,
        Commands::Diff(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
    }
}
