//! `smartthings-auth`: authorize this machine against SmartThings and keep
//! the stored OAuth tokens healthy.

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use smartthings_domain::constants::CALLBACK_TIMEOUT_SECS;
use smartthings_infra::config;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "smartthings-auth", version, about = "SmartThings OAuth setup and token maintenance")]
struct Cli {
    /// Read settings from this TOML or JSON file instead of probing
    #[arg(long, global = true, env = "SMARTTHINGS_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the interactive OAuth authorization and store the tokens
    Setup {
        /// Seconds to wait for the browser callback
        #[arg(long, default_value_t = CALLBACK_TIMEOUT_SECS)]
        timeout: u64,

        /// Print the authorization URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,
    },
    /// Show the configured mode and the stored token's validity
    Status,
    /// Refresh the access token now
    Refresh,
}

impl Command {
    const fn name(&self) -> &'static str {
        match self {
            Self::Setup { .. } => "setup",
            Self::Status => "status",
            Self::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool, format: LogFormat) {
    use tracing_subscriber::fmt;

    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match format {
        LogFormat::Json => fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).json().init(),
        LogFormat::Text => fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).init(),
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let settings = match cli.config {
        Some(path) => config::load_from_file(Some(path))?,
        None => config::load()?,
    };
    tracing::debug!(command = cli.command.name(), settings = ?settings, "dispatching command");

    match cli.command {
        Command::Setup { timeout, no_browser } => {
            commands::setup(&settings, Duration::from_secs(timeout), !no_browser).await?;
            Ok(true)
        }
        Command::Status => commands::status(&settings).await,
        Command::Refresh => {
            commands::refresh(&settings).await?;
            Ok(true)
        }
    }
}
