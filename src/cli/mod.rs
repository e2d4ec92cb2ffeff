//! CLI module: command parsing and dispatch
//!
//! All CLI logic lives here. `main.rs` calls `cli::run()`.

pub mod common;
pub mod config;
pub mod fetch;
pub mod resolve;
pub mod serve;
pub mod status;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::error;

use quickmc::config::Config;
use quickmc::error::QuickError;

#[derive(Parser)]
#[command(name = "quickmc")]
#[command(version)]
#[command(
    about = "Fetch, verify and supervise a PaperMC server",
    long_about = None
)]
struct Cli {
    /// Config file (defaults to $QUICKMC_CONFIG or ./quickmc.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Acquire the server jar, launch it and serve /healthcheck and /metrics (default)
    Run,
    /// Resolve the build coordinate and print its download link
    Resolve {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },
    /// Download, verify and prepare the server jar without launching it
    Fetch,
    /// Probe a running server once and print its status
    Status {
        /// Server host (defaults to the configured status host)
        #[arg(long)]
        host: Option<String>,
        /// Server port (defaults to the configured status port)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration file and environment overrides
    Check,
}

fn cmd_version() {
    println!("quickmc {}", env!("CARGO_PKG_VERSION"));
}

/// Load config and install the logger for commands that need both.
fn load_runtime(path: Option<&std::path::Path>) -> Result<Config> {
    let config = Config::load(path).with_context(|| "Failed to load configuration")?;
    quickmc::utils::logging::init_logging(&config.logging)
        .with_context(|| "Failed to initialize logging")?;
    Ok(config)
}

/// Log a fatal error once, tagged with its kind, before it reaches `main`.
fn report_fatal(err: &anyhow::Error) {
    match err.downcast_ref::<QuickError>() {
        Some(e) => error!(kind = e.kind(), error = %e, "Fatal error"),
        None => error!(error = %format!("{:#}", err), "Fatal error"),
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    // A missing .env is fine; values already in the environment win.
    let _ = dotenvy::dotenv();

    let config_path = cli.config.as_deref();
    let result = match cli.command {
        Some(Commands::Version) => {
            cmd_version();
            return Ok(());
        }
        Some(Commands::Config { action }) => return config::cmd_config(action, config_path),
        None | Some(Commands::Run) => {
            let config = load_runtime(config_path)?;
            serve::cmd_run(config).await
        }
        Some(Commands::Resolve { json }) => {
            let config = load_runtime(config_path)?;
            resolve::cmd_resolve(&config, json).await
        }
        Some(Commands::Fetch) => {
            let config = load_runtime(config_path)?;
            fetch::cmd_fetch(&config).await
        }
        Some(Commands::Status { host, port }) => {
            let config = load_runtime(config_path)?;
            status::cmd_status(&config, host, port).await
        }
    };

    if let Err(e) = &result {
        report_fatal(e);
    }
    result
}
