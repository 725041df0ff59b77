mod config_cmd;
mod doctor_cmd;
mod relay_cmd;
mod run_cmd;
mod snap_cmd;
mod terminal_output;
mod wiring;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, warn};

use snapsage_config::{config_dir, config_file_path, load_and_prepare, SnapSageConfig, ValidationReport};
use snapsage_config::defaults::DEFAULT_LOG_LEVEL;
use snapsage_logging::init_logger;

#[derive(Parser)]
#[command(name = "snapsage")]
#[command(about = "SnapSage: point a camera at text and get an explanation")]
#[command(version)]
struct Cli {
    /// Path to the config file (defaults to ~/.snapsage/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the camera and run capture cycles from the keyboard
    Run,
    /// Run a single cycle over a still image
    Snap {
        /// Image file standing in for the rear camera
        #[arg(long)]
        image: PathBuf,
    },
    /// Serve the reasoning relay (`POST /chat`)
    Relay {
        /// Port to bind, overriding relay.port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Check OCR, camera devices and the reasoning endpoint
    Doctor,
    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective config with secrets masked
    Show,
    /// Write a config file populated with defaults
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| config_file_path(&config_dir()));

    // These two must work even when the existing config does not load.
    match cli.command {
        Commands::Config {
            action: ConfigAction::Init { force },
        } => {
            config_cmd::init(&config_path, force).await?;
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Doctor => return doctor_cmd::run(&config_path).await,
        _ => {}
    }

    let (config, report) = load_and_prepare(&config_path)
        .await
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    init_logging(&config)?;
    log_report(&report);

    match cli.command {
        Commands::Config {
            action: ConfigAction::Show,
        } => {
            config_cmd::show(&config)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run => {
            ensure_valid(&report)?;
            run_cmd::run(&config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Snap { image } => {
            ensure_valid(&report)?;
            snap_cmd::run(&config, &image).await
        }
        Commands::Relay { port } => {
            ensure_valid(&report)?;
            relay_cmd::run(&config, port).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Doctor | Commands::Config { .. } => Ok(ExitCode::SUCCESS),
    }
}

fn init_logging(config: &SnapSageConfig) -> Result<()> {
    let logging = config.logging.clone().unwrap_or_default();
    let dir = logging
        .dir
        .map(PathBuf::from)
        .unwrap_or_else(|| config_dir().join("logs"));
    let level = logging.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL);
    init_logger(&dir, level).context("Failed to initialize logging")
}

fn log_report(report: &ValidationReport) {
    for warning in &report.warnings {
        warn!(path = %warning.path, "{}", warning.message);
    }
    for err in &report.errors {
        error!(path = %err.path, "{}", err.message);
    }
}

fn ensure_valid(report: &ValidationReport) -> Result<()> {
    if report.is_valid() {
        return Ok(());
    }
    for err in &report.errors {
        terminal_output::note_error(&format!("{}: {}", err.path, err.message));
    }
    anyhow::bail!("config has {} error(s)", report.errors.len())
}
