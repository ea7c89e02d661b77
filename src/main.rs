//! tabwire - remote debugging protocol client
//!
//! Main entry point for the tabwire CLI.

mod cli;
mod commands;

use std::sync::OnceLock;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::{debug, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use tabwire_config::{Config, ConfigLoader, ConfigValidator, LoggingConfig};

use crate::cli::{BrowserArgs, Cli};
use crate::commands::handle_command;

/// Keeps the file writer flushing for the life of the process.
static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Console logging plus an optional daily log file.
///
/// `RUST_LOG` overrides `logging.level`.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let file_layer = match logging.directory {
        Some(ref directory) => {
            std::fs::create_dir_all(directory)?;
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("tabwire")
                .filename_suffix("log")
                .max_log_files(14)
                .build(directory)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let _ = GUARD.set(guard);
            Some(fmt::layer().with_writer(non_blocking).with_ansi(false).boxed())
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}

/// Command-line flags win over the `[discovery]` section.
fn apply_browser_args(config: &mut Config, args: BrowserArgs) {
    let discovery = &mut config.discovery;
    if args.endpoint.is_some() {
        discovery.cdp_endpoint = args.endpoint;
    }
    if args.debugger_address.is_some() {
        discovery.debugger_address = args.debugger_address;
    }
    if args.browser.is_some() {
        discovery.browser_name = args.browser;
    }
    if args.browser_version.is_some() {
        discovery.browser_version = args.browser_version;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::load_or_default(&cli.config)?;
    apply_browser_args(&mut config, cli.browser);

    init_tracing(&config.logging)?;
    debug!("Loaded configuration from {}", cli.config.display());

    let validation = ConfigValidator::validate(&config);
    for warning in &validation.warnings {
        warn!("{}: {}", warning.path, warning.message);
    }
    if let Some(error) = validation.errors.first() {
        bail!("invalid configuration: {}: {}", error.path, error.message);
    }

    handle_command(cli.command, &config).await
}
