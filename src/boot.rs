use std::{env, process::ExitCode, str::FromStr as _};

use clap::Parser as _;
use config_rs::{Config as ConfigRs, ConfigError};
use sea_orm::DbErr;
use thiserror::Error;
use tracing::{debug, error, trace};

use crate::{
    app_info::AppInfo,
    cli::{Cli, Commands},
    commands::{migrate, serve, version},
    config::Config,
    environment::Environment,
    setup_tracing::setup_tracing_for_command,
    work_queue::QueueError,
};

const ENVIRONMENT_VARIABLE: &str = "APP_ENVIRONMENT";

/// Failures that stop the process before or while starting its loops.
#[derive(Debug, Error)]
pub enum BootError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("database error: {0}")]
    Database(#[from] DbErr),
    #[error("failed to connect to the work queue: {0}")]
    Queue(#[from] QueueError),
}

pub async fn boot() -> ExitCode {
    let cli = Cli::parse();

    if matches!(cli.command, Some(Commands::Version)) {
        version::print_version_info(AppInfo::current());
        return ExitCode::SUCCESS;
    }

    let environment = set_environment();

    let app_config = match read_config(&environment) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration for '{environment}': {e}");
            return ExitCode::FAILURE;
        }
    };

    // Set up tracing with appropriate level based on command
    setup_tracing_for_command(&cli.command, &app_config.tracing.log_level);

    debug!("Environment set to: {:?}", environment);
    trace!("Configuration loaded: {:?}", app_config);

    match handle_command(app_config, cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

#[must_use]
pub fn set_environment() -> Environment {
    env::var(ENVIRONMENT_VARIABLE)
        .ok()
        .and_then(|s| Environment::from_str(&s).ok())
        .unwrap_or_default()
}

/// Reads `config/{environment}` and overlays `APP_`-prefixed variables,
/// with `__` separating nested keys (e.g. `APP_QUEUE__URL`).
pub fn read_config(environment: &Environment) -> Result<Config, ConfigError> {
    let config_file_name = format!("config/{environment}");

    trace!("Reading configuration from: {}", config_file_name);

    ConfigRs::builder()
        .add_source(config_rs::File::with_name(&config_file_name))
        .add_source(
            config_rs::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?
        .try_deserialize()
}

pub async fn handle_command(config: Config, cli: Cli) -> Result<(), BootError> {
    match cli.command {
        Some(Commands::Migrate { action }) => migrate::handle_migrate_command(&config, action).await,
        Some(Commands::Version) => {
            version::print_version_info(AppInfo::current());
            Ok(())
        }
        Some(Commands::Scheduler) => {
            serve::handle_serve_command(config, serve::Role::Scheduler).await
        }
        Some(Commands::Worker { count }) => {
            let count = count.unwrap_or(config.worker.count);
            serve::handle_serve_command(config, serve::Role::Workers { count }).await
        }
        Some(Commands::Serve) | None => {
            let count = config.worker.count;
            serve::handle_serve_command(config, serve::Role::All { count }).await
        }
    }
}
