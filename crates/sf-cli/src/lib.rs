//! scanforge library: everything `main.rs` needs is `cli::run()`. All
//! output, including error reporting, is handled here; `main` only maps the
//! returned `Result` to a process exit code.

pub mod args;
pub mod commands;
pub mod config;
pub mod exit_codes;
pub mod logging;
pub mod support;

use clap::Parser;
use sf_core::ExitCode;

use crate::args::{Cli, Commands};
use crate::config::{CliOverrides, Config};

fn utf8_path(path: std::path::PathBuf) -> Result<camino::Utf8PathBuf, ExitCode> {
    camino::Utf8PathBuf::from_path_buf(path).map_err(|path| {
        tracing::error!(path = %path.display(), "path is not valid UTF-8");
        ExitCode::CLI_ARGS
    })
}

pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_json);

    let overrides = CliOverrides {
        config_path: cli.config.clone().map(utf8_path).transpose()?,
        max_parallel: cli.max_parallel,
        checkpoint_dir: cli.checkpoint_dir.clone().map(utf8_path).transpose()?,
        severity_floor: cli.severity_floor.clone(),
    };
    let config = Config::discover(&overrides).map_err(|err| {
        tracing::error!(error = %err, "configuration error");
        ExitCode::CLI_ARGS
    })?;

    let runtime = tokio::runtime::Runtime::new().map_err(|err| {
        tracing::error!(error = %err, "failed to start the tokio runtime");
        ExitCode::INTERNAL
    })?;

    runtime.block_on(dispatch(cli.command, &config))
}

async fn dispatch(command: Commands, config: &Config) -> Result<(), ExitCode> {
    match command {
        Commands::Run { .. } => commands::run::execute(command, config).await,
        Commands::Status { .. } => commands::status::execute(command, config).await,
        Commands::Resume { .. } => commands::resume::execute(command, config).await,
        Commands::Cancel { .. } => commands::cancel::execute(command, config).await,
        Commands::Gate { .. } => commands::gate::execute(command, config).await,
        Commands::Broker { .. } => commands::broker::execute(command).await,
        Commands::Doctor { .. } => commands::doctor::execute(command).await,
    }
}
