//! lognorm -- command-line front end for the liblognorm boundary layer

mod cli;
mod commands;
mod error;
mod logging;
mod output;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use lognorm_core::config::{GeneralConfig, LognormConfig};
use lognorm_normalizer::{DynamicEngine, NativeEngine};

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::output::OutputWriter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            eprintln!("error: {err}");
            ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let (config_path, explicit) = cli.config_path();
    let writer = OutputWriter::new(cli.output);
    let log_level = cli.log_level;

    match cli.command {
        Commands::Config(args) => {
            // config 명령은 설정이 깨져 있어도 동작해야 하므로 기본 로깅으로 시작
            let mut general = GeneralConfig::default();
            if let Some(level) = log_level {
                general.log_level = level;
            }
            install_logging(&general);
            commands::config::execute(args, &config_path, explicit, &writer)
        }
        Commands::Normalize(args) => {
            let (config, engine) = prepare(&config_path, explicit, log_level)?;
            commands::normalize::execute(args, engine, &config, &writer)
        }
        Commands::Check(args) => {
            let (config, engine) = prepare(&config_path, explicit, log_level)?;
            commands::check::execute(args, engine, &config, &writer)
        }
        Commands::Version => {
            let (config, engine) = prepare(&config_path, explicit, log_level)?;
            commands::version::execute(engine.as_ref(), &config, &writer)
        }
    }
}

/// Load the effective config, start logging, and open the native library.
fn prepare(
    config_path: &Path,
    explicit: bool,
    log_level: Option<String>,
) -> Result<(LognormConfig, Arc<dyn NativeEngine>), CliError> {
    let mut config = commands::config::load_effective(config_path, explicit)?;
    if let Some(level) = log_level {
        config.general.log_level = level;
    }
    install_logging(&config.general);
    lognorm_core::metrics::describe_all();

    tracing::info!(
        config = %config_path.display(),
        library = %config.library.lognorm_path,
        "lognorm starting"
    );

    let engine: Arc<dyn NativeEngine> = Arc::new(DynamicEngine::open(&config.library)?);
    Ok((config, engine))
}

fn install_logging(general: &GeneralConfig) {
    if let Err(e) = logging::init_tracing(general) {
        eprintln!("warning: {e:#}");
    }
}
