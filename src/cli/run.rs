//! CLI entry point and dispatch logic
//!
//! `run()` parses arguments, discovers configuration, installs the tracing
//! subscriber and dispatches to a command handler. It prints every error
//! itself; main.rs only maps the returned code to the process exit status.

use clap::Parser;
use tracing::debug;

use stagehand_config::{CliArgs, Config};
use stagehand_utils::error::{ConfigError, StagehandError};
use stagehand_utils::exit_codes::ExitCode;
use stagehand_utils::logging::{LogFormat, init_tracing};

use super::args::{Cli, Commands};
use super::commands;

/// Main CLI execution function.
///
/// Returns `Ok(())` on success. On failure the error has already been
/// printed to stderr and the returned [`ExitCode`] says why.
pub fn run() -> Result<(), ExitCode> {
    run_with(Cli::parse())
}

/// Execute an already parsed command line.
pub fn run_with(cli: Cli) -> Result<(), ExitCode> {
    let cli_args = build_cli_args(&cli);

    let config = match Config::discover(&cli_args) {
        Ok(config) => config,
        Err(err) => {
            let err = StagehandError::Config(config_error(err));
            eprintln!("{}", err.display_for_user());
            return Err(err.to_exit_code());
        }
    };

    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    if let Err(e) = init_tracing(config.verbose(), format) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    let operation = cli.command.operation();
    debug!(
        operation,
        project = cli.command.project_id(),
        config_file = ?config.config_path,
        "Dispatching command"
    );

    match dispatch(cli.command, config, cli.force) {
        Ok(code) if code == ExitCode::SUCCESS => Ok(()),
        Ok(code) => Err(code),
        Err(err) => {
            debug!(operation, error = %err, "Command failed");
            eprintln!("{}", err.display_for_user());
            Err(err.to_exit_code())
        }
    }
}

fn dispatch(command: Commands, config: Config, force: bool) -> Result<ExitCode, StagehandError> {
    match command {
        Commands::Init { id, manifest } => commands::execute_init_command(&id, &manifest, config),
        Commands::Status { id, json } => commands::execute_status_command(&id, json, config),
        Commands::Report { id, json } => commands::execute_report_command(&id, json, config),
        Commands::Gate { id, stage, json } => {
            commands::execute_gate_command(&id, stage, json, config)
        }
        Commands::Progress {
            id,
            percent,
            message,
        } => commands::execute_progress_command(&id, percent, &message, config, force),
        Commands::Complete { id, metrics } => {
            commands::execute_complete_command(&id, metrics, config, force)
        }
        Commands::Advance { id } => commands::execute_advance_command(&id, config, force),
        Commands::TestConnection {
            id,
            name,
            passed,
            failed: _,
            message,
        } => commands::execute_test_connection_command(&id, &name, passed, message, config, force),
        Commands::Convert {
            id,
            job,
            score,
            pattern,
            pattern_complexity,
            custom_code,
            unsupported,
            warnings,
            json,
        } => commands::execute_convert_command(
            &id,
            commands::ConvertRequest {
                job,
                score,
                pattern,
                pattern_complexity,
                custom_code,
                unsupported,
                warnings,
            },
            json,
            config,
            force,
        ),
        Commands::Review { id, job, strict } => {
            commands::execute_review_command(&id, &job, strict, config, force)
        }
        Commands::Validate {
            id,
            job,
            passed,
            failed: _,
            detail,
        } => commands::execute_validate_command(&id, &job, passed, detail, config, force),
    }
}

fn build_cli_args(cli: &Cli) -> CliArgs {
    CliArgs {
        config_path: cli.config.clone(),
        verbose: cli.verbose.then_some(true),
        optimization_ratio: cli.optimization_ratio,
        hold_for_review: cli.hold_for_review.then_some(true),
        test_timeout_secs: cli.test_timeout_secs,
        min_pass_rate: cli.min_pass_rate,
        lock_ttl_seconds: cli.lock_ttl_seconds,
    }
}

/// Recover the typed configuration error from discovery, if there is one.
fn config_error(err: anyhow::Error) -> ConfigError {
    match err.downcast::<ConfigError>() {
        Ok(config_error) => config_error,
        Err(err) => ConfigError::DiscoveryFailed {
            reason: format!("{err:#}"),
        },
    }
}
