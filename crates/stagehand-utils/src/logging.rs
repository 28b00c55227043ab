//! Logging and observability for stagehand
//!
//! Structured logging goes through `tracing`. The CLI installs a subscriber
//! once at startup via [`init_tracing`]; library crates only emit events.

use std::io::IsTerminal;
use tracing::{Level, info, span, warn};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::types::StageId;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable compact lines
    #[default]
    Compact,
    /// One JSON object per line, for log shippers
    Json,
}

/// Check if colored output should be used.
///
/// Returns true only if stderr is a terminal and NO_COLOR is not set.
fn use_color() -> bool {
    std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// Build the env filter: `RUST_LOG` wins, otherwise a verbosity-based default.
fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("stagehand=debug,info")
            } else {
                EnvFilter::try_new("stagehand=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the tracing subscriber for structured logging.
///
/// Logs are written to stderr so that `--json` command output on stdout
/// stays machine-readable.
///
/// # Arguments
/// * `verbose` - Enable debug-level events and span close timings
/// * `format` - Compact text or JSON lines
pub fn init_tracing(verbose: bool, format: LogFormat) -> Result<(), Box<dyn std::error::Error>> {
    let filter = env_filter(verbose);
    let span_events = if verbose {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_span_events(span_events)
                        .with_target(true),
                )
                .try_init()?;
        }
        LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .compact()
                        .with_writer(std::io::stderr)
                        .with_ansi(use_color())
                        .with_span_events(span_events)
                        .with_target(verbose)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false),
                )
                .try_init()?;
        }
    }

    Ok(())
}

/// Create a span covering work on one stage of a project.
pub fn stage_span(project_id: &str, stage: StageId) -> tracing::Span {
    span!(
        Level::INFO,
        "stage",
        project = %project_id,
        stage = %stage,
    )
}

/// Log a stage lifecycle transition.
pub fn log_stage_transition(project_id: &str, stage: StageId, status: &str) {
    info!(
        project = %project_id,
        stage = %stage,
        status = %status,
        "Stage transition"
    );
}

/// Log a completion attempt that the gate refused.
pub fn log_gate_blocked(project_id: &str, stage: StageId, reasons: &[String]) {
    warn!(
        project = %project_id,
        stage = %stage,
        unmet = reasons.len(),
        reasons = %reasons.join("; "),
        "Stage gate not satisfied"
    );
}
