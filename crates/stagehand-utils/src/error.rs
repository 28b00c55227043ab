use std::fmt;
use thiserror::Error;
pub use stagehand_lock::LockError;

use crate::types::StageId;

/// Library-level error type with rich context and user-friendly reporting.
///
/// `StagehandError` is the error returned by operations that cross a
/// boundary (configuration, persisted state, locks, the CLI). Pure pipeline
/// operations return the narrower [`PipelineError`], which converts into this
/// type with `?`.
///
/// # Error Categories
///
/// | Category | Description |
/// |----------|-------------|
/// | `Pipeline` | Stage, wave, review or classifier misuse |
/// | `Config` | Configuration file or CLI argument errors |
/// | `Manifest` | Invalid project manifest |
/// | `Persistence` | Project state could not be read or written |
/// | `Lock` | Another process holds the project lock |
///
/// # Exit Code Mapping
///
/// Use [`to_exit_code()`](Self::to_exit_code) to map errors to CLI exit codes.
///
/// # Example
///
/// ```rust
/// use stagehand_utils::error::{PipelineError, StagehandError};
/// use stagehand_utils::exit_codes::ExitCode;
///
/// let err = StagehandError::from(PipelineError::NoMoreStages);
/// assert_eq!(err.to_exit_code(), ExitCode::INVALID_TRANSITION);
/// ```
#[derive(Error, Debug)]
pub enum StagehandError {
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Project lock error: {0}")]
    Lock(#[from] LockError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Invalid manifest {path}: {reason}")]
    Manifest { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the orchestrator's own operations.
///
/// Every variant is local, synchronous and recoverable by caller action.
/// Failures of external collaborators (a connection test that did not pass,
/// a conversion that needs attention) are data, never one of these.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Invalid transition for stage {stage}: {reason}")]
    InvalidTransition { stage: StageId, reason: String },

    #[error("Gate not satisfied for stage {stage}: {}", reasons.join("; "))]
    GateNotSatisfied { stage: StageId, reasons: Vec<String> },

    #[error("Stage {stage} has not been completed")]
    PriorStageIncomplete { stage: StageId },

    #[error("No stages remain after the terminal stage")]
    NoMoreStages,

    #[error("Job '{job}' is already in the manual review queue")]
    DuplicateJob { job: String },

    #[error("Unknown job '{job}'")]
    UnknownJob { job: String },

    #[error("Job '{job}' has already completed manual review")]
    TerminalStep { job: String },

    #[error("Confidence score {score} is outside 0..=100")]
    ScoreOutOfRange { score: f64 },

    #[error("Cannot plan waves for an empty job set")]
    EmptyJobSet,

    #[error("Job '{job}' belongs to wave {wave}, which is not converting")]
    JobNotInActiveWave { job: String, wave: u32 },

    #[error("Unknown connection '{name}'")]
    UnknownConnection { name: String },

    #[error("Connection '{name}' is declared more than once")]
    DuplicateConnection { name: String },
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found at {path}")]
    NotFound { path: String },

    #[error("Configuration discovery failed: {reason}")]
    DiscoveryFailed { reason: String },

    #[error("Configuration validation failed: {error_count} errors")]
    ValidationFailed {
        errors: Vec<String>,
        error_count: usize,
    },
}

/// Errors reading or writing persisted project state
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Project '{project}' does not exist")]
    ProjectNotFound { project: String },

    #[error("Project '{project}' already exists")]
    ProjectExists { project: String },

    #[error("Invalid project id '{project}': {reason}")]
    InvalidProjectId { project: String, reason: String },

    #[error("State file {path} is corrupt: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("Failed to write state file {path}: {reason}")]
    WriteFailed { path: String, reason: String },
}

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    StageGating,
    ReviewQueue,
    InvalidInput,
    FileSystem,
    Concurrency,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::StageGating => write!(f, "Stage Gating"),
            Self::ReviewQueue => write!(f, "Manual Review"),
            Self::InvalidInput => write!(f, "Invalid Input"),
            Self::FileSystem => write!(f, "File System"),
            Self::Concurrency => write!(f, "Concurrency"),
        }
    }
}

impl UserFriendlyError for PipelineError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidTransition { stage, reason } => {
                format!("Cannot update the {} stage: {reason}", stage.title())
            }
            Self::GateNotSatisfied { stage, reasons } => {
                format!(
                    "The {} stage cannot complete yet ({} unmet condition(s))",
                    stage.title(),
                    reasons.len()
                )
            }
            Self::PriorStageIncomplete { stage } => {
                format!(
                    "The {} stage must be completed before the pipeline can advance",
                    stage.title()
                )
            }
            Self::NoMoreStages => "The pipeline is already at its final stage".to_string(),
            Self::DuplicateJob { job } => {
                format!("Job '{job}' is already waiting for manual review")
            }
            Self::UnknownJob { job } => format!("No job named '{job}' exists in this project"),
            Self::TerminalStep { job } => {
                format!("Manual review of '{job}' is already complete")
            }
            Self::ScoreOutOfRange { score } => {
                format!("Confidence score {score} must be between 0 and 100")
            }
            Self::EmptyJobSet => "The project has no jobs to convert".to_string(),
            Self::JobNotInActiveWave { job, wave } => {
                format!("Job '{job}' is scheduled in wave {wave}, which is not converting yet")
            }
            Self::UnknownConnection { name } => {
                format!("No connection named '{name}' exists in this project")
            }
            Self::DuplicateConnection { name } => {
                format!("Connection '{name}' is declared twice")
            }
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::GateNotSatisfied { reasons, .. } => Some(reasons.join("\n")),
            Self::InvalidTransition { .. } => Some(
                "Progress only moves forward and only the current stage accepts updates."
                    .to_string(),
            ),
            Self::JobNotInActiveWave { .. } => Some(
                "Waves convert strictly in order: low, then medium, then high complexity."
                    .to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::GateNotSatisfied { stage, .. } => vec![
                format!("Run 'stagehand gate <project> --stage {stage}' to list unmet conditions"),
                "Resolve each condition, then retry the completion".to_string(),
            ],
            Self::PriorStageIncomplete { .. } => vec![
                "Complete the current stage with 'stagehand complete <project>'".to_string(),
            ],
            Self::NoMoreStages => vec!["Run 'stagehand report <project>' to export results".to_string()],
            Self::UnknownJob { .. } | Self::UnknownConnection { .. } => vec![
                "Check the name against 'stagehand status <project>'".to_string(),
            ],
            Self::JobNotInActiveWave { .. } => vec![
                "Finish converting the active wave first".to_string(),
            ],
            Self::ScoreOutOfRange { .. } => vec![
                "Pass a confidence score between 0 and 100".to_string(),
            ],
            Self::EmptyJobSet => vec!["Add jobs to the project manifest".to_string()],
            _ => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidTransition { .. }
            | Self::GateNotSatisfied { .. }
            | Self::PriorStageIncomplete { .. }
            | Self::NoMoreStages
            | Self::JobNotInActiveWave { .. } => ErrorCategory::StageGating,
            Self::DuplicateJob { .. } | Self::UnknownJob { .. } | Self::TerminalStep { .. } => {
                ErrorCategory::ReviewQueue
            }
            Self::ScoreOutOfRange { .. }
            | Self::EmptyJobSet
            | Self::UnknownConnection { .. }
            | Self::DuplicateConnection { .. } => ErrorCategory::InvalidInput,
        }
    }
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => {
                format!("Configuration file has invalid format: {reason}")
            }
            Self::InvalidValue { key, value } => {
                format!("Configuration '{key}' has invalid value: {value}")
            }
            Self::NotFound { path } => format!("Configuration file not found: {path}"),
            Self::DiscoveryFailed { reason } => {
                format!("Failed to discover configuration: {reason}")
            }
            Self::ValidationFailed { errors, .. } => format!(
                "Configuration validation failed with {} errors: {}",
                errors.len(),
                errors.join(", ")
            ),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::NotFound { .. } | Self::DiscoveryFailed { .. } => Some(
                "stagehand searches for .stagehand/config.toml starting from the current directory upward."
                    .to_string(),
            ),
            _ => Some("Configuration files must be valid TOML.".to_string()),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidValue { key, .. } => match key.as_str() {
                "classifier" => vec![
                    "Thresholds must satisfy 0 <= medium < high < very_high <= 100".to_string(),
                ],
                "waves.optimization_ratio" => {
                    vec!["Use a ratio between 0.0 and 1.0".to_string()]
                }
                _ => vec!["Remove the option to use the default value".to_string()],
            },
            Self::NotFound { .. } => vec![
                "Create .stagehand/config.toml in your project root".to_string(),
                "Pass --config <path> explicitly".to_string(),
            ],
            _ => vec!["Check the TOML syntax and section names".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

impl StagehandError {
    /// Format the error for terminal display, including context and suggestions.
    #[must_use]
    pub fn display_for_user(&self) -> String {
        let (message, context, suggestions) = match self {
            Self::Pipeline(e) => (e.user_message(), e.context(), e.suggestions()),
            Self::Config(e) => (e.user_message(), e.context(), e.suggestions()),
            Self::Lock(e) => (
                e.to_string(),
                Some("Only one process may modify a project at a time.".to_string()),
                vec!["Wait for the other command to finish, then retry".to_string()],
            ),
            other => (other.to_string(), None, Vec::new()),
        };

        let mut out = format!("Error: {message}");
        if let Some(context) = context {
            out.push_str("\n\n");
            out.push_str(&context);
        }
        if !suggestions.is_empty() {
            out.push_str("\n\nSuggestions:");
            for suggestion in suggestions {
                out.push_str("\n  - ");
                out.push_str(&suggestion);
            }
        }
        out
    }

    /// Map this error to a CLI exit code.
    #[must_use]
    pub fn to_exit_code(&self) -> crate::exit_codes::ExitCode {
        use crate::exit_codes::ExitCode;

        match self {
            Self::Config(_) => ExitCode::CLI_ARGS,
            Self::Lock(_) => ExitCode::LOCK_HELD,
            Self::Manifest { .. } => ExitCode::INVALID_INPUT,
            Self::Persistence(PersistenceError::ProjectNotFound { .. })
            | Self::Persistence(PersistenceError::ProjectExists { .. })
            | Self::Persistence(PersistenceError::InvalidProjectId { .. }) => ExitCode::CLI_ARGS,
            Self::Persistence(_) | Self::Io(_) => ExitCode::INTERNAL,
            Self::Pipeline(err) => match err {
                PipelineError::GateNotSatisfied { .. } => ExitCode::GATE_NOT_SATISFIED,
                PipelineError::InvalidTransition { .. }
                | PipelineError::PriorStageIncomplete { .. }
                | PipelineError::NoMoreStages
                | PipelineError::JobNotInActiveWave { .. } => ExitCode::INVALID_TRANSITION,
                PipelineError::DuplicateJob { .. }
                | PipelineError::UnknownJob { .. }
                | PipelineError::TerminalStep { .. } => ExitCode::REVIEW_QUEUE,
                PipelineError::ScoreOutOfRange { .. }
                | PipelineError::EmptyJobSet
                | PipelineError::UnknownConnection { .. }
                | PipelineError::DuplicateConnection { .. } => ExitCode::INVALID_INPUT,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit_codes::ExitCode;

    #[test]
    fn test_gate_error_lists_reasons() {
        let err = PipelineError::GateNotSatisfied {
            stage: StageId::Conversion,
            reasons: vec![
                "2 manual review job(s) pending".to_string(),
                "wave 3 (high) is converting".to_string(),
            ],
        };
        let text = err.to_string();
        assert!(text.contains("conversion"));
        assert!(text.contains("2 manual review job(s) pending; wave 3"));
        assert_eq!(err.category(), ErrorCategory::StageGating);
        assert!(err.context().unwrap().contains("wave 3 (high)"));
    }

    #[test]
    fn test_exit_code_mapping() {
        let cases = [
            (
                StagehandError::from(PipelineError::GateNotSatisfied {
                    stage: StageId::Analysis,
                    reasons: vec![],
                }),
                ExitCode::GATE_NOT_SATISFIED,
            ),
            (
                StagehandError::from(PipelineError::PriorStageIncomplete {
                    stage: StageId::Setup,
                }),
                ExitCode::INVALID_TRANSITION,
            ),
            (
                StagehandError::from(PipelineError::UnknownJob {
                    job: "m_load".to_string(),
                }),
                ExitCode::REVIEW_QUEUE,
            ),
            (
                StagehandError::from(PipelineError::ScoreOutOfRange { score: 150.0 }),
                ExitCode::INVALID_INPUT,
            ),
            (
                StagehandError::from(ConfigError::InvalidFile("bad".to_string())),
                ExitCode::CLI_ARGS,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.to_exit_code(), expected, "{err}");
        }
    }

    #[test]
    fn test_display_for_user_includes_suggestions() {
        let err = StagehandError::from(PipelineError::PriorStageIncomplete {
            stage: StageId::Analysis,
        });
        let text = err.display_for_user();
        assert!(text.starts_with("Error: The Source Analysis stage must be completed"));
        assert!(text.contains("Suggestions:"));
        assert!(text.contains("stagehand complete"));
    }
}
