//! CLI argument definitions and parsing structures
//!
//! This module defines the command-line interface structure using clap,
//! including the main `Cli` struct and the subcommand enum.

use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

use stagehand_classifier::PatternComplexity;
use stagehand_utils::types::StageId;

/// stagehand - stage-gated orchestration for ETL migrations
#[derive(Parser, Debug)]
#[command(name = "stagehand")]
#[command(about = "Drive an ETL migration project through gated stages, conversion waves and manual review")]
#[command(long_about = r#"
stagehand tracks one migration project per id. Every command loads the
project state, applies one operation and saves it back.

EXAMPLES:
  # Create a project from a manifest
  stagehand init acme-dw --manifest migration.toml

  # Record connection tests and move past analysis
  stagehand test-connection acme-dw ora_src --passed
  stagehand complete acme-dw
  stagehand advance acme-dw

  # Report a converted job and walk its manual review
  stagehand convert acme-dw m_custom_java --score 62 --custom-code
  stagehand review acme-dw m_custom_java

  # Check the gate of the current stage
  stagehand gate acme-dw

CONFIGURATION:
  Configuration is loaded with precedence: CLI flags > config file > defaults
  Config file is discovered by searching upward from CWD for .stagehand/config.toml
  Use --config to specify an explicit config file path

STAGES:
  Setup → Analysis → Discovery → Conversion → Validation → Completion
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Write log lines as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Take the project lock even if another process holds it
    #[arg(long, global = true)]
    pub force: bool,

    /// Fraction of each tier converted by its first wave (0.0 to 1.0)
    #[arg(long, global = true)]
    pub optimization_ratio: Option<f64>,

    /// Keep a wave converting until its manual reviews are complete
    #[arg(long, global = true)]
    pub hold_for_review: bool,

    /// Minimum validation pass rate in percent
    #[arg(long, global = true)]
    pub min_pass_rate: Option<f64>,

    /// Connection test timeout in seconds
    #[arg(long = "test-timeout", global = true)]
    pub test_timeout_secs: Option<u64>,

    /// Lock TTL in seconds
    #[arg(long, global = true)]
    pub lock_ttl_seconds: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a project from a manifest
    Init {
        /// Project id
        id: String,

        /// TOML manifest listing connections and jobs
        #[arg(long)]
        manifest: PathBuf,
    },

    /// Show stages, waves, reviews and effective configuration
    Status {
        /// Project id
        id: String,

        /// Output as canonical JSON
        #[arg(long)]
        json: bool,
    },

    /// Evaluate a stage's gate (exit code 3 when it does not pass)
    Gate {
        /// Project id
        id: String,

        /// Stage to evaluate (default: the current stage)
        #[arg(long)]
        stage: Option<StageId>,

        /// Output as canonical JSON
        #[arg(long)]
        json: bool,
    },

    /// Record progress on the current stage
    Progress {
        /// Project id
        id: String,

        /// Progress in percent (0-100, never decreasing)
        percent: u8,

        /// Status message
        #[arg(long, default_value = "")]
        message: String,
    },

    /// Complete the current stage if its gate passes
    Complete {
        /// Project id
        id: String,

        /// Extra stage metric as KEY=VALUE (VALUE parsed as JSON when possible)
        #[arg(long = "metric", value_parser = parse_metric)]
        metrics: Vec<(String, serde_json::Value)>,
    },

    /// Start the next stage
    Advance {
        /// Project id
        id: String,
    },

    /// Record the result of a connection test
    #[command(group(ArgGroup::new("outcome").required(true).args(["passed", "failed"])))]
    TestConnection {
        /// Project id
        id: String,

        /// Connection name
        name: String,

        /// The test passed
        #[arg(long)]
        passed: bool,

        /// The test failed
        #[arg(long)]
        failed: bool,

        /// Tester message
        #[arg(long)]
        message: Option<String>,
    },

    /// Record the conversion of one job
    Convert {
        /// Project id
        id: String,

        /// Job name from the inventory
        job: String,

        /// Confidence score (0-100)
        #[arg(long)]
        score: f64,

        /// Recognized pattern (default: the inventory pattern)
        #[arg(long)]
        pattern: Option<String>,

        /// Pattern complexity (default: the inventory value)
        #[arg(long)]
        pattern_complexity: Option<PatternComplexity>,

        /// The job embeds custom code
        #[arg(long)]
        custom_code: bool,

        /// Construct the converter could not translate (repeatable)
        #[arg(long = "unsupported")]
        unsupported: Vec<String>,

        /// Converter warning (repeatable)
        #[arg(long = "warning")]
        warnings: Vec<String>,

        /// Output the classified job as canonical JSON
        #[arg(long)]
        json: bool,
    },

    /// Advance a job's manual review by one wizard step
    Review {
        /// Project id
        id: String,

        /// Job name
        job: String,

        /// Fail when the review is already complete
        #[arg(long)]
        strict: bool,
    },

    /// Record the validation result of a converted job
    #[command(group(ArgGroup::new("outcome").required(true).args(["passed", "failed"])))]
    Validate {
        /// Project id
        id: String,

        /// Job name
        job: String,

        /// Validation passed
        #[arg(long)]
        passed: bool,

        /// Validation failed
        #[arg(long)]
        failed: bool,

        /// Free-form detail
        #[arg(long)]
        detail: Option<String>,
    },

    /// Print the migration report
    Report {
        /// Project id
        id: String,

        /// Output as canonical JSON
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    /// Project id the command operates on.
    #[must_use]
    pub fn project_id(&self) -> &str {
        match self {
            Self::Init { id, .. }
            | Self::Status { id, .. }
            | Self::Gate { id, .. }
            | Self::Progress { id, .. }
            | Self::Complete { id, .. }
            | Self::Advance { id }
            | Self::TestConnection { id, .. }
            | Self::Convert { id, .. }
            | Self::Review { id, .. }
            | Self::Validate { id, .. }
            | Self::Report { id, .. } => id,
        }
    }

    /// Operation name used in log events.
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::Status { .. } => "status",
            Self::Gate { .. } => "gate",
            Self::Progress { .. } => "progress",
            Self::Complete { .. } => "complete",
            Self::Advance { .. } => "advance",
            Self::TestConnection { .. } => "test-connection",
            Self::Convert { .. } => "convert",
            Self::Review { .. } => "review",
            Self::Validate { .. } => "validate",
            Self::Report { .. } => "report",
        }
    }
}

/// Parse `KEY=VALUE`. The value is JSON when it parses as JSON, otherwise a string.
pub fn parse_metric(raw: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("metric key is empty in '{raw}'"));
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
