//! stagehand - stage-gated orchestration for ETL migration projects
//!
//! A migration moves an inventory of ETL jobs from a legacy platform to a
//! new one through six ordered stages:
//!
//! Setup → Analysis → Discovery → Conversion → Validation → Completion
//!
//! Each stage has a gate. Conversion runs in waves ordered by complexity tier,
//! converted jobs are classified by confidence, and the jobs that need a
//! human go through a four-step manual review wizard.
//!
//! stagehand can be used in two ways:
//! - **CLI**: the `stagehand` binary drives one project per invocation and
//!   persists its state under `$STAGEHAND_HOME/projects/<id>/` (default
//!   `.stagehand/` in the working directory)
//! - **Library**: embed a [`ProjectHandle`] or a [`SharedPipeline`] and plug
//!   in your own [`ConnectionTester`] and [`ConversionEngine`]
//!
//! # Quick Start (CLI)
//!
//! ```bash
//! # Create a project from a manifest of connections and jobs
//! stagehand init acme-dw --manifest migration.toml
//!
//! # Record a connection test, then complete and advance the stage
//! stagehand test-connection acme-dw ora_src --passed
//! stagehand complete acme-dw
//! stagehand advance acme-dw
//!
//! # Check whether the current stage may complete
//! stagehand gate acme-dw --json
//! ```
//!
//! # Quick Start (Library)
//!
//! ```rust,no_run
//! use stagehand::{Config, ProjectHandle, ProjectManifest};
//!
//! let manifest = ProjectManifest::load("migration.toml".as_ref())?;
//! let handle = ProjectHandle::create("acme-dw", &manifest, Config::defaults())?;
//! println!("current stage: {}", handle.state().current_stage());
//! # Ok::<(), stagehand::StagehandError>(())
//! ```
//!
//! # JSON Contracts
//!
//! Gate results, status snapshots and the persisted state file are emitted
//! as JCS (RFC 8785) canonical JSON. Use [`emit_jcs`] for your own output.

pub mod cli;

// ============================================================================
// Stable Public API
// ============================================================================

pub use stagehand_engine::{
    ConnectionTester, ConversionEngine, ConversionOutcome, DriverReport, EventLoopReport,
    InventoryJob, PipelineEvent, PipelineSettings, PipelineState, ProjectHandle, ProjectManifest,
    SharedPipeline, event_channel, run_conversion, spawn_event_loop, test_connections,
};

pub use stagehand_config::{CliArgs, Config};

pub use stagehand_utils::canonicalization::emit_jcs;
pub use stagehand_utils::error::{PipelineError, StagehandError};
pub use stagehand_utils::exit_codes::ExitCode;
pub use stagehand_utils::types::{
    ComplexityTier, Connection, ConnectionKind, ConnectionTestResult, StageId, StageStatus,
    ValidationRecord,
};

pub use stagehand_classifier::{
    BadgeTier, ClassifiedJob, ConfidenceLevel, ConversionMethod, JobProfile, PatternComplexity,
};
pub use stagehand_gate::GateResult;
pub use stagehand_review::{ReviewComplexity, WizardStep};
pub use stagehand_stages::StageMetrics;
pub use stagehand_status::{PipelineSnapshot, ProjectSummary};
