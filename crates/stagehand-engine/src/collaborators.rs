//! External collaborators and their drivers
//!
//! Connection testing and job conversion happen outside the orchestrator.
//! The drivers here call a collaborator under a caller-side deadline and
//! apply whatever comes back, a timeout included, to the shared pipeline.
//! A collaborator that fails or runs out of time produces a failed result;
//! it never unwinds pipeline state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use stagehand_classifier::JobProfile;
use stagehand_utils::types::{Connection, ConnectionTestResult};

use crate::events::PipelineEvent;
use crate::manifest::InventoryJob;
use crate::shared::SharedPipeline;

/// What the conversion engine reports for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionOutcome {
    pub job: String,
    pub confidence_score: f64,
    pub profile: JobProfile,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ConversionOutcome {
    #[must_use]
    pub fn new(job: impl Into<String>, confidence_score: f64, profile: JobProfile) -> Self {
        Self {
            job: job.into(),
            confidence_score,
            profile,
            warnings: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    /// Recognized mapping pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.profile.pattern
    }

    /// Outcome for a conversion that did not produce a result. The job
    /// scores zero and is routed to manual review.
    #[must_use]
    pub fn failed(job: &InventoryJob, reason: &str) -> Self {
        let mut profile = job.profile.clone();
        profile
            .unsupported_constructs
            .push(format!("conversion engine: {reason}"));
        Self {
            job: job.name.clone(),
            confidence_score: 0.0,
            profile,
            warnings: vec![format!("Automatic conversion failed: {reason}")],
        }
    }
}

/// Tests a declared connection against the real system.
#[async_trait]
pub trait ConnectionTester: Send + Sync {
    async fn test(&self, connection: &Connection) -> ConnectionTestResult;
}

/// Converts one inventory job.
#[async_trait]
pub trait ConversionEngine: Send + Sync {
    async fn convert(&self, job: &InventoryJob) -> ConversionOutcome;
}

/// Counts from one driver run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverReport {
    /// Results applied to the pipeline
    pub applied: usize,
    /// Calls that hit the deadline
    pub timed_out: usize,
    /// Results the pipeline refused
    pub rejected: usize,
}

/// Test every connection concurrently, each under `deadline`.
///
/// A test that overruns records a failed result for its connection.
pub async fn test_connections(
    tester: Arc<dyn ConnectionTester>,
    shared: &SharedPipeline,
    deadline: Duration,
) -> DriverReport {
    let connections = shared.read(|state| state.connections().to_vec());
    let mut tasks = JoinSet::new();

    for connection in connections {
        let tester = Arc::clone(&tester);
        tasks.spawn(async move {
            let tested = tokio::time::timeout(deadline, tester.test(&connection)).await;
            match tested {
                Ok(result) => (connection.name, result, false),
                Err(_) => {
                    let message = format!("timed out after {deadline:?}");
                    (connection.name, ConnectionTestResult::failed(message), true)
                }
            }
        });
    }

    let mut report = DriverReport::default();
    while let Some(joined) = tasks.join_next().await {
        let (name, result, timed_out) = match joined {
            Ok(done) => done,
            Err(e) => {
                warn!(error = %e, "Connection test task failed");
                report.rejected += 1;
                continue;
            }
        };
        if timed_out {
            warn!(connection = %name, "Connection test timed out");
            report.timed_out += 1;
        }
        match shared.apply(PipelineEvent::ConnectionTested { name, result }) {
            Ok(()) => report.applied += 1,
            Err(e) => {
                warn!(error = %e, "Connection test result rejected");
                report.rejected += 1;
            }
        }
    }
    report
}

/// Convert jobs in wave order until no converting wave expects another.
///
/// Each call to the engine runs under `deadline`. A timed-out or rejected
/// outcome is replaced by [`ConversionOutcome::failed`], so every job the
/// driver picks up ends up recorded. Stops early when a wave is held for
/// manual review.
pub async fn run_conversion(
    engine: Arc<dyn ConversionEngine>,
    shared: &SharedPipeline,
    deadline: Duration,
) -> DriverReport {
    let mut report = DriverReport::default();

    while let Some(job) = shared.read(|state| state.next_job_to_convert()) {
        let outcome = match tokio::time::timeout(deadline, engine.convert(&job)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(job = %job.name, "Conversion timed out");
                report.timed_out += 1;
                ConversionOutcome::failed(&job, &format!("timed out after {deadline:?}"))
            }
        };

        let outcome = if outcome.job == job.name {
            outcome
        } else {
            warn!(expected = %job.name, reported = %outcome.job, "Engine reported a different job");
            report.rejected += 1;
            ConversionOutcome::failed(&job, "engine reported a different job")
        };

        if let Err(e) = shared.apply(PipelineEvent::ConversionFinished(outcome)) {
            warn!(job = %job.name, error = %e, "Conversion outcome rejected");
            report.rejected += 1;
            // Record the job anyway so the driver makes progress.
            let fallback = ConversionOutcome::failed(&job, &e.to_string());
            if let Err(e) = shared.apply(PipelineEvent::ConversionFinished(fallback)) {
                warn!(job = %job.name, error = %e, "Conversion could not be recorded");
                break;
            }
        }
        debug!(job = %job.name, "Conversion recorded");
        report.applied += 1;
    }
    report
}
