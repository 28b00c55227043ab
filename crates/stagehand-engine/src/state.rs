//! Owned pipeline state
//!
//! [`PipelineState`] is the single writer for one project. Every mutation
//! goes through its methods, which keep the stage registry, the wave
//! scheduler, the review queue and the job records consistent with each
//! other.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

use stagehand_classifier::{ClassifiedJob, ConfidenceThresholds, JobClassifier, JobOutcome};
use stagehand_config::Config;
use stagehand_gate::{GateEvaluator, GateInputs, GateResult, ValidationCoverage};
use stagehand_review::{ManualReviewJob, ReviewQueue, StepOutcome, WizardStep};
use stagehand_stages::{Completion, StageMetrics, StageRegistry};
use stagehand_status::{PipelineSnapshot, ProjectSummary, SnapshotInput};
use stagehand_utils::error::{ConfigError, PipelineError};
use stagehand_utils::logging::{log_gate_blocked, log_stage_transition, stage_span};
use stagehand_utils::progress::percent;
use stagehand_utils::types::{
    Connection, ConnectionTestResult, StageId, StageStatus, ValidationRecord,
};
use stagehand_waves::{DEFAULT_OPTIMIZATION_RATIO, WaveScheduler, WaveStatus};

use crate::collaborators::ConversionOutcome;
use crate::manifest::{InventoryJob, ProjectManifest, jobs_by_tier};

/// Runtime settings derived from configuration. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    pub thresholds: ConfidenceThresholds,
    pub optimization_ratio: f64,
    pub hold_for_review: bool,
    pub min_pass_rate: Option<f64>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            thresholds: ConfidenceThresholds::default(),
            optimization_ratio: DEFAULT_OPTIMIZATION_RATIO,
            hold_for_review: false,
            min_pass_rate: None,
        }
    }
}

impl PipelineSettings {
    /// Settings from a validated [`Config`].
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let c = &config.classifier;
        let thresholds = ConfidenceThresholds::new(c.very_high, c.high, c.medium).ok_or_else(
            || ConfigError::InvalidValue {
                key: "classifier".to_string(),
                value: format!("{}/{}/{}", c.very_high, c.high, c.medium),
            },
        )?;
        Ok(Self {
            thresholds,
            optimization_ratio: config.waves.optimization_ratio,
            hold_for_review: config.waves.hold_for_review,
            min_pass_rate: config.validation.min_pass_rate,
        })
    }
}

/// All state of one migration project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    project_id: String,
    project_name: String,
    stages: StageRegistry,
    connections: Vec<Connection>,
    inventory: Vec<InventoryJob>,
    waves: WaveScheduler,
    jobs: Vec<ClassifiedJob>,
    reviews: ReviewQueue,
    validation: Vec<ValidationRecord>,
    #[serde(skip)]
    settings: PipelineSettings,
}

impl PipelineState {
    /// Create a project in the setup stage.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::DuplicateConnection`] for a repeated connection name
    /// * [`PipelineError::DuplicateJob`] for a repeated job name
    pub fn new(
        project_id: impl Into<String>,
        project_name: impl Into<String>,
        connections: Vec<Connection>,
        inventory: Vec<InventoryJob>,
        settings: PipelineSettings,
    ) -> Result<Self, PipelineError> {
        let mut seen = HashSet::new();
        for connection in &connections {
            if !seen.insert(connection.name.as_str()) {
                return Err(PipelineError::DuplicateConnection {
                    name: connection.name.clone(),
                });
            }
        }
        let mut seen = HashSet::new();
        for job in &inventory {
            if !seen.insert(job.name.as_str()) {
                return Err(PipelineError::DuplicateJob {
                    job: job.name.clone(),
                });
            }
        }

        let mut state = Self {
            project_id: project_id.into(),
            project_name: project_name.into(),
            stages: StageRegistry::new(),
            connections,
            inventory,
            waves: WaveScheduler::new(settings.optimization_ratio, settings.hold_for_review),
            jobs: Vec::new(),
            reviews: ReviewQueue::new(),
            validation: Vec::new(),
            settings,
        };
        let message = format!(
            "{} connection(s) and {} job(s) declared",
            state.connections.len(),
            state.inventory.len()
        );
        state.stages.update_progress(StageId::Setup, 100, message)?;
        info!(
            project = %state.project_id,
            connections = state.connections.len(),
            jobs = state.inventory.len(),
            "Project created"
        );
        Ok(state)
    }

    /// Create a project from a parsed manifest. The name defaults to the id.
    pub fn from_manifest(
        project_id: &str,
        manifest: &ProjectManifest,
        settings: PipelineSettings,
    ) -> Result<Self, PipelineError> {
        let name = manifest
            .project
            .name
            .clone()
            .unwrap_or_else(|| project_id.to_string());
        Self::new(
            project_id,
            name,
            manifest.connections(),
            manifest.jobs.clone(),
            settings,
        )
    }

    /// Apply runtime settings, e.g. after loading persisted state.
    ///
    /// Waves that are already planned keep their ratio and hold mode.
    pub fn set_settings(&mut self, settings: PipelineSettings) {
        self.settings = settings;
    }

    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Check the structure of a state read back from storage.
    ///
    /// # Errors
    ///
    /// A description of the first part found damaged.
    pub fn validate(&self) -> Result<(), String> {
        self.stages.validate()?;
        self.waves.validate()?;
        if self.waves.is_planned() && self.current_stage() < StageId::Conversion {
            return Err(format!(
                "waves are planned but the pipeline is at {}",
                self.current_stage()
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    #[must_use]
    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    #[must_use]
    pub fn stages(&self) -> &StageRegistry {
        &self.stages
    }

    #[must_use]
    pub fn current_stage(&self) -> StageId {
        self.stages.current_stage()
    }

    #[must_use]
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    #[must_use]
    pub fn inventory(&self) -> &[InventoryJob] {
        &self.inventory
    }

    /// Manifest metadata for an inventory job.
    #[must_use]
    pub fn inventory_job(&self, name: &str) -> Option<&InventoryJob> {
        self.inventory.iter().find(|j| j.name == name)
    }

    #[must_use]
    pub fn waves(&self) -> &WaveScheduler {
        &self.waves
    }

    /// Converted jobs in conversion order.
    #[must_use]
    pub fn jobs(&self) -> &[ClassifiedJob] {
        &self.jobs
    }

    #[must_use]
    pub fn reviews(&self) -> &ReviewQueue {
        &self.reviews
    }

    #[must_use]
    pub fn validation_records(&self) -> &[ValidationRecord] {
        &self.validation
    }

    #[must_use]
    pub fn validation_coverage(&self) -> ValidationCoverage {
        let recorded: Vec<_> = self
            .validation
            .iter()
            .filter(|r| self.jobs.iter().any(|j| j.name == r.job))
            .collect();
        ValidationCoverage {
            converted: self.jobs.len(),
            recorded: recorded.len(),
            passed: recorded.iter().filter(|r| r.passed).count(),
        }
    }

    /// Next job the converting wave expects, with its manifest metadata.
    #[must_use]
    pub fn next_job_to_convert(&self) -> Option<InventoryJob> {
        let name = self.waves.next_unconverted()?;
        self.inventory_job(name).cloned()
    }

    /// Evaluate the gate for `stage` against current data.
    #[must_use]
    pub fn gate(&self, stage: StageId) -> GateResult {
        GateEvaluator::new(self).can_advance(stage)
    }

    /// Record progress on the current stage.
    pub fn update_progress(
        &mut self,
        stage: StageId,
        percent: u8,
        message: impl Into<String>,
    ) -> Result<(), PipelineError> {
        self.stages.update_progress(stage, percent, message)
    }

    /// Complete `stage` if its gate passes, recording derived metrics merged
    /// with `extra`.
    pub fn complete_stage(
        &mut self,
        stage: StageId,
        extra: StageMetrics,
    ) -> Result<Completion, PipelineError> {
        let _span = stage_span(&self.project_id, stage).entered();

        let gate = self.gate(stage);
        let mut metrics = self.stage_metrics(stage);
        metrics.extend(extra);

        let result = self
            .stages
            .complete_stage(stage, metrics, &|_: StageId| gate.clone());
        match &result {
            Ok(Completion::Completed) => log_stage_transition(&self.project_id, stage, "completed"),
            Err(PipelineError::GateNotSatisfied { reasons, .. }) => {
                log_gate_blocked(&self.project_id, stage, reasons);
            }
            _ => {}
        }
        result
    }

    /// Complete the current stage.
    pub fn complete_current(&mut self, extra: StageMetrics) -> Result<Completion, PipelineError> {
        self.complete_stage(self.current_stage(), extra)
    }

    /// Start the next stage.
    ///
    /// Entering conversion plans the waves from the inventory; if planning
    /// fails the pipeline stays where it is.
    pub fn advance(&mut self) -> Result<StageId, PipelineError> {
        let current = self.current_stage();
        let planned = if current.next() == Some(StageId::Conversion)
            && self.stages.stage(current).status == StageStatus::Completed
            && !self.waves.is_planned()
        {
            let mut scheduler = WaveScheduler::new(
                self.settings.optimization_ratio,
                self.settings.hold_for_review,
            );
            scheduler.initialize(&jobs_by_tier(&self.inventory))?;
            Some(scheduler)
        } else {
            None
        };

        let next = self.stages.advance_to_next()?;
        if let Some(scheduler) = planned {
            self.waves = scheduler;
        }

        let _span = stage_span(&self.project_id, next).entered();
        log_stage_transition(&self.project_id, next, "started");
        match next {
            StageId::Analysis => self.refresh_analysis_progress(),
            StageId::Conversion => self.refresh_conversion_progress(),
            StageId::Validation => self.refresh_validation_progress(),
            _ => {}
        }
        Ok(next)
    }

    /// Record a connection test result. Later results replace earlier ones.
    ///
    /// # Errors
    ///
    /// [`PipelineError::UnknownConnection`] when no such connection exists.
    pub fn record_connection_test(
        &mut self,
        name: &str,
        result: ConnectionTestResult,
    ) -> Result<(), PipelineError> {
        let connection = self
            .connections
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| PipelineError::UnknownConnection {
                name: name.to_string(),
            })?;

        if result.success {
            info!(connection = %name, kind = %connection.kind, "Connection test passed");
        } else {
            warn!(
                connection = %name,
                kind = %connection.kind,
                message = result.message.as_deref().unwrap_or(""),
                "Connection test failed"
            );
        }
        connection.record_test(result);
        self.refresh_analysis_progress();
        Ok(())
    }

    /// Classify a converted job and count it against its wave.
    ///
    /// A job that was already recorded returns its existing record unchanged.
    /// Attention Required jobs are flagged and queued for manual review
    /// before the conversion is counted.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::InvalidTransition`] before waves are planned
    /// * [`PipelineError::UnknownJob`] for a job outside the inventory
    /// * [`PipelineError::JobNotInActiveWave`] when its wave is not converting
    /// * [`PipelineError::ScoreOutOfRange`] for an invalid score
    pub fn record_conversion(
        &mut self,
        outcome: ConversionOutcome,
    ) -> Result<ClassifiedJob, PipelineError> {
        if let Some(existing) = self.jobs.iter().find(|j| j.name == outcome.job) {
            return Ok(existing.clone());
        }
        if !self.waves.is_planned() {
            return Err(PipelineError::InvalidTransition {
                stage: StageId::Conversion,
                reason: "waves are planned when the conversion stage starts".to_string(),
            });
        }

        let wave = self
            .waves
            .wave_of(&outcome.job)
            .ok_or_else(|| PipelineError::UnknownJob {
                job: outcome.job.clone(),
            })?;
        if wave.status() != WaveStatus::Converting {
            return Err(PipelineError::JobNotInActiveWave {
                job: outcome.job.clone(),
                wave: wave.id(),
            });
        }
        let (wave_id, tier) = (wave.id(), wave.tier());

        let classified = JobClassifier::new(self.settings.thresholds).classify_job(JobOutcome {
            name: &outcome.job,
            wave: wave_id,
            tier,
            confidence_score: outcome.confidence_score,
            profile: &outcome.profile,
            warnings: &outcome.warnings,
        })?;

        if classified.needs_review() {
            let reason = classified
                .review_reason
                .clone()
                .unwrap_or_else(|| "Needs manual conversion".to_string());
            self.waves.flag_for_review(&classified.name)?;
            self.reviews
                .enqueue(ManualReviewJob::new(&classified.name, reason, tier.into()))?;
        }
        self.waves.convert_job(&classified.name)?;
        self.jobs.push(classified.clone());
        self.refresh_conversion_progress();
        Ok(classified)
    }

    /// Move a manual review one step forward.
    ///
    /// Completing the review releases its wave when the wave was only held
    /// for review.
    pub fn advance_review(&mut self, job: &str) -> Result<StepOutcome, PipelineError> {
        let outcome = self.reviews.advance_step(job)?;
        if outcome.completed_now() {
            self.waves.mark_reviewed(job)?;
            self.refresh_conversion_progress();
        }
        Ok(outcome)
    }

    /// Like [`advance_review`](Self::advance_review), failing with
    /// [`PipelineError::TerminalStep`] for completed reviews.
    pub fn advance_review_strict(&mut self, job: &str) -> Result<WizardStep, PipelineError> {
        let step = self.reviews.advance_step_strict(job)?;
        if step == WizardStep::Complete {
            self.waves.mark_reviewed(job)?;
            self.refresh_conversion_progress();
        }
        Ok(step)
    }

    /// Record the validation result for a converted job.
    ///
    /// # Errors
    ///
    /// [`PipelineError::UnknownJob`] when the job has not been converted.
    pub fn record_validation(&mut self, record: ValidationRecord) -> Result<(), PipelineError> {
        if !self.jobs.iter().any(|j| j.name == record.job) {
            return Err(PipelineError::UnknownJob { job: record.job });
        }
        if record.passed {
            info!(job = %record.job, "Validation passed");
        } else {
            warn!(
                job = %record.job,
                detail = record.detail.as_deref().unwrap_or(""),
                "Validation failed"
            );
        }

        match self.validation.iter_mut().find(|r| r.job == record.job) {
            Some(existing) => *existing = record,
            None => self.validation.push(record),
        }
        self.refresh_validation_progress();
        Ok(())
    }

    /// Aggregate numbers for reporting.
    #[must_use]
    pub fn summary(&self) -> ProjectSummary {
        ProjectSummary::compute(
            self.inventory.len() as u64,
            &self.jobs,
            &self.reviews,
            &self.validation,
        )
    }

    /// Read-only view for presentation. `effective_config` maps key to
    /// `(value, source)`.
    #[must_use]
    pub fn snapshot(&self, effective_config: BTreeMap<String, (String, String)>) -> PipelineSnapshot {
        PipelineSnapshot::build(
            SnapshotInput {
                project_id: &self.project_id,
                project_name: &self.project_name,
                total_jobs: self.inventory.len() as u64,
                stages: &self.stages,
                waves: &self.waves,
                jobs: &self.jobs,
                reviews: &self.reviews,
                connections: &self.connections,
                validation: &self.validation,
            },
            effective_config,
        )
    }

    fn stage_metrics(&self, stage: StageId) -> StageMetrics {
        let mut metrics = StageMetrics::new();
        match stage {
            StageId::Setup => {
                metrics.insert("connections".into(), json!(self.connections.len()));
                metrics.insert("jobs_declared".into(), json!(self.inventory.len()));
            }
            StageId::Analysis => {
                let tested = self.connections.iter().filter(|c| c.tested).count();
                let ready = self.connections.iter().filter(|c| c.is_ready()).count();
                metrics.insert("connections_tested".into(), json!(tested));
                metrics.insert("connections_ready".into(), json!(ready));
            }
            StageId::Discovery => {
                for (tier, jobs) in jobs_by_tier(&self.inventory) {
                    metrics.insert(format!("jobs_{tier}"), json!(jobs.len()));
                }
                metrics.insert("jobs_total".into(), json!(self.inventory.len()));
            }
            StageId::Conversion => {
                let summary = self.summary();
                metrics.insert("waves".into(), json!(self.waves.waves().len()));
                metrics.insert("jobs_converted".into(), json!(summary.converted_jobs));
                metrics.insert("jobs_automated".into(), json!(summary.automated_jobs));
                metrics.insert("jobs_manual".into(), json!(summary.manual_jobs));
                metrics.insert("automation_rate".into(), json!(summary.automation_rate));
                metrics.insert(
                    "average_confidence".into(),
                    json!(summary.average_confidence),
                );
            }
            StageId::Validation => {
                let coverage = self.validation_coverage();
                metrics.insert("jobs_validated".into(), json!(coverage.recorded));
                metrics.insert("jobs_passed".into(), json!(coverage.passed));
                metrics.insert("pass_rate".into(), json!(coverage.pass_rate()));
            }
            StageId::Completion => {
                let summary = self.summary();
                metrics.insert("jobs_total".into(), json!(summary.total_jobs));
                metrics.insert("automation_rate".into(), json!(summary.automation_rate));
                metrics.insert(
                    "validation_pass_rate".into(),
                    json!(summary.validation_pass_rate),
                );
            }
        }
        metrics
    }

    /// Raise the progress of `stage` to `percent` while it is in progress.
    /// Lower values are ignored.
    fn raise_progress(&mut self, stage: StageId, percent: u8, message: String) {
        let record = self.stages.stage(stage);
        if record.status != StageStatus::InProgress || percent < record.progress {
            return;
        }
        // Cannot fail: in progress, within 0..=100 and not decreasing.
        let _ = self.stages.update_progress(stage, percent, message);
    }

    fn refresh_analysis_progress(&mut self) {
        let required: Vec<_> = self.connections.iter().filter(|c| c.required).collect();
        let ready = required.iter().filter(|c| c.is_ready()).count();
        let pct = if required.is_empty() {
            100
        } else {
            percent(ready as u64, required.len() as u64)
        };
        let message = format!("{ready}/{} required connection(s) ready", required.len());
        self.raise_progress(StageId::Analysis, pct, message);
    }

    fn refresh_conversion_progress(&mut self) {
        let message = format!(
            "{}/{} job(s) converted, {} manual review(s) pending",
            self.waves.total_converted(),
            self.waves.total_jobs(),
            self.reviews.pending_count()
        );
        self.raise_progress(StageId::Conversion, self.waves.progress(), message);
    }

    fn refresh_validation_progress(&mut self) {
        let coverage = self.validation_coverage();
        let message = format!(
            "{}/{} converted job(s) validated, {} passed",
            coverage.recorded, coverage.converted, coverage.passed
        );
        self.raise_progress(
            StageId::Validation,
            percent(coverage.recorded as u64, coverage.converted as u64),
            message,
        );
    }
}

impl GateInputs for PipelineState {
    fn connections(&self) -> &[Connection] {
        &self.connections
    }

    fn inventory_size(&self) -> usize {
        self.inventory.len()
    }

    fn waves(&self) -> &WaveScheduler {
        &self.waves
    }

    fn reviews(&self) -> &ReviewQueue {
        &self.reviews
    }

    fn validation(&self) -> ValidationCoverage {
        self.validation_coverage()
    }

    fn min_pass_rate(&self) -> Option<f64> {
        self.settings.min_pass_rate
    }
}
