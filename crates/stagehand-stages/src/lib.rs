//! Stage registry
//!
//! Owns the ordered list of pipeline stages and enforces their lifecycle:
//!
//! - only the current `in_progress` stage accepts progress updates, and its
//!   progress never decreases;
//! - a stage completes once, through its gate, with progress pinned to 100
//!   and metrics frozen;
//! - the next stage starts only after the current one completed.
//!
//! The registry performs no I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use stagehand_gate::StageGate;
use stagehand_utils::error::PipelineError;
use stagehand_utils::types::{StageId, StageStatus};

/// Metrics recorded when a stage completes.
pub type StageMetrics = BTreeMap<String, serde_json::Value>;

/// One stage of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub id: StageId,
    pub status: StageStatus,
    /// 0-100
    pub progress: u8,
    pub message: String,
    /// Empty until the stage completes, then never changes.
    #[serde(default)]
    pub metrics: StageMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Stage {
    fn pending(id: StageId) -> Self {
        Self {
            id,
            status: StageStatus::Pending,
            progress: 0,
            message: String::new(),
            metrics: StageMetrics::new(),
            started_at: None,
            completed_at: None,
        }
    }

    fn start(&mut self) {
        self.status = StageStatus::InProgress;
        self.progress = 0;
        self.message = format!("{} in progress", self.id.title());
        self.started_at = Some(Utc::now());
    }
}

/// Outcome of [`StageRegistry::complete_stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Completed,
    /// The stage had already completed; the call changed nothing.
    AlreadyCompleted,
}

/// Ordered stages with the current stage in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRegistry {
    stages: Vec<Stage>,
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StageRegistry {
    /// All stages pending except the first, which starts in progress.
    #[must_use]
    pub fn new() -> Self {
        let mut stages: Vec<Stage> = StageId::all().map(Stage::pending).collect();
        stages[0].start();
        Self { stages }
    }

    /// The furthest stage that has started.
    #[must_use]
    pub fn current_stage(&self) -> StageId {
        self.stages
            .iter()
            .rev()
            .find(|s| s.status != StageStatus::Pending)
            .map_or_else(StageId::first, |s| s.id)
    }

    /// Check the structure of a registry read back from storage.
    ///
    /// Requires one entry per stage in pipeline order, progress within
    /// 0-100, and statuses that read completed, then at most one in
    /// progress, then pending, with the first stage started.
    ///
    /// # Errors
    ///
    /// A description of the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        let ids: Vec<StageId> = self.stages.iter().map(|s| s.id).collect();
        if !ids.iter().copied().eq(StageId::all()) {
            let names: Vec<&str> = ids.iter().map(StageId::as_str).collect();
            return Err(format!(
                "stages must list every stage in order, found [{}]",
                names.join(", ")
            ));
        }

        let mut seen_open = false;
        for stage in &self.stages {
            if stage.progress > 100 {
                return Err(format!("stage {} has progress {}", stage.id, stage.progress));
            }
            let out_of_order = match stage.status {
                StageStatus::Completed => seen_open,
                StageStatus::InProgress => std::mem::replace(&mut seen_open, true),
                StageStatus::Pending => {
                    seen_open = true;
                    false
                }
            };
            if out_of_order {
                return Err(format!("stage {} is {} out of order", stage.id, stage.status));
            }
        }

        if self.stages[0].status == StageStatus::Pending {
            return Err(format!("stage {} has not started", self.stages[0].id));
        }
        Ok(())
    }

    #[must_use]
    pub fn stage(&self, id: StageId) -> &Stage {
        &self.stages[id.ordinal()]
    }

    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Mean progress across all stages, rounded.
    #[must_use]
    pub fn overall_progress(&self) -> u8 {
        let total: u32 = self.stages.iter().map(|s| u32::from(s.progress)).sum();
        let count = self.stages.len() as u32;
        ((2 * total + count) / (2 * count)) as u8
    }

    /// Record progress on the current stage.
    ///
    /// # Errors
    ///
    /// [`PipelineError::InvalidTransition`] when `stage` is not the current
    /// in-progress stage, when `percent` is above 100 or when it is lower
    /// than the recorded progress.
    pub fn update_progress(
        &mut self,
        stage: StageId,
        percent: u8,
        message: impl Into<String>,
    ) -> Result<(), PipelineError> {
        let invalid = |reason: String| PipelineError::InvalidTransition { stage, reason };

        let record = &mut self.stages[stage.ordinal()];
        if record.status != StageStatus::InProgress {
            return Err(invalid(format!(
                "stage is {}, only the in-progress stage accepts progress",
                record.status
            )));
        }
        if percent > 100 {
            return Err(invalid(format!("progress {percent} exceeds 100")));
        }
        if percent < record.progress {
            return Err(invalid(format!(
                "progress cannot decrease from {} to {percent}",
                record.progress
            )));
        }

        record.progress = percent;
        record.message = message.into();
        Ok(())
    }

    /// Complete `stage` if its gate allows it.
    ///
    /// Completing an already-completed stage succeeds and ignores `metrics`.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::InvalidTransition`] when the stage has not started
    /// * [`PipelineError::GateNotSatisfied`] with the unmet reasons
    pub fn complete_stage(
        &mut self,
        stage: StageId,
        metrics: StageMetrics,
        gate: &(impl StageGate + ?Sized),
    ) -> Result<Completion, PipelineError> {
        match self.stages[stage.ordinal()].status {
            StageStatus::Completed => return Ok(Completion::AlreadyCompleted),
            StageStatus::Pending => {
                return Err(PipelineError::InvalidTransition {
                    stage,
                    reason: "stage has not started".to_string(),
                });
            }
            StageStatus::InProgress => {}
        }

        let result = gate.can_advance(stage);
        if let Err(err) = result.ensure_passed() {
            warn!(
                stage = %stage,
                unmet = result.failure_reasons.len(),
                reasons = %result.failure_reasons.join("; "),
                "Stage gate not satisfied"
            );
            return Err(err);
        }

        let record = &mut self.stages[stage.ordinal()];
        record.status = StageStatus::Completed;
        record.progress = 100;
        record.message = format!("{} complete", stage.title());
        record.metrics = metrics;
        record.completed_at = Some(Utc::now());
        info!(stage = %stage, "Stage completed");
        Ok(Completion::Completed)
    }

    /// Start the stage after the current one.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::NoMoreStages`] at the terminal stage
    /// * [`PipelineError::PriorStageIncomplete`] unless the current stage
    ///   has completed
    pub fn advance_to_next(&mut self) -> Result<StageId, PipelineError> {
        let current = self.current_stage();
        let Some(next) = current.next() else {
            return Err(PipelineError::NoMoreStages);
        };
        if self.stages[current.ordinal()].status != StageStatus::Completed {
            return Err(PipelineError::PriorStageIncomplete { stage: current });
        }

        self.stages[next.ordinal()].start();
        info!(from = %current, to = %next, "Stage started");
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use stagehand_gate::GateResult;

    fn open(stage: StageId) -> GateResult {
        GateResult {
            stage,
            passed: true,
            summary: "open".to_string(),
            conditions: vec![],
            failure_reasons: vec![],
        }
    }

    fn closed(stage: StageId) -> GateResult {
        GateResult {
            stage,
            passed: false,
            summary: "closed".to_string(),
            conditions: vec![],
            failure_reasons: vec!["2 manual review job(s) pending".to_string()],
        }
    }

    fn metrics(key: &str, value: i64) -> StageMetrics {
        StageMetrics::from([(key.to_string(), serde_json::json!(value))])
    }

    #[test]
    fn test_new_registry_starts_at_setup() {
        let registry = StageRegistry::new();
        assert_eq!(registry.current_stage(), StageId::Setup);
        assert_eq!(registry.stage(StageId::Setup).status, StageStatus::InProgress);
        assert!(registry.stage(StageId::Setup).started_at.is_some());
        for stage in StageId::all().skip(1) {
            assert_eq!(registry.stage(stage).status, StageStatus::Pending);
        }
    }

    #[test]
    fn test_update_progress_rules() {
        let mut registry = StageRegistry::new();
        registry.update_progress(StageId::Setup, 40, "Registering connections").unwrap();
        registry.update_progress(StageId::Setup, 40, "Still registering").unwrap();
        assert_eq!(registry.stage(StageId::Setup).message, "Still registering");

        let err = registry.update_progress(StageId::Setup, 30, "back").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTransition { .. }));
        let err = registry.update_progress(StageId::Setup, 101, "over").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTransition { .. }));
        let err = registry.update_progress(StageId::Analysis, 10, "early").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidTransition {
                stage: StageId::Analysis,
                ..
            }
        ));
        assert_eq!(registry.stage(StageId::Setup).progress, 40);
    }

    #[test]
    fn test_complete_blocked_by_gate() {
        let mut registry = StageRegistry::new();
        let err = registry
            .complete_stage(StageId::Setup, StageMetrics::new(), &closed)
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::GateNotSatisfied {
                stage: StageId::Setup,
                reasons: vec!["2 manual review job(s) pending".to_string()],
            }
        );
        assert_eq!(registry.stage(StageId::Setup).status, StageStatus::InProgress);
    }

    #[test]
    fn test_complete_is_idempotent_and_freezes_metrics() {
        let mut registry = StageRegistry::new();
        let first = registry
            .complete_stage(StageId::Setup, metrics("connections", 4), &open)
            .unwrap();
        assert_eq!(first, Completion::Completed);

        let setup = registry.stage(StageId::Setup).clone();
        assert_eq!(setup.status, StageStatus::Completed);
        assert_eq!(setup.progress, 100);
        assert!(setup.completed_at.is_some());

        let again = registry
            .complete_stage(StageId::Setup, metrics("connections", 99), &closed)
            .unwrap();
        assert_eq!(again, Completion::AlreadyCompleted);
        assert_eq!(registry.stage(StageId::Setup), &setup);
    }

    #[test]
    fn test_validate_accepts_registries_built_through_the_api() {
        let mut registry = StageRegistry::new();
        assert_eq!(registry.validate(), Ok(()));
        registry
            .complete_stage(StageId::Setup, StageMetrics::new(), &open)
            .unwrap();
        assert_eq!(registry.validate(), Ok(()));
        registry.advance_to_next().unwrap();
        assert_eq!(registry.validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_damaged_registries() {
        let mut truncated = StageRegistry::new();
        truncated.stages.truncate(2);
        let err = truncated.validate().unwrap_err();
        assert!(err.contains("[setup, analysis]"), "{err}");

        let mut swapped = StageRegistry::new();
        swapped.stages.swap(1, 2);
        assert!(swapped.validate().is_err());

        let mut gap = StageRegistry::new();
        gap.stages[2].status = StageStatus::Completed;
        assert!(gap.validate().unwrap_err().contains("discovery"));

        let mut two_open = StageRegistry::new();
        two_open.stages[1].status = StageStatus::InProgress;
        assert!(two_open.validate().is_err());

        let mut unstarted = StageRegistry::new();
        unstarted.stages[0].status = StageStatus::Pending;
        assert!(unstarted.validate().is_err());

        let mut overfull = StageRegistry::new();
        overfull.stages[0].progress = 140;
        assert!(overfull.validate().is_err());
    }

    #[test]
    fn test_complete_pending_stage_is_invalid() {
        let mut registry = StageRegistry::new();
        let err = registry
            .complete_stage(StageId::Conversion, StageMetrics::new(), &open)
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTransition { .. }));
    }

    #[test]
    fn test_advance_requires_completion() {
        let mut registry = StageRegistry::new();
        assert_eq!(
            registry.advance_to_next().unwrap_err(),
            PipelineError::PriorStageIncomplete {
                stage: StageId::Setup
            }
        );

        registry
            .complete_stage(StageId::Setup, StageMetrics::new(), &open)
            .unwrap();
        assert_eq!(registry.advance_to_next().unwrap(), StageId::Analysis);
        assert_eq!(registry.current_stage(), StageId::Analysis);
        assert_eq!(
            registry.stage(StageId::Analysis).status,
            StageStatus::InProgress
        );
    }

    #[test]
    fn test_walk_to_terminal_stage() {
        let mut registry = StageRegistry::new();
        for stage in StageId::all() {
            registry
                .complete_stage(stage, StageMetrics::new(), &open)
                .unwrap();
            if stage.is_terminal() {
                assert_eq!(
                    registry.advance_to_next().unwrap_err(),
                    PipelineError::NoMoreStages
                );
            } else {
                assert_eq!(registry.advance_to_next().unwrap(), stage.next().unwrap());
            }
        }
        assert_eq!(registry.overall_progress(), 100);
    }

    #[test]
    fn test_terminal_stage_reports_no_more_stages_before_completion() {
        let mut registry = StageRegistry::new();
        for stage in StageId::all().take_while(|s| !s.is_terminal()) {
            registry
                .complete_stage(stage, StageMetrics::new(), &open)
                .unwrap();
            registry.advance_to_next().unwrap();
        }
        assert_eq!(registry.current_stage(), StageId::Completion);
        assert_eq!(
            registry.advance_to_next().unwrap_err(),
            PipelineError::NoMoreStages
        );
    }

    proptest! {
        #[test]
        fn prop_progress_never_decreases(updates in proptest::collection::vec(0u8..=120, 1..50)) {
            let mut registry = StageRegistry::new();
            let mut last = 0;
            for percent in updates {
                let accepted = registry.update_progress(StageId::Setup, percent, "tick").is_ok();
                prop_assert_eq!(accepted, percent <= 100 && percent >= last);
                let now = registry.stage(StageId::Setup).progress;
                prop_assert!(now >= last);
                last = now;
            }
        }

        #[test]
        fn prop_stage_never_completes_through_closed_gate(attempts in 1usize..10) {
            let mut registry = StageRegistry::new();
            for _ in 0..attempts {
                prop_assert!(registry.complete_stage(StageId::Setup, StageMetrics::new(), &closed).is_err());
            }
            prop_assert_eq!(registry.stage(StageId::Setup).status, StageStatus::InProgress);
        }
    }
}
