//! Manual review workflow
//!
//! Jobs classified Attention Required walk a forward-only wizard:
//!
//! ```text
//! review → implement → test → complete
//! ```
//!
//! A job counts as manually completed once it reaches `complete`. Steps
//! cannot be skipped and a review cannot be cancelled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use stagehand_utils::error::PipelineError;
use stagehand_utils::types::ComplexityTier;

/// Wizard step of a manual review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Review,
    Implement,
    Test,
    Complete,
}

impl WizardStep {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Review => "review",
            Self::Implement => "implement",
            Self::Test => "test",
            Self::Complete => "complete",
        }
    }

    /// Following step, or `None` at `Complete`.
    #[must_use]
    pub const fn next(&self) -> Option<Self> {
        match self {
            Self::Review => Some(Self::Implement),
            Self::Implement => Some(Self::Test),
            Self::Test => Some(Self::Complete),
            Self::Complete => None,
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Complexity of a manual review item. There is no low manual complexity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewComplexity {
    Medium,
    High,
}

impl From<ComplexityTier> for ReviewComplexity {
    fn from(tier: ComplexityTier) -> Self {
        match tier {
            ComplexityTier::Low | ComplexityTier::Medium => Self::Medium,
            ComplexityTier::High => Self::High,
        }
    }
}

impl fmt::Display for ReviewComplexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

/// A job waiting on (or done with) manual conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualReviewJob {
    pub name: String,
    pub reason: String,
    pub complexity: ReviewComplexity,
    wizard_step: WizardStep,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completed_at: Option<DateTime<Utc>>,
}

impl ManualReviewJob {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        reason: impl Into<String>,
        complexity: ReviewComplexity,
    ) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
            complexity,
            wizard_step: WizardStep::Review,
            completed_at: None,
        }
    }

    #[must_use]
    pub fn wizard_step(&self) -> WizardStep {
        self.wizard_step
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.wizard_step == WizardStep::Complete
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }
}

/// What a lenient [`ReviewQueue::advance_step`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Advanced { from: WizardStep, to: WizardStep },
    /// The job was already complete; nothing changed.
    AlreadyComplete,
}

impl StepOutcome {
    /// True when this call moved the job into `complete`.
    #[must_use]
    pub fn completed_now(&self) -> bool {
        matches!(
            self,
            Self::Advanced {
                to: WizardStep::Complete,
                ..
            }
        )
    }
}

/// Queue of manual review jobs in enqueue order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewQueue {
    jobs: Vec<ManualReviewJob>,
}

impl ReviewQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a job at the `review` step.
    ///
    /// # Errors
    ///
    /// [`PipelineError::DuplicateJob`] when a job of that name is queued.
    pub fn enqueue(&mut self, job: ManualReviewJob) -> Result<(), PipelineError> {
        if self.get(&job.name).is_some() {
            return Err(PipelineError::DuplicateJob { job: job.name });
        }
        info!(
            job = %job.name,
            complexity = %job.complexity,
            reason = %job.reason,
            "Job queued for manual review"
        );
        self.jobs.push(job);
        Ok(())
    }

    /// Move a job one step forward. At `complete` this is a no-op.
    ///
    /// # Errors
    ///
    /// [`PipelineError::UnknownJob`] when the job is not queued.
    pub fn advance_step(&mut self, name: &str) -> Result<StepOutcome, PipelineError> {
        let job = self.get_mut(name)?;
        let from = job.wizard_step;
        let Some(to) = from.next() else {
            return Ok(StepOutcome::AlreadyComplete);
        };

        job.wizard_step = to;
        if to == WizardStep::Complete {
            job.completed_at = Some(Utc::now());
        }
        info!(job = %name, from = %from, to = %to, "Review step advanced");
        Ok(StepOutcome::Advanced { from, to })
    }

    /// Like [`advance_step`](Self::advance_step) but treats a completed job
    /// as an error. Returns the new step.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::UnknownJob`] when the job is not queued
    /// * [`PipelineError::TerminalStep`] when the job is already complete
    pub fn advance_step_strict(&mut self, name: &str) -> Result<WizardStep, PipelineError> {
        match self.advance_step(name)? {
            StepOutcome::Advanced { to, .. } => Ok(to),
            StepOutcome::AlreadyComplete => Err(PipelineError::TerminalStep {
                job: name.to_string(),
            }),
        }
    }

    /// Number of jobs that reached `complete`.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.jobs.iter().filter(|j| j.is_complete()).count()
    }

    /// Jobs still short of `complete`, in enqueue order.
    pub fn pending(&self) -> impl Iterator<Item = &ManualReviewJob> {
        self.jobs.iter().filter(|j| !j.is_complete())
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.jobs.len() - self.completed_count()
    }

    #[must_use]
    pub fn all_complete(&self) -> bool {
        self.jobs.iter().all(ManualReviewJob::is_complete)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ManualReviewJob> {
        self.jobs.iter().find(|j| j.name == name)
    }

    #[must_use]
    pub fn jobs(&self) -> &[ManualReviewJob] {
        &self.jobs
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut ManualReviewJob, PipelineError> {
        self.jobs
            .iter_mut()
            .find(|j| j.name == name)
            .ok_or_else(|| PipelineError::UnknownJob {
                job: name.to_string(),
            })
    }
}
