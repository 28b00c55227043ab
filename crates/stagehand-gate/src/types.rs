use serde::{Deserialize, Serialize};

use stagehand_review::ReviewQueue;
use stagehand_utils::error::PipelineError;
use stagehand_utils::types::{Connection, StageId};
use stagehand_waves::WaveScheduler;

/// Result of evaluating a stage's gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    /// Stage whose preconditions were evaluated
    pub stage: StageId,

    /// Whether every condition held
    pub passed: bool,

    /// Human-readable summary of result
    pub summary: String,

    /// Individual conditions evaluated
    pub conditions: Vec<GateCondition>,

    /// Reasons for failure (if any)
    pub failure_reasons: Vec<String>,
}

impl GateResult {
    /// Turn a failed result into [`PipelineError::GateNotSatisfied`].
    pub fn ensure_passed(&self) -> Result<(), PipelineError> {
        if self.passed {
            Ok(())
        } else {
            Err(PipelineError::GateNotSatisfied {
                stage: self.stage,
                reasons: self.failure_reasons.clone(),
            })
        }
    }
}

/// Individual condition evaluated by gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateCondition {
    /// Name of condition
    pub name: String,

    /// Description of what the condition checks
    pub description: String,

    /// Whether the condition passed
    pub passed: bool,

    /// Actual value observed
    pub actual: Option<String>,

    /// Expected value for passing
    pub expected: Option<String>,
}

/// Validation progress over converted jobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationCoverage {
    /// Jobs converted so far
    pub converted: usize,
    /// Converted jobs that have a validation record
    pub recorded: usize,
    /// Recorded jobs whose validation passed
    pub passed: usize,
}

impl ValidationCoverage {
    /// Percent of recorded jobs that passed, or `None` with no records.
    #[must_use]
    pub fn pass_rate(&self) -> Option<f64> {
        (self.recorded > 0).then(|| self.passed as f64 * 100.0 / self.recorded as f64)
    }

    #[must_use]
    pub fn missing(&self) -> usize {
        self.converted.saturating_sub(self.recorded)
    }
}

/// Pipeline data the gate reads.
///
/// The evaluator never caches: every call reads through this trait, so a
/// result always reflects the state at the moment it was asked for.
pub trait GateInputs {
    /// Declared connections
    fn connections(&self) -> &[Connection];

    /// Number of jobs in the project inventory
    fn inventory_size(&self) -> usize;

    /// Wave scheduler state
    fn waves(&self) -> &WaveScheduler;

    /// Manual review queue
    fn reviews(&self) -> &ReviewQueue;

    /// Validation coverage of converted jobs
    fn validation(&self) -> ValidationCoverage;

    /// Minimum validation pass rate (percent), when one is required
    fn min_pass_rate(&self) -> Option<f64>;
}

/// Anything that can answer "may this stage complete?".
///
/// The stage registry takes this rather than a concrete evaluator, so tests
/// can pass a closure.
pub trait StageGate {
    fn can_advance(&self, stage: StageId) -> GateResult;
}

impl<F> StageGate for F
where
    F: Fn(StageId) -> GateResult,
{
    fn can_advance(&self, stage: StageId) -> GateResult {
        self(stage)
    }
}
