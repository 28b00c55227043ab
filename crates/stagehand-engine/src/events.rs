//! External signals and the loop that applies them
//!
//! Collaborators running on other tasks post [`PipelineEvent`]s to a bounded
//! queue. One task drains the queue and applies each event to the shared
//! pipeline, so mutation stays serialized no matter where signals come from.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use stagehand_utils::error::PipelineError;
use stagehand_utils::types::{ConnectionTestResult, ValidationRecord};

use crate::collaborators::ConversionOutcome;
use crate::shared::SharedPipeline;
use crate::state::PipelineState;

/// Default capacity of the event queue.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// A signal from outside the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    ConversionFinished(ConversionOutcome),
    ConnectionTested {
        name: String,
        result: ConnectionTestResult,
    },
    ReviewAdvanced {
        job: String,
    },
    ValidationRecorded(ValidationRecord),
}

impl PipelineEvent {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConversionFinished(_) => "conversion_finished",
            Self::ConnectionTested { .. } => "connection_tested",
            Self::ReviewAdvanced { .. } => "review_advanced",
            Self::ValidationRecorded(_) => "validation_recorded",
        }
    }

    /// Apply the event to `state`.
    pub fn apply(self, state: &mut PipelineState) -> Result<(), PipelineError> {
        match self {
            Self::ConversionFinished(outcome) => state.record_conversion(outcome).map(|_| ()),
            Self::ConnectionTested { name, result } => state.record_connection_test(&name, result),
            Self::ReviewAdvanced { job } => state.advance_review(&job).map(|_| ()),
            Self::ValidationRecorded(record) => state.record_validation(record),
        }
    }
}

/// What the event loop did before its queue closed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventLoopReport {
    pub applied: usize,
    /// Events the pipeline refused, with the reason
    pub rejected: Vec<(String, PipelineError)>,
}

/// Create the bounded event queue.
#[must_use]
pub fn event_channel(capacity: usize) -> (mpsc::Sender<PipelineEvent>, mpsc::Receiver<PipelineEvent>) {
    mpsc::channel(capacity.max(1))
}

/// Drain `events` into `shared` until every sender is dropped.
///
/// A rejected event is logged and recorded in the report; it does not stop
/// the loop.
pub fn spawn_event_loop(
    shared: SharedPipeline,
    mut events: mpsc::Receiver<PipelineEvent>,
) -> JoinHandle<EventLoopReport> {
    tokio::spawn(async move {
        let mut report = EventLoopReport::default();
        while let Some(event) = events.recv().await {
            let kind = event.kind();
            match shared.apply(event) {
                Ok(()) => {
                    debug!(event = kind, "Event applied");
                    report.applied += 1;
                }
                Err(e) => {
                    warn!(event = kind, error = %e, "Event rejected");
                    report.rejected.push((kind.to_string(), e));
                }
            }
        }
        info!(
            applied = report.applied,
            rejected = report.rejected.len(),
            "Event loop finished"
        );
        report
    })
}
