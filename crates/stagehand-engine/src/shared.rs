use std::sync::{Arc, Mutex, MutexGuard};

use stagehand_utils::error::PipelineError;

use crate::events::PipelineEvent;
use crate::state::PipelineState;

/// Cloneable handle to one project's [`PipelineState`].
///
/// Every access holds the lock for the duration of a closure, so each
/// update is applied atomically with respect to other tasks.
#[derive(Debug, Clone)]
pub struct SharedPipeline {
    inner: Arc<Mutex<PipelineState>>,
}

impl SharedPipeline {
    #[must_use]
    pub fn new(state: PipelineState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    /// Run `f` with shared access to the state.
    pub fn read<R>(&self, f: impl FnOnce(&PipelineState) -> R) -> R {
        f(&self.lock())
    }

    /// Run `f` with exclusive access to the state.
    pub fn update<R>(&self, f: impl FnOnce(&mut PipelineState) -> R) -> R {
        f(&mut self.lock())
    }

    /// Apply one event atomically.
    pub fn apply(&self, event: PipelineEvent) -> Result<(), PipelineError> {
        self.update(|state| event.apply(state))
    }

    /// Copy of the current state.
    #[must_use]
    pub fn to_state(&self) -> PipelineState {
        self.lock().clone()
    }

    // Mutations validate before writing, so a poisoned state is still whole.
    fn lock(&self) -> MutexGuard<'_, PipelineState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
