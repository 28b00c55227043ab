//! Project façade for the CLI and other embedders.
//!
//! A [`ProjectHandle`] pairs a loaded [`PipelineState`] with the resolved
//! configuration and, for writers, the project lock. Mutating commands open
//! a handle, call one state operation and [`save`](ProjectHandle::save);
//! an operation that fails leaves the state file untouched.
//!
//! ```rust,no_run
//! use stagehand_config::Config;
//! use stagehand_engine::ProjectHandle;
//! use stagehand_stages::StageMetrics;
//!
//! let config = Config::defaults();
//! let mut handle = ProjectHandle::open("acme-dw", config, false)?;
//! handle.state_mut().complete_current(StageMetrics::new())?;
//! handle.save()?;
//! # Ok::<(), stagehand_utils::error::StagehandError>(())
//! ```

use std::collections::BTreeMap;

use stagehand_config::Config;
use stagehand_lock::ProjectLock;
use stagehand_status::PipelineSnapshot;
use stagehand_utils::error::{PersistenceError, StagehandError};
use stagehand_utils::paths::{project_root, validate_project_id};

use crate::manifest::ProjectManifest;
use crate::state::{PipelineSettings, PipelineState};
use crate::store;

/// A project opened for reading or writing.
#[derive(Debug)]
pub struct ProjectHandle {
    state: PipelineState,
    config: Config,
    _lock: Option<ProjectLock>,
}

impl ProjectHandle {
    /// Create a new project from `manifest` and write its first state file.
    ///
    /// # Errors
    ///
    /// * [`PersistenceError::InvalidProjectId`] for an unusable id
    /// * [`PersistenceError::ProjectExists`] when the project already exists
    /// * lock, pipeline or write errors
    pub fn create(
        project_id: &str,
        manifest: &ProjectManifest,
        config: Config,
    ) -> Result<Self, StagehandError> {
        validate_project_id(project_id)?;
        if store::exists(project_id) {
            return Err(PersistenceError::ProjectExists {
                project: project_id.to_string(),
            }
            .into());
        }

        let lock = Self::lock(project_id, &config, false)?;
        let settings = PipelineSettings::from_config(&config)?;
        let state = PipelineState::from_manifest(project_id, manifest, settings)?;
        let handle = Self {
            state,
            config,
            _lock: Some(lock),
        };
        handle.save()?;
        Ok(handle)
    }

    /// Open an existing project for writing, holding its lock until drop.
    ///
    /// `force` overrides a lock held by another process.
    pub fn open(project_id: &str, config: Config, force: bool) -> Result<Self, StagehandError> {
        validate_project_id(project_id)?;
        let lock = Self::lock(project_id, &config, force)?;
        let mut handle = Self::load(project_id, config)?;
        handle._lock = Some(lock);
        Ok(handle)
    }

    /// Open an existing project without taking its lock.
    pub fn open_read_only(project_id: &str, config: Config) -> Result<Self, StagehandError> {
        Self::load(project_id, config)
    }

    fn load(project_id: &str, config: Config) -> Result<Self, StagehandError> {
        let mut state = store::load(project_id)?;
        state.set_settings(PipelineSettings::from_config(&config)?);
        Ok(Self {
            state,
            config,
            _lock: None,
        })
    }

    fn lock(project_id: &str, config: &Config, force: bool) -> Result<ProjectLock, StagehandError> {
        // Locking before the project directory exists creates it.
        let lock = ProjectLock::acquire(
            &project_root(project_id),
            project_id,
            force,
            config.lock_ttl_seconds(),
        )?;
        Ok(lock)
    }

    #[must_use]
    pub fn project_id(&self) -> &str {
        self.state.project_id()
    }

    #[must_use]
    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut PipelineState {
        &mut self.state
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Effective configuration as `key -> (value, source)`.
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, String)> {
        self.config.effective_config()
    }

    #[must_use]
    pub fn snapshot(&self) -> PipelineSnapshot {
        self.state.snapshot(self.effective_config())
    }

    /// Persist the current state.
    pub fn save(&self) -> Result<(), StagehandError> {
        store::save(&self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagehand_stages::StageMetrics;
    use stagehand_utils::error::PipelineError;
    use stagehand_utils::paths::with_isolated_home;
    use stagehand_utils::types::StageId;

    const MANIFEST: &str = r#"
[project]
name = "ACME warehouse"

[[connections]]
name = "landing"
kind = "flat_file"

[[jobs]]
name = "m_load_orders"
tier = "low"
pattern = "Simple Load"
"#;

    fn manifest() -> ProjectManifest {
        ProjectManifest::parse(MANIFEST).unwrap()
    }

    #[test]
    fn test_create_open_and_persist() {
        let _home = with_isolated_home();
        let handle = ProjectHandle::create("acme-dw", &manifest(), Config::defaults()).unwrap();
        assert_eq!(handle.state().project_name(), "ACME warehouse");
        drop(handle);

        let mut handle = ProjectHandle::open("acme-dw", Config::defaults(), false).unwrap();
        handle
            .state_mut()
            .complete_current(StageMetrics::new())
            .unwrap();
        handle.state_mut().advance().unwrap();
        handle.save().unwrap();
        drop(handle);

        let handle = ProjectHandle::open_read_only("acme-dw", Config::defaults()).unwrap();
        assert_eq!(handle.state().current_stage(), StageId::Analysis);
        assert_eq!(handle.snapshot().project_id, "acme-dw");
    }

    #[test]
    fn test_create_twice_fails() {
        let _home = with_isolated_home();
        ProjectHandle::create("acme-dw", &manifest(), Config::defaults()).unwrap();
        let err = ProjectHandle::create("acme-dw", &manifest(), Config::defaults()).unwrap_err();
        assert!(matches!(
            err,
            StagehandError::Persistence(PersistenceError::ProjectExists { .. })
        ));
    }

    #[test]
    fn test_second_writer_is_locked_out() {
        let _home = with_isolated_home();
        let _first = ProjectHandle::create("acme-dw", &manifest(), Config::defaults()).unwrap();
        let err = ProjectHandle::open("acme-dw", Config::defaults(), false).unwrap_err();
        assert!(matches!(err, StagehandError::Lock(_)));

        // Readers are not blocked.
        ProjectHandle::open_read_only("acme-dw", Config::defaults()).unwrap();
    }

    #[test]
    fn test_failed_operation_leaves_file_untouched() {
        let _home = with_isolated_home();
        drop(ProjectHandle::create("acme-dw", &manifest(), Config::defaults()).unwrap());

        let mut handle = ProjectHandle::open("acme-dw", Config::defaults(), false).unwrap();
        let err = handle.state_mut().advance().unwrap_err();
        assert_eq!(
            err,
            PipelineError::PriorStageIncomplete {
                stage: StageId::Setup
            }
        );
        drop(handle);

        let handle = ProjectHandle::open_read_only("acme-dw", Config::defaults()).unwrap();
        assert_eq!(handle.state().current_stage(), StageId::Setup);
    }
}
