//! Persisted project state
//!
//! Each project keeps one file, `<home>/projects/<id>/state.json`, holding
//! the full [`PipelineState`] as canonical JSON. Writes go through
//! [`write_file_atomic`] so a crash never leaves a half-written file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use stagehand_utils::atomic_write::write_file_atomic;
use stagehand_utils::canonicalization::emit_jcs;
use stagehand_utils::error::{PersistenceError, StagehandError};
use stagehand_utils::paths::{ensure_dir_all, project_root, state_path, validate_project_id};

use crate::state::PipelineState;

pub const STATE_SCHEMA_VERSION: &str = "1";

#[derive(Debug, Serialize, Deserialize)]
struct PersistedState {
    schema_version: String,
    saved_at: DateTime<Utc>,
    state: PipelineState,
}

#[derive(Serialize)]
struct PersistedStateRef<'a> {
    schema_version: &'a str,
    saved_at: DateTime<Utc>,
    state: &'a PipelineState,
}

/// Whether a state file exists for `project_id`.
#[must_use]
pub fn exists(project_id: &str) -> bool {
    state_path(project_id).is_file()
}

/// Write `state` to its project's state file.
pub fn save(state: &PipelineState) -> Result<(), StagehandError> {
    let project_id = state.project_id();
    validate_project_id(project_id)?;
    let path = state_path(project_id);
    let write_failed = |reason: String| PersistenceError::WriteFailed {
        path: path.to_string(),
        reason,
    };

    ensure_dir_all(project_root(project_id))?;
    let json = emit_jcs(&PersistedStateRef {
        schema_version: STATE_SCHEMA_VERSION,
        saved_at: Utc::now(),
        state,
    })
    .map_err(|e| write_failed(format!("{e:#}")))?;
    let written = write_file_atomic(&path, &json).map_err(|e| write_failed(format!("{e:#}")))?;

    debug!(
        project = %project_id,
        path = %path,
        bytes = written.bytes_written,
        cross_fs = written.used_cross_filesystem_fallback,
        "State saved"
    );
    Ok(())
}

/// Read the state file of `project_id`.
///
/// A file that parses but breaks the stage or wave invariants is reported
/// as [`PersistenceError::Corrupt`].
///
/// Runtime settings are not persisted; callers apply them with
/// [`PipelineState::set_settings`].
pub fn load(project_id: &str) -> Result<PipelineState, StagehandError> {
    validate_project_id(project_id)?;
    let path = state_path(project_id);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PersistenceError::ProjectNotFound {
                project: project_id.to_string(),
            }
            .into());
        }
        Err(e) => return Err(e.into()),
    };

    let corrupt = |reason: String| PersistenceError::Corrupt {
        path: path.to_string(),
        reason,
    };
    let persisted: PersistedState =
        serde_json::from_str(&content).map_err(|e| corrupt(e.to_string()))?;
    if persisted.schema_version != STATE_SCHEMA_VERSION {
        return Err(corrupt(format!(
            "unsupported schema version {}",
            persisted.schema_version
        ))
        .into());
    }
    if persisted.state.project_id() != project_id {
        return Err(corrupt(format!(
            "file belongs to project '{}'",
            persisted.state.project_id()
        ))
        .into());
    }
    persisted.state.validate().map_err(corrupt)?;
    Ok(persisted.state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::InventoryJob;
    use crate::state::PipelineSettings;
    use stagehand_classifier::JobProfile;
    use stagehand_stages::StageMetrics;
    use stagehand_utils::paths::with_isolated_home;
    use stagehand_utils::types::{ComplexityTier, Connection, ConnectionKind, ConnectionTestResult};

    fn state(id: &str) -> PipelineState {
        PipelineState::new(
            id,
            "ACME warehouse",
            vec![Connection::new("ora_src", ConnectionKind::Oracle, true)],
            vec![],
            PipelineSettings::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_save_then_load() {
        let _home = with_isolated_home();
        let mut original = state("acme-dw");
        original
            .record_connection_test("ora_src", ConnectionTestResult::failed("timeout"))
            .unwrap();

        assert!(!exists("acme-dw"));
        save(&original).unwrap();
        assert!(exists("acme-dw"));

        let loaded = load("acme-dw").unwrap();
        assert_eq!(loaded, original);

        let raw = std::fs::read_to_string(state_path("acme-dw")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["schema_version"], STATE_SCHEMA_VERSION);
        assert_eq!(value["state"]["connections"][0]["test_success"], false);
    }

    #[test]
    fn test_missing_project() {
        let _home = with_isolated_home();
        match load("ghost") {
            Err(StagehandError::Persistence(PersistenceError::ProjectNotFound { project })) => {
                assert_eq!(project, "ghost");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_corrupt_and_foreign_files() {
        let _home = with_isolated_home();
        ensure_dir_all(project_root("acme-dw")).unwrap();
        std::fs::write(state_path("acme-dw"), "{not json").unwrap();
        assert!(matches!(
            load("acme-dw"),
            Err(StagehandError::Persistence(PersistenceError::Corrupt { .. }))
        ));

        save(&state("other")).unwrap();
        std::fs::copy(state_path("other"), state_path("acme-dw")).unwrap();
        match load("acme-dw") {
            Err(StagehandError::Persistence(PersistenceError::Corrupt { reason, .. })) => {
                assert!(reason.contains("other"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    fn rewrite_state(project_id: &str, edit: impl FnOnce(&mut serde_json::Value)) {
        let path = state_path(project_id);
        let mut value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        edit(&mut value);
        std::fs::write(&path, serde_json::to_string(&value).unwrap()).unwrap();
    }

    #[test]
    fn test_truncated_stages_are_corrupt() {
        let _home = with_isolated_home();
        save(&state("acme-dw")).unwrap();
        rewrite_state("acme-dw", |value| {
            value["state"]["stages"]["stages"]
                .as_array_mut()
                .unwrap()
                .truncate(2);
        });

        match load("acme-dw") {
            Err(StagehandError::Persistence(PersistenceError::Corrupt { reason, .. })) => {
                assert!(reason.contains("every stage in order"), "{reason}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_damaged_waves_are_corrupt() {
        let _home = with_isolated_home();
        let mut original = PipelineState::new(
            "acme-dw",
            "ACME warehouse",
            vec![],
            vec![InventoryJob {
                name: "m_load_orders".to_string(),
                tier: ComplexityTier::Low,
                profile: JobProfile::new("Simple Load"),
            }],
            PipelineSettings::default(),
        )
        .unwrap();
        for _ in 0..3 {
            original.complete_current(StageMetrics::new()).unwrap();
            original.advance().unwrap();
        }
        assert!(original.waves().is_planned());
        save(&original).unwrap();
        assert_eq!(load("acme-dw").unwrap(), original);

        rewrite_state("acme-dw", |value| {
            value["state"]["waves"]["waves"][0]["converted_count"] = 1.into();
        });
        assert!(matches!(
            load("acme-dw"),
            Err(StagehandError::Persistence(PersistenceError::Corrupt { .. }))
        ));
    }

    #[test]
    fn test_invalid_project_id() {
        let _home = with_isolated_home();
        assert!(matches!(
            load("../escape"),
            Err(StagehandError::Persistence(PersistenceError::InvalidProjectId { .. }))
        ));
    }
}
