//! Helpers shared by the mutating and JSON-emitting commands

use serde::Serialize;

use stagehand_config::Config;
use stagehand_engine::{PipelineState, ProjectHandle};
use stagehand_utils::canonicalization::emit_jcs;
use stagehand_utils::error::{PipelineError, StagehandError};

/// Open `project_id` for writing, apply `op` and save.
///
/// The state file is only rewritten when `op` succeeds.
pub fn with_project<T>(
    project_id: &str,
    config: Config,
    force: bool,
    op: impl FnOnce(&mut PipelineState) -> Result<T, PipelineError>,
) -> Result<(T, ProjectHandle), StagehandError> {
    let mut handle = ProjectHandle::open(project_id, config, force)?;
    let value = op(handle.state_mut())?;
    handle.save()?;
    Ok((value, handle))
}

/// Print `value` as canonical JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<(), StagehandError> {
    let json = emit_jcs(value).map_err(emit_failed)?;
    println!("{json}");
    Ok(())
}

/// Wrap a JSON emission failure.
pub fn emit_failed(err: anyhow::Error) -> StagehandError {
    StagehandError::Io(std::io::Error::other(format!(
        "Failed to emit JSON: {err:#}"
    )))
}
