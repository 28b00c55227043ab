//! Status and report commands
//!
//! Both are read-only: they never take the project lock.

use stagehand_config::Config;
use stagehand_engine::ProjectHandle;
use stagehand_status::{emit_snapshot_json, render_report, render_status};
use stagehand_utils::error::StagehandError;
use stagehand_utils::exit_codes::ExitCode;

use super::common::{emit_failed, print_json};

/// Execute `stagehand status`.
pub fn execute_status_command(
    project_id: &str,
    json: bool,
    config: Config,
) -> Result<ExitCode, StagehandError> {
    let handle = ProjectHandle::open_read_only(project_id, config)?;
    let snapshot = handle.snapshot();
    if json {
        println!("{}", emit_snapshot_json(&snapshot).map_err(emit_failed)?);
    } else {
        print!("{}", render_status(&snapshot));
    }
    Ok(ExitCode::SUCCESS)
}

/// Execute `stagehand report`. JSON output is the project summary alone.
pub fn execute_report_command(
    project_id: &str,
    json: bool,
    config: Config,
) -> Result<ExitCode, StagehandError> {
    let handle = ProjectHandle::open_read_only(project_id, config)?;
    if json {
        print_json(&handle.state().summary())?;
    } else {
        print!("{}", render_report(&handle.snapshot()));
    }
    Ok(ExitCode::SUCCESS)
}
