//! Init command implementation
//!
//! Handles `stagehand init`: create a project from a manifest.

use std::path::Path;

use stagehand_config::Config;
use stagehand_engine::{ProjectHandle, ProjectManifest};
use stagehand_utils::error::StagehandError;
use stagehand_utils::exit_codes::ExitCode;

pub fn execute_init_command(
    project_id: &str,
    manifest_path: &Path,
    config: Config,
) -> Result<ExitCode, StagehandError> {
    let manifest = ProjectManifest::load(manifest_path)?;
    let handle = ProjectHandle::create(project_id, &manifest, config)?;
    let state = handle.state();

    println!(
        "✓ Created project '{}' ({})",
        state.project_id(),
        state.project_name()
    );
    println!("  Connections: {}", state.connections().len());
    println!("  Jobs: {}", state.inventory().len());
    println!("  Current stage: {}", state.current_stage());
    Ok(ExitCode::SUCCESS)
}
