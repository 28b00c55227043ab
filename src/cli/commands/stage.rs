//! Stage commands: progress, complete and advance

use stagehand_config::Config;
use stagehand_stages::{Completion, StageMetrics};
use stagehand_utils::error::StagehandError;
use stagehand_utils::exit_codes::ExitCode;
use stagehand_utils::types::StageId;

use super::common::with_project;

/// Execute `stagehand progress`.
pub fn execute_progress_command(
    project_id: &str,
    percent: u8,
    message: &str,
    config: Config,
    force: bool,
) -> Result<ExitCode, StagehandError> {
    let (stage, _) = with_project(project_id, config, force, |state| {
        let stage = state.current_stage();
        state.update_progress(stage, percent, message)?;
        Ok(stage)
    })?;
    println!("✓ {}: {percent}%", stage.title());
    Ok(ExitCode::SUCCESS)
}

/// Execute `stagehand complete`.
pub fn execute_complete_command(
    project_id: &str,
    metrics: Vec<(String, serde_json::Value)>,
    config: Config,
    force: bool,
) -> Result<ExitCode, StagehandError> {
    let extra: StageMetrics = metrics.into_iter().collect();
    let ((stage, completion), _) = with_project(project_id, config, force, |state| {
        let stage = state.current_stage();
        Ok((stage, state.complete_current(extra)?))
    })?;
    match completion {
        Completion::Completed => println!("✓ Completed {}", stage.title()),
        Completion::AlreadyCompleted => println!("  {} was already completed", stage.title()),
    }
    if let Some(next) = stage.next() {
        println!("  Next: stagehand advance {project_id} (starts {})", next.title());
    }
    Ok(ExitCode::SUCCESS)
}

/// Execute `stagehand advance`.
pub fn execute_advance_command(
    project_id: &str,
    config: Config,
    force: bool,
) -> Result<ExitCode, StagehandError> {
    let (next, handle) = with_project(project_id, config, force, |state| state.advance())?;
    println!("✓ Started {}", next.title());

    if next == StageId::Conversion {
        let waves = handle.state().waves();
        println!("  Planned {} waves for {} jobs:", waves.waves().len(), waves.total_jobs());
        for wave in waves.waves() {
            println!(
                "    Wave {} ({}): {} jobs, target {}% automation",
                wave.id(),
                wave.tier(),
                wave.job_count(),
                wave.automation_rate_target()
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}
