//! Review command implementation
//!
//! Handles `stagehand review`: move a job one step through the manual
//! review wizard (review → implement → test → complete).

use stagehand_config::Config;
use stagehand_review::{StepOutcome, WizardStep};
use stagehand_utils::error::StagehandError;
use stagehand_utils::exit_codes::ExitCode;

use super::common::with_project;

pub fn execute_review_command(
    project_id: &str,
    job: &str,
    strict: bool,
    config: Config,
    force: bool,
) -> Result<ExitCode, StagehandError> {
    let outcome = if strict {
        let (step, _) = with_project(project_id, config, force, |state| {
            state.advance_review_strict(job)
        })?;
        step
    } else {
        let (outcome, _) =
            with_project(project_id, config, force, |state| state.advance_review(job))?;
        match outcome {
            StepOutcome::Advanced { to, .. } => to,
            StepOutcome::AlreadyComplete => {
                println!("  {job} has already completed manual review");
                return Ok(ExitCode::SUCCESS);
            }
        }
    };

    println!("✓ {job}: {outcome}");
    if outcome == WizardStep::Complete {
        println!("  Manual review complete");
    }
    Ok(ExitCode::SUCCESS)
}
