//! Validate command implementation

use stagehand_config::Config;
use stagehand_utils::error::StagehandError;
use stagehand_utils::exit_codes::ExitCode;
use stagehand_utils::types::ValidationRecord;

use super::common::with_project;

/// Record a validation result. A later result for the same job replaces the earlier one.
pub fn execute_validate_command(
    project_id: &str,
    job: &str,
    passed: bool,
    detail: Option<String>,
    config: Config,
    force: bool,
) -> Result<ExitCode, StagehandError> {
    let record = ValidationRecord {
        job: job.to_string(),
        passed,
        detail,
    };
    let (coverage, _) = with_project(project_id, config, force, |state| {
        state.record_validation(record)?;
        Ok(state.validation_coverage())
    })?;

    let marker = if passed { "✓" } else { "✗" };
    println!("{marker} {job}: validation {}", if passed { "passed" } else { "failed" });
    println!(
        "  Validated {}/{} converted jobs ({} passed)",
        coverage.recorded, coverage.converted, coverage.passed
    );
    Ok(ExitCode::SUCCESS)
}
