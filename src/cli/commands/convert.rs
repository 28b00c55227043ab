//! Convert command implementation
//!
//! Handles `stagehand convert`: record the outcome of converting one job.
//! The job's inventory profile is the starting point; flags override it.

use stagehand_classifier::PatternComplexity;
use stagehand_config::Config;
use stagehand_engine::ConversionOutcome;
use stagehand_utils::error::{PipelineError, StagehandError};
use stagehand_utils::exit_codes::ExitCode;

use super::common::{print_json, with_project};

/// What the converter reported for one job.
#[derive(Debug, Clone)]
pub struct ConvertRequest {
    pub job: String,
    pub score: f64,
    pub pattern: Option<String>,
    pub pattern_complexity: Option<PatternComplexity>,
    pub custom_code: bool,
    pub unsupported: Vec<String>,
    pub warnings: Vec<String>,
}

pub fn execute_convert_command(
    project_id: &str,
    request: ConvertRequest,
    json: bool,
    config: Config,
    force: bool,
) -> Result<ExitCode, StagehandError> {
    let (job, _) = with_project(project_id, config, force, |state| {
        let inventory = state
            .inventory_job(&request.job)
            .ok_or_else(|| PipelineError::UnknownJob {
                job: request.job.clone(),
            })?;

        let mut profile = inventory.profile.clone();
        if let Some(pattern) = request.pattern {
            profile.pattern = pattern;
        }
        if let Some(complexity) = request.pattern_complexity {
            profile.pattern_complexity = complexity;
        }
        profile.custom_code |= request.custom_code;
        for construct in request.unsupported {
            if !profile.unsupported_constructs.contains(&construct) {
                profile.unsupported_constructs.push(construct);
            }
        }

        let outcome = ConversionOutcome::new(request.job, request.score, profile)
            .with_warnings(request.warnings);
        state.record_conversion(outcome)
    })?;

    if json {
        print_json(&job)?;
        return Ok(ExitCode::SUCCESS);
    }

    println!(
        "✓ {} converted in wave {}: {:.1} ({}, {})",
        job.name, job.wave, job.confidence_score, job.confidence_level, job.conversion_method
    );
    for warning in &job.warnings {
        println!("  Warning: {warning}");
    }
    if let Some(reason) = &job.review_reason {
        println!("  Needs manual review: {reason}");
        println!("  Next: stagehand review {project_id} {}", job.name);
    }
    Ok(ExitCode::SUCCESS)
}
