//! Gate command implementation
//!
//! Handles `stagehand gate`: evaluate a stage's preconditions without
//! changing anything.

use stagehand_config::Config;
use stagehand_engine::ProjectHandle;
use stagehand_gate::emit_gate_json;
use stagehand_utils::error::StagehandError;
use stagehand_utils::exit_codes::ExitCode;
use stagehand_utils::types::StageId;

use super::common::emit_failed;

/// Execute the gate command. Exits with `GATE_NOT_SATISFIED` when the gate fails.
pub fn execute_gate_command(
    project_id: &str,
    stage: Option<StageId>,
    json: bool,
    config: Config,
) -> Result<ExitCode, StagehandError> {
    let handle = ProjectHandle::open_read_only(project_id, config)?;
    let state = handle.state();
    let result = state.gate(stage.unwrap_or_else(|| state.current_stage()));

    if json {
        println!("{}", emit_gate_json(&result).map_err(emit_failed)?);
    } else {
        if result.passed {
            println!("✓ {}", result.summary);
        } else {
            println!("✗ {}", result.summary);
        }

        if !result.conditions.is_empty() {
            println!();
            println!("Conditions evaluated:");
        }
        for condition in &result.conditions {
            let status = if condition.passed { "✓" } else { "✗" };
            println!("  {} {}: {}", status, condition.name, condition.description);
            if let Some(actual) = &condition.actual {
                println!("      Actual: {actual}");
            }
            if let Some(expected) = &condition.expected {
                println!("      Expected: {expected}");
            }
        }

        if !result.failure_reasons.is_empty() {
            println!();
            println!("Failure reasons:");
            for reason in &result.failure_reasons {
                println!("  - {reason}");
            }
        }
    }

    if result.passed {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::GATE_NOT_SATISFIED)
    }
}
