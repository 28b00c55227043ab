//! Connection test command
//!
//! Handles `stagehand test-connection`: record a result posted by whatever
//! tool actually probed the connection.

use stagehand_config::Config;
use stagehand_utils::error::{PipelineError, StagehandError};
use stagehand_utils::exit_codes::ExitCode;
use stagehand_utils::types::ConnectionTestResult;

use super::common::with_project;

pub fn execute_test_connection_command(
    project_id: &str,
    name: &str,
    passed: bool,
    message: Option<String>,
    config: Config,
    force: bool,
) -> Result<ExitCode, StagehandError> {
    let result = ConnectionTestResult {
        success: passed,
        message,
    };
    let (connection, _) = with_project(project_id, config, force, |state| {
        state.record_connection_test(name, result)?;
        state
            .connections()
            .iter()
            .find(|c| c.name == name)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownConnection {
                name: name.to_string(),
            })
    })?;

    let marker = if connection.test_success { "✓" } else { "✗" };
    println!(
        "{marker} {} ({}): {}",
        connection.name,
        connection.kind,
        if connection.test_success { "passed" } else { "failed" }
    );
    if let Some(message) = &connection.test_message {
        println!("  {message}");
    }
    if connection.required && !connection.is_ready() {
        println!("  Required connection is not ready; analysis stays blocked");
    }
    Ok(ExitCode::SUCCESS)
}
