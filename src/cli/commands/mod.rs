//! CLI command implementations.
//!
//! Each handler returns the exit code to use on success paths (the gate
//! command reports an unsatisfied gate through its code, not an error).

mod common;
mod connection;
mod convert;
mod gate;
mod init;
mod review;
mod stage;
mod status;
mod validate;

pub use connection::execute_test_connection_command;
pub use convert::{ConvertRequest, execute_convert_command};
pub use gate::execute_gate_command;
pub use init::execute_init_command;
pub use review::execute_review_command;
pub use stage::{execute_advance_command, execute_complete_command, execute_progress_command};
pub use status::{execute_report_command, execute_status_command};
pub use validate::execute_validate_command;
