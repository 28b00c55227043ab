//! Exit code constants for the stagehand CLI.
//!
//! # Exit Code Table
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Operation completed successfully |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `CLI_ARGS` | Invalid CLI arguments, configuration or project id |
//! | 3 | `GATE_NOT_SATISFIED` | Stage preconditions are unmet |
//! | 4 | `INVALID_TRANSITION` | Stage or wave ordering misuse |
//! | 5 | `REVIEW_QUEUE` | Manual review queue misuse |
//! | 6 | `INVALID_INPUT` | Invalid score, manifest or empty job set |
//! | 9 | `LOCK_HELD` | Another process holds the project lock |

/// Exit codes matching the documented exit code table.
///
/// The numeric values are part of the public contract; scripts branch on
/// them (for example, CI can treat `GATE_NOT_SATISFIED` as "not yet").
///
/// # Example
///
/// ```rust
/// use stagehand_utils::exit_codes::ExitCode;
///
/// assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
/// assert_eq!(ExitCode::from_i32(3), ExitCode::GATE_NOT_SATISFIED);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Success - operation completed successfully
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Internal error - general failure
    pub const INTERNAL: ExitCode = ExitCode(1);

    /// CLI arguments error - invalid arguments, configuration or project id
    pub const CLI_ARGS: ExitCode = ExitCode(2);

    /// Gate not satisfied - a stage cannot complete until its preconditions hold
    pub const GATE_NOT_SATISFIED: ExitCode = ExitCode(3);

    /// Invalid transition - progress went backward, or stages were advanced out of order
    pub const INVALID_TRANSITION: ExitCode = ExitCode(4);

    /// Review queue misuse - unknown, duplicate or already-complete review job
    pub const REVIEW_QUEUE: ExitCode = ExitCode(5);

    /// Invalid input - bad confidence score, empty job set or malformed manifest
    pub const INVALID_INPUT: ExitCode = ExitCode(6);

    /// Lock held - another process is already modifying the same project
    pub const LOCK_HELD: ExitCode = ExitCode(9);

    /// Get the numeric exit code value.
    ///
    /// Use this with `std::process::exit()`.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Create an ExitCode from a raw i32 value.
    ///
    /// Prefer using the named constants when possible.
    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<i32> for ExitCode {
    fn from(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
