//! Stage gates for stagehand
//!
//! A gate answers whether a stage's preconditions hold right now. Stage
//! completion consults it on every attempt.

pub mod evaluator;
pub mod json;
pub mod types;

pub use evaluator::GateEvaluator;
pub use json::emit_gate_json;
pub use types::{GateCondition, GateInputs, GateResult, StageGate, ValidationCoverage};
