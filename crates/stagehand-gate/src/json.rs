//! JSON emission for gate results

use anyhow::Context;
use stagehand_utils::canonicalization::emit_jcs;

use crate::types::GateResult;

/// Emit gate result as canonical JSON using JCS (RFC 8785)
pub fn emit_gate_json(result: &GateResult) -> anyhow::Result<String> {
    emit_jcs(result).context("Failed to emit gate JSON")
}
