//! Canonical JSON emission (JCS, RFC 8785)
//!
//! Snapshots, gate results and the persisted state file are emitted in
//! canonical form so repeated runs produce byte-identical output and diffs
//! stay stable across platforms.

use anyhow::{Context, Result};
use serde::Serialize;

/// Emit any serializable value as canonical JSON using JCS (RFC 8785).
///
/// # Example
///
/// ```rust
/// use serde::Serialize;
/// use stagehand_utils::canonicalization::emit_jcs;
///
/// #[derive(Serialize)]
/// struct Out { b: u32, a: &'static str }
///
/// let json = emit_jcs(&Out { b: 1, a: "x" }).unwrap();
/// assert_eq!(json, r#"{"a":"x","b":1}"#);
/// ```
pub fn emit_jcs<T: Serialize>(value: &T) -> Result<String> {
    let json_value =
        serde_json::to_value(value).with_context(|| "Failed to serialize value to JSON")?;
    let json_bytes = serde_json_canonicalizer::to_vec(&json_value)
        .with_context(|| "Failed to canonicalize JSON using JCS")?;
    String::from_utf8(json_bytes).with_context(|| "JCS output contained invalid UTF-8")
}
