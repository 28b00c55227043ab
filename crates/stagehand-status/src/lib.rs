//! Status output for stagehand
//!
//! Builds [`PipelineSnapshot`]s from live pipeline parts, computes the
//! [`ProjectSummary`] roll-up and renders both as canonical JSON or text.

pub mod snapshot;
pub mod summary;
pub mod text;

pub use snapshot::{
    ConfigValue, PipelineSnapshot, SNAPSHOT_SCHEMA_VERSION, SnapshotInput, emit_snapshot_json,
};
pub use summary::ProjectSummary;
pub use text::{render_report, render_status};
