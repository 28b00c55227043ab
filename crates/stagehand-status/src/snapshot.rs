//! Pipeline snapshots
//!
//! A snapshot is the read-only view of a project that the presentation
//! layer consumes: every stage, wave, job, manual review, connection and
//! validation record, plus the summary numbers. Snapshots are emitted as
//! canonical JSON (JCS, RFC 8785) for stable diffs across runs.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use stagehand_classifier::ClassifiedJob;
use stagehand_review::{ManualReviewJob, ReviewQueue};
use stagehand_stages::{Stage, StageRegistry};
use stagehand_utils::canonicalization::emit_jcs;
use stagehand_utils::types::{Connection, StageId, ValidationRecord};
use stagehand_waves::{Wave, WaveScheduler};

use crate::summary::ProjectSummary;

pub const SNAPSHOT_SCHEMA_VERSION: &str = "1";

/// Configuration value with its source (`cli`, `config` or `default`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigValue {
    pub value: String,
    pub source: String,
}

/// Full read-only view of one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub schema_version: String,
    pub project_id: String,
    pub project_name: String,
    pub emitted_at: DateTime<Utc>,
    pub current_stage: StageId,
    pub overall_progress: u8,
    pub stages: Vec<Stage>,
    pub conversion_progress: u8,
    pub waves: Vec<Wave>,
    pub jobs: Vec<ClassifiedJob>,
    pub manual_reviews: Vec<ManualReviewJob>,
    pub connections: Vec<Connection>,
    pub validation: Vec<ValidationRecord>,
    pub summary: ProjectSummary,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub effective_config: BTreeMap<String, ConfigValue>,
}

/// Borrowed pipeline parts a snapshot is built from.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotInput<'a> {
    pub project_id: &'a str,
    pub project_name: &'a str,
    pub total_jobs: u64,
    pub stages: &'a StageRegistry,
    pub waves: &'a WaveScheduler,
    pub jobs: &'a [ClassifiedJob],
    pub reviews: &'a ReviewQueue,
    pub connections: &'a [Connection],
    pub validation: &'a [ValidationRecord],
}

impl PipelineSnapshot {
    /// Build a snapshot. `effective_config` maps key to `(value, source)`.
    #[must_use]
    pub fn build(
        input: SnapshotInput<'_>,
        effective_config: BTreeMap<String, (String, String)>,
    ) -> Self {
        let effective_config = effective_config
            .into_iter()
            .map(|(key, (value, source))| (key, ConfigValue { value, source }))
            .collect();

        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION.to_string(),
            project_id: input.project_id.to_string(),
            project_name: input.project_name.to_string(),
            emitted_at: Utc::now(),
            current_stage: input.stages.current_stage(),
            overall_progress: input.stages.overall_progress(),
            stages: input.stages.stages().to_vec(),
            conversion_progress: input.waves.progress(),
            waves: input.waves.waves().to_vec(),
            jobs: input.jobs.to_vec(),
            manual_reviews: input.reviews.jobs().to_vec(),
            connections: input.connections.to_vec(),
            validation: input.validation.to_vec(),
            summary: ProjectSummary::compute(
                input.total_jobs,
                input.jobs,
                input.reviews,
                input.validation,
            ),
            effective_config,
        }
    }
}

/// Emit a snapshot as canonical JSON using JCS (RFC 8785)
pub fn emit_snapshot_json(snapshot: &PipelineSnapshot) -> Result<String> {
    emit_jcs(snapshot).context("Failed to emit snapshot JSON")
}
