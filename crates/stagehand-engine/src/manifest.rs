//! Project manifests
//!
//! A manifest declares a migration project: its connections and the job
//! inventory, each job with its complexity tier and analysis metadata.
//!
//! ```toml
//! [project]
//! name = "ACME warehouse"
//!
//! [[connections]]
//! name = "ora_src"
//! kind = "oracle"
//!
//! [[connections]]
//! name = "landing"
//! kind = "flat_file"
//!
//! [[jobs]]
//! name = "m_load_orders"
//! tier = "low"
//! pattern = "Simple Load"
//!
//! [[jobs]]
//! name = "m_custom_java"
//! tier = "high"
//! pattern = "Java Transformation"
//! pattern_complexity = "high"
//! custom_code = true
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use stagehand_classifier::JobProfile;
use stagehand_utils::error::{PipelineError, StagehandError};
use stagehand_utils::types::{ComplexityTier, Connection, ConnectionKind};
use stagehand_waves::JobsByTier;

/// One job of the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryJob {
    pub name: String,
    pub tier: ComplexityTier,
    #[serde(flatten)]
    pub profile: JobProfile,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSpec {
    pub name: String,
    pub kind: ConnectionKind,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

/// Parsed project manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectManifest {
    #[serde(default)]
    pub project: ProjectInfo,
    #[serde(default)]
    pub connections: Vec<ConnectionSpec>,
    #[serde(default)]
    pub jobs: Vec<InventoryJob>,
}

impl ProjectManifest {
    /// Read and validate a manifest file.
    pub fn load(path: &Path) -> Result<Self, StagehandError> {
        let manifest_error = |reason: String| StagehandError::Manifest {
            path: path.display().to_string(),
            reason,
        };

        let content = std::fs::read_to_string(path).map_err(|e| manifest_error(e.to_string()))?;
        let manifest = Self::parse(&content).map_err(manifest_error)?;
        Ok(manifest)
    }

    /// Parse and validate manifest text. Errors are human-readable reasons.
    pub fn parse(content: &str) -> Result<Self, String> {
        let manifest: Self = toml::from_str(content).map_err(|e| e.to_string())?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for connection in &self.connections {
            if connection.name.trim().is_empty() {
                return Err("connection names may not be empty".to_string());
            }
            if !seen.insert(connection.name.as_str()) {
                return Err(PipelineError::DuplicateConnection {
                    name: connection.name.clone(),
                }
                .to_string());
            }
        }

        let mut seen = HashSet::new();
        for job in &self.jobs {
            if job.name.trim().is_empty() {
                return Err("job names may not be empty".to_string());
            }
            if !seen.insert(job.name.as_str()) {
                return Err(format!("job '{}' is declared more than once", job.name));
            }
        }
        Ok(())
    }

    /// Connections in declaration order, none tested yet.
    #[must_use]
    pub fn connections(&self) -> Vec<Connection> {
        self.connections
            .iter()
            .map(|c| Connection::new(c.name.clone(), c.kind, c.required))
            .collect()
    }
}

/// Group inventory job names by tier, preserving declaration order.
#[must_use]
pub fn jobs_by_tier(jobs: &[InventoryJob]) -> JobsByTier {
    let mut grouped = JobsByTier::new();
    for job in jobs {
        grouped.entry(job.tier).or_default().push(job.name.clone());
    }
    grouped
}
