use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::{EnumIter, IntoEnumIterator};

/// Stage identifiers for the migration pipeline.
///
/// Stages form a fixed total order with no cycles:
///
/// ```text
/// Setup → Analysis → Discovery → Conversion → Validation → Completion
/// ```
///
/// A stage may only start once the stage before it has completed.
///
/// # Example
///
/// ```rust
/// use stagehand_utils::types::StageId;
///
/// assert_eq!(StageId::Setup.next(), Some(StageId::Analysis));
/// assert_eq!(StageId::Completion.next(), None);
/// assert_eq!(StageId::Conversion.as_str(), "conversion");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, EnumIter,
)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    /// Project setup: inventory and connections are registered.
    Setup,
    /// Connection testing and source analysis.
    Analysis,
    /// Job discovery and complexity tiering.
    Discovery,
    /// Wave-by-wave job conversion plus manual review.
    Conversion,
    /// Converted jobs are validated against their sources.
    Validation,
    /// Terminal stage: the migration is signed off.
    Completion,
}

impl StageId {
    /// Canonical lowercase name used in state files, reports and the CLI.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Analysis => "analysis",
            Self::Discovery => "discovery",
            Self::Conversion => "conversion",
            Self::Validation => "validation",
            Self::Completion => "completion",
        }
    }

    /// Human-readable title for status output.
    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::Setup => "Project Setup",
            Self::Analysis => "Source Analysis",
            Self::Discovery => "Job Discovery",
            Self::Conversion => "Conversion",
            Self::Validation => "Validation",
            Self::Completion => "Completion",
        }
    }

    /// The stage immediately after this one, if any.
    #[must_use]
    pub fn next(&self) -> Option<Self> {
        Self::iter().skip_while(|s| s != self).nth(1)
    }

    /// The stage immediately before this one, if any.
    #[must_use]
    pub fn previous(&self) -> Option<Self> {
        Self::iter().take_while(|s| s != self).last()
    }

    /// Zero-based position in the pipeline order.
    #[must_use]
    pub fn ordinal(&self) -> usize {
        Self::iter().position(|s| s == *self).unwrap_or(0)
    }

    #[must_use]
    pub fn first() -> Self {
        Self::Setup
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.next().is_none()
    }

    /// All stages in pipeline order.
    pub fn all() -> impl Iterator<Item = StageId> {
        Self::iter()
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Self::iter().find(|stage| stage.as_str() == lowered).ok_or_else(|| {
            let valid: Vec<&str> = Self::iter().map(|stage| stage.as_str()).collect();
            format!("Unknown stage '{s}'. Valid stages: {}", valid.join(", "))
        })
    }
}

/// Lifecycle status of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    InProgress,
    Completed,
}

impl StageStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Complexity tier used to batch jobs into waves.
///
/// Ordering matters: waves are processed from `Low` to `High`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, EnumIter,
)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityTier {
    Low,
    Medium,
    High,
}

impl ComplexityTier {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Informational automation-rate target (percent) for waves of this tier.
    #[must_use]
    pub const fn automation_rate_target(&self) -> u8 {
        match self {
            Self::Low => 95,
            Self::Medium => 85,
            Self::High => 70,
        }
    }

    /// Tiers in processing order.
    pub fn all() -> impl Iterator<Item = ComplexityTier> {
        Self::iter()
    }
}

impl fmt::Display for ComplexityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplexityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(format!(
                "Unknown complexity tier '{s}'. Valid tiers: low, medium, high"
            )),
        }
    }
}

/// Kinds of source/target connections a migration project can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    Oracle,
    SqlServer,
    Postgresql,
    Mysql,
    Snowflake,
    Teradata,
    Salesforce,
    /// Flat files have nothing to dial and are exempt from testing.
    FlatFile,
}

impl ConnectionKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Oracle => "oracle",
            Self::SqlServer => "sql_server",
            Self::Postgresql => "postgresql",
            Self::Mysql => "mysql",
            Self::Snowflake => "snowflake",
            Self::Teradata => "teradata",
            Self::Salesforce => "salesforce",
            Self::FlatFile => "flat_file",
        }
    }

    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Oracle => "Oracle",
            Self::SqlServer => "SQL Server",
            Self::Postgresql => "PostgreSQL",
            Self::Mysql => "MySQL",
            Self::Snowflake => "Snowflake",
            Self::Teradata => "Teradata",
            Self::Salesforce => "Salesforce",
            Self::FlatFile => "Flat File",
        }
    }

    /// Whether a connection of this kind must be tested before it counts as ready.
    #[must_use]
    pub const fn requires_test(&self) -> bool {
        !matches!(self, Self::FlatFile)
    }
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Result posted by the external connection tester.
///
/// Failures are data: a failed test keeps the connection blocking rather
/// than unwinding anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTestResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ConnectionTestResult {
    #[must_use]
    pub fn passed(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

/// A declared source or target connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub name: String,
    pub kind: ConnectionKind,
    /// Required connections block analysis until they are ready.
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub tested: bool,
    #[serde(default)]
    pub test_success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_message: Option<String>,
}

fn default_required() -> bool {
    true
}

impl Connection {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ConnectionKind, required: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            required,
            tested: false,
            test_success: false,
            test_message: None,
        }
    }

    /// True when the connection no longer blocks stage advancement.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        !self.kind.requires_test() || (self.tested && self.test_success)
    }

    /// Record a tester result. Later results replace earlier ones.
    pub fn record_test(&mut self, result: ConnectionTestResult) {
        self.tested = true;
        self.test_success = result.success;
        self.test_message = result.message;
    }
}

/// Outcome of validating one converted job against its source.
///
/// One record per job; a later record for the same job replaces the earlier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub job: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Source of a configuration value, for status attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Cli,
    Config,
    Default,
}

impl ConfigSource {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cli => "cli",
            Self::Config => "config",
            Self::Default => "default",
        }
    }
}
