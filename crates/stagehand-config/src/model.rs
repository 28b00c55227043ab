use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use stagehand_utils::types::ConfigSource;

/// Default confidence thresholds (inclusive lower bounds, percent).
pub const DEFAULT_VERY_HIGH_THRESHOLD: f64 = 90.0;
pub const DEFAULT_HIGH_THRESHOLD: f64 = 75.0;
pub const DEFAULT_MEDIUM_THRESHOLD: f64 = 60.0;

/// Default share of converted jobs that also count as optimized.
pub const DEFAULT_OPTIMIZATION_RATIO: f64 = 0.6;

/// Default deadline for a single connection test, in seconds.
pub const DEFAULT_TEST_TIMEOUT_SECS: u64 = 30;

/// Configuration for stagehand operations.
///
/// `Config` provides hierarchical configuration with discovery and precedence:
/// CLI arguments > config file > built-in defaults.
///
/// # Discovery
///
/// [`Config::discover()`] searches for `.stagehand/config.toml` upward from
/// the current directory (stopping at a repository root), then falls back to
/// `$STAGEHAND_HOME/config.toml`, then to `<config dir>/stagehand/config.toml`.
///
/// # Configuration File Format
///
/// ```toml
/// [classifier]
/// very_high = 90.0
/// high = 75.0
/// medium = 60.0
///
/// [waves]
/// optimization_ratio = 0.6
/// hold_for_review = false
///
/// [connections]
/// test_timeout_secs = 30
///
/// [validation]
/// min_pass_rate = 95.0
///
/// [defaults]
/// verbose = false
/// lock_ttl_seconds = 900
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub classifier: ClassifierConfig,
    pub waves: WavesConfig,
    pub connections: ConnectionsConfig,
    pub validation: ValidationConfig,
    pub defaults: Defaults,
    /// Config file that was loaded, if any.
    pub config_path: Option<PathBuf>,
    /// Source attribution for each setting (for status display).
    pub source_attribution: HashMap<String, ConfigSource>,
}

/// Confidence thresholds used by the job classifier.
///
/// Each value is the inclusive lower bound of its level; scores below
/// `medium` are LOW.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ClassifierConfig {
    pub very_high: f64,
    pub high: f64,
    pub medium: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            very_high: DEFAULT_VERY_HIGH_THRESHOLD,
            high: DEFAULT_HIGH_THRESHOLD,
            medium: DEFAULT_MEDIUM_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct WavesConfig {
    /// optimized = floor(converted * ratio)
    pub optimization_ratio: f64,
    /// Keep a wave converting until its flagged jobs finish manual review.
    pub hold_for_review: bool,
}

impl Default for WavesConfig {
    fn default() -> Self {
        Self {
            optimization_ratio: DEFAULT_OPTIMIZATION_RATIO,
            hold_for_review: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConnectionsConfig {
    pub test_timeout_secs: u64,
}

impl Default for ConnectionsConfig {
    fn default() -> Self {
        Self {
            test_timeout_secs: DEFAULT_TEST_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct ValidationConfig {
    /// Minimum validation pass rate (percent) for the validation gate.
    /// `None` only requires every converted job to have a result.
    pub min_pass_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    pub verbose: Option<bool>,
    pub lock_ttl_seconds: Option<u64>,
}

/// CLI overrides applied on top of file and default values.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// Explicit config file; disables discovery.
    pub config_path: Option<PathBuf>,
    pub verbose: Option<bool>,
    pub optimization_ratio: Option<f64>,
    pub hold_for_review: Option<bool>,
    pub test_timeout_secs: Option<u64>,
    pub min_pass_rate: Option<f64>,
    pub lock_ttl_seconds: Option<u64>,
}

/// Partial TOML structure: every field optional so absent keys keep defaults.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TomlConfig {
    pub classifier: Option<TomlClassifier>,
    pub waves: Option<TomlWaves>,
    pub connections: Option<TomlConnections>,
    pub validation: Option<ValidationConfig>,
    pub defaults: Option<Defaults>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TomlClassifier {
    pub very_high: Option<f64>,
    pub high: Option<f64>,
    pub medium: Option<f64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TomlWaves {
    pub optimization_ratio: Option<f64>,
    pub hold_for_review: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TomlConnections {
    pub test_timeout_secs: Option<u64>,
}
