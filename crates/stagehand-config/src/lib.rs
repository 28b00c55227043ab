//! Configuration management for stagehand
//!
//! Hierarchical configuration with discovery and precedence:
//! CLI > file > defaults. TOML files carry `[classifier]`, `[waves]`,
//! `[connections]`, `[validation]` and `[defaults]` sections.

mod discovery;
mod model;
mod sources;
mod validation;

pub use model::*;
pub use stagehand_utils::types::ConfigSource;

use stagehand_lock::DEFAULT_LOCK_TTL_SECS;

impl Config {
    /// Whether verbose logging was requested. Defaults to `false`.
    #[must_use]
    pub fn verbose(&self) -> bool {
        self.defaults.verbose.unwrap_or(false)
    }

    /// Age in seconds after which a project lock is treated as stale.
    #[must_use]
    pub fn lock_ttl_seconds(&self) -> u64 {
        self.defaults
            .lock_ttl_seconds
            .unwrap_or(DEFAULT_LOCK_TTL_SECS)
    }

    /// Connection test deadline as a `Duration`.
    #[must_use]
    pub fn test_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.connections.test_timeout_secs)
    }
}
