use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use stagehand_utils::types::ConfigSource;

use crate::model::{CliArgs, Config, TomlConfig};

const CONFIG_DIR: &str = ".stagehand";
const CONFIG_FILE: &str = "config.toml";

/// Keys that always carry attribution, even when left at their defaults.
const ATTRIBUTED_KEYS: &[&str] = &[
    "classifier.very_high",
    "classifier.high",
    "classifier.medium",
    "waves.optimization_ratio",
    "waves.hold_for_review",
    "connections.test_timeout_secs",
    "validation.min_pass_rate",
    "verbose",
    "lock_ttl_seconds",
];

impl Config {
    /// Discover and load configuration with precedence: CLI > file > defaults
    ///
    /// Uses the current working directory as the discovery start point.
    pub fn discover(cli_args: &CliArgs) -> Result<Self> {
        let start_dir = std::env::current_dir().context("Failed to get current directory")?;
        Self::discover_from(&start_dir, cli_args)
    }

    /// Discover and load configuration starting from a specific directory
    ///
    /// This is the path-driven variant used by tests to avoid process-global state.
    pub fn discover_from(start_dir: &Path, cli_args: &CliArgs) -> Result<Self> {
        let mut config = Self::defaults();

        let config_path = match &cli_args.config_path {
            Some(explicit) => {
                if !explicit.exists() {
                    return Err(stagehand_utils::error::ConfigError::NotFound {
                        path: explicit.display().to_string(),
                    }
                    .into());
                }
                Some(explicit.clone())
            }
            None => Self::discover_config_file_from(start_dir)?,
        };

        if let Some(path) = &config_path {
            let file_config = Self::load_config_file(path)
                .with_context(|| format!("Failed to load config file: {}", path.display()))?;
            config.apply_file(file_config);
            config.config_path = Some(path.clone());
        }

        config.apply_cli(cli_args);
        config.validate()?;
        Ok(config)
    }

    /// Built-in defaults with every attributed key marked `default`.
    #[must_use]
    pub fn defaults() -> Self {
        let source_attribution = ATTRIBUTED_KEYS
            .iter()
            .map(|key| ((*key).to_string(), ConfigSource::Default))
            .collect::<HashMap<_, _>>();

        Self {
            classifier: Default::default(),
            waves: Default::default(),
            connections: Default::default(),
            validation: Default::default(),
            defaults: Default::default(),
            config_path: None,
            source_attribution,
        }
    }

    fn apply_file(&mut self, file: TomlConfig) {
        let set = |attr: &mut HashMap<String, ConfigSource>, key: &str| {
            attr.insert(key.to_string(), ConfigSource::Config);
        };

        if let Some(classifier) = file.classifier {
            if let Some(v) = classifier.very_high {
                self.classifier.very_high = v;
                set(&mut self.source_attribution, "classifier.very_high");
            }
            if let Some(v) = classifier.high {
                self.classifier.high = v;
                set(&mut self.source_attribution, "classifier.high");
            }
            if let Some(v) = classifier.medium {
                self.classifier.medium = v;
                set(&mut self.source_attribution, "classifier.medium");
            }
        }

        if let Some(waves) = file.waves {
            if let Some(v) = waves.optimization_ratio {
                self.waves.optimization_ratio = v;
                set(&mut self.source_attribution, "waves.optimization_ratio");
            }
            if let Some(v) = waves.hold_for_review {
                self.waves.hold_for_review = v;
                set(&mut self.source_attribution, "waves.hold_for_review");
            }
        }

        if let Some(connections) = file.connections
            && let Some(v) = connections.test_timeout_secs
        {
            self.connections.test_timeout_secs = v;
            set(&mut self.source_attribution, "connections.test_timeout_secs");
        }

        if let Some(validation) = file.validation
            && validation.min_pass_rate.is_some()
        {
            self.validation.min_pass_rate = validation.min_pass_rate;
            set(&mut self.source_attribution, "validation.min_pass_rate");
        }

        if let Some(defaults) = file.defaults {
            if defaults.verbose.is_some() {
                self.defaults.verbose = defaults.verbose;
                set(&mut self.source_attribution, "verbose");
            }
            if defaults.lock_ttl_seconds.is_some() {
                self.defaults.lock_ttl_seconds = defaults.lock_ttl_seconds;
                set(&mut self.source_attribution, "lock_ttl_seconds");
            }
        }
    }

    fn apply_cli(&mut self, cli: &CliArgs) {
        let set = |attr: &mut HashMap<String, ConfigSource>, key: &str| {
            attr.insert(key.to_string(), ConfigSource::Cli);
        };

        if let Some(v) = cli.verbose {
            self.defaults.verbose = Some(v);
            set(&mut self.source_attribution, "verbose");
        }
        if let Some(v) = cli.optimization_ratio {
            self.waves.optimization_ratio = v;
            set(&mut self.source_attribution, "waves.optimization_ratio");
        }
        if let Some(v) = cli.hold_for_review {
            self.waves.hold_for_review = v;
            set(&mut self.source_attribution, "waves.hold_for_review");
        }
        if let Some(v) = cli.test_timeout_secs {
            self.connections.test_timeout_secs = v;
            set(&mut self.source_attribution, "connections.test_timeout_secs");
        }
        if let Some(v) = cli.min_pass_rate {
            self.validation.min_pass_rate = Some(v);
            set(&mut self.source_attribution, "validation.min_pass_rate");
        }
        if let Some(v) = cli.lock_ttl_seconds {
            self.defaults.lock_ttl_seconds = Some(v);
            set(&mut self.source_attribution, "lock_ttl_seconds");
        }
    }

    /// Search upward for `.stagehand/config.toml`.
    ///
    /// Stops at the filesystem root or at a repository root (`.git`, `.hg`,
    /// `.svn`). Falls back to `$STAGEHAND_HOME/config.toml` and then the user
    /// config directory.
    pub fn discover_config_file_from(start_dir: &Path) -> Result<Option<PathBuf>> {
        let mut current = Some(start_dir);

        while let Some(dir) = current {
            let candidate = dir.join(CONFIG_DIR).join(CONFIG_FILE);
            if candidate.is_file() {
                return Ok(Some(candidate));
            }
            if dir.join(".git").exists() || dir.join(".hg").exists() || dir.join(".svn").exists()
            {
                break;
            }
            current = dir.parent();
        }

        if let Ok(home) = std::env::var("STAGEHAND_HOME") {
            let candidate = PathBuf::from(home).join(CONFIG_FILE);
            if candidate.is_file() {
                return Ok(Some(candidate));
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let candidate = config_dir.join("stagehand").join(CONFIG_FILE);
            if candidate.is_file() {
                return Ok(Some(candidate));
            }
        }

        Ok(None)
    }

    fn load_config_file(path: &Path) -> Result<TomlConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: TomlConfig = toml::from_str(&content).map_err(|e| {
            stagehand_utils::error::ConfigError::InvalidFile(format!("{}: {e}", path.display()))
        })?;
        Ok(config)
    }
}
