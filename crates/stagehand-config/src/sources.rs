use std::collections::BTreeMap;

use stagehand_utils::types::ConfigSource;

use super::Config;

fn source_label(source: Option<&ConfigSource>) -> String {
    source.unwrap_or(&ConfigSource::Default).as_str().to_string()
}

impl Config {
    /// Effective configuration as `key -> (value, source)` pairs.
    ///
    /// Keys are sorted so `stagehand status --config` output is stable.
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, String)> {
        let mut config = BTreeMap::new();

        let mut add = |key: &str, value: String| {
            let source = source_label(self.source_attribution.get(key));
            config.insert(key.to_string(), (value, source));
        };

        add("classifier.very_high", self.classifier.very_high.to_string());
        add("classifier.high", self.classifier.high.to_string());
        add("classifier.medium", self.classifier.medium.to_string());
        add(
            "waves.optimization_ratio",
            self.waves.optimization_ratio.to_string(),
        );
        add(
            "waves.hold_for_review",
            self.waves.hold_for_review.to_string(),
        );
        add(
            "connections.test_timeout_secs",
            self.connections.test_timeout_secs.to_string(),
        );
        if let Some(rate) = self.validation.min_pass_rate {
            add("validation.min_pass_rate", rate.to_string());
        }
        if let Some(verbose) = self.defaults.verbose {
            add("verbose", verbose.to_string());
        }
        add("lock_ttl_seconds", self.lock_ttl_seconds().to_string());

        config
    }
}
