use stagehand_utils::error::ConfigError;

use super::Config;

fn invalid(key: &str, value: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.into(),
    }
}

impl Config {
    /// Validate configuration values
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.classifier;
        for (key, value) in [
            ("classifier.very_high", c.very_high),
            ("classifier.high", c.high),
            ("classifier.medium", c.medium),
        ] {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return Err(invalid(key, format!("{value} is outside 0..=100")));
            }
        }
        if !(c.medium < c.high && c.high < c.very_high) {
            return Err(invalid(
                "classifier",
                format!(
                    "thresholds must be strictly increasing (medium {} < high {} < very_high {})",
                    c.medium, c.high, c.very_high
                ),
            ));
        }

        let ratio = self.waves.optimization_ratio;
        if !ratio.is_finite() || !(0.0..=1.0).contains(&ratio) {
            return Err(invalid(
                "waves.optimization_ratio",
                format!("{ratio} is outside 0.0..=1.0"),
            ));
        }

        if self.connections.test_timeout_secs == 0 {
            return Err(invalid(
                "connections.test_timeout_secs",
                "must be greater than 0",
            ));
        }
        if self.connections.test_timeout_secs > 3600 {
            return Err(invalid(
                "connections.test_timeout_secs",
                "exceeds maximum limit of 3600 seconds (1 hour)",
            ));
        }

        if let Some(rate) = self.validation.min_pass_rate
            && (!rate.is_finite() || !(0.0..=100.0).contains(&rate))
        {
            return Err(invalid(
                "validation.min_pass_rate",
                format!("{rate} is outside 0..=100"),
            ));
        }

        if let Some(lock_ttl) = self.defaults.lock_ttl_seconds {
            if lock_ttl < 60 {
                return Err(invalid(
                    "lock_ttl_seconds",
                    "must be at least 60 seconds (1 minute)",
                ));
            }
            if lock_ttl > 86400 {
                return Err(invalid(
                    "lock_ttl_seconds",
                    "exceeds maximum limit of 86400 seconds (24 hours)",
                ));
            }
        }

        Ok(())
    }
}
