//! Confidence scoring
//!
//! A conversion engine reports a raw confidence score in `[0, 100]`. The
//! classifier maps it onto a discrete level using inclusive lower bounds and
//! attaches the badge tier the presentation layer renders.

use serde::{Deserialize, Serialize};
use std::fmt;
use strum::EnumIter;

use stagehand_utils::error::PipelineError;

/// Discrete confidence level derived from a raw score.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ConfidenceLevel {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::VeryHigh => "VERY_HIGH",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }

    /// Badge tier used when rendering this level.
    #[must_use]
    pub const fn badge(&self) -> BadgeTier {
        match self {
            Self::VeryHigh => BadgeTier::Success,
            Self::High => BadgeTier::Info,
            Self::Medium => BadgeTier::Warning,
            Self::Low => BadgeTier::Danger,
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visual severity tier for a confidence badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeTier {
    Success,
    Info,
    Warning,
    Danger,
}

impl BadgeTier {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Danger => "danger",
        }
    }
}

impl fmt::Display for BadgeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying one raw score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub score: f64,
    pub level: ConfidenceLevel,
    pub badge: BadgeTier,
}

/// Inclusive lower bounds for each confidence level.
///
/// Scores below `medium` are [`ConfidenceLevel::Low`]. Construct through
/// [`ConfidenceThresholds::new`] to guarantee the bounds are increasing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceThresholds {
    very_high: f64,
    high: f64,
    medium: f64,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            very_high: 90.0,
            high: 75.0,
            medium: 60.0,
        }
    }
}

impl ConfidenceThresholds {
    /// Build thresholds, returning `None` unless
    /// `0 <= medium < high < very_high <= 100`.
    #[must_use]
    pub fn new(very_high: f64, high: f64, medium: f64) -> Option<Self> {
        let in_range = |v: f64| v.is_finite() && (0.0..=100.0).contains(&v);
        if in_range(very_high) && in_range(high) && in_range(medium) && medium < high && high < very_high
        {
            Some(Self {
                very_high,
                high,
                medium,
            })
        } else {
            None
        }
    }

    #[must_use]
    pub fn very_high(&self) -> f64 {
        self.very_high
    }

    #[must_use]
    pub fn high(&self) -> f64 {
        self.high
    }

    #[must_use]
    pub fn medium(&self) -> f64 {
        self.medium
    }

    /// Classify a raw score.
    ///
    /// # Errors
    ///
    /// [`PipelineError::ScoreOutOfRange`] when the score is NaN or outside
    /// `[0, 100]`.
    pub fn classify(&self, score: f64) -> Result<Classification, PipelineError> {
        if !score.is_finite() || !(0.0..=100.0).contains(&score) {
            return Err(PipelineError::ScoreOutOfRange { score });
        }

        let level = if score >= self.very_high {
            ConfidenceLevel::VeryHigh
        } else if score >= self.high {
            ConfidenceLevel::High
        } else if score >= self.medium {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        };

        Ok(Classification {
            score,
            level,
            badge: level.badge(),
        })
    }
}

/// Classify a score with the default thresholds (90 / 75 / 60).
///
/// ```rust
/// use stagehand_classifier::{classify, BadgeTier, ConfidenceLevel};
///
/// let c = classify(98.5).unwrap();
/// assert_eq!(c.level, ConfidenceLevel::VeryHigh);
/// assert_eq!(c.badge, BadgeTier::Success);
/// assert!(classify(150.0).is_err());
/// ```
pub fn classify(score: f64) -> Result<Classification, PipelineError> {
    ConfidenceThresholds::default().classify(score)
}
