use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use stagehand_utils::error::PipelineError;
use stagehand_utils::types::ComplexityTier;

use crate::confidence::{BadgeTier, ConfidenceLevel, ConfidenceThresholds};
use crate::method::{ConversionMethod, JobProfile, assign_method};

/// A converted job. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedJob {
    pub name: String,
    /// Wave that converted the job (1-based).
    pub wave: u32,
    pub tier: ComplexityTier,
    pub pattern: String,
    pub confidence_score: f64,
    pub confidence_level: ConfidenceLevel,
    pub badge: BadgeTier,
    pub conversion_method: ConversionMethod,
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Why the job needs manual review, for Attention Required jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_reason: Option<String>,
}

impl ClassifiedJob {
    #[must_use]
    pub fn needs_review(&self) -> bool {
        self.conversion_method.needs_review()
    }
}

/// Conversion facts for one job, before classification.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome<'a> {
    pub name: &'a str,
    pub wave: u32,
    pub tier: ComplexityTier,
    pub confidence_score: f64,
    pub profile: &'a JobProfile,
    pub warnings: &'a [String],
}

/// Classifies conversion outcomes into job records.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobClassifier {
    thresholds: ConfidenceThresholds,
}

impl JobClassifier {
    #[must_use]
    pub fn new(thresholds: ConfidenceThresholds) -> Self {
        Self { thresholds }
    }

    #[must_use]
    pub fn thresholds(&self) -> &ConfidenceThresholds {
        &self.thresholds
    }

    /// Score and route one converted job.
    ///
    /// # Errors
    ///
    /// [`PipelineError::ScoreOutOfRange`] when the reported score is invalid.
    pub fn classify_job(&self, outcome: JobOutcome<'_>) -> Result<ClassifiedJob, PipelineError> {
        let classification = self.thresholds.classify(outcome.confidence_score)?;
        let method = assign_method(outcome.profile);
        let review_reason = if method.needs_review() {
            outcome.profile.review_reason()
        } else {
            None
        };

        debug!(
            job = %outcome.name,
            score = outcome.confidence_score,
            level = %classification.level,
            method = %method,
            "Job classified"
        );
        if method.needs_review() {
            info!(
                job = %outcome.name,
                wave = outcome.wave,
                reason = review_reason.as_deref().unwrap_or(""),
                "Job flagged for manual review"
            );
        }

        Ok(ClassifiedJob {
            name: outcome.name.to_string(),
            wave: outcome.wave,
            tier: outcome.tier,
            pattern: outcome.profile.pattern.clone(),
            confidence_score: classification.score,
            confidence_level: classification.level,
            badge: classification.badge,
            conversion_method: method,
            warnings: outcome.warnings.to_vec(),
            review_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::PatternComplexity;

    fn outcome<'a>(
        name: &'a str,
        score: f64,
        profile: &'a JobProfile,
        warnings: &'a [String],
    ) -> JobOutcome<'a> {
        JobOutcome {
            name,
            wave: 2,
            tier: ComplexityTier::Medium,
            confidence_score: score,
            profile,
            warnings,
        }
    }

    #[test]
    fn test_classify_automated_job() {
        let profile = JobProfile::new("Lookup + Filter");
        let warnings = vec!["Implicit date format".to_string()];
        let job = JobClassifier::default()
            .classify_job(outcome("m_load_orders", 88.0, &profile, &warnings))
            .unwrap();

        assert_eq!(job.confidence_level, ConfidenceLevel::High);
        assert_eq!(job.badge, BadgeTier::Info);
        assert_eq!(job.conversion_method, ConversionMethod::AstParser);
        assert_eq!(job.pattern, "Lookup + Filter");
        assert_eq!(job.warnings, warnings);
        assert!(!job.needs_review());
        assert!(job.review_reason.is_none());
    }

    #[test]
    fn test_classify_flagged_job_carries_reason() {
        let profile = JobProfile {
            custom_code: true,
            pattern_complexity: PatternComplexity::High,
            ..JobProfile::new("Java Transformation")
        };
        let job = JobClassifier::default()
            .classify_job(outcome("m_custom_java", 41.0, &profile, &[]))
            .unwrap();

        assert!(job.needs_review());
        assert_eq!(job.confidence_level, ConfidenceLevel::Low);
        assert_eq!(job.review_reason.as_deref(), Some("Contains custom code"));
    }

    #[test]
    fn test_invalid_score_is_rejected() {
        let profile = JobProfile::new("Simple Load");
        let err = JobClassifier::default()
            .classify_job(outcome("m_bad", 150.0, &profile, &[]))
            .unwrap_err();
        assert_eq!(err, PipelineError::ScoreOutOfRange { score: 150.0 });
    }
}
