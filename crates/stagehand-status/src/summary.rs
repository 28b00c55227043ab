use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use stagehand_classifier::{ClassifiedJob, ConfidenceLevel};
use stagehand_review::ReviewQueue;
use stagehand_utils::types::ValidationRecord;

/// Roll-up numbers for a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub total_jobs: u64,
    pub converted_jobs: u64,
    /// Converted without manual review
    pub automated_jobs: u64,
    /// Flagged for manual review
    pub manual_jobs: u64,
    pub manual_completed: u64,
    /// Percent of converted jobs that needed no manual review
    pub automation_rate: Option<f64>,
    /// Percent of validated jobs that passed
    pub validation_pass_rate: Option<f64>,
    pub average_confidence: Option<f64>,
    /// Converted jobs per confidence level
    pub confidence_distribution: BTreeMap<ConfidenceLevel, u64>,
}

impl ProjectSummary {
    /// Compute the summary from recorded jobs, the review queue and
    /// validation records.
    #[must_use]
    pub fn compute(
        total_jobs: u64,
        jobs: &[ClassifiedJob],
        reviews: &ReviewQueue,
        validation: &[ValidationRecord],
    ) -> Self {
        let converted = jobs.len() as u64;
        let manual = jobs.iter().filter(|j| j.needs_review()).count() as u64;
        let automated = converted - manual;

        let automation_rate = (converted > 0).then(|| round1(automated as f64 * 100.0 / converted as f64));

        let passed = validation.iter().filter(|r| r.passed).count();
        let validation_pass_rate = (!validation.is_empty())
            .then(|| round1(passed as f64 * 100.0 / validation.len() as f64));

        let average_confidence = (converted > 0).then(|| {
            round1(jobs.iter().map(|j| j.confidence_score).sum::<f64>() / converted as f64)
        });

        let mut confidence_distribution = BTreeMap::new();
        for job in jobs {
            *confidence_distribution.entry(job.confidence_level).or_insert(0) += 1;
        }

        Self {
            total_jobs,
            converted_jobs: converted,
            automated_jobs: automated,
            manual_jobs: manual,
            manual_completed: reviews.completed_count() as u64,
            automation_rate,
            validation_pass_rate,
            average_confidence,
            confidence_distribution,
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
