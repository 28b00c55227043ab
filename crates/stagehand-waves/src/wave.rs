use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use stagehand_utils::progress::percent;
use stagehand_utils::types::ComplexityTier;

/// Lifecycle of a wave: pending → converting → completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveStatus {
    Pending,
    Converting,
    Completed,
}

impl WaveStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Converting => "converting",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for WaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One complexity tier's batch of jobs.
///
/// Counters only move through [`WaveScheduler`](crate::WaveScheduler), which
/// keeps `validated <= converted`, `optimized <= converted` and
/// `converted <= job_count`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wave {
    id: u32,
    tier: ComplexityTier,
    job_count: u32,
    converted_count: u32,
    validated_count: u32,
    optimized_count: u32,
    status: WaveStatus,
    automation_rate_target: u8,
    jobs: Vec<String>,
    converted: BTreeSet<String>,
    awaiting_review: BTreeSet<String>,
}

impl Wave {
    pub(crate) fn new(id: u32, tier: ComplexityTier, jobs: Vec<String>) -> Self {
        Self {
            id,
            tier,
            job_count: jobs.len() as u32,
            converted_count: 0,
            validated_count: 0,
            optimized_count: 0,
            status: WaveStatus::Pending,
            automation_rate_target: tier.automation_rate_target(),
            jobs,
            converted: BTreeSet::new(),
            awaiting_review: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[must_use]
    pub fn tier(&self) -> ComplexityTier {
        self.tier
    }

    #[must_use]
    pub fn job_count(&self) -> u32 {
        self.job_count
    }

    #[must_use]
    pub fn converted_count(&self) -> u32 {
        self.converted_count
    }

    #[must_use]
    pub fn validated_count(&self) -> u32 {
        self.validated_count
    }

    #[must_use]
    pub fn optimized_count(&self) -> u32 {
        self.optimized_count
    }

    #[must_use]
    pub fn status(&self) -> WaveStatus {
        self.status
    }

    #[must_use]
    pub fn automation_rate_target(&self) -> u8 {
        self.automation_rate_target
    }

    /// Job names in conversion order.
    #[must_use]
    pub fn jobs(&self) -> &[String] {
        &self.jobs
    }

    #[must_use]
    pub fn contains(&self, job: &str) -> bool {
        self.jobs.iter().any(|j| j == job)
    }

    #[must_use]
    pub fn is_converted(&self, job: &str) -> bool {
        self.converted.contains(job)
    }

    /// Jobs of this wave flagged for manual review that have not finished it.
    pub fn awaiting_review(&self) -> impl Iterator<Item = &str> {
        self.awaiting_review.iter().map(String::as_str)
    }

    #[must_use]
    pub fn fully_converted(&self) -> bool {
        self.converted_count == self.job_count
    }

    /// Percent of this wave's jobs converted, rounded.
    #[must_use]
    pub fn progress(&self) -> u8 {
        percent(self.converted_count as u64, self.job_count as u64)
    }

    /// First job in order that has not been converted yet.
    pub(crate) fn next_unconverted(&self) -> Option<&str> {
        self.jobs
            .iter()
            .find(|j| !self.converted.contains(j.as_str()))
            .map(String::as_str)
    }

    /// Record one converted job and refresh derived counters.
    ///
    /// Returns `false` when the job was already converted.
    pub(crate) fn record_conversion(&mut self, job: &str, optimization_ratio: f64) -> bool {
        if self.converted_count >= self.job_count || !self.converted.insert(job.to_string()) {
            return false;
        }
        self.converted_count += 1;
        self.validated_count = self.converted_count;
        self.optimized_count = ((self.converted_count as f64) * optimization_ratio).floor() as u32;
        self.optimized_count = self.optimized_count.min(self.converted_count);
        true
    }

    pub(crate) fn flag(&mut self, job: &str) {
        self.awaiting_review.insert(job.to_string());
    }

    pub(crate) fn unflag(&mut self, job: &str) -> bool {
        self.awaiting_review.remove(job)
    }

    pub(crate) fn has_pending_review(&self) -> bool {
        !self.awaiting_review.is_empty()
    }

    pub(crate) fn set_status(&mut self, status: WaveStatus) {
        self.status = status;
    }

    /// Check the counters of a wave read back from storage.
    pub(crate) fn validate(&self) -> Result<(), String> {
        let id = self.id;
        if self.job_count as usize != self.jobs.len() {
            return Err(format!(
                "wave {id} counts {} jobs but lists {}",
                self.job_count,
                self.jobs.len()
            ));
        }
        if self.converted_count as usize != self.converted.len() {
            return Err(format!(
                "wave {id} counts {} conversions but lists {}",
                self.converted_count,
                self.converted.len()
            ));
        }
        if self.converted_count > self.job_count {
            return Err(format!("wave {id} converted more jobs than it holds"));
        }
        if self.validated_count > self.converted_count || self.optimized_count > self.converted_count {
            return Err(format!("wave {id} validated or optimized more jobs than it converted"));
        }
        if let Some(stray) = self
            .converted
            .iter()
            .chain(&self.awaiting_review)
            .find(|job| !self.contains(job))
        {
            return Err(format!("wave {id} tracks job '{stray}' it does not hold"));
        }
        if self.status == WaveStatus::Completed && !self.fully_converted() {
            return Err(format!("wave {id} is completed with jobs left to convert"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wave(n: usize) -> Wave {
        Wave::new(
            1,
            ComplexityTier::Medium,
            (0..n).map(|i| format!("job_{i:02}")).collect(),
        )
    }

    #[test]
    fn test_new_wave_is_pending_with_tier_target() {
        let w = wave(3);
        assert_eq!(w.status(), WaveStatus::Pending);
        assert_eq!(w.job_count(), 3);
        assert_eq!(w.automation_rate_target(), 85);
        assert_eq!(w.next_unconverted(), Some("job_00"));
    }

    #[test]
    fn test_record_conversion_updates_counters() {
        let mut w = wave(5);
        for i in 0..5 {
            assert!(w.record_conversion(&format!("job_{i:02}"), 0.6));
        }
        assert_eq!(w.converted_count(), 5);
        assert_eq!(w.validated_count(), 5);
        assert_eq!(w.optimized_count(), 3);
        assert!(w.fully_converted());
        assert_eq!(w.next_unconverted(), None);
    }

    #[test]
    fn test_duplicate_conversion_is_ignored() {
        let mut w = wave(2);
        assert!(w.record_conversion("job_00", 0.6));
        assert!(!w.record_conversion("job_00", 0.6));
        assert_eq!(w.converted_count(), 1);
    }

    #[test]
    fn test_validate_catches_inconsistent_counters() {
        let mut w = wave(3);
        w.record_conversion("job_00", 0.6);
        assert_eq!(w.validate(), Ok(()));

        let mut short = w.clone();
        short.jobs.pop();
        assert!(short.validate().unwrap_err().contains("counts 3 jobs but lists 2"));

        let mut miscounted = w.clone();
        miscounted.converted_count = 2;
        assert!(miscounted.validate().is_err());

        let mut stray = w.clone();
        stray.awaiting_review.insert("job_99".to_string());
        assert!(stray.validate().unwrap_err().contains("job_99"));

        let mut early = w;
        early.status = WaveStatus::Completed;
        assert!(early.validate().is_err());
    }

    #[test]
    fn test_wave_progress_rounds() {
        let mut w = wave(3);
        assert_eq!(w.progress(), 0);
        w.record_conversion("job_00", 0.6);
        assert_eq!(w.progress(), 33);
        w.record_conversion("job_01", 0.6);
        assert_eq!(w.progress(), 67);
    }
}
