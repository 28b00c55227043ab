use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use stagehand_utils::error::PipelineError;
use stagehand_utils::progress::percent;
use stagehand_utils::types::{ComplexityTier, StageId};

use crate::wave::{Wave, WaveStatus};

/// Share of converted jobs that also count as optimized.
pub const DEFAULT_OPTIMIZATION_RATIO: f64 = 0.6;

/// Job names grouped by complexity tier.
pub type JobsByTier = BTreeMap<ComplexityTier, Vec<String>>;

/// Sequential, tier-ordered conversion scheduler.
///
/// Waves are created low → medium → high and convert one at a time: when
/// the converting wave finishes, the next pending wave starts in the same
/// call. At most one wave is ever `converting`.
///
/// With `hold_for_review` set, a fully converted wave that still has jobs
/// awaiting manual review stays `converting` until [`mark_reviewed`] clears
/// the last one.
///
/// [`mark_reviewed`]: WaveScheduler::mark_reviewed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveScheduler {
    waves: Vec<Wave>,
    optimization_ratio: f64,
    hold_for_review: bool,
}

impl Default for WaveScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_OPTIMIZATION_RATIO, false)
    }
}

impl WaveScheduler {
    /// Create an empty scheduler. Ratios outside `[0, 1]` are clamped.
    #[must_use]
    pub fn new(optimization_ratio: f64, hold_for_review: bool) -> Self {
        let optimization_ratio = if optimization_ratio.is_finite() {
            optimization_ratio.clamp(0.0, 1.0)
        } else {
            DEFAULT_OPTIMIZATION_RATIO
        };
        Self {
            waves: Vec::new(),
            optimization_ratio,
            hold_for_review,
        }
    }

    /// Plan waves from the job inventory and start the first one.
    ///
    /// Tiers without jobs get no wave, so wave ids stay contiguous.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::EmptyJobSet`] when no tier has jobs
    /// * [`PipelineError::InvalidTransition`] when waves were already planned
    pub fn initialize(&mut self, jobs_by_tier: &JobsByTier) -> Result<(), PipelineError> {
        if self.is_planned() {
            return Err(PipelineError::InvalidTransition {
                stage: StageId::Conversion,
                reason: "waves are already planned".to_string(),
            });
        }

        let mut waves = Vec::new();
        for tier in ComplexityTier::all() {
            let Some(jobs) = jobs_by_tier.get(&tier).filter(|jobs| !jobs.is_empty()) else {
                continue;
            };
            waves.push(Wave::new(waves.len() as u32 + 1, tier, jobs.clone()));
        }

        if waves.is_empty() {
            return Err(PipelineError::EmptyJobSet);
        }

        self.waves = waves;
        info!(
            waves = self.waves.len(),
            jobs = self.total_jobs(),
            "Waves planned"
        );
        self.start_wave(0);
        Ok(())
    }

    /// Convert the next job of the converting wave.
    ///
    /// Returns overall conversion progress. When no wave is converting the
    /// call changes nothing.
    ///
    /// This counts a unit without naming the job, so nothing classifies it.
    /// The pipeline reports results per job through
    /// [`convert_job`](Self::convert_job); `advance_unit` serves callers
    /// that only track counts, such as simulations and capacity planning.
    pub fn advance_unit(&mut self) -> u8 {
        let Some(index) = self.active_index() else {
            return self.progress();
        };
        let Some(job) = self.waves[index].next_unconverted().map(str::to_string) else {
            // Fully converted but held for review.
            return self.progress();
        };
        self.waves[index].record_conversion(&job, self.optimization_ratio);
        debug!(job = %job, wave = self.waves[index].id(), "Job converted");
        self.settle(index);
        self.progress()
    }

    /// Convert a specific job of the converting wave.
    ///
    /// Jobs that were already converted are ignored.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::UnknownJob`] when no wave holds the job
    /// * [`PipelineError::JobNotInActiveWave`] when its wave is not converting
    pub fn convert_job(&mut self, job: &str) -> Result<u8, PipelineError> {
        let index = self.wave_index_of(job)?;
        let wave = &self.waves[index];
        if wave.is_converted(job) {
            return Ok(self.progress());
        }
        if wave.status() != WaveStatus::Converting {
            return Err(PipelineError::JobNotInActiveWave {
                job: job.to_string(),
                wave: wave.id(),
            });
        }

        self.waves[index].record_conversion(job, self.optimization_ratio);
        debug!(job = %job, wave = self.waves[index].id(), "Job converted");
        self.settle(index);
        Ok(self.progress())
    }

    /// Mark a job as awaiting manual review.
    ///
    /// Call before the job's conversion is counted so hold mode sees it.
    ///
    /// # Errors
    ///
    /// [`PipelineError::UnknownJob`] when no wave holds the job.
    pub fn flag_for_review(&mut self, job: &str) -> Result<(), PipelineError> {
        let index = self.wave_index_of(job)?;
        self.waves[index].flag(job);
        Ok(())
    }

    /// Clear a job's review flag, completing its wave if it was only held
    /// for review.
    ///
    /// # Errors
    ///
    /// [`PipelineError::UnknownJob`] when no wave holds the job.
    pub fn mark_reviewed(&mut self, job: &str) -> Result<(), PipelineError> {
        let index = self.wave_index_of(job)?;
        if self.waves[index].unflag(job) && self.waves[index].status() == WaveStatus::Converting {
            self.settle(index);
        }
        Ok(())
    }

    /// `round(100 × Σconverted / Σjobs)`; 0 before planning.
    #[must_use]
    pub fn progress(&self) -> u8 {
        percent(self.total_converted(), self.total_jobs())
    }

    #[must_use]
    pub fn waves(&self) -> &[Wave] {
        &self.waves
    }

    #[must_use]
    pub fn active_wave(&self) -> Option<&Wave> {
        self.active_index().map(|i| &self.waves[i])
    }

    /// Next job [`advance_unit`](Self::advance_unit) would convert.
    #[must_use]
    pub fn next_unconverted(&self) -> Option<&str> {
        self.active_wave().and_then(Wave::next_unconverted)
    }

    #[must_use]
    pub fn wave_of(&self, job: &str) -> Option<&Wave> {
        self.waves.iter().find(|w| w.contains(job))
    }

    #[must_use]
    pub fn is_planned(&self) -> bool {
        !self.waves.is_empty()
    }

    /// Planned and every wave completed.
    #[must_use]
    pub fn all_completed(&self) -> bool {
        self.is_planned() && self.waves.iter().all(|w| w.status() == WaveStatus::Completed)
    }

    #[must_use]
    pub fn total_jobs(&self) -> u64 {
        self.waves.iter().map(|w| w.job_count() as u64).sum()
    }

    #[must_use]
    pub fn total_converted(&self) -> u64 {
        self.waves.iter().map(|w| w.converted_count() as u64).sum()
    }

    #[must_use]
    pub fn optimization_ratio(&self) -> f64 {
        self.optimization_ratio
    }

    #[must_use]
    pub fn hold_for_review(&self) -> bool {
        self.hold_for_review
    }

    /// Check the structure of a scheduler read back from storage.
    ///
    /// Every wave must keep its counters consistent with its job lists,
    /// ids run 1, 2, ..., the ratio lies in `[0, 1]`, and statuses read
    /// completed, then at most one converting, then pending.
    ///
    /// # Errors
    ///
    /// A description of the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.optimization_ratio) {
            return Err(format!(
                "optimization ratio {} is outside [0, 1]",
                self.optimization_ratio
            ));
        }

        let mut seen_open = false;
        for (index, wave) in self.waves.iter().enumerate() {
            if wave.id() as usize != index + 1 {
                return Err(format!("wave {} found at position {}", wave.id(), index + 1));
            }
            wave.validate()?;
            let out_of_order = match wave.status() {
                WaveStatus::Completed => seen_open,
                WaveStatus::Converting => std::mem::replace(&mut seen_open, true),
                WaveStatus::Pending => {
                    seen_open = true;
                    false
                }
            };
            if out_of_order {
                return Err(format!("wave {} is {} out of order", wave.id(), wave.status()));
            }
        }
        Ok(())
    }

    fn active_index(&self) -> Option<usize> {
        self.waves
            .iter()
            .position(|w| w.status() == WaveStatus::Converting)
    }

    fn wave_index_of(&self, job: &str) -> Result<usize, PipelineError> {
        self.waves
            .iter()
            .position(|w| w.contains(job))
            .ok_or_else(|| PipelineError::UnknownJob {
                job: job.to_string(),
            })
    }

    /// Complete the wave at `index` if it is done and start the next one.
    fn settle(&mut self, index: usize) {
        let wave = &self.waves[index];
        if wave.status() != WaveStatus::Converting || !wave.fully_converted() {
            return;
        }
        if self.hold_for_review && wave.has_pending_review() {
            debug!(wave = wave.id(), "Wave converted, awaiting manual review");
            return;
        }

        self.waves[index].set_status(WaveStatus::Completed);
        let wave = &self.waves[index];
        info!(
            wave = wave.id(),
            tier = %wave.tier(),
            converted = wave.converted_count(),
            optimized = wave.optimized_count(),
            "Wave completed"
        );

        if index + 1 < self.waves.len() {
            self.start_wave(index + 1);
        }
    }

    fn start_wave(&mut self, index: usize) {
        self.waves[index].set_status(WaveStatus::Converting);
        let wave = &self.waves[index];
        info!(
            wave = wave.id(),
            tier = %wave.tier(),
            jobs = wave.job_count(),
            target = wave.automation_rate_target(),
            "Wave started"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn names(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{prefix}_{i:02}")).collect()
    }

    fn inventory(low: usize, medium: usize, high: usize) -> JobsByTier {
        let mut jobs = JobsByTier::new();
        jobs.insert(ComplexityTier::Low, names("low", low));
        jobs.insert(ComplexityTier::Medium, names("med", medium));
        jobs.insert(ComplexityTier::High, names("high", high));
        jobs
    }

    fn assert_invariants(scheduler: &WaveScheduler) {
        let converting = scheduler
            .waves()
            .iter()
            .filter(|w| w.status() == WaveStatus::Converting)
            .count();
        assert!(converting <= 1);

        let mut seen_non_completed = false;
        for wave in scheduler.waves() {
            assert!(wave.converted_count() <= wave.job_count());
            assert!(wave.validated_count() <= wave.converted_count());
            assert!(wave.optimized_count() <= wave.converted_count());
            if wave.status() == WaveStatus::Completed {
                assert!(!seen_non_completed, "waves must complete in ascending order");
            } else {
                seen_non_completed = true;
            }
        }
        assert_eq!(scheduler.validate(), Ok(()));
    }

    #[test]
    fn test_initialize_orders_tiers_and_starts_first() {
        let mut scheduler = WaveScheduler::default();
        scheduler.initialize(&inventory(15, 42, 8)).unwrap();

        let waves = scheduler.waves();
        assert_eq!(waves.len(), 3);
        assert_eq!(
            waves.iter().map(Wave::tier).collect::<Vec<_>>(),
            vec![ComplexityTier::Low, ComplexityTier::Medium, ComplexityTier::High]
        );
        assert_eq!(waves.iter().map(Wave::id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(waves[0].status(), WaveStatus::Converting);
        assert_eq!(waves[1].status(), WaveStatus::Pending);
        assert_eq!(waves[2].automation_rate_target(), 70);
        assert_eq!(scheduler.progress(), 0);
    }

    #[test]
    fn test_empty_tiers_get_no_wave() {
        let mut scheduler = WaveScheduler::default();
        scheduler.initialize(&inventory(0, 4, 0)).unwrap();
        assert_eq!(scheduler.waves().len(), 1);
        assert_eq!(scheduler.waves()[0].id(), 1);
        assert_eq!(scheduler.waves()[0].tier(), ComplexityTier::Medium);
    }

    #[test]
    fn test_empty_job_set_is_rejected() {
        let mut scheduler = WaveScheduler::default();
        assert_eq!(
            scheduler.initialize(&inventory(0, 0, 0)).unwrap_err(),
            PipelineError::EmptyJobSet
        );
        assert_eq!(
            scheduler.initialize(&JobsByTier::new()).unwrap_err(),
            PipelineError::EmptyJobSet
        );
        assert!(!scheduler.is_planned());
    }

    #[test]
    fn test_initialize_twice_is_rejected() {
        let mut scheduler = WaveScheduler::default();
        scheduler.initialize(&inventory(1, 0, 0)).unwrap();
        assert!(matches!(
            scheduler.initialize(&inventory(1, 0, 0)),
            Err(PipelineError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_advance_unit_walks_all_waves() {
        let mut scheduler = WaveScheduler::default();
        scheduler.initialize(&inventory(15, 42, 8)).unwrap();

        let mut last = 0;
        for unit in 1..=65u64 {
            let progress = scheduler.advance_unit();
            assert!(progress >= last);
            assert_eq!(progress, percent(unit, 65));
            last = progress;
            assert_invariants(&scheduler);

            if unit == 15 {
                assert_eq!(scheduler.waves()[0].status(), WaveStatus::Completed);
                assert_eq!(scheduler.waves()[1].status(), WaveStatus::Converting);
            }
        }

        assert!(scheduler.all_completed());
        assert_eq!(scheduler.progress(), 100);
        assert!(scheduler.active_wave().is_none());

        let medium = &scheduler.waves()[1];
        assert_eq!(medium.validated_count(), 42);
        assert_eq!(medium.optimized_count(), 25);

        // No converting wave: nothing changes.
        assert_eq!(scheduler.advance_unit(), 100);
        assert_eq!(scheduler.total_converted(), 65);
    }

    #[test]
    fn test_advance_unit_before_planning_is_noop() {
        let mut scheduler = WaveScheduler::default();
        assert_eq!(scheduler.advance_unit(), 0);
        assert!(!scheduler.all_completed());
    }

    #[test]
    fn test_convert_job_rules() {
        let mut scheduler = WaveScheduler::default();
        scheduler.initialize(&inventory(2, 1, 0)).unwrap();

        assert_eq!(
            scheduler.convert_job("med_00").unwrap_err(),
            PipelineError::JobNotInActiveWave {
                job: "med_00".to_string(),
                wave: 2
            }
        );
        assert_eq!(
            scheduler.convert_job("nope").unwrap_err(),
            PipelineError::UnknownJob {
                job: "nope".to_string()
            }
        );

        assert_eq!(scheduler.convert_job("low_01").unwrap(), 33);
        assert_eq!(scheduler.convert_job("low_01").unwrap(), 33);
        assert_eq!(scheduler.convert_job("low_00").unwrap(), 67);
        assert_eq!(scheduler.waves()[1].status(), WaveStatus::Converting);

        // Re-converting a job of a completed wave is ignored too.
        assert_eq!(scheduler.convert_job("low_00").unwrap(), 67);
        assert_eq!(scheduler.convert_job("med_00").unwrap(), 100);
        assert!(scheduler.all_completed());
    }

    #[test]
    fn test_hold_mode_waits_for_review() {
        let mut scheduler = WaveScheduler::new(0.6, true);
        scheduler.initialize(&inventory(2, 1, 0)).unwrap();
        scheduler.flag_for_review("low_01").unwrap();

        scheduler.advance_unit();
        scheduler.advance_unit();
        let low = &scheduler.waves()[0];
        assert!(low.fully_converted());
        assert_eq!(low.status(), WaveStatus::Converting);
        assert_eq!(low.awaiting_review().collect::<Vec<_>>(), vec!["low_01"]);

        // Held wave: advancing changes nothing.
        assert_eq!(scheduler.advance_unit(), 67);
        assert_eq!(scheduler.waves()[1].status(), WaveStatus::Pending);

        scheduler.mark_reviewed("low_01").unwrap();
        assert_eq!(scheduler.waves()[0].status(), WaveStatus::Completed);
        assert_eq!(scheduler.waves()[1].status(), WaveStatus::Converting);
    }

    #[test]
    fn test_default_mode_ignores_review_flags_for_completion() {
        let mut scheduler = WaveScheduler::default();
        scheduler.initialize(&inventory(1, 0, 0)).unwrap();
        scheduler.flag_for_review("low_00").unwrap();
        scheduler.advance_unit();
        assert!(scheduler.all_completed());
        assert_eq!(
            scheduler.waves()[0].awaiting_review().collect::<Vec<_>>(),
            vec!["low_00"]
        );
        scheduler.mark_reviewed("low_00").unwrap();
        assert_eq!(scheduler.waves()[0].awaiting_review().count(), 0);
    }

    #[test]
    fn test_ratio_is_clamped() {
        assert_eq!(WaveScheduler::new(1.7, false).optimization_ratio(), 1.0);
        assert_eq!(WaveScheduler::new(-0.2, false).optimization_ratio(), 0.0);
        assert_eq!(
            WaveScheduler::new(f64::NAN, false).optimization_ratio(),
            DEFAULT_OPTIMIZATION_RATIO
        );
    }

    #[test]
    fn test_scheduler_round_trips_through_json() {
        let mut scheduler = WaveScheduler::default();
        scheduler.initialize(&inventory(3, 2, 1)).unwrap();
        scheduler.advance_unit();
        scheduler.flag_for_review("low_02").unwrap();

        let json = serde_json::to_string(&scheduler).unwrap();
        let restored: WaveScheduler = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, scheduler);
    }

    #[test]
    fn test_validate_rejects_edited_schedules() {
        let mut scheduler = WaveScheduler::default();
        scheduler.initialize(&inventory(3, 2, 1)).unwrap();
        scheduler.advance_unit();
        let json = serde_json::to_value(&scheduler).unwrap();

        let edited = |pointer: &str, replacement: serde_json::Value| {
            let mut value = json.clone();
            *value.pointer_mut(pointer).unwrap() = replacement;
            serde_json::from_value::<WaveScheduler>(value).unwrap().validate()
        };

        assert_eq!(edited("/waves/0/id", 1.into()), Ok(()));
        assert!(
            edited("/waves/1/status", "converting".into())
                .unwrap_err()
                .contains("out of order")
        );
        assert!(edited("/waves/0/job_count", 7.into()).is_err());
        assert!(edited("/waves/2/id", 9.into()).is_err());
        assert!(edited("/optimization_ratio", 3.5.into()).is_err());
    }

    proptest! {
        #[test]
        fn prop_invariants_hold_under_any_schedule(
            low in 0usize..6,
            medium in 0usize..6,
            high in 0usize..6,
            ratio in 0.0f64..=1.0,
            hold in any::<bool>(),
            steps in proptest::collection::vec(0u8..3, 0..40),
        ) {
            prop_assume!(low + medium + high > 0);
            let mut scheduler = WaveScheduler::new(ratio, hold);
            scheduler.initialize(&inventory(low, medium, high)).unwrap();
            let mut last = scheduler.progress();

            for (i, step) in steps.into_iter().enumerate() {
                match step {
                    0 => { scheduler.advance_unit(); }
                    1 => {
                        if let Some(job) = scheduler.next_unconverted().map(str::to_string) {
                            scheduler.flag_for_review(&job).unwrap();
                        }
                    }
                    _ => {
                        let flagged: Vec<String> = scheduler
                            .waves()
                            .iter()
                            .flat_map(|w| w.awaiting_review().map(str::to_string))
                            .collect();
                        if let Some(job) = flagged.get(i % flagged.len().max(1)) {
                            scheduler.mark_reviewed(job).unwrap();
                        }
                    }
                }
                let progress = scheduler.progress();
                prop_assert!(progress >= last);
                prop_assert!(progress <= 100);
                last = progress;
                assert_invariants(&scheduler);
            }
        }
    }
}
