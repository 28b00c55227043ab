//! Stage gate evaluation
//!
//! Each stage has a fixed set of preconditions. The evaluator checks them
//! against live pipeline data and reports every condition, not only the
//! first failure, so callers can show the full list of blockers.

use tracing::debug;

use stagehand_utils::types::StageId;

use crate::types::{GateCondition, GateInputs, GateResult, StageGate};

/// Evaluates stage preconditions over a [`GateInputs`] source.
pub struct GateEvaluator<'a, I: GateInputs + ?Sized> {
    inputs: &'a I,
}

impl<'a, I: GateInputs + ?Sized> GateEvaluator<'a, I> {
    pub fn new(inputs: &'a I) -> Self {
        Self { inputs }
    }

    /// Evaluate the gate for `stage`. Never fails.
    pub fn can_advance(&self, stage: StageId) -> GateResult {
        let mut conditions = Vec::new();
        let mut failure_reasons = Vec::new();

        let passed = match stage {
            StageId::Setup | StageId::Completion => true,
            StageId::Analysis => self.evaluate_connections(&mut conditions, &mut failure_reasons),
            StageId::Discovery => self.evaluate_inventory(&mut conditions, &mut failure_reasons),
            StageId::Conversion => {
                let planned = self.evaluate_waves_planned(&mut conditions, &mut failure_reasons);
                let completed =
                    self.evaluate_waves_completed(&mut conditions, &mut failure_reasons);
                let reviewed = self.evaluate_manual_reviews(&mut conditions, &mut failure_reasons);
                planned && completed && reviewed
            }
            StageId::Validation => {
                let covered =
                    self.evaluate_validation_coverage(&mut conditions, &mut failure_reasons);
                let rate = self.evaluate_pass_rate(&mut conditions, &mut failure_reasons);
                covered && rate
            }
        };

        let summary = if conditions.is_empty() {
            format!("Stage '{stage}' has no preconditions")
        } else if passed {
            format!("Stage '{stage}' passed all gate checks")
        } else {
            format!(
                "Stage '{stage}' failed gate checks ({} unmet)",
                failure_reasons.len()
            )
        };

        debug!(stage = %stage, passed, unmet = failure_reasons.len(), "Gate evaluated");

        GateResult {
            stage,
            passed,
            summary,
            conditions,
            failure_reasons,
        }
    }

    fn evaluate_connections(
        &self,
        conditions: &mut Vec<GateCondition>,
        failure_reasons: &mut Vec<String>,
    ) -> bool {
        let mut all_ready = true;

        for connection in self.inputs.connections().iter().filter(|c| c.required) {
            let passed = connection.is_ready();
            let actual = if !connection.kind.requires_test() {
                "no test required".to_string()
            } else if !connection.tested {
                "untested".to_string()
            } else if connection.test_success {
                "test passed".to_string()
            } else {
                match &connection.test_message {
                    Some(message) => format!("test failed: {message}"),
                    None => "test failed".to_string(),
                }
            };

            conditions.push(GateCondition {
                name: format!("Connection: {}", connection.name),
                description: format!(
                    "Required {} connection '{}' is reachable",
                    connection.kind.display_name(),
                    connection.name
                ),
                passed,
                actual: Some(actual.clone()),
                expected: Some("test passed".to_string()),
            });

            if !passed {
                all_ready = false;
                failure_reasons.push(format!(
                    "Required connection '{}' is not ready ({actual})",
                    connection.name
                ));
            }
        }

        all_ready
    }

    fn evaluate_inventory(
        &self,
        conditions: &mut Vec<GateCondition>,
        failure_reasons: &mut Vec<String>,
    ) -> bool {
        let jobs = self.inputs.inventory_size();
        let passed = jobs > 0;

        conditions.push(GateCondition {
            name: "Job inventory".to_string(),
            description: "At least one job was discovered for conversion".to_string(),
            passed,
            actual: Some(format!("{jobs} job(s)")),
            expected: Some("at least 1 job".to_string()),
        });

        if !passed {
            failure_reasons.push("Job inventory is empty".to_string());
        }

        passed
    }

    fn evaluate_waves_planned(
        &self,
        conditions: &mut Vec<GateCondition>,
        failure_reasons: &mut Vec<String>,
    ) -> bool {
        let waves = self.inputs.waves().waves().len();
        let passed = waves > 0;

        conditions.push(GateCondition {
            name: "Waves planned".to_string(),
            description: "Conversion waves have been planned".to_string(),
            passed,
            actual: Some(format!("{waves} wave(s)")),
            expected: Some("at least 1 wave".to_string()),
        });

        if !passed {
            failure_reasons.push("Conversion waves have not been planned".to_string());
        }

        passed
    }

    fn evaluate_waves_completed(
        &self,
        conditions: &mut Vec<GateCondition>,
        failure_reasons: &mut Vec<String>,
    ) -> bool {
        let scheduler = self.inputs.waves();
        let total = scheduler.waves().len();
        let incomplete = scheduler
            .waves()
            .iter()
            .filter(|w| w.status() != stagehand_waves::WaveStatus::Completed)
            .count();
        let passed = scheduler.all_completed();

        conditions.push(GateCondition {
            name: "Waves completed".to_string(),
            description: "Every conversion wave has completed".to_string(),
            passed,
            actual: Some(format!("{}/{total} completed", total - incomplete)),
            expected: Some(format!("{total}/{total} completed")),
        });

        if !passed && total > 0 {
            failure_reasons.push(format!(
                "{incomplete} of {total} wave(s) not completed ({} of {} jobs converted)",
                scheduler.total_converted(),
                scheduler.total_jobs()
            ));
        }

        passed
    }

    fn evaluate_manual_reviews(
        &self,
        conditions: &mut Vec<GateCondition>,
        failure_reasons: &mut Vec<String>,
    ) -> bool {
        let reviews = self.inputs.reviews();
        let pending = reviews.pending_count();
        let passed = pending == 0;

        conditions.push(GateCondition {
            name: "Manual reviews".to_string(),
            description: "Every job flagged for manual review has completed it".to_string(),
            passed,
            actual: Some(format!(
                "{}/{} completed",
                reviews.completed_count(),
                reviews.len()
            )),
            expected: Some(format!("{0}/{0} completed", reviews.len())),
        });

        if !passed {
            failure_reasons.push(format!("{pending} manual review job(s) pending"));
        }

        passed
    }

    fn evaluate_validation_coverage(
        &self,
        conditions: &mut Vec<GateCondition>,
        failure_reasons: &mut Vec<String>,
    ) -> bool {
        let coverage = self.inputs.validation();
        let missing = coverage.missing();
        let passed = missing == 0;

        conditions.push(GateCondition {
            name: "Validation coverage".to_string(),
            description: "Every converted job has a validation result".to_string(),
            passed,
            actual: Some(format!(
                "{}/{} validated",
                coverage.recorded, coverage.converted
            )),
            expected: Some(format!("{0}/{0} validated", coverage.converted)),
        });

        if !passed {
            failure_reasons.push(format!(
                "{missing} converted job(s) have no validation result"
            ));
        }

        passed
    }

    fn evaluate_pass_rate(
        &self,
        conditions: &mut Vec<GateCondition>,
        failure_reasons: &mut Vec<String>,
    ) -> bool {
        let Some(required) = self.inputs.min_pass_rate() else {
            // No pass-rate requirement configured
            return true;
        };

        let rate = self.inputs.validation().pass_rate();
        let passed = rate.is_none_or(|rate| rate >= required);

        conditions.push(GateCondition {
            name: "Validation pass rate".to_string(),
            description: format!("At least {required:.1}% of validated jobs pass"),
            passed,
            actual: Some(rate.map_or_else(|| "n/a".to_string(), |r| format!("{r:.1}%"))),
            expected: Some(format!(">= {required:.1}%")),
        });

        if let (false, Some(rate)) = (passed, rate) {
            failure_reasons.push(format!(
                "Validation pass rate {rate:.1}% is below the required {required:.1}%"
            ));
        }

        passed
    }
}

impl<I: GateInputs + ?Sized> StageGate for GateEvaluator<'_, I> {
    fn can_advance(&self, stage: StageId) -> GateResult {
        GateEvaluator::can_advance(self, stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValidationCoverage;
    use stagehand_review::{ManualReviewJob, ReviewComplexity, ReviewQueue};
    use stagehand_utils::types::{
        ComplexityTier, Connection, ConnectionKind, ConnectionTestResult,
    };
    use stagehand_waves::{JobsByTier, WaveScheduler};

    #[derive(Default)]
    struct Fixture {
        connections: Vec<Connection>,
        inventory: usize,
        waves: WaveScheduler,
        reviews: ReviewQueue,
        validation: ValidationCoverage,
        min_pass_rate: Option<f64>,
    }

    impl GateInputs for Fixture {
        fn connections(&self) -> &[Connection] {
            &self.connections
        }
        fn inventory_size(&self) -> usize {
            self.inventory
        }
        fn waves(&self) -> &WaveScheduler {
            &self.waves
        }
        fn reviews(&self) -> &ReviewQueue {
            &self.reviews
        }
        fn validation(&self) -> ValidationCoverage {
            self.validation
        }
        fn min_pass_rate(&self) -> Option<f64> {
            self.min_pass_rate
        }
    }

    fn jobs(low: usize, medium: usize, high: usize) -> JobsByTier {
        let mut jobs = JobsByTier::new();
        for (tier, n) in [
            (ComplexityTier::Low, low),
            (ComplexityTier::Medium, medium),
            (ComplexityTier::High, high),
        ] {
            jobs.insert(tier, (0..n).map(|i| format!("{tier}_{i:02}")).collect());
        }
        jobs
    }

    #[test]
    fn test_setup_and_completion_have_no_preconditions() {
        let fixture = Fixture::default();
        let gate = GateEvaluator::new(&fixture);
        for stage in [StageId::Setup, StageId::Completion] {
            let result = gate.can_advance(stage);
            assert!(result.passed);
            assert!(result.conditions.is_empty());
            assert!(result.ensure_passed().is_ok());
        }
    }

    #[test]
    fn test_analysis_requires_ready_connections() {
        let mut fixture = Fixture {
            connections: vec![
                Connection::new("ora_src", ConnectionKind::Oracle, true),
                Connection::new("landing", ConnectionKind::FlatFile, true),
                Connection::new("audit", ConnectionKind::Postgresql, false),
            ],
            ..Fixture::default()
        };

        let result = GateEvaluator::new(&fixture).can_advance(StageId::Analysis);
        assert!(!result.passed);
        assert_eq!(result.conditions.len(), 2);
        assert_eq!(
            result.failure_reasons,
            vec!["Required connection 'ora_src' is not ready (untested)".to_string()]
        );

        fixture.connections[0].record_test(ConnectionTestResult::failed("ORA-12541"));
        let result = GateEvaluator::new(&fixture).can_advance(StageId::Analysis);
        assert!(result.failure_reasons[0].contains("test failed: ORA-12541"));

        fixture.connections[0].record_test(ConnectionTestResult::passed("ok"));
        let result = GateEvaluator::new(&fixture).can_advance(StageId::Analysis);
        assert!(result.passed, "{:?}", result.failure_reasons);
    }

    #[test]
    fn test_discovery_requires_jobs() {
        let mut fixture = Fixture::default();
        let err = GateEvaluator::new(&fixture)
            .can_advance(StageId::Discovery)
            .ensure_passed()
            .unwrap_err();
        assert_eq!(
            err,
            stagehand_utils::error::PipelineError::GateNotSatisfied {
                stage: StageId::Discovery,
                reasons: vec!["Job inventory is empty".to_string()],
            }
        );

        fixture.inventory = 3;
        assert!(GateEvaluator::new(&fixture).can_advance(StageId::Discovery).passed);
    }

    #[test]
    fn test_conversion_requires_planned_waves() {
        let fixture = Fixture::default();
        let result = GateEvaluator::new(&fixture).can_advance(StageId::Conversion);
        assert!(!result.passed);
        assert_eq!(
            result.failure_reasons,
            vec!["Conversion waves have not been planned".to_string()]
        );
    }

    #[test]
    fn test_conversion_requires_both_tracks() {
        let mut fixture = Fixture::default();
        fixture.waves.initialize(&jobs(15, 42, 8)).unwrap();
        for name in ["medium_03", "high_01"] {
            fixture
                .reviews
                .enqueue(ManualReviewJob::new(name, "custom code", ReviewComplexity::High))
                .unwrap();
        }

        for _ in 0..10 {
            fixture.waves.advance_unit();
        }
        let result = GateEvaluator::new(&fixture).can_advance(StageId::Conversion);
        assert!(!result.passed);
        assert_eq!(
            result.failure_reasons[0],
            "3 of 3 wave(s) not completed (10 of 65 jobs converted)"
        );

        for _ in 10..65 {
            fixture.waves.advance_unit();
        }
        let result = GateEvaluator::new(&fixture).can_advance(StageId::Conversion);
        assert!(!result.passed);
        assert_eq!(
            result.failure_reasons,
            vec!["2 manual review job(s) pending".to_string()]
        );

        for name in ["medium_03", "high_01"] {
            for _ in 0..3 {
                fixture.reviews.advance_step(name).unwrap();
            }
        }
        let result = GateEvaluator::new(&fixture).can_advance(StageId::Conversion);
        assert!(result.passed, "{:?}", result.failure_reasons);
        assert_eq!(result.conditions.len(), 3);
    }

    #[test]
    fn test_validation_coverage_and_pass_rate() {
        let mut fixture = Fixture {
            validation: ValidationCoverage {
                converted: 10,
                recorded: 8,
                passed: 8,
            },
            ..Fixture::default()
        };
        let result = GateEvaluator::new(&fixture).can_advance(StageId::Validation);
        assert_eq!(
            result.failure_reasons,
            vec!["2 converted job(s) have no validation result".to_string()]
        );

        fixture.validation = ValidationCoverage {
            converted: 10,
            recorded: 10,
            passed: 9,
        };
        assert!(GateEvaluator::new(&fixture).can_advance(StageId::Validation).passed);

        fixture.min_pass_rate = Some(95.0);
        let result = GateEvaluator::new(&fixture).can_advance(StageId::Validation);
        assert!(!result.passed);
        assert_eq!(
            result.failure_reasons,
            vec!["Validation pass rate 90.0% is below the required 95.0%".to_string()]
        );
    }

    #[test]
    fn test_closure_is_a_stage_gate() {
        let gate = |stage: StageId| GateResult {
            stage,
            passed: false,
            summary: "blocked".to_string(),
            conditions: vec![],
            failure_reasons: vec!["blocked".to_string()],
        };
        assert!(!StageGate::can_advance(&gate, StageId::Setup).passed);
    }
}
