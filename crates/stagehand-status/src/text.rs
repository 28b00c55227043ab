//! Plain-text rendering of snapshots for the terminal

use std::fmt::Write;

use stagehand_utils::types::StageStatus;

use crate::snapshot::PipelineSnapshot;

fn status_marker(status: StageStatus) -> &'static str {
    match status {
        StageStatus::Completed => "[x]",
        StageStatus::InProgress => "[>]",
        StageStatus::Pending => "[ ]",
    }
}

fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.1}%"))
}

/// Short status view: stages, waves and the review queue.
#[must_use]
pub fn render_status(snapshot: &PipelineSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Project: {} ({})",
        snapshot.project_name, snapshot.project_id
    );
    let _ = writeln!(
        out,
        "Current stage: {} ({}% overall)",
        snapshot.current_stage.title(),
        snapshot.overall_progress
    );
    out.push('\n');

    for stage in &snapshot.stages {
        let _ = write!(
            out,
            "  {} {:<16} {:>3}%",
            status_marker(stage.status),
            stage.id.title(),
            stage.progress
        );
        if !stage.message.is_empty() && stage.status == StageStatus::InProgress {
            let _ = write!(out, "  {}", stage.message);
        }
        out.push('\n');
    }

    if !snapshot.waves.is_empty() {
        let _ = writeln!(out, "\nWaves ({}% converted):", snapshot.conversion_progress);
        for wave in &snapshot.waves {
            let _ = write!(
                out,
                "  Wave {} [{}] {:<10} {}/{} converted, {} optimized",
                wave.id(),
                wave.tier(),
                wave.status(),
                wave.converted_count(),
                wave.job_count(),
                wave.optimized_count()
            );
            let awaiting = wave.awaiting_review().count();
            if awaiting > 0 {
                let _ = write!(out, ", {awaiting} awaiting review");
            }
            out.push('\n');
        }
    }

    if !snapshot.manual_reviews.is_empty() {
        let _ = writeln!(
            out,
            "\nManual reviews ({}/{} complete):",
            snapshot.summary.manual_completed,
            snapshot.manual_reviews.len()
        );
        for review in &snapshot.manual_reviews {
            let _ = writeln!(
                out,
                "  {:<24} {:<10} {} ({})",
                review.name,
                review.wizard_step(),
                review.complexity,
                review.reason
            );
        }
    }

    out
}

/// Migration report: summary numbers, jobs by confidence, validation.
#[must_use]
pub fn render_report(snapshot: &PipelineSnapshot) -> String {
    let summary = &snapshot.summary;
    let mut out = String::new();

    let _ = writeln!(out, "Migration report: {}", snapshot.project_name);
    let _ = writeln!(out, "Generated: {}", snapshot.emitted_at.to_rfc3339());
    out.push('\n');
    let _ = writeln!(
        out,
        "Jobs converted:      {}/{}",
        summary.converted_jobs, summary.total_jobs
    );
    let _ = writeln!(out, "Automated:           {}", summary.automated_jobs);
    let _ = writeln!(
        out,
        "Manual:              {} ({} complete)",
        summary.manual_jobs, summary.manual_completed
    );
    let _ = writeln!(out, "Automation rate:     {}", percent(summary.automation_rate));
    let _ = writeln!(
        out,
        "Average confidence:  {}",
        summary
            .average_confidence
            .map_or_else(|| "n/a".to_string(), |v| format!("{v:.1}"))
    );
    let _ = writeln!(
        out,
        "Validation pass:     {}",
        percent(summary.validation_pass_rate)
    );

    if !summary.confidence_distribution.is_empty() {
        out.push_str("\nConfidence distribution:\n");
        for (level, count) in summary.confidence_distribution.iter().rev() {
            let _ = writeln!(out, "  {:<10} {count}", level.as_str());
        }
    }

    if !snapshot.jobs.is_empty() {
        out.push_str("\nJobs:\n");
        for job in &snapshot.jobs {
            let _ = writeln!(
                out,
                "  {:<24} wave {} {:>5.1} {:<9} {}",
                job.name,
                job.wave,
                job.confidence_score,
                job.confidence_level.as_str(),
                job.conversion_method
            );
            for warning in &job.warnings {
                let _ = writeln!(out, "      warning: {warning}");
            }
        }
    }

    let failed: Vec<_> = snapshot.validation.iter().filter(|r| !r.passed).collect();
    if !failed.is_empty() {
        out.push_str("\nValidation failures:\n");
        for record in failed {
            let _ = writeln!(
                out,
                "  {}: {}",
                record.job,
                record.detail.as_deref().unwrap_or("failed")
            );
        }
    }

    out
}
