use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{LevelCounts, ScoredStudent, TrendSummary};

pub fn level_mix(scored: &[ScoredStudent]) -> LevelCounts {
    let mut counts = LevelCounts::default();
    for student in scored {
        counts.bump(student.assessment.level);
    }
    counts
}

pub fn build_report(
    scope: Option<&str>,
    cutoff: NaiveDate,
    scored: &[ScoredStudent],
    trend: &TrendSummary,
) -> String {
    let mut output = String::new();
    let scope_label = scope.unwrap_or("all students");

    let _ = writeln!(output, "# Student Risk Report");
    let _ = writeln!(
        output,
        "Generated for {} (assessments since {})",
        scope_label, cutoff
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Level Mix");

    if scored.is_empty() {
        let _ = writeln!(output, "No scored students in this scope.");
    } else {
        let mix = level_mix(scored);
        let _ = writeln!(output, "- critical: {}", mix.critical);
        let _ = writeln!(output, "- high: {}", mix.high);
        let _ = writeln!(output, "- medium: {}", mix.medium);
        let _ = writeln!(output, "- low: {}", mix.low);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Highest Risk Students");

    if scored.is_empty() {
        let _ = writeln!(output, "No scored students in this scope.");
    } else {
        for student in scored.iter().take(10) {
            let driver = student
                .assessment
                .top_factor()
                .map(|f| format!(", driven by {}", f.factor.as_str()))
                .unwrap_or_default();
            let _ = writeln!(
                output,
                "- {} ({}, {}) score {:.2} {}{}",
                student.full_name,
                student.email,
                student.cohort,
                student.assessment.score,
                student.assessment.level.as_str(),
                driver
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Trend");

    if trend.buckets.is_empty() {
        let _ = writeln!(output, "No assessment history for this window.");
    } else {
        let _ = writeln!(output, "Cohort direction: {}", trend.direction.as_str());
        for bucket in trend.buckets.iter() {
            match bucket.mean_score {
                Some(mean) => {
                    let _ = writeln!(
                        output,
                        "- {}: mean score {:.2} across {} assessments ({} critical, {} high, {} medium, {} low)",
                        bucket.period_start,
                        mean,
                        bucket.counts.total(),
                        bucket.counts.critical,
                        bucket.counts.high,
                        bucket.counts.medium,
                        bucket.counts.low
                    );
                }
                None => {
                    let _ = writeln!(output, "- {}: no assessments", bucket.period_start);
                }
            }
        }
    }

    output
}
