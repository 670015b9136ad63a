//! Human-readable analysis report

use crate::experiment::{TestResult, TestStatus};
use crate::pipeline::{ExperimentAnalysis, PowerBasis, PowerCheck};
use crate::recommendation::{LaunchDecision, Recommendation};

fn percent(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}%", v * 100.0))
        .unwrap_or_else(|| "n/a".to_string())
}

fn signed_percent(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:+.2}%", v * 100.0))
        .unwrap_or_else(|| "n/a".to_string())
}

fn format_result(result: &TestResult) -> String {
    match result.status {
        TestStatus::InsufficientData => format!(
            "  {:<10} insufficient data (control n={}, treatment n={})\n",
            result.segment, result.control.n, result.treatment.n
        ),
        status => {
            let marker = if result.significant_adjusted {
                "**"
            } else if result.significant {
                "*"
            } else {
                ""
            };
            let ci = result
                .confidence_interval
                .map(|c| format!("[{:+.4}, {:+.4}]", c.lower, c.upper))
                .unwrap_or_default();
            let z = match status {
                TestStatus::NoVariance => "no variance".to_string(),
                _ => format!("z={:+.3}", result.z_statistic.unwrap_or_default()),
            };
            format!(
                "  {:<10} {} -> {} ({} abs, {} rel) {} p={:.4} {}{}\n",
                result.segment,
                percent(result.control_rate()),
                percent(result.treatment_rate()),
                signed_percent(result.absolute_effect),
                signed_percent(result.relative_effect),
                z,
                result.p_value,
                ci,
                marker
            )
        }
    }
}

/// Render the full report
pub fn to_report_string(analysis: &ExperimentAnalysis, recommendation: &Recommendation) -> String {
    let mut report = String::new();

    // Verdict header
    match recommendation.decision {
        LaunchDecision::Launch => report.push_str("✅ "),
        LaunchDecision::ExtendTest => report.push_str("⏳ "),
        LaunchDecision::StopExperiment | LaunchDecision::DoNotLaunch => report.push_str("❌ "),
    }
    report.push_str(recommendation.decision.describe());
    report.push_str("\n\n");

    // Data quality
    let validation = &analysis.validation;
    report.push_str("🔍 Data Quality:\n");
    report.push_str(&format!("  Records loaded: {}\n", validation.total_records));
    report.push_str(&format!(
        "  Duplicate ids: {} ({} rows)\n",
        validation.duplicates.duplicate_ids(),
        validation.duplicates.duplicate_rows()
    ));
    report.push_str(&format!(
        "  Misassigned records: {}{}\n",
        validation.misassignment.count,
        if validation.misassignment_warning {
            "  ⚠️"
        } else {
            ""
        }
    ));
    report.push_str(&format!("  Missing values: {}\n", validation.missing.total()));
    report.push_str(&format!(
        "  Group balance: {} control / {} treatment (ratio {:.3}){}\n",
        validation.balance.control,
        validation.balance.treatment,
        validation.balance.ratio,
        if validation.balance.balanced {
            ""
        } else {
            "  ⚠️"
        }
    ));
    if let Some((first, last)) = validation.observation_window {
        report.push_str(&format!("  Observation window: {} to {}\n", first, last));
    }
    report.push_str(&format!(
        "  Analyzed after cleaning: {} (removed {} duplicates, {} misassigned)\n",
        analysis.cleaning.analyzed_records,
        analysis.cleaning.removed_duplicates,
        analysis.cleaning.removed_misassigned
    ));

    // Power
    report.push_str("\n⚡ Power Analysis:\n");
    match &analysis.power {
        PowerCheck::Computed { basis, result } => {
            let basis = match basis {
                PowerBasis::Planned => "planned",
                PowerBasis::Observed => "observed",
            };
            report.push_str(&format!(
                "  Effect: {:+.4} ({}), Cohen's h = {:.4}\n",
                result.minimum_detectable_effect, basis, result.effect_size
            ));
            report.push_str(&format!(
                "  Required per group: {}\n",
                result.required_sample_size
            ));
            report.push_str(&format!(
                "  Achieved power: {:.3} (target {:.2}){}\n",
                result.achieved_power,
                result.target_power,
                if result.adequately_powered {
                    ""
                } else {
                    "  ⚠️"
                }
            ));
        }
        PowerCheck::Skipped { reason } => {
            report.push_str(&format!("  Skipped: {}\n", reason));
        }
    }

    // Statistical tests
    let results = &analysis.results;
    report.push_str("\n📊 Statistical Tests:\n");
    report.push_str(&format!(
        "  alpha={} adjusted_alpha={:.4} ({} segment comparisons)\n",
        results.alpha, results.adjusted_alpha, results.comparisons
    ));
    for result in &results.results {
        report.push_str(&format_result(result));
    }
    report.push_str("  (* significant, ** significant after Bonferroni correction)\n");

    // Impact
    if !recommendation.negative_segments.is_empty() {
        report.push_str(&format!(
            "\n📉 Negative segments: {}\n",
            recommendation.negative_segments.join(", ")
        ));
    }
    if let Some(change) = recommendation.projected_change {
        report.push_str(&format!(
            "\nProjected change: {:+.0} conversions (from {})\n",
            change, recommendation.current_conversions
        ));
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use crate::experiment::AnalysisConfig;
    use crate::observation::{Group, Observation, Variant};
    use crate::pipeline::{analyze, CleaningPlan};
    use crate::recommendation::ImpactThresholds;

    fn render(treatment_every: usize) -> String {
        let mut observations = Vec::new();
        for i in 0..1000 {
            observations.push(
                Observation::new(format!("c{}", i), Group::Control, Variant::Old, i % 10 == 0)
                    .with_segment("US"),
            );
            observations.push(
                Observation::new(
                    format!("t{}", i),
                    Group::Treatment,
                    Variant::New,
                    i % treatment_every == 0,
                )
                .with_segment("US"),
            );
        }
        observations.push(Observation::new("c0", Group::Control, Variant::Old, false));

        let analysis = analyze(
            &Dataset::new(observations),
            &AnalysisConfig::default(),
            CleaningPlan::default(),
        )
        .unwrap();
        let recommendation =
            Recommendation::from_results(&analysis.results, &ImpactThresholds::default());
        to_report_string(&analysis, &recommendation)
    }

    #[test]
    fn test_report_sections() {
        let report = render(7);
        assert!(report.contains("Data Quality"));
        assert!(report.contains("Duplicate ids: 1 (2 rows)"));
        assert!(report.contains("Power Analysis"));
        assert!(report.contains("Statistical Tests"));
        assert!(report.contains("overall"));
        assert!(report.contains("US"));
    }

    #[test]
    fn test_report_launch_header() {
        let report = render(7);
        assert!(report.starts_with("✅ Launch"), "{}", report);
    }

    #[test]
    fn test_report_no_effect_skips_power() {
        let report = render(10);
        assert!(report.contains("Skipped"));
        assert!(report.starts_with("⏳ Extend"));
    }
}
