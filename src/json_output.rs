//! JSON output format for analysis reports

use crate::experiment::{
    AnalysisConfig, DescriptiveSummary, ResultSet, ValidationReport,
};
use crate::pipeline::{CleaningSummary, ExperimentAnalysis, PowerCheck};
use crate::recommendation::Recommendation;
use serde::{Deserialize, Serialize};

/// Validation findings, flattened for readers that only want counts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonValidationSummary {
    pub total_records: u64,
    pub duplicate_ids: usize,
    pub duplicate_rows: usize,
    pub misassigned: u64,
    pub misassignment_warning: bool,
    pub missing_values: u64,
    pub balanced: bool,
    pub balance_ratio: f64,
    /// Earliest and latest timestamp, formatted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation_window: Option<(String, String)>,
}

impl From<&ValidationReport> for JsonValidationSummary {
    fn from(report: &ValidationReport) -> Self {
        Self {
            total_records: report.total_records,
            duplicate_ids: report.duplicates.duplicate_ids(),
            duplicate_rows: report.duplicates.duplicate_rows(),
            misassigned: report.misassignment.count,
            misassignment_warning: report.misassignment_warning,
            missing_values: report.missing.total(),
            balanced: report.balance.balanced,
            balance_ratio: report.balance.ratio,
            observation_window: report
                .observation_window
                .map(|(lo, hi)| (lo.to_string(), hi.to_string())),
        }
    }
}

/// Complete JSON report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonReport {
    pub version: String,
    pub config: AnalysisConfig,
    pub validation: JsonValidationSummary,
    pub cleaning: CleaningSummary,
    pub summary: DescriptiveSummary,
    pub power: PowerCheck,
    pub tests: ResultSet,
    pub recommendation: Recommendation,
}

impl JsonReport {
    pub fn new(analysis: &ExperimentAnalysis, recommendation: &Recommendation) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            config: analysis.config.clone(),
            validation: JsonValidationSummary::from(&analysis.validation),
            cleaning: analysis.cleaning,
            summary: analysis.summary.clone(),
            power: analysis.power.clone(),
            tests: analysis.results.clone(),
            recommendation: recommendation.clone(),
        }
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
