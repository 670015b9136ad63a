//! CSV output format for segment test results
//!
//! One row per tested segment ("overall" first), for spreadsheet analysis
//! and machine parsing. Undefined values are written as empty fields.

use crate::experiment::{ResultSet, TestResult, TestStatus};
use anyhow::Result;

/// CSV formatter for a result set
#[derive(Debug)]
pub struct CsvOutput<'a> {
    results: &'a ResultSet,
}

impl<'a> CsvOutput<'a> {
    pub fn new(results: &'a ResultSet) -> Self {
        Self { results }
    }

    /// Header row
    fn header() -> [&'static str; 17] {
        [
            "segment",
            "status",
            "control_n",
            "control_conversions",
            "control_rate",
            "treatment_n",
            "treatment_conversions",
            "treatment_rate",
            "absolute_effect",
            "relative_effect",
            "z_statistic",
            "p_value",
            "ci_lower",
            "ci_upper",
            "ci_level",
            "significant",
            "significant_adjusted",
        ]
    }

    fn status_label(status: TestStatus) -> &'static str {
        match status {
            TestStatus::Tested => "tested",
            TestStatus::NoVariance => "no_variance",
            TestStatus::InsufficientData => "insufficient_data",
        }
    }

    fn optional(value: Option<f64>) -> String {
        value.map(|v| v.to_string()).unwrap_or_default()
    }

    /// Format a test result as CSV fields
    fn format_result(result: &TestResult) -> Vec<String> {
        let ci = result.confidence_interval;
        vec![
            result.segment.clone(),
            Self::status_label(result.status).to_string(),
            result.control.n.to_string(),
            result.control.conversions.to_string(),
            Self::optional(result.control_rate()),
            result.treatment.n.to_string(),
            result.treatment.conversions.to_string(),
            Self::optional(result.treatment_rate()),
            Self::optional(result.absolute_effect),
            Self::optional(result.relative_effect),
            Self::optional(result.z_statistic),
            result.p_value.to_string(),
            Self::optional(ci.map(|c| c.lower)),
            Self::optional(ci.map(|c| c.upper)),
            Self::optional(ci.map(|c| c.level)),
            result.significant.to_string(),
            result.significant_adjusted.to_string(),
        ]
    }

    /// Generate CSV output as string
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(Self::header())?;

        for result in &self.results.results {
            writer.write_record(Self::format_result(result))?;
        }

        let bytes = writer.into_inner().map_err(|e| anyhow::anyhow!(e.to_string()))?;
        Ok(String::from_utf8(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::{
        AnalysisConfig, MultiSegmentTestRunner, SegmentPair, SegmentPartition, SegmentSample,
    };

    fn pair(c: (u64, u64), t: (u64, u64)) -> SegmentPair {
        SegmentPair::new(
            SegmentSample::new(c.0, c.1).unwrap(),
            SegmentSample::new(t.0, t.1).unwrap(),
        )
    }

    fn results() -> ResultSet {
        let partition = SegmentPartition::from_pairs(
            pair((1030, 103), (1000, 140)),
            [
                ("US".to_string(), pair((1000, 100), (1000, 140))),
                ("Bonaire, Sint Eustatius".to_string(), pair((30, 3), (0, 0))),
            ],
        );
        MultiSegmentTestRunner::new(&AnalysisConfig::default())
            .unwrap()
            .run(&partition)
            .unwrap()
    }

    #[test]
    fn test_csv_header() {
        let results = results();
        let csv = CsvOutput::new(&results).to_csv().unwrap();
        let header = csv.lines().next().unwrap();
        assert!(header.starts_with("segment,status,control_n"));
        assert!(header.ends_with("significant,significant_adjusted"));
    }

    #[test]
    fn test_csv_one_row_per_result() {
        let results = results();
        let csv = CsvOutput::new(&results).to_csv().unwrap();
        assert_eq!(csv.lines().count(), 1 + results.results.len());
        assert!(csv.lines().nth(1).unwrap().starts_with("overall,tested"));
    }

    #[test]
    fn test_csv_escapes_labels_and_leaves_undefined_empty() {
        let results = results();
        let csv = CsvOutput::new(&results).to_csv().unwrap();
        let row = csv
            .lines()
            .find(|l| l.starts_with("\"Bonaire"))
            .unwrap();
        assert!(row.starts_with("\"Bonaire, Sint Eustatius\",insufficient_data,30,3,0.1,0,0,,"));
    }
}
