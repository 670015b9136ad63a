// Two-proportion z-test for a single segment
//
// The test statistic uses the pooled standard error (variance under the
// null of no difference); the reported interval uses the unpooled standard
// error of the observed difference.
//
//   z = (p_t − p_c) / SE_pooled
//   p = 2·(1 − Φ(|z|))
//
// A pooled rate of exactly 0 or 1 leaves z undefined. That is a legitimate
// outcome (no conversions anywhere, or all conversions), so it is reported
// as a no-variance result with p = 1 rather than as an error.

use crate::experiment::config::check_open_unit;
use crate::experiment::error::{AnalysisError, Result};
use crate::experiment::proportion::{
    confidence_interval, pooled_rate, standard_error, two_sided_p_value, ConfidenceInterval,
};
use crate::experiment::segments::SegmentSample;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How a segment's test concluded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    /// Numeric z-test performed
    Tested,
    /// Pooled rate of 0 or 1; the statistic is undefined, p reported as 1
    NoVariance,
    /// One arm has no observations; excluded from the comparison family
    InsufficientData,
}

impl TestStatus {
    /// Whether the result counts as a comparison in the Bonferroni family
    pub fn is_comparison(&self) -> bool {
        !matches!(self, TestStatus::InsufficientData)
    }
}

/// Result of one segment's hypothesis test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub segment: String,
    pub control: SegmentSample,
    pub treatment: SegmentSample,
    pub status: TestStatus,
    /// `p_treatment − p_control`
    pub absolute_effect: Option<f64>,
    /// `absolute / p_control`, undefined when `p_control = 0`
    pub relative_effect: Option<f64>,
    pub z_statistic: Option<f64>,
    /// Two-sided p-value
    pub p_value: f64,
    pub confidence_interval: Option<ConfidenceInterval>,
    /// `p_value < alpha`
    pub significant: bool,
    /// `p_value < adjusted_alpha`, set by the multi-segment runner
    pub significant_adjusted: bool,
}

impl TestResult {
    /// Marker for a segment where an arm is empty
    pub fn insufficient_data(
        segment: impl Into<String>,
        control: SegmentSample,
        treatment: SegmentSample,
    ) -> Self {
        Self {
            segment: segment.into(),
            control,
            treatment,
            status: TestStatus::InsufficientData,
            absolute_effect: None,
            relative_effect: None,
            z_statistic: None,
            p_value: 1.0,
            confidence_interval: None,
            significant: false,
            significant_adjusted: false,
        }
    }

    pub fn control_rate(&self) -> Option<f64> {
        self.control.rate()
    }

    pub fn treatment_rate(&self) -> Option<f64> {
        self.treatment.rate()
    }
}

/// Two-sided two-proportion z-test
#[derive(Debug, Clone, Copy)]
pub struct HypothesisTestEngine {
    alpha: f64,
    confidence_level: f64,
}

impl HypothesisTestEngine {
    pub fn new(alpha: f64, confidence_level: f64) -> Result<Self> {
        check_open_unit("alpha", alpha)?;
        check_open_unit("confidence_level", confidence_level)?;
        Ok(Self {
            alpha,
            confidence_level,
        })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn confidence_level(&self) -> f64 {
        self.confidence_level
    }

    /// Compare treatment against control for one segment
    ///
    /// # Errors
    /// `InsufficientData` when either arm has `n = 0`.
    ///
    /// # Example
    /// ```
    /// use veredicto::experiment::{HypothesisTestEngine, SegmentSample};
    ///
    /// let engine = HypothesisTestEngine::new(0.05, 0.95).unwrap();
    /// let control = SegmentSample::new(1000, 100).unwrap();
    /// let treatment = SegmentSample::new(1000, 140).unwrap();
    ///
    /// let result = engine.test("overall", control, treatment).unwrap();
    /// assert!(result.significant);
    /// assert!(result.p_value < 0.01);
    /// ```
    pub fn test(
        &self,
        segment: &str,
        control: SegmentSample,
        treatment: SegmentSample,
    ) -> Result<TestResult> {
        let (Some(p_c), Some(p_t)) = (control.rate(), treatment.rate()) else {
            let empty = if control.is_empty() { "control" } else { "treatment" };
            return Err(AnalysisError::InsufficientData {
                segment: segment.to_string(),
                reason: format!("{} arm has no observations", empty),
            });
        };

        let absolute = p_t - p_c;
        let relative = (p_c > 0.0).then(|| absolute / p_c);
        let interval =
            confidence_interval(p_c, control.n, p_t, treatment.n, self.confidence_level)?;

        let pooled = pooled_rate(
            control.conversions,
            control.n,
            treatment.conversions,
            treatment.n,
        )?;
        let se = standard_error(pooled, control.n, treatment.n)?;

        if pooled == 0.0 || pooled == 1.0 || se == 0.0 {
            debug!(segment, pooled, "no variance in segment");
            return Ok(TestResult {
                segment: segment.to_string(),
                control,
                treatment,
                status: TestStatus::NoVariance,
                absolute_effect: Some(absolute),
                relative_effect: relative,
                z_statistic: None,
                p_value: 1.0,
                confidence_interval: Some(interval),
                significant: false,
                significant_adjusted: false,
            });
        }

        let z = absolute / se;
        let p_value = two_sided_p_value(z)?;
        let significant = p_value < self.alpha;

        Ok(TestResult {
            segment: segment.to_string(),
            control,
            treatment,
            status: TestStatus::Tested,
            absolute_effect: Some(absolute),
            relative_effect: relative,
            z_statistic: Some(z),
            p_value,
            confidence_interval: Some(interval),
            significant,
            significant_adjusted: significant,
        })
    }
}
