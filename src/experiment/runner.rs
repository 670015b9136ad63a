// Multi-segment testing with Bonferroni correction
//
// Runs the z-test once for "overall" and once per named segment. The overall
// test is the primary comparison; segment tests form the secondary family and
// are judged against alpha / k, where k counts only the segments that were
// actually tested. ResultSet states this with `overall_in_family = false`.
//
// Per-segment anomalies never abort the run: an empty arm becomes an
// InsufficientData marker and is left out of k.
//
// The primary result is always `results[0]`. It is identified by position,
// never by label, so a data segment that happens to be called "overall" is
// an ordinary member of the family.

use crate::experiment::config::AnalysisConfig;
use crate::experiment::error::Result;
use crate::experiment::proportion::confidence_interval;
use crate::experiment::segments::SegmentPartition;
use crate::experiment::ztest::{HypothesisTestEngine, TestResult, TestStatus};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Ordered test results: the overall comparison first, then segments by label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub results: Vec<TestResult>,
    pub alpha: f64,
    /// `alpha / comparisons`, or `alpha` when no segment was testable
    pub adjusted_alpha: f64,
    /// Segment-level comparisons counted in the Bonferroni family
    pub comparisons: usize,
    /// Whether the overall test counts toward the family (always false)
    pub overall_in_family: bool,
}

impl ResultSet {
    /// The primary comparison over all observations
    pub fn overall(&self) -> Option<&TestResult> {
        self.results.first()
    }

    /// Segment results, excluding the primary comparison
    pub fn segments(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().skip(1)
    }

    /// First result with this label, the primary comparison included
    pub fn get(&self, segment: &str) -> Option<&TestResult> {
        self.results.iter().find(|r| r.segment == segment)
    }

    /// Segment result with this label, never the primary comparison
    pub fn segment(&self, segment: &str) -> Option<&TestResult> {
        self.segments().find(|r| r.segment == segment)
    }

    /// Segments significant after Bonferroni correction
    pub fn significant_segments(&self) -> Vec<&str> {
        self.segments()
            .filter(|r| r.significant_adjusted)
            .map(|r| r.segment.as_str())
            .collect()
    }
}

/// Drives the hypothesis test engine across a partition
#[derive(Debug, Clone)]
pub struct MultiSegmentTestRunner {
    engine: HypothesisTestEngine,
    adjusted_intervals: bool,
}

impl MultiSegmentTestRunner {
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        Ok(Self {
            engine: HypothesisTestEngine::new(config.alpha, config.confidence_level)?,
            adjusted_intervals: config.adjusted_intervals,
        })
    }

    /// Run every segment test and apply the correction
    ///
    /// # Example
    /// ```
    /// use veredicto::experiment::{
    ///     AnalysisConfig, MultiSegmentTestRunner, SegmentPair, SegmentPartition, SegmentSample,
    /// };
    ///
    /// let pair = |c: (u64, u64), t: (u64, u64)| {
    ///     SegmentPair::new(
    ///         SegmentSample::new(c.0, c.1).unwrap(),
    ///         SegmentSample::new(t.0, t.1).unwrap(),
    ///     )
    /// };
    /// let partition = SegmentPartition::from_pairs(
    ///     pair((2000, 200), (2000, 260)),
    ///     [
    ///         ("UK".to_string(), pair((1000, 100), (1000, 120))),
    ///         ("US".to_string(), pair((1000, 100), (1000, 140))),
    ///     ],
    /// );
    ///
    /// let runner = MultiSegmentTestRunner::new(&AnalysisConfig::default()).unwrap();
    /// let results = runner.run(&partition).unwrap();
    /// assert_eq!(results.comparisons, 2);
    /// assert_eq!(results.adjusted_alpha, 0.025);
    /// assert_eq!(results.results[0].segment, "overall");
    /// ```
    pub fn run(&self, partition: &SegmentPartition) -> Result<ResultSet> {
        let mut results = Vec::with_capacity(partition.segments.len() + 1);

        for (label, pair) in partition.iter() {
            let result = match self.engine.test(label, pair.control, pair.treatment) {
                Ok(result) => result,
                Err(e) if e.is_recoverable() => {
                    warn!("{}; segment marked and excluded from correction", e);
                    TestResult::insufficient_data(label, pair.control, pair.treatment)
                }
                Err(e) => return Err(e),
            };
            debug!(
                segment = label,
                status = ?result.status,
                p_value = result.p_value,
                "segment tested"
            );
            results.push(result);
        }

        let comparisons = results
            .iter()
            .skip(1)
            .filter(|r| r.status.is_comparison())
            .count();

        let alpha = self.engine.alpha();
        let adjusted_alpha = if comparisons > 0 {
            alpha / comparisons as f64
        } else {
            alpha
        };

        for result in results.iter_mut().skip(1) {
            result.significant_adjusted =
                result.status == TestStatus::Tested && result.p_value < adjusted_alpha;

            if self.adjusted_intervals && result.status != TestStatus::InsufficientData {
                if let (Some(p_c), Some(p_t)) = (result.control.rate(), result.treatment.rate()) {
                    result.confidence_interval = Some(confidence_interval(
                        p_c,
                        result.control.n,
                        p_t,
                        result.treatment.n,
                        1.0 - adjusted_alpha,
                    )?);
                }
            }
        }

        info!(
            segments = results.len() - 1,
            comparisons, adjusted_alpha, "applied Bonferroni correction"
        );

        Ok(ResultSet {
            results,
            alpha,
            adjusted_alpha,
            comparisons,
            overall_in_family: false,
        })
    }
}
