//! Launch recommendation from test results
//!
//! Classifies each segment's relative effect into an impact category and
//! derives a launch decision for the experiment as a whole:
//!
//! 1. two or more segments with a negative effect: do not launch
//! 2. overall relative effect below the stop threshold: stop the experiment
//! 3. overall effect significant and above the positive threshold: launch
//! 4. otherwise: extend the test
//!
//! The projected impact scales the overall relative effect by the conversions
//! already observed, as a rough size of what rolling out would change.

use crate::experiment::{ResultSet, TestResult, TestStatus};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Impact of a segment's relative effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactCategory {
    Critical,
    Warning,
    Neutral,
    Positive,
}

impl ImpactCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactCategory::Critical => "critical",
            ImpactCategory::Warning => "warning",
            ImpactCategory::Neutral => "neutral",
            ImpactCategory::Positive => "positive",
        }
    }
}

/// Overall launch decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchDecision {
    DoNotLaunch,
    StopExperiment,
    Launch,
    ExtendTest,
}

impl LaunchDecision {
    pub fn describe(&self) -> &'static str {
        match self {
            LaunchDecision::DoNotLaunch => {
                "Do not launch: multiple segments show a negative effect"
            }
            LaunchDecision::StopExperiment => "Stop the experiment: overall effect is negative",
            LaunchDecision::Launch => "Launch: overall effect is positive and significant",
            LaunchDecision::ExtendTest => "Extend the test: results are inconclusive",
        }
    }
}

/// Relative-effect thresholds for classification and decisions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpactThresholds {
    /// Below this relative effect a segment is critical
    pub critical: f64,
    /// Above this relative effect a segment is positive
    pub positive: f64,
    /// Overall relative effect below this stops the experiment
    pub stop: f64,
    /// Negative segments needed to block a launch
    pub max_negative_segments: usize,
}

impl Default for ImpactThresholds {
    fn default() -> Self {
        Self {
            critical: -0.02,
            positive: 0.02,
            stop: -0.01,
            max_negative_segments: 2,
        }
    }
}

impl ImpactThresholds {
    pub fn classify(&self, relative_effect: f64) -> ImpactCategory {
        if relative_effect < self.critical {
            ImpactCategory::Critical
        } else if relative_effect < 0.0 {
            ImpactCategory::Warning
        } else if relative_effect > self.positive {
            ImpactCategory::Positive
        } else {
            ImpactCategory::Neutral
        }
    }
}

/// Impact assessment for one segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentImpact {
    pub segment: String,
    /// None when the relative effect is undefined
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<ImpactCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative_effect: Option<f64>,
    pub significant_adjusted: bool,
}

/// Launch recommendation for a result set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub decision: LaunchDecision,
    pub overall: Option<SegmentImpact>,
    pub segments: Vec<SegmentImpact>,
    /// Segments with a negative relative effect, in result order
    pub negative_segments: Vec<String>,
    /// Conversions observed across both arms
    pub current_conversions: u64,
    /// Expected change in conversions if the treatment rolled out
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projected_change: Option<f64>,
}

impl Recommendation {
    pub fn from_results(results: &ResultSet, thresholds: &ImpactThresholds) -> Self {
        let impact = |r: &TestResult| {
            let relative_effect = match r.status {
                TestStatus::InsufficientData => None,
                _ => r.relative_effect,
            };
            SegmentImpact {
                segment: r.segment.clone(),
                category: relative_effect.map(|e| thresholds.classify(e)),
                relative_effect,
                significant_adjusted: r.significant_adjusted,
            }
        };

        let overall_result = results.overall();
        let overall = overall_result.map(impact);
        let segments: Vec<SegmentImpact> = results.segments().map(impact).collect();

        let negative_segments: Vec<String> = segments
            .iter()
            .filter(|s| s.relative_effect.is_some_and(|e| e < 0.0))
            .map(|s| s.segment.clone())
            .collect();

        let overall_effect = overall.as_ref().and_then(|o| o.relative_effect);
        let overall_significant = overall_result.is_some_and(|r| r.significant);

        let decision = if negative_segments.len() >= thresholds.max_negative_segments {
            LaunchDecision::DoNotLaunch
        } else if overall_effect.is_some_and(|e| e < thresholds.stop) {
            LaunchDecision::StopExperiment
        } else if overall_significant && overall_effect.is_some_and(|e| e > thresholds.positive) {
            LaunchDecision::Launch
        } else {
            LaunchDecision::ExtendTest
        };

        let current_conversions = overall_result
            .map(|r| r.control.conversions + r.treatment.conversions)
            .unwrap_or(0);
        let projected_change = overall_effect.map(|e| e * current_conversions as f64);

        debug!(?decision, negative = negative_segments.len(), "recommendation");

        Self {
            decision,
            overall,
            segments,
            negative_segments,
            current_conversions,
            projected_change,
        }
    }
}
