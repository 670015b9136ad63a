// Segment partitioning and descriptive summaries
//
// Segments are resolved once, at partition time, into a fixed ordered set
// (BTreeMap, sorted by label). Every later stage iterates that set rather
// than re-deriving groups per statistic, so output ordering is identical
// across runs on identical input.

use crate::experiment::error::{AnalysisError, Result};
use crate::observation::{Group, Observation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Label of the synthetic segment spanning all data
pub const OVERALL: &str = "overall";

/// Aggregate for one (segment, group) pair
///
/// Invariant: `conversions <= n`. The rate is undefined (not zero) when `n = 0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentSample {
    /// Sample size
    pub n: u64,
    /// Conversion count
    pub conversions: u64,
}

impl SegmentSample {
    pub fn new(n: u64, conversions: u64) -> Result<Self> {
        if conversions > n {
            return Err(AnalysisError::InvalidArgument(format!(
                "conversion count {} exceeds sample size {}",
                conversions, n
            )));
        }
        Ok(Self { n, conversions })
    }

    /// Conversion rate `x / n`, `None` when the sample is empty
    pub fn rate(&self) -> Option<f64> {
        (self.n > 0).then(|| self.conversions as f64 / self.n as f64)
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    fn record(&mut self, converted: bool) {
        self.n += 1;
        if converted {
            self.conversions += 1;
        }
    }
}

/// Control and treatment aggregates for one segment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentPair {
    pub control: SegmentSample,
    pub treatment: SegmentSample,
}

impl SegmentPair {
    pub fn new(control: SegmentSample, treatment: SegmentSample) -> Self {
        Self { control, treatment }
    }

    pub fn get(&self, group: Group) -> &SegmentSample {
        match group {
            Group::Control => &self.control,
            Group::Treatment => &self.treatment,
        }
    }

    fn get_mut(&mut self, group: Group) -> &mut SegmentSample {
        match group {
            Group::Control => &mut self.control,
            Group::Treatment => &mut self.treatment,
        }
    }

    pub fn total(&self) -> u64 {
        self.control.n + self.treatment.n
    }
}

/// Observations partitioned into the overall segment plus named segments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentPartition {
    pub overall: SegmentPair,
    /// Named segments, sorted by label
    pub segments: BTreeMap<String, SegmentPair>,
    /// Records left out because the group or conversion outcome is missing
    pub excluded: u64,
}

impl SegmentPartition {
    /// Aggregate observations into per-segment, per-group samples
    ///
    /// Records without a segment label contribute to "overall" only.
    pub fn from_observations(observations: &[Observation]) -> Self {
        let mut partition = SegmentPartition::default();

        for obs in observations {
            let (Some(group), Some(converted)) = (obs.group, obs.converted) else {
                partition.excluded += 1;
                continue;
            };

            partition.overall.get_mut(group).record(converted);

            if let Some(label) = obs.segment.as_deref() {
                partition
                    .segments
                    .entry(label.to_string())
                    .or_default()
                    .get_mut(group)
                    .record(converted);
            }
        }

        debug!(
            segments = partition.segments.len(),
            excluded = partition.excluded,
            "partitioned observations"
        );

        partition
    }

    /// Build a partition directly from pre-aggregated pairs
    pub fn from_pairs(
        overall: SegmentPair,
        segments: impl IntoIterator<Item = (String, SegmentPair)>,
    ) -> Self {
        Self {
            overall,
            segments: segments.into_iter().collect(),
            excluded: 0,
        }
    }

    /// Overall first, then named segments in label order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SegmentPair)> {
        std::iter::once((OVERALL, &self.overall))
            .chain(self.segments.iter().map(|(k, v)| (k.as_str(), v)))
    }

    /// Descriptive summary of rates and sample shares
    pub fn describe(&self) -> DescriptiveSummary {
        let total = self.overall.total();
        let rows = self
            .iter()
            .map(|(label, pair)| SegmentSummary {
                segment: label.to_string(),
                control_n: pair.control.n,
                treatment_n: pair.treatment.n,
                control_rate: pair.control.rate(),
                treatment_rate: pair.treatment.rate(),
                share_of_total: (total > 0).then(|| pair.total() as f64 / total as f64),
            })
            .collect();

        let conversions = self.overall.control.conversions + self.overall.treatment.conversions;

        DescriptiveSummary {
            total_observations: total,
            total_conversions: conversions,
            overall_rate: (total > 0).then(|| conversions as f64 / total as f64),
            excluded: self.excluded,
            segments: rows,
        }
    }
}

/// Rates and sizes for one segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSummary {
    pub segment: String,
    pub control_n: u64,
    pub treatment_n: u64,
    pub control_rate: Option<f64>,
    pub treatment_rate: Option<f64>,
    /// Fraction of all partitioned observations falling in this segment
    pub share_of_total: Option<f64>,
}

/// Descriptive statistics of a partition, overall row first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptiveSummary {
    pub total_observations: u64,
    pub total_conversions: u64,
    pub overall_rate: Option<f64>,
    pub excluded: u64,
    pub segments: Vec<SegmentSummary>,
}
