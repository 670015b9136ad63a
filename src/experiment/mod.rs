// Statistical inference engine for two-arm experiments
//
// Pipeline of pure stages, each consuming the previous stage's output:
//
//   observations ─► DataIntegrityValidator ─► ValidationReport
//                └► SegmentPartition ─► DescriptiveSummary
//                                    ├► PowerAnalyzer ─► PowerResult
//                                    └► MultiSegmentTestRunner ─► ResultSet
//
// Configuration is an immutable AnalysisConfig passed into each stage. No
// stage keeps mutable state between calls, so re-running on identical input
// yields identical output, ordering included.
//
// Statistics:
// - Two-proportion z-test with pooled SE for the statistic and unpooled SE
//   for the interval
// - Cohen's h for effect size and normal-approximation power
// - Bonferroni correction over segment-level comparisons ("overall" is the
//   primary test and is not counted)
// - statrs provides the normal CDF and quantiles

mod config;
mod error;
pub mod power;
pub mod proportion;
mod runner;
mod segments;
mod validation;
mod ztest;

pub use config::AnalysisConfig;
pub use error::{AnalysisError, Result};
pub use power::{PowerAnalyzer, PowerResult};
pub use proportion::ConfidenceInterval;
pub use runner::{MultiSegmentTestRunner, ResultSet};
pub use segments::{
    DescriptiveSummary, SegmentPair, SegmentPartition, SegmentSample, SegmentSummary, OVERALL,
};
pub use validation::{
    BalanceCheck, DataIntegrityValidator, DuplicateGroup, DuplicateReport, GroupAssignment,
    MisassignmentReport, MissingValues, ValidationReport,
};
pub use ztest::{HypothesisTestEngine, TestResult, TestStatus};

#[cfg(test)]
mod tests;
