//! End-to-end analysis of one experiment dataset
//!
//! Validation always runs on the data as loaded, so the report shows what
//! was wrong with it. Cleaning (duplicate resolution, optional removal of
//! misassigned records) then produces the dataset that is partitioned and
//! tested.

use crate::dataset::{Dataset, DuplicatePolicy};
use crate::experiment::{
    AnalysisConfig, AnalysisError, DataIntegrityValidator, DescriptiveSummary,
    MultiSegmentTestRunner, PowerAnalyzer, PowerResult, ResultSet, SegmentPartition,
    ValidationReport,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Caller decisions about how to clean the data before testing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningPlan {
    pub duplicate_policy: DuplicatePolicy,
    pub drop_misassigned: bool,
}

/// What cleaning removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningSummary {
    pub plan: CleaningPlan,
    pub loaded_records: u64,
    pub removed_duplicates: u64,
    pub removed_misassigned: u64,
    pub analyzed_records: u64,
}

/// Where the effect used for power analysis came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerBasis {
    /// Configured minimum detectable effect
    Planned,
    /// Observed overall effect (post-hoc)
    Observed,
}

/// Power analysis outcome, or the reason it was skipped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PowerCheck {
    Computed { basis: PowerBasis, result: PowerResult },
    Skipped { reason: String },
}

impl PowerCheck {
    pub fn result(&self) -> Option<&PowerResult> {
        match self {
            PowerCheck::Computed { result, .. } => Some(result),
            PowerCheck::Skipped { .. } => None,
        }
    }
}

/// Everything one analysis run produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentAnalysis {
    pub config: AnalysisConfig,
    pub validation: ValidationReport,
    pub cleaning: CleaningSummary,
    pub summary: DescriptiveSummary,
    pub power: PowerCheck,
    pub results: ResultSet,
}

/// Validate, clean, partition, check power and test every segment
pub fn analyze(
    dataset: &Dataset,
    config: &AnalysisConfig,
    plan: CleaningPlan,
) -> crate::experiment::Result<ExperimentAnalysis> {
    config.validate()?;

    let validation =
        DataIntegrityValidator::new(dataset.observations(), &config.group_variant_map)
            .validate(config)?;

    let deduplicated = dataset.deduplicate(plan.duplicate_policy);
    let cleaned = if plan.drop_misassigned {
        deduplicated.without_misassigned(&config.group_variant_map)
    } else {
        deduplicated.clone()
    };

    let cleaning = CleaningSummary {
        plan,
        loaded_records: dataset.len() as u64,
        removed_duplicates: (dataset.len() - deduplicated.len()) as u64,
        removed_misassigned: (deduplicated.len() - cleaned.len()) as u64,
        analyzed_records: cleaned.len() as u64,
    };
    info!(
        loaded = cleaning.loaded_records,
        analyzed = cleaning.analyzed_records,
        "cleaned dataset"
    );

    let partition = SegmentPartition::from_observations(cleaned.observations());
    let summary = partition.describe();
    let power = check_power(&partition, config)?;
    let results = MultiSegmentTestRunner::new(config)?.run(&partition)?;

    Ok(ExperimentAnalysis {
        config: config.clone(),
        validation,
        cleaning,
        summary,
        power,
        results,
    })
}

/// Power of the overall comparison
///
/// With a configured MDE every error propagates. Without one the observed
/// effect is used, and an observed effect that cannot drive a power
/// calculation (empty arm, zero difference, degenerate baseline) is recorded
/// as skipped.
pub fn check_power(
    partition: &SegmentPartition,
    config: &AnalysisConfig,
) -> crate::experiment::Result<PowerCheck> {
    let control = partition.overall.control;
    let treatment = partition.overall.treatment;

    if let Some(mde) = config.minimum_detectable_effect {
        let baseline = control.rate().ok_or_else(|| {
            AnalysisError::InvalidArgument("control group has no observations".to_string())
        })?;
        let result = PowerAnalyzer::new(baseline, mde, config.alpha, config.target_power)?
            .analyze(control.n, treatment.n)?;
        return Ok(PowerCheck::Computed {
            basis: PowerBasis::Planned,
            result,
        });
    }

    let (Some(p_c), Some(p_t)) = (control.rate(), treatment.rate()) else {
        return Ok(skipped("an experiment arm has no observations"));
    };

    let outcome = PowerAnalyzer::new(p_c, p_t - p_c, config.alpha, config.target_power)
        .and_then(|analyzer| analyzer.analyze(control.n, treatment.n));

    match outcome {
        Ok(result) => Ok(PowerCheck::Computed {
            basis: PowerBasis::Observed,
            result,
        }),
        Err(e @ (AnalysisError::Domain(_) | AnalysisError::InvalidArgument(_))) => {
            Ok(skipped(&e.to_string()))
        }
        Err(e) => Err(e),
    }
}

fn skipped(reason: &str) -> PowerCheck {
    warn!("post-hoc power analysis skipped: {}", reason);
    PowerCheck::Skipped {
        reason: reason.to_string(),
    }
}
