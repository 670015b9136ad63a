// Data integrity validation
//
// Checks a loaded dataset for duplicate identifiers, missing values,
// treatment-assignment contamination and group-size imbalance.
//
// Only unusable input is an error (empty dataset, a required field missing
// on every record). Everything else is reported so the analysis can proceed
// with caveats; the caller decides how to resolve duplicates.

use crate::experiment::config::AnalysisConfig;
use crate::experiment::error::{AnalysisError, Result};
use crate::observation::{Group, GroupVariantMap, Observation};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

/// One identifier that appears on more than one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub id: String,
    /// Row indices of every record carrying this identifier, ascending
    pub rows: Vec<usize>,
}

/// Result of duplicate detection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateReport {
    /// Duplicated identifiers, ordered by first occurrence
    pub groups: Vec<DuplicateGroup>,
}

impl DuplicateReport {
    /// Number of distinct identifiers appearing more than once
    pub fn duplicate_ids(&self) -> usize {
        self.groups.len()
    }

    /// Number of records involved in any duplication
    pub fn duplicate_rows(&self) -> usize {
        self.groups.iter().map(|g| g.rows.len()).sum()
    }

    /// Records beyond the first occurrence of each identifier
    pub fn redundant_rows(&self) -> usize {
        self.duplicate_rows() - self.groups.len()
    }

    pub fn rows_for(&self, id: &str) -> Option<&[usize]> {
        self.groups
            .iter()
            .find(|g| g.id == id)
            .map(|g| g.rows.as_slice())
    }
}

/// Misassignment totals for one group
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupAssignment {
    /// Records labelled with this group and a known variant
    pub total: u64,
    /// Records whose variant violates the declared mapping
    pub misassigned: u64,
}

impl GroupAssignment {
    pub fn rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.misassigned as f64 / self.total as f64
        }
    }
}

/// Result of misassignment detection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MisassignmentReport {
    pub count: u64,
    /// Identifiers of offending records
    pub ids: BTreeSet<String>,
    pub by_group: BTreeMap<Group, GroupAssignment>,
}

impl MisassignmentReport {
    /// Whether any group's misassignment rate exceeds `warning_rate`
    pub fn exceeds(&self, warning_rate: f64) -> bool {
        self.by_group.values().any(|g| g.rate() > warning_rate)
    }
}

/// Missing-value counts per field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingValues {
    pub id: u64,
    pub timestamp: u64,
    pub group: u64,
    pub variant: u64,
    pub converted: u64,
    pub segment: u64,
}

impl MissingValues {
    pub fn total(&self) -> u64 {
        self.id + self.timestamp + self.group + self.variant + self.converted + self.segment
    }

    /// Counts for the fields every record must carry
    fn required(&self) -> [(&'static str, u64); 4] {
        [
            ("id", self.id),
            ("group", self.group),
            ("variant", self.variant),
            ("converted", self.converted),
        ]
    }
}

/// Group-size balance check
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BalanceCheck {
    pub control: u64,
    pub treatment: u64,
    /// Smaller group size over larger group size
    pub ratio: f64,
    pub threshold: f64,
    pub balanced: bool,
}

/// Full integrity report for a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub total_records: u64,
    pub duplicates: DuplicateReport,
    pub missing: MissingValues,
    pub misassignment: MisassignmentReport,
    pub misassignment_warning: bool,
    pub balance: BalanceCheck,
    /// Earliest and latest event timestamp, when any are present
    pub observation_window: Option<(NaiveDateTime, NaiveDateTime)>,
}

impl ValidationReport {
    /// Whether the report carries any caveat worth surfacing
    pub fn has_issues(&self) -> bool {
        self.duplicates.duplicate_ids() > 0
            || self.missing.total() > 0
            || self.misassignment.count > 0
            || !self.balance.balanced
    }
}

/// Integrity checks over a borrowed dataset
#[derive(Debug)]
pub struct DataIntegrityValidator<'a> {
    observations: &'a [Observation],
    mapping: &'a GroupVariantMap,
}

impl<'a> DataIntegrityValidator<'a> {
    pub fn new(observations: &'a [Observation], mapping: &'a GroupVariantMap) -> Self {
        Self {
            observations,
            mapping,
        }
    }

    /// Group records by identifier; any identifier seen more than once is
    /// a duplicate
    ///
    /// Nothing is dropped here. Empty identifiers are counted as missing,
    /// not as duplicates of each other.
    pub fn detect_duplicates(&self) -> DuplicateReport {
        let mut rows_by_id: HashMap<&str, Vec<usize>> = HashMap::new();
        for (row, obs) in self.observations.iter().enumerate() {
            if !obs.id.is_empty() {
                rows_by_id.entry(obs.id.as_str()).or_default().push(row);
            }
        }

        let mut groups: Vec<DuplicateGroup> = rows_by_id
            .into_iter()
            .filter(|(_, rows)| rows.len() > 1)
            .map(|(id, rows)| DuplicateGroup {
                id: id.to_string(),
                rows,
            })
            .collect();
        groups.sort_by_key(|g| g.rows[0]);

        DuplicateReport { groups }
    }

    /// Flag records whose (group, variant) pair violates the declared mapping
    pub fn detect_misassignment(&self) -> MisassignmentReport {
        let mut report = MisassignmentReport::default();

        for obs in self.observations {
            let (Some(group), Some(_)) = (obs.group, obs.variant) else {
                continue;
            };

            let entry = report.by_group.entry(group).or_default();
            entry.total += 1;

            if obs.is_misassigned(self.mapping) {
                entry.misassigned += 1;
                report.count += 1;
                report.ids.insert(obs.id.clone());
            }
        }

        report
    }

    pub fn missing_values(&self) -> MissingValues {
        let mut missing = MissingValues::default();
        for obs in self.observations {
            missing.id += u64::from(obs.id.is_empty());
            missing.timestamp += u64::from(obs.timestamp.is_none());
            missing.group += u64::from(obs.group.is_none());
            missing.variant += u64::from(obs.variant.is_none());
            missing.converted += u64::from(obs.converted.is_none());
            missing.segment += u64::from(obs.segment.is_none());
        }
        missing
    }

    /// Number of records labelled with each group
    pub fn group_sizes(&self) -> BTreeMap<Group, u64> {
        let mut sizes: BTreeMap<Group, u64> = Group::ALL.iter().map(|g| (*g, 0)).collect();
        for group in self.observations.iter().filter_map(|o| o.group) {
            *sizes.entry(group).or_default() += 1;
        }
        sizes
    }

    /// Ratio of the smaller group to the larger; imbalanced below `threshold`
    pub fn assess_balance(group_sizes: &BTreeMap<Group, u64>, threshold: f64) -> BalanceCheck {
        let control = group_sizes.get(&Group::Control).copied().unwrap_or(0);
        let treatment = group_sizes.get(&Group::Treatment).copied().unwrap_or(0);

        let larger = control.max(treatment);
        let ratio = if larger == 0 {
            0.0
        } else {
            control.min(treatment) as f64 / larger as f64
        };

        BalanceCheck {
            control,
            treatment,
            ratio,
            threshold,
            balanced: ratio >= threshold,
        }
    }

    fn observation_window(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let mut stamps = self.observations.iter().filter_map(|o| o.timestamp);
        let first = stamps.next()?;
        Some(stamps.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t))))
    }

    /// Run every check and assemble the report
    ///
    /// Fails with `DataIntegrity` when the dataset is empty or a required
    /// field is missing on every record.
    pub fn validate(&self, config: &AnalysisConfig) -> Result<ValidationReport> {
        let total = self.observations.len() as u64;
        if total == 0 {
            return Err(AnalysisError::DataIntegrity(
                "dataset contains no observations".to_string(),
            ));
        }

        let missing = self.missing_values();
        if let Some((field, _)) = missing.required().into_iter().find(|(_, n)| *n == total) {
            return Err(AnalysisError::DataIntegrity(format!(
                "required field '{}' is missing on all {} records",
                field, total
            )));
        }

        let duplicates = self.detect_duplicates();
        let misassignment = self.detect_misassignment();
        let misassignment_warning = misassignment.exceeds(config.misassignment_warning_rate);
        let balance = Self::assess_balance(&self.group_sizes(), config.balance_threshold);

        debug!(
            total,
            duplicate_ids = duplicates.duplicate_ids(),
            misassigned = misassignment.count,
            balance_ratio = balance.ratio,
            "validated dataset"
        );

        if duplicates.duplicate_ids() > 0 {
            warn!(
                "{} identifiers appear on more than one record ({} rows)",
                duplicates.duplicate_ids(),
                duplicates.duplicate_rows()
            );
        }
        if misassignment_warning {
            warn!(
                "misassignment rate above {:.2}% ({} records)",
                config.misassignment_warning_rate * 100.0,
                misassignment.count
            );
        }
        if !balance.balanced {
            warn!(
                "unbalanced groups: ratio {:.3} below threshold {}",
                balance.ratio, balance.threshold
            );
        }

        Ok(ValidationReport {
            total_records: total,
            duplicates,
            missing,
            misassignment,
            misassignment_warning,
            balance,
            observation_window: self.observation_window(),
        })
    }
}
