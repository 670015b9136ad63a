//! Experiment dataset loading
//!
//! Reads the event CSV (`id,timestamp,group,variant,converted`, also accepting
//! the `con_treat`/`page` column names and `old_page`/`new_page` labels) and an
//! optional segment lookup CSV keyed by identifier. Segment labels are joined
//! by identifier; records without a lookup entry keep no segment label.
//!
//! Loading never resolves data-quality issues on its own. Duplicate handling
//! and removal of misassigned records are explicit operations on [`Dataset`].

use crate::observation::{Group, GroupVariantMap, Observation, Variant};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Default segment column in the lookup file
pub const DEFAULT_SEGMENT_COLUMN: &str = "country";

/// How to resolve identifiers that appear on more than one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Keep the first record of each identifier
    #[default]
    KeepFirst,
    /// Drop every record of a duplicated identifier
    DropAll,
    /// Keep all records
    KeepAll,
}

/// Raw row of the experiment file
#[derive(Debug, Deserialize)]
struct ExperimentRow {
    id: String,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default, alias = "con_treat")]
    group: Option<String>,
    #[serde(default, alias = "page")]
    variant: Option<String>,
    #[serde(default)]
    converted: Option<String>,
}

/// Loaded, immutable set of observations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    observations: Vec<Observation>,
}

impl Dataset {
    pub fn new(observations: Vec<Observation>) -> Self {
        Self { observations }
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Load the experiment file and, optionally, a segment lookup file
    pub fn from_paths(
        experiment: &Path,
        segments: Option<&Path>,
        segment_column: &str,
    ) -> Result<Self> {
        let file = File::open(experiment)
            .with_context(|| format!("Failed to open {}", experiment.display()))?;

        let lookup = match segments {
            Some(path) => {
                let lookup_file = File::open(path)
                    .with_context(|| format!("Failed to open {}", path.display()))?;
                Some(
                    read_segment_lookup(lookup_file, segment_column)
                        .with_context(|| format!("Failed to read {}", path.display()))?,
                )
            }
            None => None,
        };

        let dataset = Self::from_reader(file, lookup.as_ref())
            .with_context(|| format!("Failed to read {}", experiment.display()))?;

        info!(
            records = dataset.len(),
            segments_joined = lookup.is_some(),
            "loaded experiment data"
        );
        Ok(dataset)
    }

    /// Parse experiment rows, joining segment labels from `lookup`
    pub fn from_reader<R: Read>(
        reader: R,
        lookup: Option<&HashMap<String, Option<String>>>,
    ) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

        let mut observations = Vec::new();
        for (index, row) in csv_reader.deserialize::<ExperimentRow>().enumerate() {
            // +2: one for the header, one for 1-based line numbers
            let line = index + 2;
            let row = row.with_context(|| format!("line {}: malformed record", line))?;
            let mut obs = parse_row(row).with_context(|| format!("line {}", line))?;
            obs.segment = lookup.and_then(|l| l.get(&obs.id).cloned().flatten());
            observations.push(obs);
        }

        Ok(Self { observations })
    }

    /// Resolve duplicated identifiers according to `policy`
    pub fn deduplicate(&self, policy: DuplicatePolicy) -> Dataset {
        let observations = match policy {
            DuplicatePolicy::KeepAll => self.observations.clone(),
            DuplicatePolicy::KeepFirst => {
                let mut seen = HashSet::new();
                self.observations
                    .iter()
                    .filter(|o| o.id.is_empty() || seen.insert(o.id.as_str()))
                    .cloned()
                    .collect()
            }
            DuplicatePolicy::DropAll => {
                let mut counts: HashMap<&str, usize> = HashMap::new();
                for obs in &self.observations {
                    *counts.entry(obs.id.as_str()).or_default() += 1;
                }
                self.observations
                    .iter()
                    .filter(|o| o.id.is_empty() || counts[o.id.as_str()] == 1)
                    .cloned()
                    .collect()
            }
        };
        Dataset { observations }
    }

    /// Drop records whose (group, variant) pair violates `map`
    pub fn without_misassigned(&self, map: &GroupVariantMap) -> Dataset {
        Dataset {
            observations: self
                .observations
                .iter()
                .filter(|o| !o.is_misassigned(map))
                .cloned()
                .collect(),
        }
    }
}

/// Read `id -> segment label` from a lookup CSV
///
/// Empty labels map to `None`. The first entry wins for repeated identifiers.
pub fn read_segment_lookup<R: Read>(
    reader: R,
    column: &str,
) -> Result<HashMap<String, Option<String>>> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let headers = csv_reader.headers().context("missing header row")?.clone();
    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| anyhow!("column '{}' not found in segment lookup", name))
    };
    let id_idx = position("id")?;
    let segment_idx = position(column)?;

    let mut lookup = HashMap::new();
    for (index, record) in csv_reader.records().enumerate() {
        let record = record.with_context(|| format!("line {}: malformed record", index + 2))?;
        let id = record.get(id_idx).unwrap_or_default().to_string();
        let label = record
            .get(segment_idx)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        lookup.entry(id).or_insert(label);
    }

    Ok(lookup)
}

fn parse_row(row: ExperimentRow) -> Result<Observation> {
    let timestamp = non_empty(row.timestamp)
        .map(|s| parse_timestamp(&s))
        .transpose()?;
    let group = non_empty(row.group)
        .map(|s| s.parse::<Group>().map_err(|e| anyhow!(e)))
        .transpose()?;
    let variant = non_empty(row.variant)
        .map(|s| s.parse::<Variant>().map_err(|e| anyhow!(e)))
        .transpose()?;
    let converted = non_empty(row.converted)
        .map(|s| parse_converted(&s))
        .transpose()?;

    Ok(Observation {
        id: row.id,
        timestamp,
        group,
        variant,
        converted,
        segment: None,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Accepts `YYYY-MM-DD HH:MM:SS[.fff]`, the `T`-separated form, and RFC 3339
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    const FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.naive_utc())
        })
        .ok_or_else(|| anyhow!("unparsable timestamp '{}'", value))
}

fn parse_converted(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(anyhow!("unparsable conversion flag '{}'", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPERIMENT: &str = "\
id,timestamp,con_treat,page,converted
1,2024-01-03 10:15:00,control,old_page,0
2,2024-01-04 11:00:00.250,treatment,new_page,1
3,,control,old_page,
4,2024-01-05T08:00:00,treatment,old_page,1
";

    const COUNTRIES: &str = "\
id,country
1,US
2,UK
3,
";

    fn lookup() -> HashMap<String, Option<String>> {
        read_segment_lookup(COUNTRIES.as_bytes(), DEFAULT_SEGMENT_COLUMN).unwrap()
    }

    #[test]
    fn test_loads_original_column_names() {
        let dataset = Dataset::from_reader(EXPERIMENT.as_bytes(), None).unwrap();
        assert_eq!(dataset.len(), 4);

        let first = &dataset.observations()[0];
        assert_eq!(first.group, Some(Group::Control));
        assert_eq!(first.variant, Some(Variant::Old));
        assert_eq!(first.converted, Some(false));
        assert!(first.timestamp.is_some());
    }

    #[test]
    fn test_empty_cells_are_missing() {
        let dataset = Dataset::from_reader(EXPERIMENT.as_bytes(), None).unwrap();
        let third = &dataset.observations()[2];
        assert_eq!(third.timestamp, None);
        assert_eq!(third.converted, None);
    }

    #[test]
    fn test_segment_join() {
        let lookup = lookup();
        let dataset = Dataset::from_reader(EXPERIMENT.as_bytes(), Some(&lookup)).unwrap();
        let segments: Vec<Option<&str>> = dataset
            .observations()
            .iter()
            .map(|o| o.segment.as_deref())
            .collect();
        assert_eq!(segments, vec![Some("US"), Some("UK"), None, None]);
    }

    #[test]
    fn test_canonical_column_names() {
        let data = "id,group,variant,converted\n7,treatment,new,true\n";
        let dataset = Dataset::from_reader(data.as_bytes(), None).unwrap();
        let obs = &dataset.observations()[0];
        assert_eq!(obs.group, Some(Group::Treatment));
        assert_eq!(obs.variant, Some(Variant::New));
        assert_eq!(obs.converted, Some(true));
        assert_eq!(obs.timestamp, None);
    }

    #[test]
    fn test_unknown_group_reports_line() {
        let data = "id,group,variant,converted\n1,control,old,0\n2,holdout,old,0\n";
        let err = Dataset::from_reader(data.as_bytes(), None).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("line 3"), "{}", message);
        assert!(message.contains("holdout"), "{}", message);
    }

    #[test]
    fn test_bad_conversion_flag() {
        let data = "id,group,variant,converted\n1,control,old,maybe\n";
        assert!(Dataset::from_reader(data.as_bytes(), None).is_err());
    }

    #[test]
    fn test_missing_lookup_column() {
        let err = read_segment_lookup(COUNTRIES.as_bytes(), "region").unwrap_err();
        assert!(err.to_string().contains("region"));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2024-01-01 00:00:00").is_ok());
        assert!(parse_timestamp("2024-01-01T23:59:59.5").is_ok());
        assert!(parse_timestamp("2024-01-01T12:00:00+02:00").is_ok());
        assert!(parse_timestamp("yesterday").is_err());
    }

    fn dup_dataset() -> Dataset {
        Dataset::new(vec![
            Observation::new("a", Group::Control, Variant::Old, false),
            Observation::new("b", Group::Treatment, Variant::New, true),
            Observation::new("a", Group::Treatment, Variant::New, true),
            Observation::new("c", Group::Control, Variant::New, false),
        ])
    }

    #[test]
    fn test_deduplicate_keep_first() {
        let deduped = dup_dataset().deduplicate(DuplicatePolicy::KeepFirst);
        assert_eq!(deduped.len(), 3);
        assert_eq!(deduped.observations()[0].group, Some(Group::Control));
    }

    #[test]
    fn test_deduplicate_drop_all() {
        let deduped = dup_dataset().deduplicate(DuplicatePolicy::DropAll);
        let ids: Vec<&str> = deduped.observations().iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_deduplicate_keep_all() {
        assert_eq!(dup_dataset().deduplicate(DuplicatePolicy::KeepAll).len(), 4);
    }

    #[test]
    fn test_without_misassigned() {
        let cleaned = dup_dataset().without_misassigned(&GroupVariantMap::default());
        assert_eq!(cleaned.len(), 3);
        assert!(cleaned.observations().iter().all(|o| o.id != "c"));
    }
}
