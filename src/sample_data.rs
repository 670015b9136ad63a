//! Seeded synthetic experiment data
//!
//! Produces a dataset shaped like a real landing-page test: users spread
//! over weighted countries, each with its own baseline rate and treatment
//! effect, a small share of misassigned records and a few users missing
//! from the country lookup. Same seed, same data.

use crate::observation::{Group, Observation, Variant};
use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Conversion behaviour of one country
#[derive(Debug, Clone, PartialEq)]
pub struct CountryProfile {
    pub code: String,
    pub weight: f64,
    pub base_rate: f64,
    /// Absolute change in conversion rate under treatment
    pub treatment_effect: f64,
}

impl CountryProfile {
    pub fn new(code: &str, weight: f64, base_rate: f64, treatment_effect: f64) -> Self {
        Self {
            code: code.to_string(),
            weight,
            base_rate,
            treatment_effect,
        }
    }
}

/// Generator settings
#[derive(Debug, Clone, PartialEq)]
pub struct SampleConfig {
    pub users: usize,
    pub seed: u64,
    pub countries: Vec<CountryProfile>,
    pub misassignment_rate: f64,
    pub missing_country_rate: f64,
    pub start: NaiveDateTime,
    pub duration_days: i64,
}

impl Default for SampleConfig {
    fn default() -> Self {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default();
        Self {
            users: 100_000,
            seed: 42,
            countries: vec![
                CountryProfile::new("US", 0.60, 0.125, -0.008),
                CountryProfile::new("UK", 0.25, 0.110, 0.015),
                CountryProfile::new("CA", 0.15, 0.115, -0.005),
            ],
            misassignment_rate: 0.01,
            missing_country_rate: 0.001,
            start,
            duration_days: 30,
        }
    }
}

/// Generate observations with country labels attached
pub fn generate(config: &SampleConfig) -> Result<Vec<Observation>> {
    let weights = WeightedIndex::new(config.countries.iter().map(|c| c.weight))
        .context("invalid country weights")?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let window_secs = config.duration_days.max(1) * 24 * 60 * 60;

    let observations = (0..config.users)
        .map(|i| {
            let country = &config.countries[weights.sample(&mut rng)];
            let group = if rng.gen_bool(0.5) {
                Group::Treatment
            } else {
                Group::Control
            };

            let mut variant = match group {
                Group::Control => Variant::Old,
                Group::Treatment => Variant::New,
            };
            if rng.gen_bool(config.misassignment_rate.clamp(0.0, 1.0)) {
                variant = match variant {
                    Variant::Old => Variant::New,
                    Variant::New => Variant::Old,
                };
            }

            let rate = match variant {
                Variant::Old => country.base_rate,
                Variant::New => country.base_rate + country.treatment_effect,
            };
            let converted = rng.gen_bool(rate.clamp(0.0, 1.0));
            let timestamp = config.start + Duration::seconds(rng.gen_range(0..window_secs));

            let mut obs = Observation::new((i + 1).to_string(), group, variant, converted)
                .with_timestamp(timestamp);
            if !rng.gen_bool(config.missing_country_rate.clamp(0.0, 1.0)) {
                obs = obs.with_segment(country.code.clone());
            }
            obs
        })
        .collect();

    Ok(observations)
}

/// Write the event file (`id,timestamp,con_treat,page,converted`)
pub fn write_experiment_csv<W: Write>(observations: &[Observation], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(["id", "timestamp", "con_treat", "page", "converted"])?;

    for obs in observations {
        csv_writer.write_record([
            obs.id.clone(),
            obs.timestamp
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
            obs.group.map(|g| g.as_str().to_string()).unwrap_or_default(),
            obs.variant
                .map(|v| format!("{}_page", v.as_str()))
                .unwrap_or_default(),
            obs.converted
                .map(|c| u8::from(c).to_string())
                .unwrap_or_default(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Write the segment lookup file (`id,<column>`)
pub fn write_segment_csv<W: Write>(
    observations: &[Observation],
    column: &str,
    writer: W,
) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(["id", column])?;

    for obs in observations {
        csv_writer.write_record([obs.id.as_str(), obs.segment.as_deref().unwrap_or("")])?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Generate and write both files into `out_dir`, returning their paths
pub fn write_sample_files(
    config: &SampleConfig,
    out_dir: &Path,
    column: &str,
) -> Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let observations = generate(config)?;
    let experiment_path = out_dir.join("experiment.csv");
    let segments_path = out_dir.join("segments.csv");

    let experiment = File::create(&experiment_path)
        .with_context(|| format!("Failed to create {}", experiment_path.display()))?;
    write_experiment_csv(&observations, experiment)?;

    let segments = File::create(&segments_path)
        .with_context(|| format!("Failed to create {}", segments_path.display()))?;
    write_segment_csv(&observations, column, segments)?;

    info!(
        users = observations.len(),
        seed = config.seed,
        dir = %out_dir.display(),
        "wrote sample data"
    );
    Ok((experiment_path, segments_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{read_segment_lookup, Dataset};
    use crate::observation::GroupVariantMap;

    fn small() -> SampleConfig {
        SampleConfig {
            users: 5_000,
            ..SampleConfig::default()
        }
    }

    #[test]
    fn test_same_seed_same_data() {
        assert_eq!(generate(&small()).unwrap(), generate(&small()).unwrap());
    }

    #[test]
    fn test_different_seed_differs() {
        let other = SampleConfig { seed: 7, ..small() };
        assert_ne!(generate(&small()).unwrap(), generate(&other).unwrap());
    }

    #[test]
    fn test_shape() {
        let data = generate(&small()).unwrap();
        assert_eq!(data.len(), 5_000);

        let us = data.iter().filter(|o| o.segment.as_deref() == Some("US")).count();
        assert!(us > 2_700 && us < 3_300, "US = {}", us);

        let misassigned = data
            .iter()
            .filter(|o| o.is_misassigned(&GroupVariantMap::default()))
            .count();
        assert!(misassigned > 10 && misassigned < 100, "misassigned = {}", misassigned);

        let config = small();
        let end = config.start + Duration::days(config.duration_days);
        assert!(data
            .iter()
            .all(|o| o.timestamp.is_some_and(|t| t >= config.start && t < end)));
    }

    #[test]
    fn test_bad_weights_rejected() {
        let config = SampleConfig {
            countries: vec![CountryProfile::new("US", 0.0, 0.1, 0.0)],
            ..small()
        };
        assert!(generate(&config).is_err());
    }

    #[test]
    fn test_written_files_load_back() {
        let data = generate(&SampleConfig {
            users: 200,
            ..SampleConfig::default()
        })
        .unwrap();

        let mut experiment = Vec::new();
        let mut segments = Vec::new();
        write_experiment_csv(&data, &mut experiment).unwrap();
        write_segment_csv(&data, "country", &mut segments).unwrap();

        let lookup = read_segment_lookup(segments.as_slice(), "country").unwrap();
        let loaded = Dataset::from_reader(experiment.as_slice(), Some(&lookup)).unwrap();
        assert_eq!(loaded.observations(), data.as_slice());
    }
}
