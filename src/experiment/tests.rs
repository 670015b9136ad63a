// Scenario tests for the inference engine
//
// Each scenario starts from event-level observations and runs the same
// stages the pipeline does, so partitioning, validation and testing are
// exercised together.

use super::*;
use crate::observation::{Group, GroupVariantMap, Observation, Variant};

/// `n` records for one arm/segment, the first `x` of them converted
fn arm(
    prefix: &str,
    group: Group,
    n: usize,
    x: usize,
    segment: Option<&str>,
) -> Vec<Observation> {
    let variant = match group {
        Group::Control => Variant::Old,
        Group::Treatment => Variant::New,
    };
    (0..n)
        .map(|i| {
            let mut obs = Observation::new(format!("{}-{}", prefix, i), group, variant, i < x);
            obs.segment = segment.map(str::to_string);
            obs
        })
        .collect()
}

/// Scenario: practically identical conversion rates (~0.1% each)
///
/// Expected: effect ≈ 0, p-value close to 1, not significant
#[test]
fn test_equal_rates_scenario() {
    let mut data = arm("c", Group::Control, 9702, 10, None);
    data.extend(arm("t", Group::Treatment, 9772, 10, None));

    let partition = SegmentPartition::from_observations(&data);
    let results = MultiSegmentTestRunner::new(&AnalysisConfig::default())
        .unwrap()
        .run(&partition)
        .unwrap();

    let overall = results.overall().unwrap();
    assert_eq!(overall.control, SegmentSample::new(9702, 10).unwrap());
    assert!(overall.absolute_effect.unwrap().abs() < 1e-4);
    assert!(overall.p_value > 0.95);
    assert!(!overall.significant);
}

/// Scenario: 10% control vs 14% treatment
///
/// Expected: significant lift, absolute 0.04, relative 0.40
#[test]
fn test_clear_lift_scenario() {
    let mut data = arm("c", Group::Control, 1000, 100, Some("US"));
    data.extend(arm("t", Group::Treatment, 1000, 140, Some("US")));

    let partition = SegmentPartition::from_observations(&data);
    let results = MultiSegmentTestRunner::new(&AnalysisConfig::default())
        .unwrap()
        .run(&partition)
        .unwrap();

    let overall = results.overall().unwrap();
    let z = overall.z_statistic.unwrap();
    assert!(z > 2.6 && z < 2.8, "z = {}", z);
    assert!(overall.p_value < 0.01, "p = {}", overall.p_value);
    assert!(overall.significant);
    assert!((overall.absolute_effect.unwrap() - 0.04).abs() < 1e-12);
    assert!((overall.relative_effect.unwrap() - 0.40).abs() < 1e-12);

    // The only segment mirrors overall and is the whole family
    assert_eq!(results.comparisons, 1);
    assert_eq!(results.get("US").unwrap().p_value, overall.p_value);
}

/// Scenario: a segment with no treatment observations
///
/// Expected: insufficient-data marker, excluded from k, others still tested
#[test]
fn test_empty_treatment_segment_scenario() {
    let mut data = arm("c-us", Group::Control, 800, 80, Some("US"));
    data.extend(arm("t-us", Group::Treatment, 800, 96, Some("US")));
    data.extend(arm("c-uk", Group::Control, 600, 60, Some("UK")));
    data.extend(arm("t-uk", Group::Treatment, 600, 70, Some("UK")));
    data.extend(arm("c-nz", Group::Control, 25, 2, Some("NZ")));

    let partition = SegmentPartition::from_observations(&data);
    let results = MultiSegmentTestRunner::new(&AnalysisConfig::default())
        .unwrap()
        .run(&partition)
        .unwrap();

    let labels: Vec<&str> = results.results.iter().map(|r| r.segment.as_str()).collect();
    assert_eq!(labels, vec!["overall", "NZ", "UK", "US"]);

    let nz = results.get("NZ").unwrap();
    assert_eq!(nz.status, TestStatus::InsufficientData);
    assert_eq!(nz.control.n, 25);
    assert_eq!(nz.treatment.n, 0);

    assert_eq!(results.comparisons, 2);
    assert_eq!(results.adjusted_alpha, 0.025);
    assert_eq!(results.get("UK").unwrap().status, TestStatus::Tested);
}

/// Scenario: one identifier on three records
///
/// Expected: one duplicate identifier, all three rows retrievable
#[test]
fn test_triplicate_identifier_scenario() {
    let mut data = arm("c", Group::Control, 20, 2, None);
    data.extend(arm("t", Group::Treatment, 20, 3, None));
    data[5].id = "dup".to_string();
    data[17].id = "dup".to_string();
    data[31].id = "dup".to_string();

    let map = GroupVariantMap::default();
    let report = DataIntegrityValidator::new(&data, &map)
        .validate(&AnalysisConfig::default())
        .unwrap();

    assert_eq!(report.duplicates.duplicate_ids(), 1);
    assert_eq!(report.duplicates.rows_for("dup"), Some(&[5, 17, 31][..]));
    assert!(report.duplicates.duplicate_ids() as u64 <= report.total_records);
}

/// Scenario: baseline 10%, detect +2 points at α=0.05 with 80% power
///
/// Expected: returned n reaches 0.80 and n − 1 does not
#[test]
fn test_power_boundary_scenario() {
    let analyzer = PowerAnalyzer::new(0.10, 0.02, 0.05, 0.80).unwrap();
    let n = analyzer.required_sample_size().unwrap();

    assert!(analyzer.achieved_power(n).unwrap() >= 0.80);
    assert!(analyzer.achieved_power(n - 1).unwrap() < 0.80);
}

/// Scenario: contaminated assignment does not change the tested groups
///
/// Misassigned records are reported; dropping them is the caller's call.
#[test]
fn test_misassigned_records_are_reported_not_dropped() {
    let mut data = arm("c", Group::Control, 100, 10, Some("US"));
    data.extend(arm("t", Group::Treatment, 100, 12, Some("US")));
    data[3].variant = Some(Variant::New);
    data[4].variant = Some(Variant::New);
    data[150].variant = Some(Variant::Old);

    let map = GroupVariantMap::default();
    let config = AnalysisConfig::default();
    let report = DataIntegrityValidator::new(&data, &map)
        .validate(&config)
        .unwrap();

    assert_eq!(report.misassignment.count, 3);
    assert!(report.misassignment_warning);

    let partition = SegmentPartition::from_observations(&data);
    assert_eq!(partition.overall.control.n, 100);
    assert_eq!(partition.overall.treatment.n, 100);
}

/// Scenario: a segment with zero conversions in both arms
///
/// Expected: no-variance marker with p = 1, distinguishable from data errors
#[test]
fn test_zero_conversion_segment_scenario() {
    let mut data = arm("c-us", Group::Control, 500, 50, Some("US"));
    data.extend(arm("t-us", Group::Treatment, 500, 65, Some("US")));
    data.extend(arm("c-ie", Group::Control, 40, 0, Some("IE")));
    data.extend(arm("t-ie", Group::Treatment, 35, 0, Some("IE")));

    let partition = SegmentPartition::from_observations(&data);
    let results = MultiSegmentTestRunner::new(&AnalysisConfig::default())
        .unwrap()
        .run(&partition)
        .unwrap();

    let ie = results.get("IE").unwrap();
    assert_eq!(ie.status, TestStatus::NoVariance);
    assert_eq!(ie.p_value, 1.0);
    assert!(!ie.significant);
    assert_ne!(ie.status, TestStatus::InsufficientData);
}

/// Scenario: strict configuration is harder to satisfy
#[test]
fn test_strict_config_reduces_significance() {
    let mut data = arm("c", Group::Control, 2000, 250, None);
    data.extend(arm("t", Group::Treatment, 2000, 210, None));
    let partition = SegmentPartition::from_observations(&data);

    let default = MultiSegmentTestRunner::new(&AnalysisConfig::default())
        .unwrap()
        .run(&partition)
        .unwrap();
    let strict = MultiSegmentTestRunner::new(&AnalysisConfig::strict())
        .unwrap()
        .run(&partition)
        .unwrap();

    assert!(default.overall().unwrap().significant);
    assert!(!strict.overall().unwrap().significant);
}
