// Configuration for experiment analysis
//
// Passed explicitly into every stage as an immutable value. Nothing in the
// engine holds ambient analysis settings.

use crate::experiment::error::{AnalysisError, Result};
use crate::observation::GroupVariantMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Configuration for experiment analysis
///
/// # Example
/// ```
/// use veredicto::experiment::AnalysisConfig;
///
/// let config = AnalysisConfig::default();
/// assert_eq!(config.alpha, 0.05); // 95% confidence
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Significance level (alpha) for every hypothesis test
    ///
    /// Segment tests are additionally judged against `alpha / k` (Bonferroni),
    /// where `k` is the number of segment comparisons actually tested.
    pub alpha: f64,

    /// Two-sided confidence level for reported intervals
    pub confidence_level: f64,

    /// Power the design should reach for the minimum detectable effect
    pub target_power: f64,

    /// Absolute effect (difference in conversion rate) the design must detect
    ///
    /// When absent, power analysis uses the observed absolute effect.
    pub minimum_detectable_effect: Option<f64>,

    /// Minimum acceptable smaller/larger group-size ratio
    ///
    /// Designed 50/50 splits should land close to 1.0.
    pub balance_threshold: f64,

    /// Per-group misassignment rate above which the validator warns
    pub misassignment_warning_rate: f64,

    /// Compute segment confidence intervals at `1 - adjusted_alpha`
    /// instead of `confidence_level`
    pub adjusted_intervals: bool,

    /// Declared valid (group, variant) pairs
    pub group_variant_map: GroupVariantMap,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            confidence_level: 0.95,
            target_power: 0.80,
            minimum_detectable_effect: None,
            balance_threshold: 0.9,
            misassignment_warning_rate: 0.01,
            adjusted_intervals: false,
            group_variant_map: GroupVariantMap::default(),
        }
    }
}

impl AnalysisConfig {
    /// Strict configuration: 99% confidence, 90% power
    pub fn strict() -> Self {
        Self {
            alpha: 0.01,
            confidence_level: 0.99,
            target_power: 0.90,
            ..Self::default()
        }
    }

    /// Permissive configuration: 90% confidence, catches effects early
    pub fn permissive() -> Self {
        Self {
            alpha: 0.10,
            confidence_level: 0.90,
            target_power: 0.80,
            balance_threshold: 0.8,
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file
    ///
    /// Missing keys fall back to [`AnalysisConfig::default`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        use anyhow::Context;

        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        Self::from_toml_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        use anyhow::Context;

        let config: Self = toml::from_str(content).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        check_open_unit("alpha", self.alpha)?;
        check_open_unit("confidence_level", self.confidence_level)?;
        check_open_unit("target_power", self.target_power)?;

        if let Some(mde) = self.minimum_detectable_effect {
            if !mde.is_finite() || mde == 0.0 || mde.abs() >= 1.0 {
                return Err(AnalysisError::InvalidArgument(format!(
                    "minimum_detectable_effect must be a non-zero value in (-1, 1), got {}",
                    mde
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.balance_threshold) {
            return Err(AnalysisError::InvalidArgument(format!(
                "balance_threshold must be in [0, 1], got {}",
                self.balance_threshold
            )));
        }

        if !(0.0..=1.0).contains(&self.misassignment_warning_rate) {
            return Err(AnalysisError::InvalidArgument(format!(
                "misassignment_warning_rate must be in [0, 1], got {}",
                self.misassignment_warning_rate
            )));
        }

        Ok(())
    }
}

/// Reject values outside the open interval (0, 1)
pub(crate) fn check_open_unit(name: &str, value: f64) -> Result<()> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(AnalysisError::InvalidArgument(format!(
            "{} must be in (0, 1), got {}",
            name, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::{Group, Variant};

    #[test]
    fn test_default_config() {
        let config = AnalysisConfig::default();
        assert_eq!(config.alpha, 0.05);
        assert_eq!(config.confidence_level, 0.95);
        assert_eq!(config.target_power, 0.80);
        assert_eq!(config.balance_threshold, 0.9);
        assert!(config.minimum_detectable_effect.is_none());
        assert!(!config.adjusted_intervals);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_strict_config() {
        let config = AnalysisConfig::strict();
        assert_eq!(config.alpha, 0.01);
        assert_eq!(config.target_power, 0.90);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_permissive_config() {
        let config = AnalysisConfig::permissive();
        assert_eq!(config.alpha, 0.10);
        assert_eq!(config.balance_threshold, 0.8);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[allow(clippy::field_reassign_with_default)]
    fn test_invalid_alpha() {
        let mut config = AnalysisConfig::default();
        config.alpha = 1.0;
        assert!(matches!(
            config.validate(),
            Err(AnalysisError::InvalidArgument(_))
        ));

        config.alpha = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    #[allow(clippy::field_reassign_with_default)]
    fn test_invalid_mde() {
        let mut config = AnalysisConfig::default();
        config.minimum_detectable_effect = Some(0.0);
        assert!(config.validate().is_err());

        config.minimum_detectable_effect = Some(0.02);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[allow(clippy::field_reassign_with_default)]
    fn test_invalid_balance_threshold() {
        let mut config = AnalysisConfig::default();
        config.balance_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml_partial() {
        let config = AnalysisConfig::from_toml_str(
            r#"
            alpha = 0.01
            minimum_detectable_effect = 0.02

            [group_variant_map]
            control = "old"
            treatment = "new"
            "#,
        )
        .unwrap();

        assert_eq!(config.alpha, 0.01);
        assert_eq!(config.minimum_detectable_effect, Some(0.02));
        assert_eq!(config.confidence_level, 0.95);
        assert_eq!(
            config.group_variant_map.expected(Group::Treatment),
            Some(Variant::New)
        );
    }

    #[test]
    fn test_from_toml_rejects_invalid_values() {
        assert!(AnalysisConfig::from_toml_str("alpha = 2.0").is_err());
    }
}
