// Proportion statistics for conversion-rate comparisons
//
// Pure functions, no side effects. Normal quantiles and CDF values come from
// statrs; nothing here hand-rolls a distribution.
//
// - Pooled rate and standard error: the null-hypothesis variance used for
//   the z statistic
// - Wald interval: unpooled (per-group) variance around the observed
//   difference
// - Cohen's h: arcsine-transformed effect size, stable across [0, 1]

use crate::experiment::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

/// Two-sided confidence interval for a difference in proportions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
    /// Confidence level the bounds were computed at (e.g. 0.95)
    pub level: f64,
}

impl ConfidenceInterval {
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// Whether the whole interval lies on one side of zero
    pub fn excludes_zero(&self) -> bool {
        self.lower > 0.0 || self.upper < 0.0
    }
}

fn standard_normal() -> Result<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| AnalysisError::Domain(e.to_string()))
}

/// Standard normal CDF, Φ(x)
pub fn normal_cdf(x: f64) -> Result<f64> {
    Ok(standard_normal()?.cdf(x))
}

/// Standard normal quantile, Φ⁻¹(p)
pub fn normal_quantile(p: f64) -> Result<f64> {
    if !(p > 0.0 && p < 1.0) {
        return Err(AnalysisError::Domain(format!(
            "normal quantile requires p in (0, 1), got {}",
            p
        )));
    }
    Ok(standard_normal()?.inverse_cdf(p))
}

/// Two-sided critical value for a confidence level (1.96 at 0.95)
pub fn z_critical(confidence: f64) -> Result<f64> {
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(AnalysisError::InvalidArgument(format!(
            "confidence level must be in (0, 1), got {}",
            confidence
        )));
    }
    normal_quantile(1.0 - (1.0 - confidence) / 2.0)
}

/// Two-sided p-value for a z statistic: `2 * (1 - Φ(|z|))`
pub fn two_sided_p_value(z: f64) -> Result<f64> {
    // Φ(-|z|) keeps precision in the far tail where 1 - Φ(|z|) rounds to 0
    let tail = normal_cdf(-z.abs())?;
    Ok((2.0 * tail).min(1.0))
}

/// Pooled conversion rate `(x1 + x2) / (n1 + n2)`
pub fn pooled_rate(x1: u64, n1: u64, x2: u64, n2: u64) -> Result<f64> {
    if x1 > n1 || x2 > n2 {
        return Err(AnalysisError::InvalidArgument(format!(
            "conversions exceed observations (x1={}, n1={}, x2={}, n2={})",
            x1, n1, x2, n2
        )));
    }

    let n = n1 + n2;
    if n == 0 {
        return Err(AnalysisError::DegenerateInput(
            "pooled rate of two empty groups".to_string(),
        ));
    }
    Ok((x1 + x2) as f64 / n as f64)
}

/// Pooled standard error `sqrt(p(1-p)(1/n1 + 1/n2))`
pub fn standard_error(p_pooled: f64, n1: u64, n2: u64) -> Result<f64> {
    if n1 == 0 || n2 == 0 {
        return Err(AnalysisError::DegenerateInput(format!(
            "standard error requires non-empty groups (n1={}, n2={})",
            n1, n2
        )));
    }
    check_probability("p_pooled", p_pooled)?;

    let spread = 1.0 / n1 as f64 + 1.0 / n2 as f64;
    Ok((p_pooled * (1.0 - p_pooled) * spread).sqrt())
}

/// Unpooled standard error of `p2 - p1`
pub fn unpooled_standard_error(p1: f64, n1: u64, p2: f64, n2: u64) -> Result<f64> {
    if n1 == 0 || n2 == 0 {
        return Err(AnalysisError::DegenerateInput(format!(
            "standard error requires non-empty groups (n1={}, n2={})",
            n1, n2
        )));
    }
    check_probability("p1", p1)?;
    check_probability("p2", p2)?;

    Ok((p1 * (1.0 - p1) / n1 as f64 + p2 * (1.0 - p2) / n2 as f64).sqrt())
}

/// Wald interval around `p2 - p1` using unpooled variance
///
/// # Example
/// ```
/// use veredicto::experiment::proportion::confidence_interval;
///
/// let ci = confidence_interval(0.10, 1000, 0.14, 1000, 0.95).unwrap();
/// assert!(ci.contains(0.04));
/// assert!(ci.excludes_zero());
/// ```
pub fn confidence_interval(
    p1: f64,
    n1: u64,
    p2: f64,
    n2: u64,
    confidence: f64,
) -> Result<ConfidenceInterval> {
    let z = z_critical(confidence)?;
    let se = unpooled_standard_error(p1, n1, p2, n2)?;
    let diff = p2 - p1;

    Ok(ConfidenceInterval {
        lower: diff - z * se,
        upper: diff + z * se,
        level: confidence,
    })
}

/// Cohen's h: `2·asin(√p2) − 2·asin(√p1)`
pub fn cohens_h(p1: f64, p2: f64) -> Result<f64> {
    check_probability("p1", p1)?;
    check_probability("p2", p2)?;

    Ok(2.0 * p2.sqrt().asin() - 2.0 * p1.sqrt().asin())
}

fn check_probability(name: &str, p: f64) -> Result<()> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(AnalysisError::Domain(format!(
            "{} must be a probability in [0, 1], got {}",
            name, p
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pooled_rate() {
        assert_eq!(pooled_rate(100, 1000, 140, 1000).unwrap(), 0.12);
        assert!(pooled_rate(0, 0, 0, 0).is_err());
    }

    #[test]
    fn test_pooled_rate_rejects_more_conversions_than_observations() {
        assert!(matches!(
            pooled_rate(11, 10, 0, 10),
            Err(AnalysisError::InvalidArgument(_))
        ));
        assert!(matches!(
            pooled_rate(0, 10, 12, 10),
            Err(AnalysisError::InvalidArgument(_))
        ));
        assert_eq!(pooled_rate(10, 10, 10, 10).unwrap(), 1.0);
    }

    #[test]
    fn test_standard_error_known_value() {
        // sqrt(0.12 * 0.88 * 0.002) = 0.014533
        let se = standard_error(0.12, 1000, 1000).unwrap();
        assert!((se - 0.014533).abs() < 1e-5);
    }

    #[test]
    fn test_standard_error_empty_group_is_degenerate() {
        assert!(matches!(
            standard_error(0.1, 0, 10),
            Err(AnalysisError::DegenerateInput(_))
        ));
        assert!(matches!(
            standard_error(0.1, 10, 0),
            Err(AnalysisError::DegenerateInput(_))
        ));
    }

    #[test]
    fn test_z_critical_95() {
        assert!((z_critical(0.95).unwrap() - 1.959964).abs() < 1e-5);
        assert!((z_critical(0.99).unwrap() - 2.575829).abs() < 1e-5);
        assert!(z_critical(1.0).is_err());
    }

    #[test]
    fn test_two_sided_p_value() {
        assert!((two_sided_p_value(1.959964).unwrap() - 0.05).abs() < 1e-6);
        assert_eq!(two_sided_p_value(0.0).unwrap(), 1.0);
        assert_eq!(
            two_sided_p_value(2.5).unwrap(),
            two_sided_p_value(-2.5).unwrap()
        );
        assert!(two_sided_p_value(40.0).unwrap() >= 0.0);
    }

    #[test]
    fn test_confidence_interval_symmetric_around_difference() {
        let ci = confidence_interval(0.10, 1000, 0.14, 1000, 0.95).unwrap();
        let mid = (ci.lower + ci.upper) / 2.0;
        assert!((mid - 0.04).abs() < 1e-12);
        // unpooled se = sqrt(0.09/1000 + 0.1204/1000) = 0.014505
        assert!((ci.width() / 2.0 - 1.959964 * 0.014505).abs() < 1e-5);
        assert_eq!(ci.level, 0.95);
    }

    #[test]
    fn test_confidence_interval_zero_variance_collapses() {
        let ci = confidence_interval(0.0, 50, 0.0, 60, 0.95).unwrap();
        assert_eq!(ci.lower, 0.0);
        assert_eq!(ci.upper, 0.0);
        assert!(ci.contains(0.0));
        assert!(!ci.excludes_zero());
    }

    #[test]
    fn test_cohens_h_basic() {
        assert_eq!(cohens_h(0.3, 0.3).unwrap(), 0.0);
        let h = cohens_h(0.10, 0.12).unwrap();
        assert!((h - 0.063982).abs() < 1e-5);
        assert_eq!(h, -cohens_h(0.12, 0.10).unwrap());
    }

    #[test]
    fn test_cohens_h_full_range() {
        // h(0, 1) = 2 * asin(1) = pi
        assert!((cohens_h(0.0, 1.0).unwrap() - std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn test_cohens_h_domain_error() {
        assert!(matches!(cohens_h(-0.1, 0.5), Err(AnalysisError::Domain(_))));
        assert!(matches!(cohens_h(0.5, 1.01), Err(AnalysisError::Domain(_))));
        assert!(cohens_h(f64::NAN, 0.5).is_err());
    }
}
