// Power analysis for two independent proportions
//
// Normal approximation on Cohen's h. For per-group sizes n1 and n2 the
// standardized effect is |h| / sqrt(1/n1 + 1/n2), which reduces to
// |h|·sqrt(n/2) for a balanced design:
//
//   power(n) = Φ(|h|·sqrt(n/2) − z₁₋α/₂) + Φ(−|h|·sqrt(n/2) − z₁₋α/₂)
//
// The required sample size starts from the closed-form inversion
// n = 2·((z₁₋α/₂ + z_power) / h)² and is then stepped to the smallest
// integer meeting target power, so feeding it back into achieved_power is
// always consistent.

use crate::experiment::config::check_open_unit;
use crate::experiment::error::{AnalysisError, Result};
use crate::experiment::proportion::{cohens_h, normal_cdf, normal_quantile, z_critical};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Outcome of a power analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerResult {
    pub baseline_rate: f64,
    pub minimum_detectable_effect: f64,
    /// Cohen's h between the baseline and `baseline + mde`
    pub effect_size: f64,
    pub alpha: f64,
    pub target_power: f64,
    /// Smallest per-group sample size reaching target power
    pub required_sample_size: u64,
    pub control_n: u64,
    pub treatment_n: u64,
    /// Power given the actual group sizes
    pub achieved_power: f64,
    pub adequately_powered: bool,
}

/// Power calculator for a fixed baseline, effect and significance level
#[derive(Debug, Clone)]
pub struct PowerAnalyzer {
    baseline_rate: f64,
    minimum_detectable_effect: f64,
    alpha: f64,
    target_power: f64,
    effect_size: f64,
    z_alpha: f64,
}

impl PowerAnalyzer {
    /// # Errors
    ///
    /// - `Domain` when the baseline is 0 or 1, or `baseline + mde` leaves [0, 1]
    /// - `InvalidArgument` for a zero effect or alpha/power outside (0, 1)
    ///
    /// # Example
    /// ```
    /// use veredicto::experiment::PowerAnalyzer;
    ///
    /// let analyzer = PowerAnalyzer::new(0.10, 0.02, 0.05, 0.80).unwrap();
    /// let n = analyzer.required_sample_size().unwrap();
    /// assert!(analyzer.achieved_power(n).unwrap() >= 0.80);
    /// ```
    pub fn new(
        baseline_rate: f64,
        minimum_detectable_effect: f64,
        alpha: f64,
        target_power: f64,
    ) -> Result<Self> {
        check_open_unit("alpha", alpha)?;
        check_open_unit("target_power", target_power)?;

        if !minimum_detectable_effect.is_finite() || minimum_detectable_effect == 0.0 {
            return Err(AnalysisError::InvalidArgument(format!(
                "minimum detectable effect must be non-zero, got {}",
                minimum_detectable_effect
            )));
        }

        if !(baseline_rate > 0.0 && baseline_rate < 1.0) {
            return Err(AnalysisError::Domain(format!(
                "baseline rate {} leaves Cohen's h undefined for a non-zero effect",
                baseline_rate
            )));
        }

        let target_rate = baseline_rate + minimum_detectable_effect;
        if !(0.0..=1.0).contains(&target_rate) {
            return Err(AnalysisError::Domain(format!(
                "baseline {} + effect {} = {} is not a probability",
                baseline_rate, minimum_detectable_effect, target_rate
            )));
        }

        let effect_size = cohens_h(baseline_rate, target_rate)?;
        let z_alpha = z_critical(1.0 - alpha)?;

        Ok(Self {
            baseline_rate,
            minimum_detectable_effect,
            alpha,
            target_power,
            effect_size,
            z_alpha,
        })
    }

    pub fn effect_size(&self) -> f64 {
        self.effect_size
    }

    /// Power for `n` observations in each group
    pub fn achieved_power(&self, n: u64) -> Result<f64> {
        self.achieved_power_unbalanced(n, n)
    }

    /// Power for unequal group sizes
    pub fn achieved_power_unbalanced(&self, n1: u64, n2: u64) -> Result<f64> {
        if n1 == 0 || n2 == 0 {
            return Err(AnalysisError::InvalidArgument(format!(
                "sample sizes must be positive (n1={}, n2={})",
                n1, n2
            )));
        }

        let shift = self.effect_size.abs() / (1.0 / n1 as f64 + 1.0 / n2 as f64).sqrt();
        let power = normal_cdf(shift - self.z_alpha)? + normal_cdf(-shift - self.z_alpha)?;
        Ok(power.clamp(0.0, 1.0))
    }

    pub fn is_adequately_powered(&self, n: u64) -> Result<bool> {
        Ok(self.achieved_power(n)? >= self.target_power)
    }

    /// Smallest per-group `n` whose achieved power reaches target power
    pub fn required_sample_size(&self) -> Result<u64> {
        let z_beta = normal_quantile(self.target_power)?;
        let estimate = 2.0 * ((self.z_alpha + z_beta) / self.effect_size).powi(2);
        let mut n = (estimate.ceil() as u64).max(1);

        // The closed form ignores the opposite rejection tail, so it can be
        // off by a unit in either direction.
        while n > 1 && self.achieved_power(n - 1)? >= self.target_power {
            n -= 1;
        }
        while self.achieved_power(n)? < self.target_power {
            n += 1;
        }

        Ok(n)
    }

    /// Full analysis against the actual group sizes
    pub fn analyze(&self, control_n: u64, treatment_n: u64) -> Result<PowerResult> {
        let required_sample_size = self.required_sample_size()?;
        let achieved_power = self.achieved_power_unbalanced(control_n, treatment_n)?;
        let adequately_powered = achieved_power >= self.target_power;

        debug!(
            effect_size = self.effect_size,
            required_sample_size, achieved_power, "power analysis"
        );
        if !adequately_powered {
            warn!(
                "statistical power {:.3} is below target {:.2}",
                achieved_power, self.target_power
            );
        }

        Ok(PowerResult {
            baseline_rate: self.baseline_rate,
            minimum_detectable_effect: self.minimum_detectable_effect,
            effect_size: self.effect_size,
            alpha: self.alpha,
            target_power: self.target_power,
            required_sample_size,
            control_n,
            treatment_n,
            achieved_power,
            adequately_powered,
        })
    }
}
