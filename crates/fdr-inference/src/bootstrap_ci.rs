//! Confidence intervals from a bootstrap replicate distribution.
//!
//! Two constructions are offered:
//! - percentile: the empirical `(1-cl)/2` and `(1+cl)/2` quantiles,
//! - BCa (Efron 1987): the same quantiles at levels shifted by a bias
//!   correction `z0` (from the replicates) and an acceleration `a` (from the
//!   jackknife leave-one-out estimates).
//!
//! Ratios of weighted means are skewed when the denominator is small, which
//! is where BCa and percentile intervals part ways.

use fdr_core::{Error, Result};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

/// Probabilities are kept inside `[P_MIN, 1 - P_MIN]` before `Φ⁻¹`.
const P_MIN: f64 = 1e-12;

/// Fewest jackknife estimates (records) a BCa acceleration can use.
pub const MIN_BCA_RECORDS: usize = 3;

/// Interval construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BootstrapCiMethod {
    /// Empirical quantiles of the replicates.
    Percentile,
    /// Bias-corrected and accelerated quantiles.
    Bca,
}

impl std::str::FromStr for BootstrapCiMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "percentile" => Ok(Self::Percentile),
            "bca" => Ok(Self::Bca),
            other => Err(Error::Validation(format!(
                "unknown interval method '{other}' (expected 'percentile' or 'bca')"
            ))),
        }
    }
}

/// Two-sided interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    /// Lower bound.
    pub lower: f64,
    /// Upper bound.
    pub upper: f64,
    /// Nominal coverage in `(0, 1)`.
    pub conf_level: f64,
    /// How the bounds were obtained.
    pub method: BootstrapCiMethod,
}

/// Intermediate BCa quantities, for logging.
#[derive(Debug, Clone)]
pub struct BcaDiagnostics {
    /// Bias correction.
    pub z0: f64,
    /// Acceleration.
    pub acceleration: f64,
    /// Adjusted lower quantile level.
    pub alpha_low_adj: f64,
    /// Adjusted upper quantile level.
    pub alpha_high_adj: f64,
}

fn unit_normal() -> Result<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| Error::Computation(format!("standard normal: {e}")))
}

fn check_conf_level(conf_level: f64) -> Result<()> {
    if conf_level.is_finite() && conf_level > 0.0 && conf_level < 1.0 {
        Ok(())
    } else {
        Err(Error::Validation(format!("conf_level must be in (0,1), got {conf_level}")))
    }
}

fn sorted_finite(samples: &[f64]) -> Result<Vec<f64>> {
    if samples.len() < 2 {
        return Err(Error::InsufficientSamples { required: 2, got: samples.len() });
    }
    if samples.iter().any(|x| !x.is_finite()) {
        return Err(Error::Validation("bootstrap replicates must be finite".into()));
    }
    let mut v = samples.to_vec();
    v.sort_by(f64::total_cmp);
    Ok(v)
}

/// Linear-interpolation quantile of ascending data (`NaN` when empty).
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = (lo + 1).min(n - 1);
            let t = pos - lo as f64;
            sorted[lo] + t * (sorted[hi] - sorted[lo])
        }
    }
}

/// Percentile interval of the replicates.
pub fn percentile_interval(samples: &[f64], conf_level: f64) -> Result<ConfidenceInterval> {
    check_conf_level(conf_level)?;
    let sorted = sorted_finite(samples)?;
    let tail = 0.5 * (1.0 - conf_level);
    Ok(ConfidenceInterval {
        lower: quantile_sorted(&sorted, tail),
        upper: quantile_sorted(&sorted, 1.0 - tail),
        conf_level,
        method: BootstrapCiMethod::Percentile,
    })
}

/// `z0 = Φ⁻¹(p)` with `p` the mid-rank fraction of replicates below `theta_hat`.
pub fn bias_correction(theta_hat: f64, samples: &[f64]) -> Result<f64> {
    if samples.is_empty() || !theta_hat.is_finite() {
        return Err(Error::Validation(
            "bias correction needs replicates and a finite estimate".into(),
        ));
    }
    let (below, tied) = samples.iter().fold((0usize, 0usize), |(b, t), &x| {
        if x < theta_hat {
            (b + 1, t)
        } else if x == theta_hat {
            (b, t + 1)
        } else {
            (b, t)
        }
    });
    let p = (below as f64 + 0.5 * tied as f64) / samples.len() as f64;
    Ok(unit_normal()?.inverse_cdf(p.clamp(P_MIN, 1.0 - P_MIN)))
}

/// Jackknife acceleration `a = Σd³ / (6 (Σd²)^{3/2})`, `d = mean - θ_(i)`.
///
/// Returns 0 when the leave-one-out estimates do not vary.
pub fn acceleration(jackknife: &[f64]) -> Result<f64> {
    if jackknife.len() < MIN_BCA_RECORDS {
        return Err(Error::InsufficientSamples {
            required: MIN_BCA_RECORDS,
            got: jackknife.len(),
        });
    }
    if jackknife.iter().any(|x| !x.is_finite()) {
        return Err(Error::Validation("jackknife estimates must be finite".into()));
    }
    let mean = jackknife.iter().sum::<f64>() / jackknife.len() as f64;
    let (s2, s3) = jackknife.iter().fold((0.0, 0.0), |(s2, s3), &x| {
        let d = mean - x;
        (s2 + d * d, s3 + d * d * d)
    });
    if s2 <= 0.0 {
        return Ok(0.0);
    }
    let a = s3 / (6.0 * s2.powf(1.5));
    if a.is_finite() {
        Ok(a)
    } else {
        Err(Error::Computation("non-finite BCa acceleration".into()))
    }
}

/// Quantile level that BCa uses in place of `alpha`.
pub fn adjusted_level(alpha: f64, z0: f64, accel: f64) -> Result<f64> {
    let normal = unit_normal()?;
    let z = normal.inverse_cdf(alpha.clamp(P_MIN, 1.0 - P_MIN));
    let denom = 1.0 - accel * (z0 + z);
    if !denom.is_finite() || denom.abs() < 1e-12 {
        return Ok(if denom.is_sign_negative() { P_MIN } else { 1.0 - P_MIN });
    }
    Ok(normal.cdf(z0 + (z0 + z) / denom).clamp(P_MIN, 1.0 - P_MIN))
}

/// BCa interval.
pub fn bca_interval(
    theta_hat: f64,
    samples: &[f64],
    jackknife: &[f64],
    conf_level: f64,
) -> Result<(ConfidenceInterval, BcaDiagnostics)> {
    check_conf_level(conf_level)?;
    let sorted = sorted_finite(samples)?;
    let z0 = bias_correction(theta_hat, samples)?;
    let accel = acceleration(jackknife)?;

    let tail = 0.5 * (1.0 - conf_level);
    let alpha_low_adj = adjusted_level(tail, z0, accel)?;
    let alpha_high_adj = adjusted_level(1.0 - tail, z0, accel)?;
    let a = quantile_sorted(&sorted, alpha_low_adj);
    let b = quantile_sorted(&sorted, alpha_high_adj);

    Ok((
        ConfidenceInterval {
            lower: a.min(b),
            upper: a.max(b),
            conf_level,
            method: BootstrapCiMethod::Bca,
        },
        BcaDiagnostics { z0, acceleration: accel, alpha_low_adj, alpha_high_adj },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn quantile_interpolates() {
        let s = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_abs_diff_eq!(quantile_sorted(&s, 0.0), 1.0);
        assert_abs_diff_eq!(quantile_sorted(&s, 1.0), 5.0);
        assert_abs_diff_eq!(quantile_sorted(&s, 0.125), 1.5, epsilon = 1e-12);
        assert!(quantile_sorted(&[], 0.5).is_nan());
    }

    #[test]
    fn percentile_needs_two_samples() {
        assert!(matches!(
            percentile_interval(&[1.0], 0.9),
            Err(Error::InsufficientSamples { required: 2, got: 1 })
        ));
        assert!(percentile_interval(&[1.0, 2.0], 1.0).is_err());
    }

    #[test]
    fn percentile_is_ordered() {
        let xs: Vec<f64> = (0..101).map(|i| i as f64).collect();
        let ci = percentile_interval(&xs, 0.9).unwrap();
        assert_abs_diff_eq!(ci.lower, 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(ci.upper, 95.0, epsilon = 1e-9);
    }

    #[test]
    fn bias_correction_zero_at_median() {
        let xs = [-2.0, -1.0, 1.0, 2.0];
        assert_abs_diff_eq!(bias_correction(0.0, &xs).unwrap(), 0.0, epsilon = 1e-9);
        assert!(bias_correction(1.5, &xs).unwrap() > 0.0);
    }

    #[test]
    fn flat_jackknife_has_no_acceleration() {
        assert_eq!(acceleration(&[0.3; 5]).unwrap(), 0.0);
    }

    #[test]
    fn adjusted_level_is_identity_without_correction() {
        for a in [0.05, 0.16, 0.5, 0.84, 0.95] {
            assert_abs_diff_eq!(adjusted_level(a, 0.0, 0.0).unwrap(), a, epsilon = 1e-9);
        }
    }

    #[test]
    fn bca_on_skewed_sample() {
        let boot = [0.2, 0.3, 0.31, 0.35, 0.4, 0.45, 0.6, 0.9, 1.1, 1.2];
        let jk = [0.41, 0.43, 0.39, 0.42, 0.40, 0.44, 0.38, 0.41, 0.43, 0.40];
        let (ci, diag) = bca_interval(0.4, &boot, &jk, 0.9).unwrap();
        assert!(ci.lower < ci.upper);
        assert!(diag.z0.is_finite() && diag.acceleration.is_finite());
        assert_eq!(ci.method, BootstrapCiMethod::Bca);
    }
}
