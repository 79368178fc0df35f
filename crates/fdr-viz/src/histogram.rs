//! Fixed-range histogram of a bootstrap replicate distribution.

use fdr_core::{BootstrapResult, Error, Result};
use serde::{Deserialize, Serialize};

/// Default number of histogram bins.
pub const DEFAULT_HIST_BINS: usize = 50;

/// Default half-width in units of the standard error.
pub const DEFAULT_WIDTH_SIGMAS: f64 = 5.0;

/// Replicate histogram centred on the point estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicateHistogram {
    /// Lower edge of the first bin.
    pub low: f64,
    /// Upper edge of the last bin.
    pub high: f64,
    /// Bin edges (`counts.len() + 1` values).
    pub edges: Vec<f64>,
    /// In-range counts.
    pub counts: Vec<u64>,
    /// Replicates below `low`.
    pub underflow: u64,
    /// Replicates at or above `high`.
    pub overflow: u64,
    /// Point estimate the range is centred on.
    pub point_estimate: f64,
    /// Standard error used for the range.
    pub standard_error: f64,
    /// Mean of all replicates.
    pub replicate_mean: f64,
}

impl ReplicateHistogram {
    /// Histogram over `[pe - k·σ, pe + k·σ]`.
    ///
    /// With `σ = 0` (all replicates equal) the half-width falls back to
    /// `1e-6 · max(|pe|, 1)` so the single spike still lands in a bin.
    pub fn from_result(result: &BootstrapResult, n_bins: usize, width_sigmas: f64) -> Result<Self> {
        if n_bins == 0 {
            return Err(Error::Validation("histogram needs at least one bin".into()));
        }
        if !(width_sigmas.is_finite() && width_sigmas > 0.0) {
            return Err(Error::Validation(format!(
                "histogram width must be positive, got {width_sigmas}"
            )));
        }

        let pe = result.point_estimate;
        let sigma = result.standard_error;
        let half = if sigma.is_finite() && sigma > 0.0 {
            width_sigmas * sigma
        } else {
            1e-6 * pe.abs().max(1.0)
        };
        let (low, high) = (pe - half, pe + half);
        let width = (high - low) / n_bins as f64;

        let mut counts = vec![0u64; n_bins];
        let (mut underflow, mut overflow) = (0u64, 0u64);
        for &x in &result.replicate_distribution {
            if x < low {
                underflow += 1;
            } else if x >= high {
                overflow += 1;
            } else {
                let i = (((x - low) / width) as usize).min(n_bins - 1);
                counts[i] += 1;
            }
        }

        Ok(Self {
            low,
            high,
            edges: (0..=n_bins).map(|i| low + width * i as f64).collect(),
            counts,
            underflow,
            overflow,
            point_estimate: pe,
            standard_error: sigma,
            replicate_mean: result.replicate_mean(),
        })
    }

    /// Total entries including under/overflow.
    pub fn entries(&self) -> u64 {
        self.counts.iter().sum::<u64>() + self.underflow + self.overflow
    }
}
