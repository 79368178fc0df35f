//! # fdr-inference
//!
//! Statistical estimation for fdratio.
//!
//! This crate provides:
//! - the bootstrap ratio estimator (`compute_ratio`, `run_for_all_bins`),
//! - pair-weighted means and jackknife leave-one-out ratios,
//! - bootstrap confidence intervals (percentile and BCa).
//!
//! Resampling is case resampling: whole events are drawn with replacement, so
//! the correlation between an event's numerator and denominator survives into
//! every replicate.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Bootstrap confidence intervals (percentile, BCa).
pub mod bootstrap_ci;
/// Weighted-ratio bootstrap estimator.
pub mod ratio;

pub use bootstrap_ci::{BootstrapCiMethod, ConfidenceInterval};
pub use ratio::{
    BinOutcome, BootstrapOptions, NumeratorResult, RatioPlan, compute_ratio, compute_ratio_with,
    jackknife_ratios, ratio_interval, run_for_all_bins, weighted_mean, weighted_ratio,
    weighted_ratio_indexed,
};
