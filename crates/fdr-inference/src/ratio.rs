//! Weighted-ratio bootstrap.
//!
//! The estimated quantity is the ratio of two pair-weighted means,
//!
//! ```text
//!     R = (Σ n_i w_i / Σ w_i) / (Σ d_i v_i / Σ v_i)
//! ```
//!
//! where `n_i`, `d_i` are an event's numerator and denominator correlators and
//! `w_i`, `v_i` their pair multiplicities. The uncertainty is the spread of `R`
//! over case-resampled replicates of the event list.
//!
//! Replicate `b` draws its indices from a generator seeded with
//! `replicate_seed(seed, b)`, so replicates are independent streams and can be
//! produced on any number of threads without changing a single bit of output.

use fdr_core::{
    BootstrapResult, CentralityBin, Correlator, Error, EventRecord, EventTable, Observable,
    PairSpecies, Result,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::bootstrap_ci::{self, BootstrapCiMethod, ConfidenceInterval};

/// Minimum qualifying events for a centrality bin to be analysed.
pub const MIN_EVENTS_PER_BIN: usize = 10;

/// Default number of bootstrap replicates.
pub const DEFAULT_N_BOOTSTRAP: usize = 1000;

/// Default replicate seed.
pub const DEFAULT_SEED: u64 = 42;

/// Default last centrality bin analysed (bin 5 = 50-60%).
pub const DEFAULT_MAX_BIN: u8 = 5;

/// Knobs of a bootstrap run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapOptions {
    /// Number of replicates (must be ≥ 2).
    pub n_bootstrap: usize,
    /// Base seed; replicate streams are derived from it.
    pub seed: u64,
    /// Value substituted for a ratio whose denominator mean is exactly zero.
    pub degenerate_value: f64,
    /// Bins with fewer qualifying events are skipped.
    pub min_events_per_bin: usize,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            n_bootstrap: DEFAULT_N_BOOTSTRAP,
            seed: DEFAULT_SEED,
            degenerate_value: 0.0,
            min_events_per_bin: MIN_EVENTS_PER_BIN,
        }
    }
}

/// Which ratios to compute, and over which bins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioPlan {
    /// Correlator family shared by numerators and denominator.
    pub correlator: Correlator,
    /// Denominator species.
    pub denominator: PairSpecies,
    /// Numerator species, each compared against the same denominator.
    pub numerators: Vec<PairSpecies>,
    /// Last centrality bin analysed (inclusive).
    pub max_bin: CentralityBin,
}

impl Default for RatioPlan {
    fn default() -> Self {
        Self {
            correlator: Correlator::Delta,
            denominator: PairSpecies::LambdaLambda,
            numerators: vec![PairSpecies::PFromLambda, PairSpecies::PiFromLambda],
            max_bin: CentralityBin::clamped(DEFAULT_MAX_BIN),
        }
    }
}

impl RatioPlan {
    /// Denominator observable.
    pub fn denominator_observable(&self) -> Observable {
        Observable::new(self.correlator, self.denominator)
    }

    /// Numerator observables, in plan order.
    pub fn numerator_observables(&self) -> Vec<Observable> {
        self.numerators.iter().map(|&s| Observable::new(self.correlator, s)).collect()
    }
}

/// Bootstrap result for one numerator within one bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumeratorResult {
    /// Numerator observable.
    pub observable: Observable,
    /// Estimate of numerator / denominator.
    pub result: BootstrapResult,
}

/// Outcome of one centrality bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BinOutcome {
    /// Enough events: one result per numerator.
    Analyzed {
        /// Centrality bin.
        bin: CentralityBin,
        /// Qualifying events in the bin.
        n_events: usize,
        /// Per-numerator results, in plan order.
        ratios: Vec<NumeratorResult>,
    },
    /// Below the minimum-events floor.
    Skipped {
        /// Centrality bin.
        bin: CentralityBin,
        /// Qualifying events in the bin.
        n_events: usize,
    },
}

impl BinOutcome {
    /// Centrality bin.
    pub fn bin(&self) -> CentralityBin {
        match self {
            BinOutcome::Analyzed { bin, .. } | BinOutcome::Skipped { bin, .. } => *bin,
        }
    }

    /// Qualifying events in the bin.
    pub fn n_events(&self) -> usize {
        match self {
            BinOutcome::Analyzed { n_events, .. } | BinOutcome::Skipped { n_events, .. } => {
                *n_events
            }
        }
    }

    /// True if the bin fell below the floor.
    pub fn is_skipped(&self) -> bool {
        matches!(self, BinOutcome::Skipped { .. })
    }

    /// Result for a numerator, if the bin was analysed.
    pub fn ratio_for(&self, numerator: Observable) -> Option<&BootstrapResult> {
        match self {
            BinOutcome::Analyzed { ratios, .. } => {
                ratios.iter().find(|r| r.observable == numerator).map(|r| &r.result)
            }
            BinOutcome::Skipped { .. } => None,
        }
    }
}

/// Running sums of both weighted means.
#[derive(Debug, Default, Clone, Copy)]
struct RatioSums {
    num: f64,
    num_w: f64,
    den: f64,
    den_w: f64,
}

impl RatioSums {
    #[inline]
    fn add(&mut self, r: &EventRecord) {
        self.num += r.numerator_value * r.numerator_weight;
        self.num_w += r.numerator_weight;
        self.den += r.denominator_value * r.denominator_weight;
        self.den_w += r.denominator_weight;
    }

    #[inline]
    fn merged(&self, other: &RatioSums) -> RatioSums {
        RatioSums {
            num: self.num + other.num,
            num_w: self.num_w + other.num_w,
            den: self.den + other.den,
            den_w: self.den_w + other.den_w,
        }
    }

    #[inline]
    fn ratio(&self, degenerate_value: f64) -> f64 {
        let den_mean = mean_or_zero(self.den, self.den_w);
        if den_mean == 0.0 {
            return degenerate_value;
        }
        mean_or_zero(self.num, self.num_w) / den_mean
    }
}

#[inline]
fn mean_or_zero(sum: f64, weight: f64) -> f64 {
    // No pairs means no signal: the producer writes 0 for such events too.
    if weight == 0.0 { 0.0 } else { sum / weight }
}

/// Pair-weighted mean `Σ v_i w_i / Σ w_i` (0 when the total weight is 0).
pub fn weighted_mean(values: &[f64], weights: &[f64]) -> f64 {
    let (sum, w) =
        values.iter().zip(weights).fold((0.0, 0.0), |(s, sw), (&v, &wi)| (s + v * wi, sw + wi));
    mean_or_zero(sum, w)
}

/// Weighted ratio over all records.
pub fn weighted_ratio(records: &[EventRecord], degenerate_value: f64) -> f64 {
    let mut sums = RatioSums::default();
    for r in records {
        sums.add(r);
    }
    sums.ratio(degenerate_value)
}

/// Weighted ratio over `records[i]` for each `i` in `indices` (repeats count again).
pub fn weighted_ratio_indexed(
    records: &[EventRecord],
    indices: &[usize],
    degenerate_value: f64,
) -> f64 {
    let mut sums = RatioSums::default();
    for &i in indices {
        sums.add(&records[i]);
    }
    sums.ratio(degenerate_value)
}

/// SplitMix64 derivation of an independent stream seed for replicate `index`.
#[inline]
pub fn replicate_seed(base_seed: u64, index: u64) -> u64 {
    let mut z = base_seed.wrapping_add(index.wrapping_mul(0x9e37_79b9_7f4a_7c15));
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// One replicate: `records.len()` draws with replacement, then the weighted ratio.
pub fn replicate_ratio(records: &[EventRecord], stream_seed: u64, degenerate_value: f64) -> f64 {
    let n = records.len();
    if n == 0 {
        return degenerate_value;
    }
    let mut rng = StdRng::seed_from_u64(stream_seed);
    let indices: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
    weighted_ratio_indexed(records, &indices, degenerate_value)
}

/// All replicates, in index order.
pub fn bootstrap_replicates(
    records: &[EventRecord],
    n_bootstrap: usize,
    seed: u64,
    degenerate_value: f64,
) -> Vec<f64> {
    use rayon::prelude::*;

    (0..n_bootstrap)
        .into_par_iter()
        .map(|b| replicate_ratio(records, replicate_seed(seed, b as u64), degenerate_value))
        .collect()
}

/// Bessel-corrected standard deviation (Welford), `NaN` for fewer than 2 values.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let mut mean = 0.0;
    let mut m2 = 0.0;
    for (k, &x) in values.iter().enumerate() {
        let delta = x - mean;
        mean += delta / (k + 1) as f64;
        m2 += delta * (x - mean);
    }
    (m2 / (values.len() - 1) as f64).sqrt()
}

/// Bootstrap a weighted ratio with the default degenerate policy.
///
/// `records` must be non-empty and `bootstrap_count` at least 2; a single
/// replicate has no spread and is rejected with [`Error::InsufficientSamples`].
pub fn compute_ratio(
    records: &[EventRecord],
    bootstrap_count: usize,
    rng_seed: u64,
) -> Result<BootstrapResult> {
    let options =
        BootstrapOptions { n_bootstrap: bootstrap_count, seed: rng_seed, ..Default::default() };
    compute_ratio_with(records, &options)
}

/// Bootstrap a weighted ratio.
pub fn compute_ratio_with(
    records: &[EventRecord],
    options: &BootstrapOptions,
) -> Result<BootstrapResult> {
    if options.n_bootstrap < 2 {
        return Err(Error::InsufficientSamples { required: 2, got: options.n_bootstrap });
    }
    if records.is_empty() {
        return Err(Error::Validation("compute_ratio requires at least one record".into()));
    }
    if let Some(r) = records.iter().find(|r| r.denominator_weight <= 0.0) {
        return Err(Error::Validation(format!(
            "record with non-positive denominator pair count {} in bin {}",
            r.denominator_weight, r.centrality_bin
        )));
    }

    let point_estimate = weighted_ratio(records, options.degenerate_value);
    let replicates =
        bootstrap_replicates(records, options.n_bootstrap, options.seed, options.degenerate_value);
    let standard_error = sample_std(&replicates);

    Ok(BootstrapResult {
        point_estimate,
        standard_error,
        replicate_distribution: replicates,
        n_events: records.len(),
        seed: options.seed,
    })
}

/// Leave-one-out weighted ratios, one per record.
///
/// Each estimate joins the sums of the records before and after the left-out
/// one, so a record with a dominant pair count is never subtracted back out.
pub fn jackknife_ratios(records: &[EventRecord], degenerate_value: f64) -> Result<Vec<f64>> {
    if records.len() < 2 {
        return Err(Error::Validation("jackknife requires at least 2 records".into()));
    }
    // suffix[i] = sums over records[i..]
    let mut suffix = vec![RatioSums::default(); records.len() + 1];
    for (i, r) in records.iter().enumerate().rev() {
        suffix[i] = suffix[i + 1];
        suffix[i].add(r);
    }

    let mut prefix = RatioSums::default();
    let mut out = Vec::with_capacity(records.len());
    for (i, r) in records.iter().enumerate() {
        out.push(prefix.merged(&suffix[i + 1]).ratio(degenerate_value));
        prefix.add(r);
    }
    Ok(out)
}

/// Confidence interval of a bootstrap result.
///
/// BCa needs the records the result was computed from (for the jackknife
/// acceleration); the percentile method ignores them.
pub fn ratio_interval(
    result: &BootstrapResult,
    records: &[EventRecord],
    method: BootstrapCiMethod,
    conf_level: f64,
    degenerate_value: f64,
) -> Result<ConfidenceInterval> {
    match method {
        BootstrapCiMethod::Percentile => {
            bootstrap_ci::percentile_interval(&result.replicate_distribution, conf_level)
        }
        BootstrapCiMethod::Bca => {
            let jackknife = jackknife_ratios(records, degenerate_value)?;
            let (ci, diag) = bootstrap_ci::bca_interval(
                result.point_estimate,
                &result.replicate_distribution,
                &jackknife,
                conf_level,
            )?;
            log::debug!(
                "BCa z0={:.4} a={:.4} alpha=({:.4}, {:.4})",
                diag.z0,
                diag.acceleration,
                diag.alpha_low_adj,
                diag.alpha_high_adj
            );
            Ok(ci)
        }
    }
}

/// Bootstrap every numerator of `plan` in every bin up to `plan.max_bin`.
///
/// Only events with a positive denominator pair count are considered. A table
/// without any such event is fatal ([`Error::NoEvents`]); a bin below
/// `options.min_events_per_bin` is reported as [`BinOutcome::Skipped`].
pub fn run_for_all_bins(
    table: &EventTable,
    plan: &RatioPlan,
    options: &BootstrapOptions,
) -> Result<Vec<BinOutcome>> {
    if plan.numerators.is_empty() {
        return Err(Error::Validation("ratio plan has no numerators".into()));
    }
    if options.n_bootstrap < 2 {
        return Err(Error::InsufficientSamples { required: 2, got: options.n_bootstrap });
    }

    let denominator = plan.denominator_observable();
    let numerators = plan.numerator_observables();
    for &num in &numerators {
        table.require(num)?;
    }

    let qualifying = table.qualifying(denominator)?;
    if qualifying.is_empty() {
        return Err(Error::NoEvents);
    }

    let counts = qualifying.count_by_bin();
    let floor = options.min_events_per_bin.max(1);
    let mut outcomes = Vec::new();

    for bin in CentralityBin::range_inclusive(plan.max_bin.index())? {
        let n_events = counts[usize::from(bin.index())];
        if n_events < floor {
            log::warn!(
                "only {n_events} events in centrality bin {bin} ({}), skipping",
                bin.label()
            );
            outcomes.push(BinOutcome::Skipped { bin, n_events });
            continue;
        }

        log::debug!("centrality bin {bin} ({}): {n_events} events", bin.label());
        let mut ratios = Vec::with_capacity(numerators.len());
        for &num in &numerators {
            let records = qualifying.records_in_bin(bin, num, denominator)?;
            let result = compute_ratio_with(&records, options)?;
            ratios.push(NumeratorResult { observable: num, result });
        }
        outcomes.push(BinOutcome::Analyzed { bin, n_events, ratios });
    }

    Ok(outcomes)
}
