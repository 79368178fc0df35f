//! JSON artifacts (numbers-first).

use std::time::{SystemTime, UNIX_EPOCH};

use fdr_core::{CentralityBin, Correlator, Error, EventTable, Observable, PairSpecies, Result};
use fdr_inference::bootstrap_ci::MIN_BCA_RECORDS;
use fdr_inference::{
    BinOutcome, BootstrapCiMethod, BootstrapOptions, ConfidenceInterval, RatioPlan, ratio_interval,
};
use serde::Serialize;

use crate::fit::{ConstantFit, constant_fit};
use crate::graph::{GraphErrors, bootstrap_graph, profile_graph, ratio_graph, subtract_graphs};
use crate::histogram::{DEFAULT_HIST_BINS, DEFAULT_WIDTH_SIGMAS, ReplicateHistogram};

/// Schema tag of [`BootstrapArtifact`].
pub const BOOTSTRAP_SCHEMA_V1: &str = "fdratio_bootstrap_v1";
/// Schema tag of [`RatioArtifact`].
pub const RATIO_SCHEMA_V1: &str = "fdratio_naive_ratio_v1";
/// Schema tag of [`DiffArtifact`].
pub const DIFF_SCHEMA_V1: &str = "fdratio_diff_v1";

fn now_unix_ms() -> Result<u128> {
    let d = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| Error::Computation(format!("system time error: {e}")))?;
    Ok(d.as_millis())
}

/// Result of a bootstrap run over all centrality bins.
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapArtifact {
    /// Always [`BOOTSTRAP_SCHEMA_V1`].
    pub schema_version: String,
    /// Run settings.
    pub meta: BootstrapMeta,
    /// One entry per requested bin, skipped bins included.
    pub bins: Vec<BootstrapBinEntry>,
    /// Ratio against centrality, one graph per numerator.
    pub graphs: Vec<GraphErrors>,
    /// Replicate histograms, empty unless requested.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub histograms: Vec<HistogramEntry>,
}

/// Settings a bootstrap run was made with.
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapMeta {
    /// Producing tool (`fdratio`).
    pub tool: String,
    /// Tool version.
    pub tool_version: String,
    /// Creation time, ms since the Unix epoch.
    pub created_unix_ms: u128,
    /// Input path, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    /// Correlator family.
    pub correlator: Correlator,
    /// Denominator observable.
    pub denominator: Observable,
    /// Numerator observables, in output order.
    pub numerators: Vec<Observable>,
    /// Replicates per bin.
    pub n_bootstrap: usize,
    /// Base seed.
    pub seed: u64,
    /// Skip floor.
    pub min_events_per_bin: usize,
    /// Ratio used for a zero denominator mean.
    pub degenerate_value: f64,
    /// Requested interval coverage.
    pub conf_level: f64,
    /// Requested interval construction.
    pub ci_method: BootstrapCiMethod,
}

/// One centrality bin.
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapBinEntry {
    /// Decile index.
    pub bin: CentralityBin,
    /// Label such as `10-20%`.
    pub centrality: String,
    /// Bin center in percent.
    pub centrality_percent: f64,
    /// Qualifying events in the bin.
    pub n_events: usize,
    /// True if the bin fell below the event floor.
    pub skipped: bool,
    /// Empty for skipped bins.
    pub ratios: Vec<RatioEntry>,
}

/// Bootstrap ratio of one numerator in one bin.
#[derive(Debug, Clone, Serialize)]
pub struct RatioEntry {
    /// Numerator observable.
    pub observable: Observable,
    /// Plot label.
    pub label: String,
    /// Point estimate.
    pub ratio: f64,
    /// Bootstrap standard error.
    pub error: f64,
    /// Lower interval bound.
    pub ci_low: f64,
    /// Upper interval bound.
    pub ci_high: f64,
    /// Construction actually used; bins too small for BCa fall back to
    /// percentile.
    pub ci_method: BootstrapCiMethod,
    /// Mean of the replicates.
    pub replicate_mean: f64,
    /// Replicate count.
    pub n_bootstrap: usize,
}

/// Replicate histogram of one numerator in one bin.
#[derive(Debug, Clone, Serialize)]
pub struct HistogramEntry {
    /// `h_bootstrap_<stem>_cent<bin>`.
    pub name: String,
    /// Decile index.
    pub bin: CentralityBin,
    /// Numerator observable.
    pub observable: Observable,
    /// Histogram data.
    pub histogram: ReplicateHistogram,
}

/// Interval settings for [`BootstrapArtifact::build`].
#[derive(Debug, Clone, Copy)]
pub struct IntervalSettings {
    /// Nominal coverage.
    pub conf_level: f64,
    /// Construction.
    pub method: BootstrapCiMethod,
}

impl Default for IntervalSettings {
    fn default() -> Self {
        // ±1σ coverage, matching the quoted standard errors.
        Self { conf_level: 0.6827, method: BootstrapCiMethod::Percentile }
    }
}

impl BootstrapArtifact {
    /// Assemble the artifact of a [`fdr_inference::run_for_all_bins`] run.
    ///
    /// `table` must be the table the outcomes were computed from; BCa
    /// intervals re-derive each bin's records from it for the jackknife.
    pub fn build(
        table: &EventTable,
        outcomes: &[BinOutcome],
        plan: &RatioPlan,
        options: &BootstrapOptions,
        intervals: IntervalSettings,
        with_histograms: bool,
    ) -> Result<Self> {
        let denominator = plan.denominator_observable();
        let numerators = plan.numerator_observables();

        let mut bins = Vec::with_capacity(outcomes.len());
        let mut histograms = Vec::new();
        for outcome in outcomes {
            let bin = outcome.bin();
            let mut ratios = Vec::new();
            for &num in &numerators {
                let Some(result) = outcome.ratio_for(num) else {
                    continue;
                };
                let ci = bin_interval(table, bin, num, denominator, result, options, intervals)?;
                ratios.push(RatioEntry {
                    observable: num,
                    label: num.label(),
                    ratio: result.point_estimate,
                    error: result.standard_error,
                    ci_low: ci.lower,
                    ci_high: ci.upper,
                    ci_method: ci.method,
                    replicate_mean: result.replicate_mean(),
                    n_bootstrap: result.n_bootstrap(),
                });
                if with_histograms {
                    histograms.push(HistogramEntry {
                        name: format!("h_bootstrap_{}_cent{}", num.species.file_stem(), bin),
                        bin,
                        observable: num,
                        histogram: ReplicateHistogram::from_result(
                            result,
                            DEFAULT_HIST_BINS,
                            DEFAULT_WIDTH_SIGMAS,
                        )?,
                    });
                }
            }
            bins.push(BootstrapBinEntry {
                bin,
                centrality: bin.label(),
                centrality_percent: bin.center_percent(),
                n_events: outcome.n_events(),
                skipped: outcome.is_skipped(),
                ratios,
            });
        }

        Ok(Self {
            schema_version: BOOTSTRAP_SCHEMA_V1.to_string(),
            meta: BootstrapMeta {
                tool: "fdratio".to_string(),
                tool_version: fdr_core::VERSION.to_string(),
                created_unix_ms: now_unix_ms()?,
                input: None,
                correlator: plan.correlator,
                denominator,
                numerators: numerators.clone(),
                n_bootstrap: options.n_bootstrap,
                seed: options.seed,
                min_events_per_bin: options.min_events_per_bin,
                degenerate_value: options.degenerate_value,
                conf_level: intervals.conf_level,
                ci_method: intervals.method,
            },
            bins,
            graphs: numerators.iter().map(|&n| bootstrap_graph(outcomes, n)).collect(),
            histograms,
        })
    }
}

fn bin_interval(
    table: &EventTable,
    bin: CentralityBin,
    numerator: Observable,
    denominator: Observable,
    result: &fdr_core::BootstrapResult,
    options: &BootstrapOptions,
    intervals: IntervalSettings,
) -> Result<ConfidenceInterval> {
    let mut method = intervals.method;
    let records = match method {
        BootstrapCiMethod::Percentile => Vec::new(),
        BootstrapCiMethod::Bca => table.records_in_bin(bin, numerator, denominator)?,
    };
    if method == BootstrapCiMethod::Bca && records.len() < MIN_BCA_RECORDS {
        log::warn!(
            "bin {bin}: {} events are too few for a BCa interval of {numerator}, using percentile",
            records.len()
        );
        method = BootstrapCiMethod::Percentile;
    }
    ratio_interval(result, &records, method, intervals.conf_level, options.degenerate_value)
}

/// Naive (independent-error) ratio of profiles, with pol0 fits.
#[derive(Debug, Clone, Serialize)]
pub struct RatioArtifact {
    /// Always [`RATIO_SCHEMA_V1`].
    pub schema_version: String,
    /// Tool version.
    pub tool_version: String,
    /// Creation time, ms since the Unix epoch.
    pub created_unix_ms: u128,
    /// Correlator family.
    pub correlator: Correlator,
    /// Ratio points above this centrality are dropped.
    pub max_centrality_percent: f64,
    /// Profiles of every species, denominator first.
    pub profiles: Vec<GraphErrors>,
    /// `p / ΛΛ` then `π / ΛΛ`.
    pub ratios: Vec<FittedRatio>,
}

/// A naive ratio graph and its constant fit.
#[derive(Debug, Clone, Serialize)]
pub struct FittedRatio {
    /// Numerator observable.
    pub numerator: Observable,
    /// Denominator observable.
    pub denominator: Observable,
    /// Ratio against centrality.
    pub graph: GraphErrors,
    /// `None` if the graph has no points.
    pub fit: Option<ConstantFit>,
}

impl RatioArtifact {
    /// Profiles of every species, and `p / ΛΛ`, `π / ΛΛ` with x offsets of
    /// -0.5 and +0.5.
    pub fn build(
        table: &EventTable,
        correlator: Correlator,
        max_centrality_percent: f64,
    ) -> Result<Self> {
        let last = CentralityBin::clamped(u8::MAX);
        let denominator = Observable::new(correlator, PairSpecies::LambdaLambda);
        let den_profile = profile_graph(table, denominator, last)?;

        let mut profiles = vec![den_profile.clone()];
        let mut ratios = Vec::new();
        let offsets = [(PairSpecies::PFromLambda, -0.5), (PairSpecies::PiFromLambda, 0.5)];
        for (species, offset) in offsets {
            let numerator = Observable::new(correlator, species);
            let num_profile = profile_graph(table, numerator, last)?;
            let graph = ratio_graph(
                &num_profile,
                &den_profile,
                &format!("ratio_{}_{}", correlator.prefix(), species.file_stem()),
                max_centrality_percent,
                offset,
            );
            let fit = constant_fit(&graph);
            profiles.push(num_profile);
            ratios.push(FittedRatio { numerator, denominator, graph, fit });
        }

        Ok(Self {
            schema_version: RATIO_SCHEMA_V1.to_string(),
            tool_version: fdr_core::VERSION.to_string(),
            created_unix_ms: now_unix_ms()?,
            correlator,
            max_centrality_percent,
            profiles,
            ratios,
        })
    }
}

/// Difference of two observable profiles.
#[derive(Debug, Clone, Serialize)]
pub struct DiffArtifact {
    /// Always [`DIFF_SCHEMA_V1`].
    pub schema_version: String,
    /// Tool version.
    pub tool_version: String,
    /// Creation time, ms since the Unix epoch.
    pub created_unix_ms: u128,
    /// Profile of the minuend.
    pub minuend: GraphErrors,
    /// Profile of the subtrahend.
    pub subtrahend: GraphErrors,
    /// `minuend - subtrahend` at shared centralities.
    pub difference: GraphErrors,
}

impl DiffArtifact {
    /// `minuend - subtrahend` over all centrality bins.
    pub fn build(table: &EventTable, minuend: Observable, subtrahend: Observable) -> Result<Self> {
        let last = CentralityBin::clamped(u8::MAX);
        let a = profile_graph(table, minuend, last)?;
        let b = profile_graph(table, subtrahend, last)?;
        let difference = subtract_graphs(&a, &b);
        if difference.len() != a.len().max(b.len()) {
            log::warn!(
                "{} has {} points and {} has {}; {} centralities are in both",
                a.name,
                a.len(),
                b.name,
                b.len(),
                difference.len()
            );
        }
        Ok(Self {
            schema_version: DIFF_SCHEMA_V1.to_string(),
            tool_version: fdr_core::VERSION.to_string(),
            created_unix_ms: now_unix_ms()?,
            minuend: a,
            subtrahend: b,
            difference,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fdr_inference::run_for_all_bins;

    fn table() -> EventTable {
        let n = 60;
        let centrality = (0..n).map(|i| CentralityBin::new((i % 3) as u8).unwrap()).collect();
        let columns = PairSpecies::ALL
            .into_iter()
            .enumerate()
            .map(|(k, s)| {
                let values =
                    (0..n).map(|i| 0.01 * (k as f64 + 1.0) + 0.001 * ((i * 7) % 5) as f64).collect();
                let weights = (0..n).map(|i| 1.0 + (i % 2) as f64).collect();
                (Observable::new(Correlator::Delta, s), values, weights)
            })
            .collect();
        EventTable::from_columns(centrality, columns).unwrap()
    }

    #[test]
    fn bootstrap_artifact_shape() {
        let t = table();
        let plan = RatioPlan { max_bin: CentralityBin::new(3).unwrap(), ..Default::default() };
        let opts = BootstrapOptions { n_bootstrap: 50, ..Default::default() };
        let outcomes = run_for_all_bins(&t, &plan, &opts).unwrap();

        for method in [BootstrapCiMethod::Percentile, BootstrapCiMethod::Bca] {
            let ci = IntervalSettings { conf_level: 0.68, method };
            let art = BootstrapArtifact::build(&t, &outcomes, &plan, &opts, ci, true).unwrap();
            assert_eq!(art.bins.len(), 4);
            assert!(art.bins[3].skipped);
            assert_eq!(art.bins[0].ratios.len(), 2);
            assert_eq!(art.graphs.len(), 2);
            assert_eq!(art.graphs[0].len(), 3);
            assert_eq!(art.histograms.len(), 6);
            let e = &art.bins[1].ratios[0];
            assert!(e.ci_low <= e.ci_high);

            let v = serde_json::to_value(&art).unwrap();
            assert_eq!(v["schema_version"], BOOTSTRAP_SCHEMA_V1);
            assert_eq!(v["meta"]["numerators"][0], "delta_pFromLambda");
        }
    }

    #[test]
    fn bca_falls_back_to_percentile_for_tiny_bins() {
        let bins = [0u8, 0, 0, 0, 1, 1].iter().map(|&b| CentralityBin::new(b).unwrap()).collect();
        let columns = PairSpecies::ALL
            .into_iter()
            .enumerate()
            .map(|(k, s)| {
                let values = vec![0.1, 0.3, 0.2, 0.4, 0.5, 0.1]
                    .into_iter()
                    .map(|v| v * (k as f64 + 1.0))
                    .collect();
                (Observable::new(Correlator::Delta, s), values, vec![1.0, 2.0, 1.0, 3.0, 2.0, 1.0])
            })
            .collect();
        let t = EventTable::from_columns(bins, columns).unwrap();
        let plan = RatioPlan { max_bin: CentralityBin::new(1).unwrap(), ..Default::default() };
        let opts = BootstrapOptions { n_bootstrap: 40, min_events_per_bin: 2, ..Default::default() };
        let outcomes = run_for_all_bins(&t, &plan, &opts).unwrap();
        assert!(!outcomes[1].is_skipped());

        let ci = IntervalSettings { conf_level: 0.68, method: BootstrapCiMethod::Bca };
        let art = BootstrapArtifact::build(&t, &outcomes, &plan, &opts, ci, false).unwrap();
        assert_eq!(art.bins[0].ratios[0].ci_method, BootstrapCiMethod::Bca);
        let small = &art.bins[1].ratios[0];
        assert_eq!(small.ci_method, BootstrapCiMethod::Percentile);
        assert!(small.ci_low <= small.ci_high);
    }

    #[test]
    fn ratio_artifact_offsets() {
        let art = RatioArtifact::build(&table(), Correlator::Delta, 55.0).unwrap();
        assert_eq!(art.profiles.len(), 3);
        assert_eq!(art.ratios[0].graph.points[0].x, 4.5);
        assert_eq!(art.ratios[1].graph.points[0].x, 5.5);
        assert!(art.ratios[0].fit.is_some());
    }

    #[test]
    fn diff_artifact() {
        let pl = Observable::new(Correlator::Delta, PairSpecies::PFromLambda);
        let pi = Observable::new(Correlator::Delta, PairSpecies::PiFromLambda);
        let art = DiffArtifact::build(&table(), pl, pi).unwrap();
        assert_eq!(art.difference.len(), 3);
        assert!(art.difference.points.iter().all(|p| p.y < 0.0));
    }
}
