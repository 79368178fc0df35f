//! Common data types for fdratio

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Number of centrality categories written by the upstream producer (deciles).
pub const N_CENTRALITY_BINS: u8 = 10;

/// Centrality decile in `0..=9` (bin 0 is 0-10%, bin 9 is 90-100%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct CentralityBin(u8);

impl CentralityBin {
    /// Create a bin, rejecting indices outside `0..=9`.
    pub fn new(index: u8) -> Result<Self> {
        if index >= N_CENTRALITY_BINS {
            return Err(Error::Validation(format!(
                "centrality bin must be in 0..={}, got {index}",
                N_CENTRALITY_BINS - 1
            )));
        }
        Ok(Self(index))
    }

    /// Create a bin, clamping indices above 9 to the last decile.
    pub const fn clamped(index: u8) -> Self {
        if index >= N_CENTRALITY_BINS { Self(N_CENTRALITY_BINS - 1) } else { Self(index) }
    }

    /// Create a bin from a raw integer column value.
    pub fn from_i64(value: i64) -> Result<Self> {
        let index = u8::try_from(value).map_err(|_| {
            Error::Validation(format!(
                "centrality bin must be in 0..={}, got {value}",
                N_CENTRALITY_BINS - 1
            ))
        })?;
        Self::new(index)
    }

    /// All bins `0..=max_index`.
    pub fn range_inclusive(max_index: u8) -> Result<Vec<Self>> {
        let last = Self::new(max_index)?;
        Ok((0..=last.0).map(Self).collect())
    }

    /// Raw index.
    pub fn index(self) -> u8 {
        self.0
    }

    /// Lower edge in percent.
    pub fn low_percent(self) -> f64 {
        f64::from(self.0) * 10.0
    }

    /// Upper edge in percent.
    pub fn high_percent(self) -> f64 {
        f64::from(self.0 + 1) * 10.0
    }

    /// Bin center in percent (`10 * bin + 5`).
    pub fn center_percent(self) -> f64 {
        self.low_percent() + 5.0
    }

    /// Human readable range, e.g. `"20-30%"`.
    pub fn label(self) -> String {
        format!("{}-{}%", u32::from(self.0) * 10, (u32::from(self.0) + 1) * 10)
    }
}

impl TryFrom<u8> for CentralityBin {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<CentralityBin> for u8 {
    fn from(bin: CentralityBin) -> Self {
        bin.0
    }
}

impl fmt::Display for CentralityBin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Correlator family stored per event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Correlator {
    /// `delta` (cos(phi_a - phi_b)) correlator.
    Delta,
    /// `gamma` (cos(phi_a + phi_b - 2 Psi)) correlator.
    Gamma,
}

impl Correlator {
    /// All correlators in column order.
    pub const ALL: [Correlator; 2] = [Correlator::Delta, Correlator::Gamma];

    /// Column-name prefix.
    pub fn prefix(self) -> &'static str {
        match self {
            Correlator::Delta => "delta",
            Correlator::Gamma => "gamma",
        }
    }

    /// Display name used in labels.
    pub fn title(self) -> &'static str {
        match self {
            Correlator::Delta => "Delta",
            Correlator::Gamma => "Gamma",
        }
    }
}

impl FromStr for Correlator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "delta" => Ok(Correlator::Delta),
            "gamma" => Ok(Correlator::Gamma),
            other => Err(Error::Validation(format!(
                "unknown correlator '{other}' (expected 'delta' or 'gamma')"
            ))),
        }
    }
}

impl fmt::Display for Correlator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Particle pairing a per-event correlator is averaged over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PairSpecies {
    /// Primary Lambda paired with Lambda.
    #[serde(rename = "lambda_lambda")]
    LambdaLambda,
    /// Proton from a Lambda decay paired with Lambda.
    #[serde(rename = "pFromLambda")]
    PFromLambda,
    /// Pion from a Lambda decay paired with Lambda.
    #[serde(rename = "piFromLambda")]
    PiFromLambda,
}

impl PairSpecies {
    /// All species in column order.
    pub const ALL: [PairSpecies; 3] =
        [PairSpecies::LambdaLambda, PairSpecies::PFromLambda, PairSpecies::PiFromLambda];

    /// Column tag.
    pub fn tag(self) -> &'static str {
        match self {
            PairSpecies::LambdaLambda => "lambda_lambda",
            PairSpecies::PFromLambda => "pFromLambda",
            PairSpecies::PiFromLambda => "piFromLambda",
        }
    }

    /// Plot label.
    pub fn label(self) -> &'static str {
        match self {
            PairSpecies::LambdaLambda => "Lambda - Lambda",
            PairSpecies::PFromLambda => "p from Lambda - Lambda",
            PairSpecies::PiFromLambda => "pi from Lambda - Lambda",
        }
    }

    /// Short name used in file names (`lambda_lambda`, `p_from_lambda`, `pi_from_lambda`).
    pub fn file_stem(self) -> &'static str {
        match self {
            PairSpecies::LambdaLambda => "lambda_lambda",
            PairSpecies::PFromLambda => "p_from_lambda",
            PairSpecies::PiFromLambda => "pi_from_lambda",
        }
    }

    /// Pair-count column, e.g. `npairs_pFromLambda`.
    pub fn weight_column(self) -> String {
        format!("npairs_{}", self.tag())
    }
}

impl FromStr for PairSpecies {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        PairSpecies::ALL
            .into_iter()
            .find(|p| p.tag().eq_ignore_ascii_case(s) || p.file_stem().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                Error::Validation(format!(
                    "unknown pair species '{s}' (expected one of: lambda_lambda, pFromLambda, piFromLambda)"
                ))
            })
    }
}

impl fmt::Display for PairSpecies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A correlator averaged over one pair species, e.g. `delta_pFromLambda`.
///
/// Resolves to exactly two columns of the event table: the per-event mean
/// (`<correlator>_<tag>`) and the pair multiplicity (`npairs_<tag>`).
/// Serializes as the value-column name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Observable {
    /// Correlator family.
    pub correlator: Correlator,
    /// Pair species.
    pub species: PairSpecies,
}

impl Observable {
    /// Create an observable.
    pub const fn new(correlator: Correlator, species: PairSpecies) -> Self {
        Self { correlator, species }
    }

    /// Per-event mean column.
    pub fn value_column(&self) -> String {
        format!("{}_{}", self.correlator.prefix(), self.species.tag())
    }

    /// Pair multiplicity column.
    pub fn weight_column(&self) -> String {
        self.species.weight_column()
    }

    /// Plot label, e.g. `"Delta p from Lambda - Lambda"`.
    pub fn label(&self) -> String {
        format!("{} {}", self.correlator.title(), self.species.label())
    }

    /// Every observable of one correlator family.
    pub fn all_for(correlator: Correlator) -> Vec<Observable> {
        PairSpecies::ALL.into_iter().map(|s| Observable::new(correlator, s)).collect()
    }
}

impl FromStr for Observable {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (prefix, tag) = s.split_once('_').ok_or_else(|| {
            Error::Validation(format!(
                "observable '{s}' must look like '<delta|gamma>_<species>', e.g. delta_pFromLambda"
            ))
        })?;
        Ok(Observable::new(prefix.parse()?, tag.parse()?))
    }
}

impl TryFrom<String> for Observable {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Observable> for String {
    fn from(obs: Observable) -> Self {
        obs.value_column()
    }
}

impl fmt::Display for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value_column())
    }
}

/// One event's contribution to a numerator/denominator ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Centrality decile.
    pub centrality_bin: CentralityBin,
    /// Per-event mean of the numerator correlator.
    pub numerator_value: f64,
    /// Pair multiplicity of the numerator.
    pub numerator_weight: f64,
    /// Per-event mean of the denominator correlator.
    pub denominator_value: f64,
    /// Pair multiplicity of the denominator (strictly positive for included events).
    pub denominator_weight: f64,
}

/// Bootstrap estimate of one weighted ratio in one centrality bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapResult {
    /// Weighted ratio over all records.
    pub point_estimate: f64,
    /// Sample standard deviation (n-1) of the replicates.
    pub standard_error: f64,
    /// Replicate ratios in generation order.
    pub replicate_distribution: Vec<f64>,
    /// Number of records the ratio was computed from.
    pub n_events: usize,
    /// Seed the replicates were generated from.
    pub seed: u64,
}

impl BootstrapResult {
    /// Number of bootstrap replicates.
    pub fn n_bootstrap(&self) -> usize {
        self.replicate_distribution.len()
    }

    /// Mean of the replicate distribution.
    pub fn replicate_mean(&self) -> f64 {
        if self.replicate_distribution.is_empty() {
            return f64::NAN;
        }
        self.replicate_distribution.iter().sum::<f64>() / self.replicate_distribution.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centrality_bin_bounds() {
        assert!(CentralityBin::new(9).is_ok());
        assert!(CentralityBin::new(10).is_err());
        assert!(CentralityBin::from_i64(-1).is_err());
        assert!(CentralityBin::from_i64(300).is_err());

        let b = CentralityBin::new(2).unwrap();
        assert_eq!(b.center_percent(), 25.0);
        assert_eq!(b.label(), "20-30%");
        assert_eq!(CentralityBin::range_inclusive(5).unwrap().len(), 6);
    }

    #[test]
    fn observable_columns() {
        let obs = Observable::new(Correlator::Delta, PairSpecies::PFromLambda);
        assert_eq!(obs.value_column(), "delta_pFromLambda");
        assert_eq!(obs.weight_column(), "npairs_pFromLambda");

        let g = Observable::new(Correlator::Gamma, PairSpecies::LambdaLambda);
        assert_eq!(g.value_column(), "gamma_lambda_lambda");
        assert_eq!(g.weight_column(), "npairs_lambda_lambda");
    }

    #[test]
    fn observable_parse_roundtrip() {
        for c in Correlator::ALL {
            for obs in Observable::all_for(c) {
                let parsed: Observable = obs.value_column().parse().unwrap();
                assert_eq!(parsed, obs);
            }
        }
    }

    #[test]
    fn unknown_tags_fail_fast() {
        assert!("delta_kaon".parse::<Observable>().is_err());
        assert!("omega_pFromLambda".parse::<Observable>().is_err());
        assert!("pFromLambda".parse::<Observable>().is_err());
        assert!("rho".parse::<Correlator>().is_err());
    }

    #[test]
    fn bin_serde_rejects_out_of_range() {
        let ok: CentralityBin = serde_json::from_str("3").unwrap();
        assert_eq!(ok.index(), 3);
        assert!(serde_json::from_str::<CentralityBin>("12").is_err());
    }

    #[test]
    fn observable_serializes_as_column_name() {
        let obs = Observable::new(Correlator::Gamma, PairSpecies::PiFromLambda);
        assert_eq!(serde_json::to_string(&obs).unwrap(), "\"gamma_piFromLambda\"");
        let back: Observable = serde_json::from_str("\"gamma_piFromLambda\"").unwrap();
        assert_eq!(back, obs);
    }
}
