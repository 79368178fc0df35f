use std::path::Path;

use anyhow::{Context, Result};
use fdr_core::{CentralityBin, Correlator, PairSpecies};
use fdr_inference::ratio::{DEFAULT_MAX_BIN, DEFAULT_N_BOOTSTRAP, DEFAULT_SEED, MIN_EVENTS_PER_BIN};
use fdr_inference::{BootstrapCiMethod, BootstrapOptions, RatioPlan};
use fdr_viz::IntervalSettings;
use fdr_viz::graph::DEFAULT_MAX_CENTRALITY_PERCENT;
use serde::{Deserialize, Serialize};

/// Analysis settings. Every field is optional so that a file, the command
/// line and the built-in defaults can be layered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_bootstrap: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_centrality_bin: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_events_per_bin: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degenerate_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlator: Option<Correlator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denominator: Option<PairSpecies>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numerators: Option<Vec<PairSpecies>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conf_level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ci_method: Option<BootstrapCiMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_centrality_percent: Option<f64>,
}

impl AnalysisConfig {
    /// Built-in defaults, every field set.
    pub fn defaults() -> Self {
        let plan = RatioPlan::default();
        let intervals = IntervalSettings::default();
        Self {
            n_bootstrap: Some(DEFAULT_N_BOOTSTRAP),
            seed: Some(DEFAULT_SEED),
            max_centrality_bin: Some(DEFAULT_MAX_BIN),
            min_events_per_bin: Some(MIN_EVENTS_PER_BIN),
            degenerate_value: Some(0.0),
            correlator: Some(plan.correlator),
            denominator: Some(plan.denominator),
            numerators: Some(plan.numerators),
            conf_level: Some(intervals.conf_level),
            ci_method: Some(intervals.method),
            threads: Some(0),
            max_centrality_percent: Some(DEFAULT_MAX_CENTRALITY_PERCENT),
        }
    }

    /// Field-wise: values set in `top` win.
    pub fn layered(self, top: AnalysisConfig) -> Self {
        Self {
            n_bootstrap: top.n_bootstrap.or(self.n_bootstrap),
            seed: top.seed.or(self.seed),
            max_centrality_bin: top.max_centrality_bin.or(self.max_centrality_bin),
            min_events_per_bin: top.min_events_per_bin.or(self.min_events_per_bin),
            degenerate_value: top.degenerate_value.or(self.degenerate_value),
            correlator: top.correlator.or(self.correlator),
            denominator: top.denominator.or(self.denominator),
            numerators: top.numerators.or(self.numerators),
            conf_level: top.conf_level.or(self.conf_level),
            ci_method: top.ci_method.or(self.ci_method),
            threads: top.threads.or(self.threads),
            max_centrality_percent: top.max_centrality_percent.or(self.max_centrality_percent),
        }
    }

    /// Defaults, then the optional file, then `cli`.
    pub fn resolve(file: Option<&Path>, cli: AnalysisConfig) -> Result<Self> {
        let mut cfg = Self::defaults();
        if let Some(path) = file {
            cfg = cfg.layered(read_analysis_config(path)?);
        }
        Ok(cfg.layered(cli))
    }

    pub fn plan(&self) -> Result<RatioPlan> {
        let d = RatioPlan::default();
        let max_bin = match self.max_centrality_bin {
            Some(b) => CentralityBin::new(b)?,
            None => d.max_bin,
        };
        let numerators = self.numerators.clone().unwrap_or(d.numerators);
        if numerators.is_empty() {
            anyhow::bail!("at least one numerator species is required");
        }
        Ok(RatioPlan {
            correlator: self.correlator.unwrap_or(d.correlator),
            denominator: self.denominator.unwrap_or(d.denominator),
            numerators,
            max_bin,
        })
    }

    pub fn bootstrap_options(&self) -> BootstrapOptions {
        let d = BootstrapOptions::default();
        BootstrapOptions {
            n_bootstrap: self.n_bootstrap.unwrap_or(d.n_bootstrap),
            seed: self.seed.unwrap_or(d.seed),
            degenerate_value: self.degenerate_value.unwrap_or(d.degenerate_value),
            min_events_per_bin: self.min_events_per_bin.unwrap_or(d.min_events_per_bin),
        }
    }

    pub fn intervals(&self) -> Result<IntervalSettings> {
        let d = IntervalSettings::default();
        let conf_level = self.conf_level.unwrap_or(d.conf_level);
        if !(conf_level > 0.0 && conf_level < 1.0) {
            anyhow::bail!("conf_level must be in (0,1), got {conf_level}");
        }
        Ok(IntervalSettings { conf_level, method: self.ci_method.unwrap_or(d.method) })
    }
}

/// YAML by default, JSON for `.json`.
pub fn read_analysis_config(path: &Path) -> Result<AnalysisConfig> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read config {}", path.display()))?;
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("").to_ascii_lowercase();
    let cfg: AnalysisConfig = if ext == "json" {
        serde_json::from_slice(&bytes)
            .with_context(|| format!("invalid JSON config {}", path.display()))?
    } else {
        serde_yaml_ng::from_slice(&bytes)
            .with_context(|| format!("invalid YAML config {}", path.display()))?
    };
    Ok(cfg)
}

/// Serialize the full default config in the format implied by `path`.
pub fn render_default_config(path: &Path) -> Result<String> {
    let cfg = AnalysisConfig::defaults();
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("").to_ascii_lowercase();
    if ext == "json" {
        Ok(serde_json::to_string_pretty(&cfg)? + "\n")
    } else {
        Ok(serde_yaml_ng::to_string(&cfg)?)
    }
}
