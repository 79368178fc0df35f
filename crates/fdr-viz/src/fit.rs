//! Constant (pol0) least-squares fit of a graph.

use serde::{Deserialize, Serialize};

use crate::graph::GraphErrors;

/// Result of fitting `y = c`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstantFit {
    /// Fitted constant.
    pub value: f64,
    /// Its uncertainty.
    pub error: f64,
    /// χ² of the fit over the weighted points.
    pub chi2: f64,
    /// Degrees of freedom (weighted points minus one, floored at 0).
    pub ndf: usize,
}

/// Inverse-variance weighted mean of the points.
///
/// Points with zero (or non-finite) error carry no weight. If none remain,
/// the unweighted mean is returned with zero error; an empty graph gives
/// `None`.
pub fn constant_fit(graph: &GraphErrors) -> Option<ConstantFit> {
    if graph.is_empty() {
        return None;
    }

    let weighted: Vec<(f64, f64)> = graph
        .points
        .iter()
        .filter(|p| p.ey.is_finite() && p.ey > 0.0)
        .map(|p| (p.y, 1.0 / (p.ey * p.ey)))
        .collect();

    if weighted.is_empty() {
        let mean = graph.points.iter().map(|p| p.y).sum::<f64>() / graph.len() as f64;
        return Some(ConstantFit { value: mean, error: 0.0, chi2: 0.0, ndf: graph.len() - 1 });
    }

    let sw: f64 = weighted.iter().map(|(_, w)| w).sum();
    let value = weighted.iter().map(|(y, w)| y * w).sum::<f64>() / sw;
    let chi2 = weighted.iter().map(|(y, w)| w * (y - value) * (y - value)).sum();

    let fit = ConstantFit { value, error: sw.sqrt().recip(), chi2, ndf: weighted.len() - 1 };
    log::info!("pol0 fit of {}: {:.4} ± {:.4}", graph.name, fit.value, fit.error);
    Some(fit)
}
