//! Graphs of a quantity against centrality.

use fdr_core::{CentralityBin, EventTable, Observable, Result};
use fdr_inference::BinOutcome;
use serde::{Deserialize, Serialize};

/// Default upper x limit (percent) of a naive ratio graph.
pub const DEFAULT_MAX_CENTRALITY_PERCENT: f64 = 55.0;

/// One point with a symmetric y error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraphPoint {
    /// Centrality in percent.
    pub x: f64,
    /// Value.
    pub y: f64,
    /// Error on `y`.
    pub ey: f64,
}

/// A named list of points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphErrors {
    /// Identifier (used for file names).
    pub name: String,
    /// Legend label.
    pub label: String,
    /// Points in increasing x.
    pub points: Vec<GraphPoint>,
}

impl GraphErrors {
    /// Empty graph.
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self { name: name.into(), label: label.into(), points: Vec::new() }
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if there are no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point at `x`, if any.
    pub fn at(&self, x: f64) -> Option<&GraphPoint> {
        self.points.iter().find(|p| (p.x - x).abs() < 1e-9)
    }
}

/// Bootstrap ratio against centrality; skipped bins are left out.
pub fn bootstrap_graph(outcomes: &[BinOutcome], numerator: Observable) -> GraphErrors {
    let mut g = GraphErrors::new(
        format!("bootstrap_{}", numerator.species.file_stem()),
        numerator.label(),
    );
    for o in outcomes {
        if let Some(r) = o.ratio_for(numerator) {
            g.points.push(GraphPoint {
                x: o.bin().center_percent(),
                y: r.point_estimate,
                ey: r.standard_error,
            });
        }
    }
    g
}

/// Pair-weighted mean of `observable` per centrality bin.
///
/// `ey = sqrt(Σw(y-ȳ)²/Σw) / sqrt(n_eff)` with `n_eff = (Σw)²/Σw²`. Rows with
/// no pairs carry no weight; bins without pairs are left out.
pub fn profile_graph(
    table: &EventTable,
    observable: Observable,
    max_bin: CentralityBin,
) -> Result<GraphErrors> {
    let col = table.require(observable)?;
    let n_bins = usize::from(max_bin.index()) + 1;
    let mut sw = vec![0.0; n_bins];
    let mut sw2 = vec![0.0; n_bins];
    let mut swy = vec![0.0; n_bins];

    for (i, bin) in table.centrality().iter().enumerate() {
        let b = usize::from(bin.index());
        let w = col.weights[i];
        if b >= n_bins || w <= 0.0 {
            continue;
        }
        sw[b] += w;
        sw2[b] += w * w;
        swy[b] += w * col.values[i];
    }
    let mean: Vec<f64> =
        (0..n_bins).map(|b| if sw[b] > 0.0 { swy[b] / sw[b] } else { 0.0 }).collect();

    // Second pass for the spread about the bin mean.
    let mut swd2 = vec![0.0; n_bins];
    for (i, bin) in table.centrality().iter().enumerate() {
        let b = usize::from(bin.index());
        let w = col.weights[i];
        if b >= n_bins || w <= 0.0 {
            continue;
        }
        let d = col.values[i] - mean[b];
        swd2[b] += w * d * d;
    }

    let mut g = GraphErrors::new(observable.value_column(), observable.label());
    for bin in CentralityBin::range_inclusive(max_bin.index())? {
        let b = usize::from(bin.index());
        if sw[b] <= 0.0 {
            continue;
        }
        let n_eff = sw[b] * sw[b] / sw2[b];
        let ey = (swd2[b] / sw[b]).sqrt() / n_eff.sqrt();
        g.points.push(GraphPoint { x: bin.center_percent(), y: mean[b], ey });
    }
    Ok(g)
}

/// Pointwise `num / den` with independent error propagation.
///
/// Points beyond `max_x` or with a zero denominator are dropped; surviving
/// points are shifted by `x_offset` so overlaid graphs stay readable.
pub fn ratio_graph(
    num: &GraphErrors,
    den: &GraphErrors,
    name: &str,
    max_x: f64,
    x_offset: f64,
) -> GraphErrors {
    let mut g = GraphErrors::new(name, format!("{} / {}", num.label, den.label));
    for p in &num.points {
        if p.x > max_x {
            continue;
        }
        let Some(d) = den.at(p.x) else {
            continue;
        };
        if d.y == 0.0 {
            continue;
        }
        let ratio = p.y / d.y;
        let ey = (p.ey / d.y).hypot(p.y * d.ey / (d.y * d.y));
        log::info!("centrality {:.1}%: {name} = {ratio:.3} ± {ey:.3}", p.x);
        g.points.push(GraphPoint { x: p.x + x_offset, y: ratio, ey });
    }
    g
}

/// `a - b` at every x present in both graphs, errors in quadrature.
///
/// Profiles leave out bins without pairs, so points are matched by x rather
/// than by position.
pub fn subtract_graphs(a: &GraphErrors, b: &GraphErrors) -> GraphErrors {
    let mut g = GraphErrors::new(
        format!("{}_minus_{}", a.name, b.name),
        format!("{} - {}", a.label, b.label),
    );
    g.points = a
        .points
        .iter()
        .filter_map(|pa| {
            let pb = b.at(pa.x)?;
            Some(GraphPoint { x: pa.x, y: pa.y - pb.y, ey: pa.ey.hypot(pb.ey) })
        })
        .collect();
    g
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use fdr_core::{BootstrapResult, Correlator, PairSpecies};
    use fdr_inference::NumeratorResult;

    const LL: Observable = Observable::new(Correlator::Delta, PairSpecies::LambdaLambda);
    const PL: Observable = Observable::new(Correlator::Delta, PairSpecies::PFromLambda);

    fn graph(points: &[(f64, f64, f64)]) -> GraphErrors {
        GraphErrors {
            name: "g".into(),
            label: "g".into(),
            points: points.iter().map(|&(x, y, ey)| GraphPoint { x, y, ey }).collect(),
        }
    }

    #[test]
    fn profile_weighted_mean_and_error() {
        let bins = [0u8, 0, 0, 1].iter().map(|&b| CentralityBin::new(b).unwrap()).collect();
        let table = EventTable::from_columns(
            bins,
            vec![(LL, vec![1.0, 3.0, 100.0, 2.0], vec![1.0, 1.0, 0.0, 4.0])],
        )
        .unwrap();

        let g = profile_graph(&table, LL, CentralityBin::new(2).unwrap()).unwrap();
        assert_eq!(g.len(), 2);
        assert_eq!(g.points[0].x, 5.0);
        assert_relative_eq!(g.points[0].y, 2.0);
        // spread 1, n_eff 2
        assert_relative_eq!(g.points[0].ey, 1.0 / 2f64.sqrt(), epsilon = 1e-12);
        assert_eq!(g.points[1].x, 15.0);
        assert_eq!(g.points[1].ey, 0.0);
    }

    #[test]
    fn ratio_skips_beyond_max_and_zero_denominator() {
        let num = graph(&[(5.0, 2.0, 0.2), (15.0, 1.0, 0.1), (65.0, 1.0, 0.1)]);
        let den = graph(&[(5.0, 4.0, 0.4), (15.0, 0.0, 0.1), (65.0, 1.0, 0.1)]);
        let r = ratio_graph(&num, &den, "r", 55.0, 0.5);
        assert_eq!(r.len(), 1);
        assert_eq!(r.points[0].x, 5.5);
        assert_relative_eq!(r.points[0].y, 0.5);
        assert_relative_eq!(r.points[0].ey, (0.05f64).hypot(0.05), epsilon = 1e-12);
    }

    #[test]
    fn ratio_error_with_zero_numerator() {
        let num = graph(&[(5.0, 0.0, 0.3)]);
        let den = graph(&[(5.0, 2.0, 0.5)]);
        let r = ratio_graph(&num, &den, "r", 55.0, 0.0);
        assert_eq!(r.points[0].y, 0.0);
        assert_relative_eq!(r.points[0].ey, 0.15);
    }

    #[test]
    fn subtraction_uses_quadrature() {
        let a = graph(&[(5.0, 3.0, 0.3), (15.0, 1.0, 0.1), (25.0, 9.0, 9.0)]);
        let b = graph(&[(5.0, 1.0, 0.4), (15.0, 2.0, 0.0)]);
        let d = subtract_graphs(&a, &b);
        assert_eq!(d.len(), 2);
        assert_relative_eq!(d.points[0].y, 2.0);
        assert_relative_eq!(d.points[0].ey, 0.5, epsilon = 1e-12);
        assert_relative_eq!(d.points[1].y, -1.0);
    }

    #[test]
    fn subtraction_matches_points_by_centrality() {
        let bins = [0u8, 1, 2].iter().map(|&b| CentralityBin::new(b).unwrap()).collect();
        let pi = Observable::new(Correlator::Delta, PairSpecies::PiFromLambda);
        let table = EventTable::from_columns(
            bins,
            vec![
                (PL, vec![9.0, 5.0, 7.0], vec![0.0, 1.0, 1.0]),
                (pi, vec![1.0, 2.0, 4.0], vec![1.0, 1.0, 0.0]),
            ],
        )
        .unwrap();
        let last = CentralityBin::new(2).unwrap();
        let a = profile_graph(&table, PL, last).unwrap();
        let b = profile_graph(&table, pi, last).unwrap();
        assert_eq!((a.len(), b.len()), (2, 2));

        let d = subtract_graphs(&a, &b);
        assert_eq!(d.len(), 1);
        assert_eq!(d.points[0].x, 15.0);
        assert_relative_eq!(d.points[0].y, 3.0);
    }

    #[test]
    fn bootstrap_graph_omits_skipped() {
        let bin = |i| CentralityBin::new(i).unwrap();
        let result = BootstrapResult {
            point_estimate: 0.4,
            standard_error: 0.05,
            replicate_distribution: vec![0.35, 0.45],
            n_events: 20,
            seed: 42,
        };
        let outcomes = vec![
            BinOutcome::Skipped { bin: bin(0), n_events: 3 },
            BinOutcome::Analyzed {
                bin: bin(1),
                n_events: 20,
                ratios: vec![NumeratorResult { observable: PL, result }],
            },
        ];
        let g = bootstrap_graph(&outcomes, PL);
        assert_eq!(g.len(), 1);
        assert_eq!(g.points[0], GraphPoint { x: 15.0, y: 0.4, ey: 0.05 });
        assert_eq!(g.name, "bootstrap_p_from_lambda");
    }
}
