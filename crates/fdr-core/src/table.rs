//! In-memory columnar event table.
//!
//! Holds the per-event centrality and, for every loaded [`Observable`], the
//! per-event mean and pair multiplicity as flat `f64` columns. Columns are
//! keyed by the closed `Observable` enum set, never by free-form strings.

use crate::types::{CentralityBin, EventRecord, N_CENTRALITY_BINS, Observable};
use crate::{Error, Result};

/// Per-event values and pair multiplicities of one observable.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservableColumn {
    /// Per-event mean of the correlator.
    pub values: Vec<f64>,
    /// Per-event pair multiplicity.
    pub weights: Vec<f64>,
}

/// Columnar event table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventTable {
    centrality: Vec<CentralityBin>,
    columns: Vec<(Observable, ObservableColumn)>,
}

impl EventTable {
    /// Create a table with only the centrality column.
    pub fn new(centrality: Vec<CentralityBin>) -> Self {
        Self { centrality, columns: Vec::new() }
    }

    /// Create a table from centrality plus `(observable, values, weights)` columns.
    pub fn from_columns(
        centrality: Vec<CentralityBin>,
        columns: Vec<(Observable, Vec<f64>, Vec<f64>)>,
    ) -> Result<Self> {
        let mut table = Self::new(centrality);
        for (obs, values, weights) in columns {
            table.insert_column(obs, values, weights)?;
        }
        Ok(table)
    }

    /// Add (or replace) the columns of one observable.
    pub fn insert_column(
        &mut self,
        observable: Observable,
        values: Vec<f64>,
        weights: Vec<f64>,
    ) -> Result<()> {
        let n = self.centrality.len();
        if values.len() != n || weights.len() != n {
            return Err(Error::Validation(format!(
                "column '{}' length mismatch: values={} weights={} expected={n}",
                observable,
                values.len(),
                weights.len()
            )));
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(Error::Validation(format!(
                "column '{}' has a non-finite value at row {i}",
                observable.value_column()
            )));
        }
        if let Some(i) = weights.iter().position(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::Validation(format!(
                "column '{}' has a negative or non-finite pair count at row {i}",
                observable.weight_column()
            )));
        }

        // Both correlators of a species are averaged over the same pairs and
        // share one `npairs_<tag>` column.
        let conflicting = self.columns.iter().find(|(o, c)| {
            o.species == observable.species
                && o.correlator != observable.correlator
                && c.weights != weights
        });
        if let Some((other, _)) = conflicting {
            return Err(Error::Validation(format!(
                "'{}' and '{}' disagree on the shared pair count column '{}'",
                observable.value_column(),
                other.value_column(),
                observable.weight_column()
            )));
        }

        let col = ObservableColumn { values, weights };
        match self.columns.iter_mut().find(|(o, _)| *o == observable) {
            Some((_, existing)) => *existing = col,
            None => self.columns.push((observable, col)),
        }
        Ok(())
    }

    /// Number of rows.
    pub fn n_events(&self) -> usize {
        self.centrality.len()
    }

    /// True if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.centrality.is_empty()
    }

    /// Centrality column.
    pub fn centrality(&self) -> &[CentralityBin] {
        &self.centrality
    }

    /// Loaded observables, in insertion order.
    pub fn observables(&self) -> Vec<Observable> {
        self.columns.iter().map(|(o, _)| *o).collect()
    }

    /// Columns of one observable, if loaded.
    pub fn column(&self, observable: Observable) -> Option<&ObservableColumn> {
        self.columns.iter().find(|(o, _)| *o == observable).map(|(_, c)| c)
    }

    /// Columns of one observable, or `MissingData` if it was not loaded.
    pub fn require(&self, observable: Observable) -> Result<&ObservableColumn> {
        self.column(observable).ok_or_else(|| {
            Error::MissingData(format!(
                "columns '{}' / '{}' not present in event table",
                observable.value_column(),
                observable.weight_column()
            ))
        })
    }

    /// Rows whose `denominator` pair multiplicity is strictly positive.
    ///
    /// This is the only event selection applied anywhere in the analysis.
    pub fn qualifying(&self, denominator: Observable) -> Result<EventTable> {
        let keep: Vec<bool> = self.require(denominator)?.weights.iter().map(|&w| w > 0.0).collect();

        let pick = |xs: &[f64]| -> Vec<f64> {
            xs.iter().zip(&keep).filter(|(_, k)| **k).map(|(x, _)| *x).collect()
        };

        let centrality =
            self.centrality.iter().zip(&keep).filter(|(_, k)| **k).map(|(c, _)| *c).collect();
        let columns = self
            .columns
            .iter()
            .map(|(o, c)| {
                (*o, ObservableColumn { values: pick(&c.values), weights: pick(&c.weights) })
            })
            .collect();

        Ok(EventTable { centrality, columns })
    }

    /// Qualifying records for a numerator/denominator pair, in row order.
    pub fn records(
        &self,
        numerator: Observable,
        denominator: Observable,
    ) -> Result<Vec<EventRecord>> {
        self.collect_records(numerator, denominator, |_| true)
    }

    /// Qualifying records of a single centrality bin, in row order.
    pub fn records_in_bin(
        &self,
        bin: CentralityBin,
        numerator: Observable,
        denominator: Observable,
    ) -> Result<Vec<EventRecord>> {
        self.collect_records(numerator, denominator, |c| c == bin)
    }

    /// Row counts per centrality decile.
    pub fn count_by_bin(&self) -> [usize; N_CENTRALITY_BINS as usize] {
        let mut counts = [0usize; N_CENTRALITY_BINS as usize];
        for c in &self.centrality {
            counts[usize::from(c.index())] += 1;
        }
        counts
    }

    fn collect_records(
        &self,
        numerator: Observable,
        denominator: Observable,
        mut select: impl FnMut(CentralityBin) -> bool,
    ) -> Result<Vec<EventRecord>> {
        let num = self.require(numerator)?;
        let den = self.require(denominator)?;

        let mut out = Vec::new();
        for (i, &bin) in self.centrality.iter().enumerate() {
            if den.weights[i] <= 0.0 || !select(bin) {
                continue;
            }
            out.push(EventRecord {
                centrality_bin: bin,
                numerator_value: num.values[i],
                numerator_weight: num.weights[i],
                denominator_value: den.values[i],
                denominator_weight: den.weights[i],
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Correlator, PairSpecies};

    const LL: Observable = Observable::new(Correlator::Delta, PairSpecies::LambdaLambda);
    const PL: Observable = Observable::new(Correlator::Delta, PairSpecies::PFromLambda);

    fn bins(xs: &[u8]) -> Vec<CentralityBin> {
        xs.iter().map(|&b| CentralityBin::new(b).unwrap()).collect()
    }

    fn small_table() -> EventTable {
        EventTable::from_columns(
            bins(&[0, 0, 1, 1]),
            vec![
                (LL, vec![0.1, 0.2, 0.3, 0.4], vec![2.0, 0.0, 1.0, 3.0]),
                (PL, vec![1.0, 2.0, 3.0, 4.0], vec![5.0, 6.0, 7.0, 8.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn zero_denominator_weight_rows_excluded() {
        let t = small_table();
        let q = t.qualifying(LL).unwrap();
        assert_eq!(q.n_events(), 3);
        assert_eq!(q.count_by_bin()[0], 1);
        assert_eq!(q.count_by_bin()[1], 2);

        let recs = t.records(PL, LL).unwrap();
        assert_eq!(recs.len(), 3);
        assert!(recs.iter().all(|r| r.denominator_weight > 0.0));
        assert_eq!(recs[0].numerator_value, 1.0);
        assert_eq!(recs[1].numerator_value, 3.0);
    }

    #[test]
    fn records_in_bin_filters_centrality() {
        let t = small_table();
        let b1 = CentralityBin::new(1).unwrap();
        let recs = t.records_in_bin(b1, PL, LL).unwrap();
        assert_eq!(recs.len(), 2);
        assert!(recs.iter().all(|r| r.centrality_bin == b1));
    }

    #[test]
    fn missing_observable_is_missing_data() {
        let t = small_table();
        let pi = Observable::new(Correlator::Delta, PairSpecies::PiFromLambda);
        assert!(matches!(t.records(pi, LL), Err(Error::MissingData(_))));
    }

    #[test]
    fn length_mismatch_rejected() {
        let r = EventTable::from_columns(bins(&[0, 1]), vec![(LL, vec![0.1], vec![1.0, 1.0])]);
        assert!(matches!(r, Err(Error::Validation(_))));
    }

    #[test]
    fn correlators_of_one_species_share_pair_counts() {
        let gamma_ll = Observable::new(Correlator::Gamma, PairSpecies::LambdaLambda);
        let mut t = small_table();
        t.insert_column(gamma_ll, vec![0.0; 4], vec![2.0, 0.0, 1.0, 3.0]).unwrap();
        assert_eq!(t.observables().len(), 3);

        let r = t.insert_column(gamma_ll, vec![0.0; 4], vec![2.0, 1.0, 1.0, 3.0]);
        assert!(matches!(r, Err(Error::Validation(_))));
    }

    #[test]
    fn non_finite_rejected() {
        let r =
            EventTable::from_columns(bins(&[0]), vec![(LL, vec![f64::NAN], vec![1.0])]);
        assert!(r.is_err());
        let r = EventTable::from_columns(bins(&[0]), vec![(LL, vec![0.0], vec![-1.0])]);
        assert!(r.is_err());
    }
}
