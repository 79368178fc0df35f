//! # fdr-io
//!
//! Reading and writing per-event correlator tables.
//!
//! An event table is a flat file with one row per collision event:
//!
//! | Column                   | Type         | Description                              |
//! |--------------------------|--------------|------------------------------------------|
//! | `centrality`             | int or float | Centrality decile `0..=9`                |
//! | `<delta\|gamma>_<tag>`   | `Float64`    | Per-event mean correlator for a species  |
//! | `npairs_<tag>`           | number       | Pair multiplicity for that species       |
//!
//! with `<tag>` one of `lambda_lambda`, `pFromLambda`, `piFromLambda`.
//! Parquet (`.parquet`, `.pq`) and delimited text (`.csv`, `.tsv`) are accepted.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// CSV / TSV event tables.
pub mod event_csv;
/// Parquet / Arrow event tables.
pub mod event_parquet;

use std::path::Path;

use fdr_core::{Correlator, Error, EventTable, Observable, PairSpecies, Result};

pub use event_parquet::{
    event_table_from_record_batch, event_table_from_record_batches, event_table_to_record_batch,
    read_event_table_parquet, read_event_table_parquet_bytes, write_event_table_parquet,
    write_event_table_parquet_bytes,
};

/// Name of the centrality column.
pub const CENTRALITY_COLUMN: &str = "centrality";

/// On-disk format of an event table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    /// Apache Parquet.
    Parquet,
    /// Comma-separated text.
    Csv,
    /// Tab-separated text.
    Tsv,
}

impl TableFormat {
    /// Infer the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();
        match ext.as_str() {
            "parquet" | "pq" => Ok(TableFormat::Parquet),
            "csv" => Ok(TableFormat::Csv),
            "tsv" | "tab" => Ok(TableFormat::Tsv),
            _ => Err(Error::Validation(format!(
                "cannot infer event table format of '{}' (expected .parquet, .pq, .csv or .tsv)",
                path.display()
            ))),
        }
    }
}

/// Read an event table, choosing the reader by file extension.
///
/// With `observables = None` every observable whose value and pair-count
/// columns are both present is loaded.
pub fn read_event_table(path: &Path, observables: Option<&[Observable]>) -> Result<EventTable> {
    let table = match TableFormat::from_path(path)? {
        TableFormat::Parquet => read_event_table_parquet(path, observables)?,
        TableFormat::Csv => event_csv::read_event_table_csv(path, b',', observables)?,
        TableFormat::Tsv => event_csv::read_event_table_csv(path, b'\t', observables)?,
    };
    log::info!(
        "read {} events ({} observables) from {}",
        table.n_events(),
        table.observables().len(),
        path.display()
    );
    Ok(table)
}

/// Write an event table, choosing the writer by file extension.
pub fn write_event_table(table: &EventTable, path: &Path) -> Result<()> {
    match TableFormat::from_path(path)? {
        TableFormat::Parquet => write_event_table_parquet(table, path),
        TableFormat::Csv => event_csv::write_event_table_csv(table, path, b','),
        TableFormat::Tsv => event_csv::write_event_table_csv(table, path, b'\t'),
    }
}

/// Observables to load given the available column names.
///
/// Requested observables must be complete; discovery keeps only complete pairs.
pub(crate) fn resolve_observables(
    has_column: impl Fn(&str) -> bool,
    requested: Option<&[Observable]>,
) -> Result<Vec<Observable>> {
    if !has_column(CENTRALITY_COLUMN) {
        return Err(Error::MissingData(format!(
            "event table has no '{CENTRALITY_COLUMN}' column"
        )));
    }
    match requested {
        Some(list) => {
            for obs in list {
                for col in [obs.value_column(), obs.weight_column()] {
                    if !has_column(&col) {
                        return Err(Error::MissingData(format!(
                            "event table has no '{col}' column (needed for {obs})"
                        )));
                    }
                }
            }
            Ok(list.to_vec())
        }
        None => Ok(Correlator::ALL
            .into_iter()
            .flat_map(|c| PairSpecies::ALL.into_iter().map(move |s| Observable::new(c, s)))
            .filter(|o| has_column(&o.value_column()) && has_column(&o.weight_column()))
            .collect()),
    }
}
