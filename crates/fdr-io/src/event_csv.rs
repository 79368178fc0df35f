//! Delimited-text event tables.
//!
//! Same columns as the Parquet layout, one header row. Every field must parse
//! as a number; the centrality field must be an integral decile.

use std::path::Path;

use fdr_core::{CentralityBin, Error, EventTable, Observable, Result};

use crate::{CENTRALITY_COLUMN, resolve_observables};

fn csv_err(path: &Path, e: csv::Error) -> Error {
    Error::Validation(format!("{}: {e}", path.display()))
}

/// Read a CSV (`delimiter = b','`) or TSV (`b'\t'`) event table.
pub fn read_event_table_csv(
    path: &Path,
    delimiter: u8,
    observables: Option<&[Observable]>,
) -> Result<EventTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| csv_err(path, e))?;

    let headers: Vec<String> =
        rdr.headers().map_err(|e| csv_err(path, e))?.iter().map(str::to_string).collect();
    let index_of = |name: &str| headers.iter().position(|h| h == name);

    let observables = resolve_observables(|c| index_of(c).is_some(), observables)?;
    let centrality_idx =
        index_of(CENTRALITY_COLUMN).ok_or_else(|| Error::MissingData(CENTRALITY_COLUMN.into()))?;
    let wanted: Vec<(usize, usize)> = observables
        .iter()
        .map(|o| {
            let v = index_of(&o.value_column());
            let w = index_of(&o.weight_column());
            v.zip(w).ok_or_else(|| Error::MissingData(o.value_column()))
        })
        .collect::<Result<_>>()?;

    let mut centrality = Vec::new();
    let mut columns: Vec<(Vec<f64>, Vec<f64>)> = vec![(Vec::new(), Vec::new()); wanted.len()];

    for (row, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| csv_err(path, e))?;
        let field = |idx: usize| -> Result<f64> {
            let s = record.get(idx).unwrap_or("");
            s.parse::<f64>().map_err(|_| {
                Error::Validation(format!(
                    "{}: row {}: column '{}' value '{s}' is not a number",
                    path.display(),
                    row + 1,
                    headers[idx]
                ))
            })
        };

        let c = field(centrality_idx)?;
        if c.fract() != 0.0 || !c.is_finite() {
            return Err(Error::Validation(format!(
                "{}: row {}: centrality {c} is not an integer decile",
                path.display(),
                row + 1
            )));
        }
        centrality.push(CentralityBin::from_i64(c as i64)?);

        for (&(vi, wi), (values, weights)) in wanted.iter().zip(columns.iter_mut()) {
            values.push(field(vi)?);
            weights.push(field(wi)?);
        }
    }

    let mut table = EventTable::new(centrality);
    for (obs, (values, weights)) in observables.into_iter().zip(columns) {
        table.insert_column(obs, values, weights)?;
    }
    Ok(table)
}

/// Write an event table as delimited text.
pub fn write_event_table_csv(table: &EventTable, path: &Path, delimiter: u8) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|e| csv_err(path, e))?;

    let observables = table.observables();
    let mut header = vec![CENTRALITY_COLUMN.to_string()];
    let mut cols = Vec::with_capacity(observables.len());
    let mut written_species = Vec::new();
    for o in &observables {
        header.push(o.value_column());
        let owns_weights = !written_species.contains(&o.species);
        if owns_weights {
            written_species.push(o.species);
            header.push(o.weight_column());
        }
        cols.push((table.require(*o)?, owns_weights));
    }
    wtr.write_record(&header).map_err(|e| csv_err(path, e))?;

    for (i, bin) in table.centrality().iter().enumerate() {
        let mut row = vec![bin.index().to_string()];
        for (c, owns_weights) in &cols {
            row.push(c.values[i].to_string());
            if *owns_weights {
                row.push(c.weights[i].to_string());
            }
        }
        wtr.write_record(&row).map_err(|e| csv_err(path, e))?;
    }
    wtr.flush()?;
    Ok(())
}
