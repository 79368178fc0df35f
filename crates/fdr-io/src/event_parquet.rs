//! Parquet / Arrow event tables.
//!
//! # Schema: `fdratio_event_table_v1`
//!
//! | Column                 | Arrow type | Nullable |
//! |------------------------|------------|----------|
//! | `centrality`           | `Int32`    | no       |
//! | `<prefix>_<tag>`       | `Float64`  | no       |
//! | `npairs_<tag>`         | `Float64`  | no       |
//!
//! `npairs_<tag>` is written once per species and shared by both correlators.
//!
//! Key-value metadata:
//!
//! | Key                       | Value                                   |
//! |---------------------------|-----------------------------------------|
//! | `fdratio.schema_version`  | `"fdratio_event_table_v1"`              |
//! | `fdratio.observables`     | JSON array of value-column names        |
//!
//! On read, any integer or floating type is accepted for every column and
//! cast; nulls are rejected.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Float64Array, Int32Array};
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema};
use arrow::record_batch::RecordBatch;
use fdr_core::{CentralityBin, Error, EventTable, Observable, Result};

use crate::{CENTRALITY_COLUMN, resolve_observables};

/// Schema version string embedded in Parquet key-value metadata.
pub const EVENT_TABLE_SCHEMA_V1: &str = "fdratio_event_table_v1";

/// Metadata key for the schema version.
pub const META_KEY_SCHEMA_VERSION: &str = "fdratio.schema_version";

/// Metadata key for the observable list (JSON).
pub const META_KEY_OBSERVABLES: &str = "fdratio.observables";

// ---------------------------------------------------------------------------
// Write
// ---------------------------------------------------------------------------

/// Build an Arrow [`RecordBatch`] from an [`EventTable`].
pub fn event_table_to_record_batch(table: &EventTable) -> Result<RecordBatch> {
    let observables = table.observables();
    let names: Vec<String> = observables.iter().map(|o| o.value_column()).collect();
    let obs_json = serde_json::to_string(&names)?;

    let mut fields = vec![Field::new(CENTRALITY_COLUMN, DataType::Int32, false)];
    let mut arrays: Vec<ArrayRef> = vec![Arc::new(Int32Array::from(
        table.centrality().iter().map(|b| i32::from(b.index())).collect::<Vec<_>>(),
    ))];

    let mut written_species = Vec::new();
    for obs in &observables {
        let col = table.require(*obs)?;
        fields.push(Field::new(obs.value_column(), DataType::Float64, false));
        arrays.push(Arc::new(Float64Array::from(col.values.clone())));
        if !written_species.contains(&obs.species) {
            written_species.push(obs.species);
            fields.push(Field::new(obs.weight_column(), DataType::Float64, false));
            arrays.push(Arc::new(Float64Array::from(col.weights.clone())));
        }
    }

    let metadata = HashMap::from([
        (META_KEY_SCHEMA_VERSION.to_string(), EVENT_TABLE_SCHEMA_V1.to_string()),
        (META_KEY_OBSERVABLES.to_string(), obs_json),
    ]);
    let schema = Arc::new(Schema::new(fields).with_metadata(metadata));

    RecordBatch::try_new(schema, arrays)
        .map_err(|e| Error::Validation(format!("failed to build RecordBatch: {e}")))
}

/// Write an [`EventTable`] to a Parquet file (Snappy).
pub fn write_event_table_parquet(table: &EventTable, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .map_err(|e| Error::Validation(format!("failed to create {}: {e}", path.display())))?;
    write_parquet_to(table, file)
}

/// Write an [`EventTable`] to Parquet bytes in memory.
pub fn write_event_table_parquet_bytes(table: &EventTable) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_parquet_to(table, &mut buf)?;
    Ok(buf)
}

fn write_parquet_to<W: std::io::Write + Send>(table: &EventTable, sink: W) -> Result<()> {
    let batch = event_table_to_record_batch(table)?;
    let props = parquet::file::properties::WriterProperties::builder()
        .set_compression(parquet::basic::Compression::SNAPPY)
        .build();

    let mut writer = parquet::arrow::ArrowWriter::try_new(sink, batch.schema(), Some(props))
        .map_err(|e| Error::Validation(format!("failed to create Parquet writer: {e}")))?;
    writer.write(&batch).map_err(|e| Error::Validation(format!("failed to write Parquet: {e}")))?;
    writer
        .close()
        .map_err(|e| Error::Validation(format!("failed to close Parquet writer: {e}")))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// Observables recorded in the schema metadata, if any.
pub fn observables_from_schema_metadata(schema: &Schema) -> Result<Option<Vec<Observable>>> {
    let Some(json) = schema.metadata().get(META_KEY_OBSERVABLES) else {
        return Ok(None);
    };
    let names: Vec<String> = serde_json::from_str(json)
        .map_err(|e| Error::Validation(format!("invalid {META_KEY_OBSERVABLES} metadata: {e}")))?;
    names.iter().map(|n| n.parse()).collect::<Result<Vec<_>>>().map(Some)
}

/// Build an [`EventTable`] from an Arrow [`RecordBatch`].
///
/// Without an explicit observable list, the schema metadata is consulted
/// first, then the columns are scanned for complete value/pair-count pairs.
pub fn event_table_from_record_batch(
    batch: &RecordBatch,
    observables: Option<&[Observable]>,
) -> Result<EventTable> {
    let schema = batch.schema();
    let from_meta = match observables {
        Some(_) => None,
        None => observables_from_schema_metadata(&schema)?,
    };
    let requested = observables.or(from_meta.as_deref());
    let observables = resolve_observables(|c| schema.index_of(c).is_ok(), requested)?;

    let centrality = centrality_column(batch)?;
    let mut table = EventTable::new(centrality);
    for obs in observables {
        let values = f64_column(batch, &obs.value_column())?;
        let weights = f64_column(batch, &obs.weight_column())?;
        table.insert_column(obs, values, weights)?;
    }
    Ok(table)
}

/// Build an [`EventTable`] from several batches sharing one schema.
pub fn event_table_from_record_batches(
    batches: &[RecordBatch],
    observables: Option<&[Observable]>,
) -> Result<EventTable> {
    let Some(first) = batches.first() else {
        return Err(Error::Validation("no RecordBatches provided".into()));
    };
    let merged = arrow::compute::concat_batches(&first.schema(), batches)
        .map_err(|e| Error::Validation(format!("failed to concat batches: {e}")))?;
    event_table_from_record_batch(&merged, observables)
}

/// Read a Parquet file into an [`EventTable`].
pub fn read_event_table_parquet(
    path: &Path,
    observables: Option<&[Observable]>,
) -> Result<EventTable> {
    let file = std::fs::File::open(path)
        .map_err(|e| Error::Validation(format!("failed to open {}: {e}", path.display())))?;
    read_parquet_from(file, observables)
}

/// Read Parquet bytes into an [`EventTable`].
pub fn read_event_table_parquet_bytes(
    data: &[u8],
    observables: Option<&[Observable]>,
) -> Result<EventTable> {
    read_parquet_from(bytes::Bytes::copy_from_slice(data), observables)
}

fn read_parquet_from<R: parquet::file::reader::ChunkReader + 'static>(
    source: R,
    observables: Option<&[Observable]>,
) -> Result<EventTable> {
    let builder = parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder::try_new(source)
        .map_err(|e| Error::Validation(format!("failed to read Parquet: {e}")))?;

    // The builder's schema carries the key-value metadata; the batches do not.
    let full_schema = builder.schema().clone();

    let reader = builder
        .build()
        .map_err(|e| Error::Validation(format!("failed to build Parquet reader: {e}")))?;
    let batches = reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Validation(format!("failed to read Parquet batches: {e}")))?;

    if batches.is_empty() {
        log::debug!("Parquet input has no row groups");
        return event_table_from_record_batch(&RecordBatch::new_empty(full_schema), observables);
    }

    let merged = arrow::compute::concat_batches(&full_schema, &batches)
        .map_err(|e| Error::Validation(format!("failed to concat Parquet batches: {e}")))?;
    event_table_from_record_batch(&merged, observables)
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    let idx = batch
        .schema()
        .index_of(name)
        .map_err(|_| Error::MissingData(format!("missing column '{name}'")))?;
    let arr = batch.column(idx);
    if arr.null_count() > 0 {
        return Err(Error::Validation(format!(
            "column '{name}' contains {} null values",
            arr.null_count()
        )));
    }
    Ok(arr)
}

fn is_numeric(dt: &DataType) -> bool {
    dt.is_integer() || dt.is_floating()
}

fn f64_column(batch: &RecordBatch, name: &str) -> Result<Vec<f64>> {
    let arr = column(batch, name)?;
    if !is_numeric(arr.data_type()) {
        return Err(Error::Validation(format!(
            "column '{name}' has type {:?}, expected a numeric type",
            arr.data_type()
        )));
    }
    let cast = arrow::compute::cast(arr, &DataType::Float64)
        .map_err(|e| Error::Validation(format!("failed to cast '{name}' to Float64: {e}")))?;
    Ok(cast.as_primitive::<Float64Type>().values().to_vec())
}

fn centrality_column(batch: &RecordBatch) -> Result<Vec<CentralityBin>> {
    let arr = column(batch, CENTRALITY_COLUMN)?;
    match arr.data_type() {
        dt if dt.is_integer() => {
            let cast = arrow::compute::cast(arr, &DataType::Int64).map_err(|e| {
                Error::Validation(format!("failed to cast '{CENTRALITY_COLUMN}' to Int64: {e}"))
            })?;
            cast.as_primitive::<Int64Type>()
                .values()
                .iter()
                .map(|&v| CentralityBin::from_i64(v))
                .collect()
        }
        dt if dt.is_floating() => f64_column(batch, CENTRALITY_COLUMN)?
            .into_iter()
            .map(|v| {
                if v.fract() != 0.0 || !v.is_finite() {
                    return Err(Error::Validation(format!(
                        "'{CENTRALITY_COLUMN}' value {v} is not an integer decile"
                    )));
                }
                CentralityBin::from_i64(v as i64)
            })
            .collect(),
        dt => Err(Error::Validation(format!(
            "column '{CENTRALITY_COLUMN}' has type {dt:?}, expected an integer type"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float32Array, Int64Array, UInt8Array};
    use fdr_core::{Correlator, PairSpecies};

    const LL: Observable = Observable::new(Correlator::Delta, PairSpecies::LambdaLambda);
    const PL: Observable = Observable::new(Correlator::Delta, PairSpecies::PFromLambda);

    fn make_table() -> EventTable {
        let bins = [0u8, 3, 3, 9].iter().map(|&b| CentralityBin::new(b).unwrap()).collect();
        EventTable::from_columns(
            bins,
            vec![
                (LL, vec![0.1, -0.2, 0.3, 0.0], vec![1.0, 2.0, 0.0, 4.0]),
                (PL, vec![0.5, 0.6, 0.7, 0.8], vec![10.0, 20.0, 30.0, 40.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn record_batch_roundtrip() {
        let table = make_table();
        let batch = event_table_to_record_batch(&table).unwrap();
        assert_eq!(batch.num_rows(), 4);
        assert_eq!(batch.num_columns(), 5);

        let schema = batch.schema();
        assert_eq!(schema.metadata().get(META_KEY_SCHEMA_VERSION).unwrap(), EVENT_TABLE_SCHEMA_V1);

        let back = event_table_from_record_batch(&batch, None).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn both_correlators_share_one_pair_count_column() {
        let gamma_ll = Observable::new(Correlator::Gamma, PairSpecies::LambdaLambda);
        let mut table = make_table();
        table.insert_column(gamma_ll, vec![-0.1, 0.2, 0.0, 0.4], vec![1.0, 2.0, 0.0, 4.0]).unwrap();

        let batch = event_table_to_record_batch(&table).unwrap();
        let schema = batch.schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names.iter().filter(|n| **n == "npairs_lambda_lambda").count(), 1);
        assert_eq!(batch.num_columns(), 6);

        let back = event_table_from_record_batch(&batch, None).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn parquet_bytes_roundtrip() {
        let table = make_table();
        let bytes = write_event_table_parquet_bytes(&table).unwrap();
        let back = read_event_table_parquet_bytes(&bytes, Some(&[PL, LL])).unwrap();
        assert_eq!(back.n_events(), 4);
        assert_eq!(back.require(PL).unwrap(), table.require(PL).unwrap());
        assert_eq!(back.observables(), vec![PL, LL]);
    }

    #[test]
    fn integer_and_f32_columns_are_cast() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("centrality", DataType::UInt8, false),
            Field::new("delta_lambda_lambda", DataType::Float32, false),
            Field::new("npairs_lambda_lambda", DataType::Int64, false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(UInt8Array::from(vec![1, 2])),
                Arc::new(Float32Array::from(vec![0.5, 0.25])),
                Arc::new(Int64Array::from(vec![3, 0])),
            ],
        )
        .unwrap();

        let t = event_table_from_record_batch(&batch, None).unwrap();
        assert_eq!(t.centrality()[1].index(), 2);
        let col = t.require(LL).unwrap();
        assert_eq!(col.values, vec![0.5, 0.25]);
        assert_eq!(col.weights, vec![3.0, 0.0]);
    }

    #[test]
    fn out_of_range_centrality_rejected() {
        let schema = Arc::new(Schema::new(vec![Field::new("centrality", DataType::Int64, false)]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![0, 10]))]).unwrap();
        assert!(matches!(event_table_from_record_batch(&batch, None), Err(Error::Validation(_))));
    }

    #[test]
    fn nulls_rejected() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("centrality", DataType::Int64, false),
            Field::new("delta_lambda_lambda", DataType::Float64, true),
            Field::new("npairs_lambda_lambda", DataType::Float64, false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![0, 1])),
                Arc::new(Float64Array::from(vec![Some(0.1), None])),
                Arc::new(Float64Array::from(vec![1.0, 1.0])),
            ],
        )
        .unwrap();
        assert!(event_table_from_record_batch(&batch, None).is_err());
    }
}
