use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use approx::assert_relative_eq;
use fdr_core::{CentralityBin, Correlator, Error, EventTable, Observable, PairSpecies};
use fdr_io::{read_event_table, write_event_table};

fn tmp_path(filename: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("fdratio_io_{}_{}_{}", std::process::id(), nanos, filename));
    p
}

fn sample_table(correlator: Correlator) -> EventTable {
    let n = 25;
    let centrality = (0..n).map(|i| CentralityBin::new((i % 7) as u8).unwrap()).collect();
    let columns = PairSpecies::ALL
        .into_iter()
        .enumerate()
        .map(|(k, s)| {
            let values = (0..n).map(|i| 0.001 * (i as f64 + 1.0) * (k as f64 + 1.0)).collect();
            let weights = (0..n).map(|i| ((i + k) % 4) as f64).collect();
            (Observable::new(correlator, s), values, weights)
        })
        .collect();
    EventTable::from_columns(centrality, columns).unwrap()
}

#[test]
fn parquet_file_roundtrip() {
    let path = tmp_path("events.parquet");
    let table = sample_table(Correlator::Delta);
    write_event_table(&table, &path).unwrap();

    let back = read_event_table(&path, None).unwrap();
    assert_eq!(back, table);
    let _ = std::fs::remove_file(&path);
}

fn both_correlators() -> EventTable {
    let mut table = sample_table(Correlator::Delta);
    let gamma = sample_table(Correlator::Gamma);
    for obs in gamma.observables() {
        let col = gamma.require(obs).unwrap();
        table.insert_column(obs, col.values.clone(), col.weights.clone()).unwrap();
    }
    table
}

fn header_names(path: &std::path::Path) -> Vec<String> {
    let text = std::fs::read_to_string(path).unwrap();
    text.lines().next().unwrap().split(',').map(str::to_string).collect()
}

#[test]
fn parquet_roundtrip_with_both_correlators() {
    let path = tmp_path("both.parquet");
    let table = both_correlators();
    assert_eq!(table.observables().len(), 6);
    write_event_table(&table, &path).unwrap();

    let back = read_event_table(&path, None).unwrap();
    assert_eq!(back, table);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn csv_writes_each_pair_count_column_once() {
    let path = tmp_path("both.csv");
    let table = both_correlators();
    write_event_table(&table, &path).unwrap();

    let header = header_names(&path);
    assert_eq!(header.len(), 1 + 6 + 3);
    for species in PairSpecies::ALL {
        let n = header.iter().filter(|h| **h == species.weight_column()).count();
        assert_eq!(n, 1, "{} written {n} times", species.weight_column());
    }

    let back = read_event_table(&path, None).unwrap();
    assert_eq!(back.observables().len(), 6);
    for obs in table.observables() {
        assert_eq!(back.require(obs).unwrap().weights, table.require(obs).unwrap().weights);
    }
    let _ = std::fs::remove_file(&path);
}

#[test]
fn csv_file_roundtrip() {
    let path = tmp_path("events.csv");
    let table = sample_table(Correlator::Gamma);
    write_event_table(&table, &path).unwrap();

    let back = read_event_table(&path, None).unwrap();
    assert_eq!(back.n_events(), table.n_events());
    assert_eq!(back.centrality(), table.centrality());
    for obs in table.observables() {
        let a = table.require(obs).unwrap();
        let b = back.require(obs).unwrap();
        for (x, y) in a.values.iter().zip(&b.values) {
            assert_relative_eq!(*x, *y, max_relative = 1e-15);
        }
        assert_eq!(a.weights, b.weights);
    }
    let _ = std::fs::remove_file(&path);
}

#[test]
fn tsv_with_float_centrality() {
    let path = tmp_path("events.tsv");
    std::fs::write(
        &path,
        "centrality\tdelta_lambda_lambda\tnpairs_lambda_lambda\n2.0\t0.5\t3\n4\t-0.25\t1\n",
    )
    .unwrap();

    let ll = Observable::new(Correlator::Delta, PairSpecies::LambdaLambda);
    let t = read_event_table(&path, Some(&[ll])).unwrap();
    assert_eq!(t.centrality()[0].index(), 2);
    assert_eq!(t.require(ll).unwrap().values, vec![0.5, -0.25]);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn requested_but_absent_column_is_missing_data() {
    let path = tmp_path("partial.csv");
    std::fs::write(&path, "centrality,delta_lambda_lambda,npairs_lambda_lambda\n0,0.1,1\n").unwrap();

    let pl = Observable::new(Correlator::Delta, PairSpecies::PFromLambda);
    let err = read_event_table(&path, Some(&[pl])).unwrap_err();
    assert!(matches!(err, Error::MissingData(_)), "got {err:?}");
    let _ = std::fs::remove_file(&path);
}

#[test]
fn non_numeric_field_rejected() {
    let path = tmp_path("bad.csv");
    std::fs::write(&path, "centrality,delta_lambda_lambda,npairs_lambda_lambda\n0,abc,1\n").unwrap();
    assert!(matches!(read_event_table(&path, None), Err(Error::Validation(_))));
    let _ = std::fs::remove_file(&path);
}
