//! CSV exporters.

use std::path::Path;

use fdr_core::{Error, Result};

use crate::artifact::BootstrapArtifact;
use crate::fit::ConstantFit;
use crate::graph::GraphErrors;

fn csv_err(path: &Path, e: csv::Error) -> Error {
    Error::Validation(format!("failed to write {}: {e}", path.display()))
}

/// `label,centrality_percent,value,error`, one row per point.
pub fn write_graph_csv(graph: &GraphErrors, path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| csv_err(path, e))?;
    wtr.write_record(["label", "centrality_percent", "value", "error"])
        .map_err(|e| csv_err(path, e))?;
    for p in &graph.points {
        wtr.write_record([graph.label.clone(), p.x.to_string(), p.y.to_string(), p.ey.to_string()])
            .map_err(|e| csv_err(path, e))?;
    }
    wtr.flush()?;
    Ok(())
}

/// `label,centrality_percent,ratio,ratio_error,fit_constant,fit_error`.
///
/// The fit columns repeat on every row and are empty without a fit.
pub fn write_ratio_csv(graph: &GraphErrors, fit: Option<&ConstantFit>, path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| csv_err(path, e))?;
    wtr.write_record([
        "label",
        "centrality_percent",
        "ratio",
        "ratio_error",
        "fit_constant",
        "fit_error",
    ])
    .map_err(|e| csv_err(path, e))?;
    let (fc, fe) = match fit {
        Some(f) => (f.value.to_string(), f.error.to_string()),
        None => (String::new(), String::new()),
    };
    for p in &graph.points {
        wtr.write_record([
            graph.label.clone(),
            p.x.to_string(),
            p.y.to_string(),
            p.ey.to_string(),
            fc.clone(),
            fe.clone(),
        ])
        .map_err(|e| csv_err(path, e))?;
    }
    wtr.flush()?;
    Ok(())
}

/// `bin,centrality_percent,n_events,observable,ratio,error,ci_low,ci_high`.
///
/// Skipped bins are listed with empty value columns.
pub fn write_bootstrap_csv(artifact: &BootstrapArtifact, path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| csv_err(path, e))?;
    wtr.write_record([
        "bin",
        "centrality_percent",
        "n_events",
        "observable",
        "ratio",
        "error",
        "ci_low",
        "ci_high",
    ])
    .map_err(|e| csv_err(path, e))?;

    for b in &artifact.bins {
        let head = [b.bin.to_string(), b.centrality_percent.to_string(), b.n_events.to_string()];
        if b.ratios.is_empty() {
            let row: Vec<String> =
                head.iter().cloned().chain(std::iter::repeat_n(String::new(), 5)).collect();
            wtr.write_record(&row).map_err(|e| csv_err(path, e))?;
            continue;
        }
        for r in &b.ratios {
            let mut row = head.to_vec();
            row.extend([
                r.observable.to_string(),
                r.ratio.to_string(),
                r.error.to_string(),
                r.ci_low.to_string(),
                r.ci_high.to_string(),
            ]);
            wtr.write_record(&row).map_err(|e| csv_err(path, e))?;
        }
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphPoint;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn tmp_path(name: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        std::env::temp_dir().join(format!("fdratio_viz_{}_{}_{}", std::process::id(), nanos, name))
    }

    #[test]
    fn ratio_csv_layout() {
        let g = GraphErrors {
            name: "r".into(),
            label: "p / LL".into(),
            points: vec![GraphPoint { x: 4.5, y: 0.5, ey: 0.1 }],
        };
        let fit = ConstantFit { value: 0.5, error: 0.1, chi2: 0.0, ndf: 0 };
        let path = tmp_path("ratio.csv");
        write_ratio_csv(&g, Some(&fit), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "label,centrality_percent,ratio,ratio_error,fit_constant,fit_error");
        assert_eq!(lines[1], "p / LL,4.5,0.5,0.1,0.5,0.1");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn graph_csv_layout() {
        let g = GraphErrors {
            name: "g".into(),
            label: "x".into(),
            points: vec![GraphPoint { x: 5.0, y: -0.25, ey: 0.0 }],
        };
        let path = tmp_path("graph.csv");
        write_graph_csv(&g, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "label,centrality_percent,value,error\nx,5,-0.25,0\n");
        let _ = std::fs::remove_file(&path);
    }
}
