//! # fdr-viz
//!
//! Plot artifacts for fdratio.
//!
//! Everything here is numbers-first: graphs are point lists with symmetric y
//! errors, fits and histograms are plain structs, and the artifact types
//! serialize to flat JSON that any plotting front end can consume. CSV
//! exporters mirror the column layout downstream consumers already read.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// JSON artifacts for the `bootstrap`, `ratio` and `diff` commands.
pub mod artifact;
/// CSV writers.
pub mod export;
/// Constant (pol0) fit.
pub mod fit;
/// Centrality graphs with errors.
pub mod graph;
/// Replicate-distribution histograms.
pub mod histogram;

pub use artifact::{
    BootstrapArtifact, BootstrapBinEntry, BootstrapMeta, DiffArtifact, IntervalSettings,
    RatioArtifact,
};
pub use fit::{ConstantFit, constant_fit};
pub use graph::{
    GraphErrors, GraphPoint, bootstrap_graph, profile_graph, ratio_graph, subtract_graphs,
};
pub use histogram::ReplicateHistogram;
