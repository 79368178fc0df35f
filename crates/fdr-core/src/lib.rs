//! # fdr-core
//!
//! Core types for fdratio.
//!
//! This crate defines the vocabulary shared by every other crate in the
//! workspace: the error type, centrality bins, the closed set of correlation
//! observables, per-event records and the columnar event table.
//!
//! It does no I/O and no statistics.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Error types.
pub mod error;
/// Columnar event table.
pub mod table;
/// Domain types: bins, observables, records, results.
pub mod types;

pub use error::{Error, Result};
pub use table::{EventTable, ObservableColumn};
pub use types::{
    BootstrapResult, CentralityBin, Correlator, EventRecord, N_CENTRALITY_BINS, Observable,
    PairSpecies,
};

/// Crate version, reported by the CLI and embedded in artifacts.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
