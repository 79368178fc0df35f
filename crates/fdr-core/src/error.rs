//! Error types for fdratio

use thiserror::Error;

/// fdratio error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),

    /// Required table or column is absent from the input.
    #[error("Missing data: {0}")]
    MissingData(String),

    /// Input contains no qualifying events at all.
    #[error("No valid event data found")]
    NoEvents,

    /// Too few bootstrap replicates to estimate a spread.
    #[error("Insufficient samples: need at least {required}, got {got}")]
    InsufficientSamples {
        /// Minimum number of samples.
        required: usize,
        /// Number of samples requested.
        got: usize,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
