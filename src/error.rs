//! Error types for degree-progress.

use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading transcripts or requirement catalogs.
///
/// Degenerate data (an empty view, zero credits, a track with nothing left to
/// require) is never reported through this type.
#[derive(Debug, Error)]
pub enum Error {
    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed CSV or a missing column
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Catalog (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A transcript row failed validation
    #[error("invalid record on line {line}: {reason}")]
    InvalidRecord { line: u64, reason: String },

    /// A grade outside the known scale
    #[error("unrecognised grade {value:?} on line {line}")]
    UnknownGrade { line: u64, value: String },

    /// A track tag with no entry in the requirements catalog
    #[error("track {0:?} has no entry in the requirements catalog")]
    UnknownTrack(String),

    /// A main specialisation that names a non-major track
    #[error("track {0:?} is not a specialisation track")]
    NotSpecialization(String),

    /// The requirements catalog itself is inconsistent
    #[error("invalid requirements catalog: {0}")]
    InvalidCatalog(String),
}
