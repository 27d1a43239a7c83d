//! Error types for the static domain set.

use thiserror::Error;

/// Error type for domain set compile / serialize / deserialize operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The caller-supplied buffer is not aligned to the record size.
    #[error("buffer is not 64-byte aligned")]
    BadAlignment,

    /// The caller-supplied buffer is too small to hold the compiled database.
    #[error("buffer too small: need at least {needed} bytes, got {got}")]
    SmallPlace { needed: usize, got: usize },

    /// Compile was called with an empty pattern list.
    #[error("no patterns supplied")]
    NoPatterns,

    /// A pattern, or a serialized value, failed validation.
    #[error("invalid value: {0}")]
    BadValue(String),

    /// More than 256 popular suffixes were discovered during calibration.
    #[error("too many popular suffixes: {0} exceeds the 256 limit")]
    TooManyPopular(usize),

    /// The seed/bucket-count search exhausted its growth schedule without
    /// finding a placement where every bucket fits within capacity.
    #[error("failed to calibrate hash table after exhausting growth schedule")]
    FailedToCalibrate,

    /// A pattern had no `.` and is therefore a bare top-level domain.
    #[error("pattern is a top-level domain (no '.'): {0}")]
    TopLevelDomain(String),
}

/// Result type alias for domain set operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of a [`crate::database::Database::find`] query.
///
/// Unlike [`Error`], this is not a failure channel for the library itself —
/// `InvalidInput` is a normal, expected outcome for a malformed query string
/// and is never retried internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// The query, or a whole-label suffix of it, is in the set.
    Found,
    /// The query is well-formed but not in the set.
    NotFound,
    /// The query is empty, exceeds 253 bytes, or contains a byte outside
    /// `[A-Za-z0-9._-]`.
    InvalidInput,
}
