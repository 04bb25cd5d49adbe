//! Crate-specific errors.

use thiserror::Error;

/// Crate-specific error enum.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Wrapper around `std::io::Error`.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A bit count was outside of 1..=32.
    #[error("bit counts must be between 1 and 32, not {0}")]
    InvalidBitCount(u32),

    /// A header field held a value the format cannot mean.
    #[error("invalid value for header field [{field}]: {value}")]
    InvalidField {
        /// The normalized field name.
        field: String,
        /// The offending value, as written in the file.
        value: String,
    },

    /// The record type was neither reference (1) nor subordinate (2).
    #[error("invalid record type: {0}")]
    InvalidRecordType(u32),

    /// The ASCII header is missing a field that every TCD file must carry.
    #[error("missing required header field: [{0}]")]
    MissingField(String),

    /// The source ended in the middle of a field.
    #[error("the file ended in the middle of a field")]
    Truncated,

    /// Station records from pre-v2 files are not decoded.
    ///
    /// The v1 record layout differs beyond the common header, so reading it
    /// with v2 field widths would silently misalign.
    #[error("station records from major revision {0} files are not supported")]
    UnsupportedVersion(u32),
}
