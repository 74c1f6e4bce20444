//! Record normalization error types
//!
//! A `RecordError` always concerns exactly one input record. The pipeline
//! collects these per record and keeps going with the remaining input.
//!
//! # Examples
//!
//! ```rust
//! use azgraph::errors::RecordError;
//!
//! let err = RecordError::MalformedRecord {
//!     row: 3,
//!     reason: "missing identifier".to_string(),
//! };
//! assert_eq!(err.to_string(), "Malformed record at row 3: missing identifier");
//! ```

use thiserror::Error;

/// Errors raised while turning one raw record into a resource
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// The record cannot be used at all
    #[error("Malformed record at row {row}: {reason}")]
    MalformedRecord {
        /// Zero-based position of the record in the input
        row: usize,
        /// What made the record unusable
        reason: String,
    },

    /// A record reuses an identifier that an earlier record already claimed
    #[error("Duplicate identifier '{id}' at row {row} (first seen at row {first_row})")]
    DuplicateIdentifier {
        /// The repeated identifier
        id: String,
        /// Position of the rejected record
        row: usize,
        /// Position of the record that was kept
        first_row: usize,
    },
}

impl RecordError {
    pub fn missing_identifier(row: usize) -> Self {
        RecordError::MalformedRecord {
            row,
            reason: "missing identifier".to_string(),
        }
    }

    /// Input position of the offending record
    pub fn row(&self) -> usize {
        match self {
            RecordError::MalformedRecord { row, .. } | RecordError::DuplicateIdentifier { row, .. } => {
                *row
            }
        }
    }

    /// Get error code for reports
    pub fn error_code(&self) -> &'static str {
        match self {
            RecordError::MalformedRecord { .. } => "MALFORMED_RECORD",
            RecordError::DuplicateIdentifier { .. } => "DUPLICATE_IDENTIFIER",
        }
    }
}
