//! The crate-wide error type.

use std::io;
use thiserror::Error;

/// Errors reported while loading a relation or running discovery.
///
/// Violated internal preconditions, such as bitsets whose length doesn't match the relation's
/// attribute count, are bugs rather than errors and panic instead.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The input has no columns at all.
    #[error("relation has no columns")]
    NoColumns,

    /// The input has a header but no data rows.
    #[error("empty dataset: relation has no rows")]
    EmptyRelation,

    /// Every dependency holds trivially over a single row, so there is nothing to discover.
    #[error("relation has a single row; at least two are required")]
    SingleRow,

    /// A data row has a different number of fields than the header.
    #[error("line {line}: expected {expected} fields but found {found}")]
    RaggedRow {
        /// One-based line number in the input.
        line: u64,
        /// Number of columns in the header.
        expected: usize,
        /// Number of fields found on this line.
        found: usize,
    },

    /// A field exceeded [`MAX_FIELD_LEN`](crate::config::MAX_FIELD_LEN) bytes.
    #[error("line {line}: field too long")]
    FieldTooLong {
        /// One-based line number in the input.
        line: u64,
    },

    /// A field wasn't valid UTF-8.
    #[error("line {line}: field is not valid UTF-8")]
    InvalidUtf8 {
        /// One-based line number in the input.
        line: u64,
    },

    /// Reading the input failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The configured sample/validate round budget ran out before the lattice was exhausted.
    #[error("discovery did not finish within {rounds} rounds")]
    BudgetExceeded {
        /// The configured round limit.
        rounds: usize,
    },
}

/// Result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
