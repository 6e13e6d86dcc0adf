//! Error types for dataframe pipelines

use thiserror::Error;

use crate::column::ColumnId;

/// Result type for dataframe pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for dataframe pipeline operations
#[derive(Error, Debug)]
pub enum Error {
    /// A registration referenced a column that is not registered yet
    #[error("Invalid dependency: column {column} does not exist (store has {column_count} columns)")]
    InvalidDependency {
        /// The offending column id
        column: ColumnId,
        /// Number of columns registered when the call was made
        column_count: usize,
    },

    /// A row, column, or tuple member index outside its valid range
    #[error("Index {index} out of range (length {len})")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Exclusive upper bound
        len: usize,
    },

    /// Prefetch was requested with nothing left to prefetch
    #[error("Prefetch overflow: frontier already at {frontier} of {row_count} rows")]
    PrefetchOverflow {
        /// Row index the next prefetched row would have
        frontier: usize,
        /// Row count of the store
        row_count: usize,
    },

    /// An upstream accessor or transform produced the wrong number of values
    #[error("Column {column} produced {actual} values, expected {expected}")]
    MissingData {
        /// Column whose upstream misbehaved
        column: ColumnId,
        /// Number of rows requested
        expected: usize,
        /// Number of values returned
        actual: usize,
    },

    /// Value had a different shape or kind than the consumer expects
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Failure inside a user supplied transform
    #[error("Transformation error: {0}")]
    TransformationError(String),

    /// Configuration could not be parsed
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn out_of_range(index: usize, len: usize) -> Self {
        Error::IndexOutOfRange { index, len }
    }
}
