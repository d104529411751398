//! Error types for the gridded-field data model.

use thiserror::Error;

/// Result type alias using GridError.
pub type GridResult<T> = Result<T, GridError>;

/// Structural errors raised when a field or grid violates its invariants.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GridError {
    #[error("{axis} axis is empty")]
    EmptyAxis { axis: &'static str },

    #[error("{axis} axis contains a non-finite coordinate at index {index}")]
    NonFiniteCoordinate { axis: &'static str, index: usize },

    #[error("{axis} axis is not strictly monotonic")]
    NonMonotonicAxis { axis: &'static str },

    #[error("field '{name}' has {actual} values, expected {expected} (time x lat x lon)")]
    ShapeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("time index {index} out of range for {len} time steps")]
    TimeIndexOutOfRange { index: usize, len: usize },
}
