//! Error types for the anomaly engine.

use climate_common::GridError;
use thiserror::Error;

/// Errors that abort a normalization, climatology, anomaly or store invocation.
///
/// A field that is entirely missing during feature extraction is not an error;
/// the affected feature column is `None` instead.
#[derive(Error, Debug)]
pub enum EngineError {
    /// One or more canonical variables could not be matched in a source.
    #[error("missing required variables {missing:?}; found {found:?}")]
    MissingVariable {
        missing: Vec<String>,
        found: Vec<String>,
    },

    /// The valid time of a target could not be determined.
    #[error("missing or unparseable valid time: {0}")]
    MissingValidTime(String),

    /// An axis name did not match any alias for its role.
    #[error("unrecognized {role} axis name '{name}'")]
    UnrecognizedAxis { role: &'static str, name: String },

    /// The climatology has no entry for the requested day-of-year.
    #[error("climatology has no bucket for day-of-year {day_of_year}")]
    MissingClimatologyBucket { day_of_year: u16 },

    /// Two grids do not overlap or are required to coincide but differ.
    #[error("grid mismatch: {0}")]
    GridMismatch(String),

    /// A field violates the gridded data model.
    #[error("invalid field: {0}")]
    InvalidField(#[from] GridError),

    /// Zarr or filesystem store failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Store attributes are missing or malformed.
    #[error("invalid store metadata: {0}")]
    InvalidMetadata(String),

    /// Configuration failed validation.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Create a GridMismatch error.
    pub fn grid_mismatch(msg: impl Into<String>) -> Self {
        Self::GridMismatch(msg.into())
    }

    /// Create a Storage error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create an InvalidMetadata error.
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    /// True for errors that only affect a single target date.
    pub fn is_per_date(&self) -> bool {
        matches!(
            self,
            Self::MissingClimatologyBucket { .. }
                | Self::GridMismatch(_)
                | Self::MissingValidTime(_)
        )
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
