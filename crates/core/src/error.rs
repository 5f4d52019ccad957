//! Error types for ArchTerra

use thiserror::Error;

/// Main error type for ArchTerra operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Point ({x}, {y}) lies outside the grid extent")]
    OutOfExtent { x: f64, y: f64 },

    #[error("No data at cell ({row}, {col})")]
    NoData { row: usize, col: usize },

    #[error("Cell ({row}, {col}) was never reached from the sources")]
    Unreachable { row: usize, col: usize },

    #[error("Invalid cost model '{model}': {reason}")]
    InvalidCostModel { model: String, reason: String },

    #[error("Disconnected graph: {0}")]
    DisconnectedGraph(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidParameter`].
    pub fn invalid_parameter(
        name: &'static str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this error is a per-item failure that a batch may record and skip.
    ///
    /// Structural failures (invalid grids, invalid cost models) and cancellation
    /// are never recoverable inside a batch.
    pub fn is_item_failure(&self) -> bool {
        matches!(
            self,
            Error::OutOfExtent { .. }
                | Error::NoData { .. }
                | Error::Unreachable { .. }
                | Error::IndexOutOfBounds { .. }
        )
    }
}

/// Result type alias for ArchTerra operations
pub type Result<T> = std::result::Result<T, Error>;
