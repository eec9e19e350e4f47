//! Error types for tile-common.

use thiserror::Error;

use crate::bbox::BboxParseError;
use crate::time::TimeParseError;

/// Result type alias using TileError.
pub type TileResult<T> = Result<T, TileError>;

/// Errors raised while building or addressing tiles.
#[derive(Debug, Error)]
pub enum TileError {
    #[error(transparent)]
    Bbox(#[from] BboxParseError),

    #[error(transparent)]
    Time(#[from] TimeParseError),

    #[error("Invalid grid step: {0} degrees (expected 1..=180)")]
    InvalidStep(u32),

    #[error("Invalid date range: end {end} is not after start {start}")]
    EmptyDateRange { start: String, end: String },

    #[error("Layer '{layer}' is {mode} but a date was {given}")]
    TemporalMismatch {
        layer: String,
        mode: &'static str,
        given: &'static str,
    },

    #[error("Not a tile file name: {0}")]
    InvalidFileName(String),
}
