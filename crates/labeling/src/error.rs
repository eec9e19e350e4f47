//! Error types for the labeling crate.

use std::path::PathBuf;

use thiserror::Error;
use tile_common::TileError;

/// Errors that end a labeling run.
#[derive(Error, Debug)]
pub enum LabelError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode tile {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to list tiles: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Layer directory not found: {0}")]
    MissingLayerDir(PathBuf),

    #[error("No {layer} tile for {key} (needed by {needed_by})")]
    MissingTile {
        layer: String,
        key: String,
        needed_by: PathBuf,
    },

    #[error("Failed to write manifest: {0}")]
    Manifest(#[from] csv::Error),

    #[error(transparent)]
    Tile(#[from] TileError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for labeling operations.
pub type Result<T> = std::result::Result<T, LabelError>;
