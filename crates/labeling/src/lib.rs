//! Dataset labeling for harvested tiles.
//!
//! Each reflectance tile is paired with the cloud-confidence tile of the same
//! day and the static land/water tile covering the same extent. Two labels
//! are derived from pixel counts:
//!
//! - weather: `clear` when dark cloud-confidence pixels outnumber light ones
//! - terrain: `water` when water-colored pixels outnumber land-colored ones
//!
//! Tiles that are mostly no-data (black) are dropped.

pub mod classify;
pub mod dataset;
pub mod error;
pub mod manifest;
pub mod memo;

pub use classify::{Histogram, Terrain, Weather};
pub use dataset::{label_dataset, LabelConfig, LabelSummary};
pub use error::{LabelError, Result};
pub use manifest::{LabeledSample, ManifestWriter};
pub use memo::TerrainMemo;
