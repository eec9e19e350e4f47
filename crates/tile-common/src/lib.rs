//! Common types shared by the tile harvester and the dataset labeler.

pub mod bbox;
pub mod error;
pub mod grid;
pub mod layer;
pub mod tile;
pub mod time;

pub use bbox::TileExtent;
pub use error::{TileError, TileResult};
pub use grid::TileGrid;
pub use layer::{Layer, TemporalMode};
pub use tile::{TileKey, TilePath};
pub use time::DateRange;
