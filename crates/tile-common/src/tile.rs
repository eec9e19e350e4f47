//! On-disk addressing of downloaded tiles.
//!
//! Layout under the output root:
//!
//! ```text
//! <root>/<layer>/<date>/<layer>_<date>_<bbox>.png   daily layers
//! <root>/<layer>/<layer>_<bbox>.png                 static layers
//! ```
//!
//! The bbox token is always the last `_`-separated component of the file
//! stem, which is how [`TileKey`] recovers it.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::time::format_date;
use crate::{Layer, TemporalMode, TileError, TileExtent, TileResult};

pub const TILE_EXTENSION: &str = "png";

/// Join key for tiles of different layers covering the same extent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileKey(String);

impl TileKey {
    pub fn from_extent(extent: &TileExtent) -> Self {
        Self(extent.wms_bbox())
    }

    /// Recover the key from a tile file name such as
    /// `OSM_Land_Water_Map_-90,-180,-85,-175.png`.
    pub fn from_file_name(name: &str) -> TileResult<Self> {
        let stem = name
            .strip_suffix(TILE_EXTENSION)
            .and_then(|s| s.strip_suffix('.'))
            .ok_or_else(|| TileError::InvalidFileName(name.to_string()))?;

        let token = stem
            .rsplit_once('_')
            .map(|(_, token)| token)
            .ok_or_else(|| TileError::InvalidFileName(name.to_string()))?;

        // Validate that the token really is a bbox.
        TileExtent::from_wms_string(token)?;
        Ok(Self(token.to_string()))
    }

    pub fn from_path(path: &Path) -> TileResult<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| TileError::InvalidFileName(path.display().to_string()))?;
        Self::from_file_name(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deterministic location of one tile file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilePath {
    dir: PathBuf,
    file_name: String,
}

impl TilePath {
    /// Address a tile. Daily layers require a date; static layers reject one.
    pub fn new(
        root: &Path,
        layer: &Layer,
        date: Option<NaiveDate>,
        extent: &TileExtent,
    ) -> TileResult<Self> {
        let bbox = extent.wms_bbox();
        match (layer.temporal, date) {
            (TemporalMode::Daily, Some(date)) => {
                let date = format_date(date);
                Ok(Self {
                    dir: layer_dir(root, layer).join(&date),
                    file_name: format!("{}_{}_{}.{}", layer.name, date, bbox, TILE_EXTENSION),
                })
            }
            (TemporalMode::Static, None) => Ok(Self {
                dir: layer_dir(root, layer),
                file_name: format!("{}_{}.{}", layer.name, bbox, TILE_EXTENSION),
            }),
            (TemporalMode::Daily, None) => Err(TileError::TemporalMismatch {
                layer: layer.name.clone(),
                mode: "daily",
                given: "not given",
            }),
            (TemporalMode::Static, Some(_)) => Err(TileError::TemporalMismatch {
                layer: layer.name.clone(),
                mode: "static",
                given: "given",
            }),
        }
    }

    /// Directory holding the tile; created by the fetcher on demand.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }
}

/// Root directory of one layer.
pub fn layer_dir(root: &Path, layer: &Layer) -> PathBuf {
    root.join(&layer.name)
}

/// Directory holding one day of a daily layer.
pub fn date_dir(root: &Path, layer: &Layer, date: NaiveDate) -> PathBuf {
    layer_dir(root, layer).join(format_date(date))
}
