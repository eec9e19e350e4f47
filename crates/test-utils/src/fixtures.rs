//! A temporary tile tree laid out like the fetcher's output.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use image::DynamicImage;
use tempfile::TempDir;

use tile_common::{Layer, TileExtent, TilePath};

/// Layer names used by the default pipeline configuration.
pub mod layers {
    pub const REFLECTANCE: &str = "VIIRS_SNPP_CorrectedReflectance_TrueColor";
    pub const CLOUD: &str = "VIIRS_SNPP_Clear_Sky_Confidence_Day";
    pub const LAND_WATER: &str = "OSM_Land_Water_Map";
}

/// Temporary `images/` directory that is removed on drop.
pub struct TileTree {
    dir: TempDir,
}

impl TileTree {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    /// Workspace root of the fixture (parent of `images/`).
    pub fn base(&self) -> &Path {
        self.dir.path()
    }

    /// The `images/` root tiles are written under.
    pub fn root(&self) -> PathBuf {
        self.dir.path().join("images")
    }

    /// Path a tile would have; nothing is written.
    pub fn tile_path(&self, layer: &Layer, date: Option<NaiveDate>, extent: TileExtent) -> PathBuf {
        TilePath::new(&self.root(), layer, date, &extent)
            .expect("layer and date agree")
            .path()
    }

    /// Writes `image` as a PNG tile and returns its path.
    pub fn write_tile(
        &self,
        layer: &Layer,
        date: Option<NaiveDate>,
        extent: TileExtent,
        image: impl Into<DynamicImage>,
    ) -> PathBuf {
        let path = self.tile_path(layer, date, extent);
        fs::create_dir_all(path.parent().expect("tile has a parent dir")).expect("create tile dir");
        image.into().save(&path).expect("write tile");
        path
    }

    /// Writes raw bytes at the tile location, for corrupt-file cases.
    pub fn write_raw(
        &self,
        layer: &Layer,
        date: Option<NaiveDate>,
        extent: TileExtent,
        bytes: &[u8],
    ) -> PathBuf {
        let path = self.tile_path(layer, date, extent);
        fs::create_dir_all(path.parent().expect("tile has a parent dir")).expect("create tile dir");
        fs::write(&path, bytes).expect("write raw tile");
        path
    }
}

impl Default for TileTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Shorthand for a calendar date in tests.
pub fn date(s: &str) -> NaiveDate {
    tile_common::time::parse_date(s).expect("valid test date")
}
