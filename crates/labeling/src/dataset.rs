//! Walk the harvested tile tree and label every usable reflectance tile.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use image::{GrayImage, ImageError};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use tile_common::tile::{date_dir, layer_dir, TILE_EXTENSION};
use tile_common::time::{format_date, parse_date};
use tile_common::{Layer, TemporalMode, TileKey};

use crate::classify::{classify_terrain, classify_weather, to_gray, Histogram, NoDataThreshold, Terrain};
use crate::error::{LabelError, Result};
use crate::manifest::{LabeledSample, ManifestWriter};
use crate::memo::TerrainMemo;

/// Inputs for one labeling run.
#[derive(Debug, Clone)]
pub struct LabelConfig {
    /// Root of the tile tree (`images/`)
    pub images_root: PathBuf,
    /// Daily layer whose tiles become samples
    pub reflectance: Layer,
    /// Daily layer giving per-pixel clear-sky confidence
    pub cloud: Layer,
    /// Static land/water map
    pub land_water: Layer,
    /// Tile edge in pixels; must match what was fetched
    pub resolution: u32,
    /// Fraction of pixels that must be non-zero for a sample to be kept
    pub nodata_fraction: f64,
}

impl LabelConfig {
    pub fn validate(&self) -> Result<()> {
        if self.reflectance.temporal != TemporalMode::Daily {
            return Err(LabelError::InvalidConfig(format!(
                "reflectance layer '{}' must be daily",
                self.reflectance
            )));
        }
        if self.cloud.temporal != TemporalMode::Daily {
            return Err(LabelError::InvalidConfig(format!(
                "cloud layer '{}' must be daily",
                self.cloud
            )));
        }
        if self.land_water.temporal != TemporalMode::Static {
            return Err(LabelError::InvalidConfig(format!(
                "land/water layer '{}' must be static",
                self.land_water
            )));
        }
        if self.resolution == 0 {
            return Err(LabelError::InvalidConfig("resolution must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.nodata_fraction) {
            return Err(LabelError::InvalidConfig(format!(
                "nodata fraction {} outside [0, 1]",
                self.nodata_fraction
            )));
        }
        Ok(())
    }

    pub fn no_data_threshold(&self) -> NoDataThreshold {
        NoDataThreshold::new(self.resolution, self.nodata_fraction)
    }
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSummary {
    pub dates: usize,
    pub labeled: usize,
    pub skipped_no_data: usize,
    /// Land/water tiles actually decoded and classified
    pub terrain_computed: u64,
    /// Samples whose terrain came from the memo
    pub terrain_reused: u64,
}

/// Label every reflectance tile under `config.images_root` and append the
/// results to `manifest`.
///
/// Tiles of the three layers are matched by their bbox token. A missing
/// counterpart or an unreadable tile aborts the run; a mostly-black
/// reflectance tile is skipped.
#[instrument(skip_all, fields(root = %config.images_root.display()))]
pub fn label_dataset<W: Write>(
    config: &LabelConfig,
    memo: &mut TerrainMemo,
    manifest: &mut ManifestWriter<W>,
) -> Result<LabelSummary> {
    config.validate()?;

    let threshold = config.no_data_threshold();
    let reflectance_dir = layer_dir(&config.images_root, &config.reflectance);
    let land_water_dir = layer_dir(&config.images_root, &config.land_water);
    if !reflectance_dir.is_dir() {
        return Err(LabelError::MissingLayerDir(reflectance_dir));
    }
    if !land_water_dir.is_dir() {
        return Err(LabelError::MissingLayerDir(land_water_dir));
    }

    let land_water = index_tiles(&land_water_dir)?;
    let hits_before = memo.hits();
    let misses_before = memo.misses();
    let mut summary = LabelSummary::default();

    for (date, reflectance_date_dir) in list_date_dirs(&reflectance_dir)? {
        info!(date = %format_date(date), "Labeling date");
        summary.dates += 1;

        let cloud = index_tiles(&date_dir(&config.images_root, &config.cloud, date))?;

        for (key, reflectance_path) in list_tiles(&reflectance_date_dir)? {
            let reflectance = Histogram::of(&read_gray(&reflectance_path)?);
            if threshold.is_no_data(&reflectance) {
                debug!(
                    path = %reflectance_path.display(),
                    valid = reflectance.nonzero(),
                    min_valid = threshold.min_valid(),
                    "Skipping no-data tile"
                );
                summary.skipped_no_data += 1;
                continue;
            }

            let cloud_path = counterpart(&cloud, &config.cloud, &key, &reflectance_path)?;
            let weather = classify_weather(&Histogram::of(&read_gray(cloud_path)?));

            let land_water_path =
                counterpart(&land_water, &config.land_water, &key, &reflectance_path)?;
            let terrain = memo.get_or_classify(land_water_path, classify_terrain_tile)?;

            manifest.append(&LabeledSample {
                filepath: reflectance_path,
                weather,
                terrain,
            })?;
            summary.labeled += 1;
        }
    }

    manifest.flush()?;
    summary.terrain_computed = memo.misses() - misses_before;
    summary.terrain_reused = memo.hits() - hits_before;

    info!(
        dates = summary.dates,
        labeled = summary.labeled,
        skipped_no_data = summary.skipped_no_data,
        terrain_computed = summary.terrain_computed,
        terrain_reused = summary.terrain_reused,
        "Labeling complete"
    );
    Ok(summary)
}

fn classify_terrain_tile(path: &Path) -> Result<Terrain> {
    Ok(classify_terrain(&Histogram::of(&read_gray(path)?)))
}

fn counterpart<'a>(
    index: &'a HashMap<TileKey, PathBuf>,
    layer: &Layer,
    key: &TileKey,
    needed_by: &Path,
) -> Result<&'a Path> {
    index
        .get(key)
        .map(PathBuf::as_path)
        .ok_or_else(|| LabelError::MissingTile {
            layer: layer.name.clone(),
            key: key.to_string(),
            needed_by: needed_by.to_path_buf(),
        })
}

/// Decode a tile as 8-bit grayscale.
pub fn read_gray(path: &Path) -> Result<GrayImage> {
    let image = image::open(path).map_err(|e| match e {
        ImageError::IoError(source) => LabelError::Io {
            path: path.to_path_buf(),
            source,
        },
        source => LabelError::Decode {
            path: path.to_path_buf(),
            source,
        },
    })?;
    Ok(to_gray(&image))
}

/// Tile files directly inside `dir`, sorted by file name.
///
/// Anything that is not a `.png` with a bbox token (temporary files, stray
/// notes) is ignored. A missing directory yields no tiles.
fn list_tiles(dir: &Path) -> Result<Vec<(TileKey, PathBuf)>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut tiles = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        if path.extension().map_or(true, |ext| ext != TILE_EXTENSION) {
            continue;
        }
        match TileKey::from_path(&path) {
            Ok(key) => tiles.push((key, path)),
            Err(e) => warn!(path = %path.display(), error = %e, "Ignoring file without tile key"),
        }
    }
    Ok(tiles)
}

fn index_tiles(dir: &Path) -> Result<HashMap<TileKey, PathBuf>> {
    Ok(list_tiles(dir)?.into_iter().collect())
}

/// Date-named subdirectories of a daily layer, oldest first.
fn list_date_dirs(dir: &Path) -> Result<Vec<(NaiveDate, PathBuf)>> {
    let mut dates = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        match parse_date(&name) {
            Ok(date) => dates.push((date, entry.into_path())),
            Err(_) => warn!(dir = %entry.path().display(), "Ignoring non-date directory"),
        }
    }
    dates.sort_by_key(|(date, _)| *date);
    Ok(dates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{date, gray_uniform, layers, TileTree};
    use tile_common::TileExtent;

    fn config(root: PathBuf) -> LabelConfig {
        LabelConfig {
            images_root: root,
            reflectance: Layer::daily(layers::REFLECTANCE),
            cloud: Layer::daily(layers::CLOUD),
            land_water: Layer::fixed(layers::LAND_WATER),
            resolution: 4,
            nodata_fraction: 0.6,
        }
    }

    #[test]
    fn test_list_tiles_skips_foreign_files() {
        let tree = TileTree::new();
        let layer = Layer::fixed(layers::LAND_WATER);
        tree.write_tile(&layer, None, TileExtent::new(0, 0, 5), gray_uniform(4, 4, 75));
        let dir = layer_dir(&tree.root(), &layer);
        std::fs::write(dir.join("README.txt"), "x").unwrap();
        std::fs::write(dir.join(".partial.png.part"), "x").unwrap();
        std::fs::write(dir.join("junk_-2147483648,0,2147483647,0.png"), "x").unwrap();

        let tiles = list_tiles(&dir).unwrap();
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].0.as_str(), "0,0,5,5");
    }

    #[test]
    fn test_list_date_dirs_sorted_and_filtered() {
        let tree = TileTree::new();
        let dir = tree.root().join(layers::REFLECTANCE);
        for name in ["2022-05-03", "2022-05-01", "scratch"] {
            std::fs::create_dir_all(dir.join(name)).unwrap();
        }
        let dates: Vec<NaiveDate> = list_date_dirs(&dir).unwrap().into_iter().map(|(d, _)| d).collect();
        assert_eq!(dates, vec![date("2022-05-01"), date("2022-05-03")]);
    }

    #[test]
    fn test_validate_rejects_static_reflectance() {
        let mut cfg = config(PathBuf::from("images"));
        cfg.reflectance = Layer::fixed(layers::REFLECTANCE);
        assert!(matches!(cfg.validate(), Err(LabelError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_bad_fraction() {
        let mut cfg = config(PathBuf::from("images"));
        cfg.nodata_fraction = 1.5;
        assert!(matches!(cfg.validate(), Err(LabelError::InvalidConfig(_))));
    }

    #[test]
    fn test_missing_reflectance_layer_dir() {
        let tree = TileTree::new();
        let mut memo = TerrainMemo::with_capacity(8);
        let mut manifest = ManifestWriter::from_writer(Vec::new()).unwrap();
        let err = label_dataset(&config(tree.root()), &mut memo, &mut manifest).unwrap_err();
        assert!(matches!(err, LabelError::MissingLayerDir(_)));
    }
}
