//! Harvest configuration.
//!
//! One `HarvestConfig` drives both the fetch and the label phase, so the two
//! always agree on layers, resolution and output location. Every key is
//! optional in YAML; missing keys take the defaults below.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use labeling::LabelConfig;
use tile_common::{DateRange, Layer, TileGrid};

pub const DEFAULT_ENDPOINT: &str = "https://gibs.earthdata.nasa.gov/wms/epsg4326/best/wms.cgi";

/// Root configuration loaded from a harvest YAML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// WMS endpoint (without query)
    pub endpoint: String,
    /// Root of the tile tree
    pub output_dir: PathBuf,
    /// CSV manifest written by the label phase
    pub manifest: PathBuf,
    /// Layers fetched once per day
    pub daily_layers: Vec<String>,
    /// Layer fetched once and reused for every day
    pub static_layer: String,
    /// Daily layer whose tiles become samples
    pub reflectance_layer: String,
    /// Daily layer used for the weather label
    pub cloud_layer: String,
    pub start_date: NaiveDate,
    /// Exclusive
    pub end_date: NaiveDate,
    /// Tile edge in degrees
    pub grid_step: u32,
    /// Tile edge in pixels
    pub resolution: u32,
    /// Minimum fraction of non-zero reflectance pixels
    pub nodata_fraction: f64,
    pub retry: RetryConfig,
}

/// Download retry settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// `null` retries forever
    pub max_retries: Option<u32>,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: Some(5),
            initial_delay_ms: 5_000,
            max_delay_ms: 120_000,
            request_timeout_secs: 60,
        }
    }
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            output_dir: PathBuf::from("images"),
            manifest: PathBuf::from("labeled_data.csv"),
            daily_layers: vec![
                "VIIRS_SNPP_CorrectedReflectance_TrueColor".to_string(),
                "VIIRS_SNPP_Clear_Sky_Confidence_Day".to_string(),
            ],
            static_layer: "OSM_Land_Water_Map".to_string(),
            reflectance_layer: "VIIRS_SNPP_CorrectedReflectance_TrueColor".to_string(),
            cloud_layer: "VIIRS_SNPP_Clear_Sky_Confidence_Day".to_string(),
            start_date: NaiveDate::from_ymd_opt(2022, 5, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2022, 5, 6).unwrap_or_default(),
            grid_step: 5,
            resolution: 128,
            nodata_fraction: 0.6,
            retry: RetryConfig::default(),
        }
    }
}

impl HarvestConfig {
    /// Load a configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: HarvestConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        debug!(path = %path.display(), "Loaded harvest config");
        Ok(config)
    }

    /// Check that both phases can run with these settings.
    pub fn validate(&self) -> Result<()> {
        if self.daily_layers.is_empty() {
            bail!("daily_layers must list at least one layer");
        }
        if self.static_layer.is_empty() {
            bail!("static_layer must be set");
        }
        for (role, name) in [
            ("reflectance_layer", &self.reflectance_layer),
            ("cloud_layer", &self.cloud_layer),
        ] {
            if !self.daily_layers.contains(name) {
                bail!("{} '{}' is not one of daily_layers", role, name);
            }
        }
        if self.daily_layers.contains(&self.static_layer) {
            bail!("static_layer '{}' is also listed as daily", self.static_layer);
        }
        self.date_range()?;
        self.grid()?;
        if self.resolution == 0 {
            bail!("resolution must be positive");
        }
        if !(0.0..=1.0).contains(&self.nodata_fraction) {
            bail!("nodata_fraction {} outside [0, 1]", self.nodata_fraction);
        }
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            bail!("retry.initial_delay_ms exceeds retry.max_delay_ms");
        }
        Ok(())
    }

    pub fn date_range(&self) -> Result<DateRange> {
        Ok(DateRange::new(self.start_date, self.end_date)?)
    }

    pub fn grid(&self) -> Result<TileGrid> {
        Ok(TileGrid::new(self.grid_step)?)
    }

    /// Every configured layer: daily layers in order, then the static layer.
    pub fn layers(&self) -> Vec<Layer> {
        self.daily_layers
            .iter()
            .map(Layer::daily)
            .chain(std::iter::once(Layer::fixed(&self.static_layer)))
            .collect()
    }

    pub fn find_layer(&self, name: &str) -> Option<Layer> {
        self.layers().into_iter().find(|l| l.name == name)
    }

    pub fn label_config(&self) -> LabelConfig {
        LabelConfig {
            images_root: self.output_dir.clone(),
            reflectance: Layer::daily(&self.reflectance_layer),
            cloud: Layer::daily(&self.cloud_layer),
            land_water: Layer::fixed(&self.static_layer),
            resolution: self.resolution,
            nodata_fraction: self.nodata_fraction,
        }
    }
}
