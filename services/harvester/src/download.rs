//! Tile download loop with skip-if-present and retry.
//!
//! Key features:
//! - A tile whose file exists and decodes is never requested again
//! - Exponential backoff retry on any failure (network, status, decode)
//! - Bounded retries with explicit terminal failures, or unbounded on request
//! - Atomic writes: tiles land under a temporary name and are renamed

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use image::ImageFormat;
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

use tile_common::time::format_date;
use tile_common::{DateRange, Layer, TileExtent, TileGrid, TilePath};
use wms_protocol::GetMapRequest;

use crate::config::HarvestConfig;
use crate::source::TileSource;

/// How failed tiles are retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt; `None` retries forever
    pub max_retries: Option<u32>,
    /// Delay before the first retry (doubles each retry)
    pub initial_delay: Duration,
    /// Maximum retry delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &HarvestConfig) -> Self {
        Self {
            max_retries: config.retry.max_retries,
            initial_delay: config.retry.initial_delay(),
            max_delay: config.retry.max_delay(),
        }
    }

    /// Whether retry number `retry` (1-based) may run.
    pub fn allows(&self, retry: u32) -> bool {
        self.max_retries.map_or(true, |max| retry <= max)
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let doublings = retry.saturating_sub(1).min(31);
        self.initial_delay
            .checked_mul(1u32 << doublings)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

/// What happened to one tile.
#[derive(Debug)]
pub enum TileOutcome {
    /// A valid file was already on disk
    Skipped,
    Downloaded { attempts: u32 },
    Failed { attempts: u32, error: anyhow::Error },
}

/// A tile that exhausted its retries.
#[derive(Debug, Clone)]
pub struct FailedTile {
    pub layer: String,
    pub date: Option<NaiveDate>,
    pub path: PathBuf,
    pub attempts: u32,
    pub error: String,
}

/// Counts for a fetch run.
#[derive(Debug, Clone, Default)]
pub struct FetchSummary {
    pub skipped: usize,
    pub downloaded: usize,
    pub failed: Vec<FailedTile>,
    /// Requests sent, including retries
    pub requests: u64,
}

impl FetchSummary {
    pub fn merge(&mut self, other: FetchSummary) {
        self.skipped += other.skipped;
        self.downloaded += other.downloaded;
        self.requests += other.requests;
        self.failed.extend(other.failed);
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Downloads every tile of the configured grid, one at a time.
pub struct TileFetcher<S> {
    source: S,
    output_dir: PathBuf,
    grid: TileGrid,
    dates: DateRange,
    resolution: u32,
    retry: RetryPolicy,
}

impl<S: TileSource> TileFetcher<S> {
    pub fn new(source: S, config: &HarvestConfig) -> Result<Self> {
        Ok(Self {
            source,
            output_dir: config.output_dir.clone(),
            grid: config.grid()?,
            dates: config.date_range()?,
            resolution: config.resolution,
            retry: RetryPolicy::from_config(config),
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetch each layer in turn.
    pub async fn fetch_all(&self, layers: &[Layer]) -> Result<FetchSummary> {
        let mut summary = FetchSummary::default();
        for layer in layers {
            summary.merge(self.fetch_layer(layer).await?);
        }

        info!(
            skipped = summary.skipped,
            downloaded = summary.downloaded,
            failed = summary.failed.len(),
            requests = summary.requests,
            "Fetch complete"
        );
        Ok(summary)
    }

    /// Fetch every grid tile of `layer`: once per day for daily layers, once
    /// in total for static layers.
    #[instrument(skip(self), fields(layer = %layer.name))]
    pub async fn fetch_layer(&self, layer: &Layer) -> Result<FetchSummary> {
        info!(tiles = self.grid.len(), "Downloading layer");
        let mut summary = FetchSummary::default();

        if layer.is_daily() {
            for date in self.dates.days() {
                info!(date = %format_date(date), "Downloading images for date");
                self.fetch_date(layer, Some(date), &mut summary).await?;
            }
        } else {
            self.fetch_date(layer, None, &mut summary).await?;
        }

        info!(
            skipped = summary.skipped,
            downloaded = summary.downloaded,
            failed = summary.failed.len(),
            "Layer done"
        );
        Ok(summary)
    }

    async fn fetch_date(
        &self,
        layer: &Layer,
        date: Option<NaiveDate>,
        summary: &mut FetchSummary,
    ) -> Result<()> {
        for extent in self.grid.extents() {
            let tile = TilePath::new(&self.output_dir, layer, date, &extent)?;
            match self.fetch_tile(layer, date, extent, &tile).await? {
                TileOutcome::Skipped => summary.skipped += 1,
                TileOutcome::Downloaded { attempts } => {
                    summary.downloaded += 1;
                    summary.requests += attempts as u64;
                }
                TileOutcome::Failed { attempts, error } => {
                    summary.requests += attempts as u64;
                    summary.failed.push(FailedTile {
                        layer: layer.name.clone(),
                        date,
                        path: tile.path(),
                        attempts,
                        error: format!("{:#}", error),
                    });
                }
            }
        }
        Ok(())
    }

    /// Make sure one tile is on disk.
    ///
    /// Only a bad request (which no retry can fix) or a failure to create the
    /// tile directory is returned as an error; download failures are reported
    /// through [`TileOutcome::Failed`].
    pub async fn fetch_tile(
        &self,
        layer: &Layer,
        date: Option<NaiveDate>,
        extent: TileExtent,
        tile: &TilePath,
    ) -> Result<TileOutcome> {
        let path = tile.path();
        if is_valid_tile(&path).await {
            debug!(path = %path.display(), "Tile already present, skipping");
            return Ok(TileOutcome::Skipped);
        }

        let request = GetMapRequest::for_tile(layer, date, extent, self.resolution)?;
        fs::create_dir_all(tile.dir())
            .await
            .with_context(|| format!("Failed to create {}", tile.dir().display()))?;

        let mut retry_count = 0;
        loop {
            let attempts = retry_count + 1;
            match self.attempt(&request, tile).await {
                Ok(()) => {
                    debug!(path = %path.display(), attempts, "Tile downloaded");
                    return Ok(TileOutcome::Downloaded { attempts });
                }
                Err(e) => {
                    retry_count += 1;

                    if !self.retry.allows(retry_count) {
                        error!(
                            path = %path.display(),
                            attempts,
                            error = %format!("{:#}", e),
                            "Tile download failed, giving up"
                        );
                        return Ok(TileOutcome::Failed { attempts, error: e });
                    }

                    let delay = self.retry.delay_for(retry_count);
                    warn!(
                        bbox = %extent,
                        error = %format!("{:#}", e),
                        retry = retry_count,
                        max_retries = ?self.retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Error encountered, retrying"
                    );

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// One request: fetch, decode, re-encode as PNG, write atomically.
    async fn attempt(&self, request: &GetMapRequest, tile: &TilePath) -> Result<()> {
        let body = self.source.fetch(request).await?;
        let png = reencode_png(&body)?;
        write_atomic(tile, &png).await
    }
}

/// A tile counts as present when the file exists and decodes as an image.
pub async fn is_valid_tile(path: &Path) -> bool {
    match fs::read(path).await {
        Ok(bytes) => image::load_from_memory(&bytes).is_ok(),
        Err(_) => false,
    }
}

fn reencode_png(body: &[u8]) -> Result<Vec<u8>> {
    let image = image::load_from_memory(body).map_err(|e| {
        let preview: String = String::from_utf8_lossy(&body[..body.len().min(120)])
            .chars()
            .filter(|c| !c.is_control())
            .collect();
        anyhow!("Response is not an image ({}): {}", e, preview)
    })?;

    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .context("Failed to encode PNG")?;
    Ok(png)
}

async fn write_atomic(tile: &TilePath, bytes: &[u8]) -> Result<()> {
    let tmp = tile.dir().join(format!(".{}.part", tile.file_name()));
    let path = tile.path();

    let result = match fs::write(&tmp, bytes).await {
        Ok(()) => fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("Failed to move tile into {}", path.display())),
        Err(e) => Err(e).with_context(|| format!("Failed to write {}", tmp.display())),
    };

    // A failed write may have left a partial file behind.
    if result.is_err() {
        fs::remove_file(&tmp).await.ok();
    }
    result
}
