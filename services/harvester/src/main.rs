//! GIBS tile harvester.
//!
//! Builds a labeled satellite-image training set in two phases:
//! - `fetch` downloads a global grid of WMS tiles for each configured layer,
//!   skipping tiles already on disk and retrying failures with backoff
//! - `label` pairs every usable reflectance tile with its cloud and
//!   land/water tiles and writes a CSV manifest
//!
//! `run` does both, refusing to label a partially downloaded tree.

mod config;
mod download;
mod source;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use labeling::{label_dataset, LabelConfig, LabelSummary, ManifestWriter, TerrainMemo};
use tile_common::time::parse_date;
use tile_common::TilePath;

use config::HarvestConfig;
use download::{FetchSummary, TileFetcher};
use source::HttpTileSource;

#[derive(Parser, Debug)]
#[command(name = "harvester")]
#[command(about = "Download GIBS tiles and label them for training")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Harvest configuration file (YAML); built-in defaults when absent
    #[arg(long, global = true, env = "HARVEST_CONFIG")]
    config: Option<PathBuf>,

    /// Root of the tile tree
    #[arg(long, global = true, env = "HARVEST_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// CSV manifest path
    #[arg(long, global = true)]
    manifest: Option<PathBuf>,

    /// First date to fetch (YYYY-MM-DD)
    #[arg(long, global = true, value_parser = parse_date_arg)]
    start: Option<NaiveDate>,

    /// Day after the last date to fetch (YYYY-MM-DD)
    #[arg(long, global = true, value_parser = parse_date_arg)]
    end: Option<NaiveDate>,

    /// Maximum retry attempts per tile
    #[arg(long, global = true, conflicts_with = "retry_forever")]
    max_retries: Option<u32>,

    /// Retry failed tiles until they succeed
    #[arg(long, global = true)]
    retry_forever: bool,

    /// Log level
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download tiles for every configured layer
    Fetch {
        /// Only fetch this layer
        #[arg(long)]
        layer: Option<String>,
    },
    /// Label the tiles already on disk
    Label,
    /// Fetch, then label if every tile arrived
    Run,
    /// Print the tile paths a layer would use
    Paths {
        #[arg(long)]
        layer: String,
        /// Date for daily layers
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
    },
}

fn parse_date_arg(s: &str) -> Result<NaiveDate, String> {
    parse_date(s).map_err(|e| e.to_string())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args.log_level, args.json_logs)?;

    let config = load_config(&args)?;

    match &args.command {
        Command::Fetch { layer } => {
            let summary = fetch(&config, layer.as_deref()).await?;
            report_failures(&summary)?;
        }
        Command::Label => {
            label(&config)?;
        }
        Command::Run => {
            let summary = fetch(&config, None).await?;
            report_failures(&summary).context("Not labeling an incomplete tile set")?;
            label(&config)?;
        }
        Command::Paths { layer, date } => {
            print_paths(&config, layer, *date)?;
        }
    }

    Ok(())
}

fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

/// Config file (or defaults), then command-line overrides, then validation.
fn load_config(args: &Args) -> Result<HarvestConfig> {
    let mut config = match &args.config {
        Some(path) => HarvestConfig::load(path)?,
        None => HarvestConfig::default(),
    };

    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(manifest) = &args.manifest {
        config.manifest = manifest.clone();
    }
    if let Some(start) = args.start {
        config.start_date = start;
    }
    if let Some(end) = args.end {
        config.end_date = end;
    }
    if args.retry_forever {
        config.retry.max_retries = None;
    } else if let Some(max) = args.max_retries {
        config.retry.max_retries = Some(max);
    }

    config.validate().context("Invalid harvest configuration")?;
    Ok(config)
}

async fn fetch(config: &HarvestConfig, only: Option<&str>) -> Result<FetchSummary> {
    let layers = match only {
        Some(name) => match config.find_layer(name) {
            Some(layer) => vec![layer],
            None => bail!("Unknown layer: {}", name),
        },
        None => config.layers(),
    };

    info!(
        endpoint = %config.endpoint,
        output_dir = %config.output_dir.display(),
        layers = layers.len(),
        start = %config.start_date,
        end = %config.end_date,
        step = config.grid_step,
        resolution = config.resolution,
        max_retries = ?config.retry.max_retries,
        "Starting tile fetch"
    );

    let source = HttpTileSource::new(&config.endpoint, config.retry.request_timeout())?;
    let fetcher = TileFetcher::new(source, config)?;
    fetcher.fetch_all(&layers).await
}

fn report_failures(summary: &FetchSummary) -> Result<()> {
    if summary.is_complete() {
        return Ok(());
    }
    for failed in &summary.failed {
        error!(
            layer = %failed.layer,
            date = ?failed.date,
            path = %failed.path.display(),
            attempts = failed.attempts,
            error = %failed.error,
            "Tile not downloaded"
        );
    }
    bail!("{} tiles failed to download", summary.failed.len())
}

/// Label the tree into a sibling temporary file, then replace the manifest.
/// A failed run leaves any previous manifest untouched.
fn label(config: &HarvestConfig) -> Result<LabelSummary> {
    let label_config = config.label_config();
    label_config.validate()?;
    let mut memo = TerrainMemo::with_capacity(config.grid()?.len());

    let name = config
        .manifest
        .file_name()
        .with_context(|| format!("Manifest path has no file name: {}", config.manifest.display()))?;
    let tmp = config
        .manifest
        .with_file_name(format!(".{}.part", name.to_string_lossy()));

    let result = write_manifest(&tmp, &label_config, &mut memo)
        .map_err(anyhow::Error::from)
        .and_then(|summary| {
            std::fs::rename(&tmp, &config.manifest).with_context(|| {
                format!("Failed to move manifest into {}", config.manifest.display())
            })?;
            Ok(summary)
        });
    if result.is_err() {
        std::fs::remove_file(&tmp).ok();
    }
    let summary = result?;

    info!(
        manifest = %config.manifest.display(),
        rows = summary.labeled,
        "Manifest written"
    );
    Ok(summary)
}

fn write_manifest(
    path: &Path,
    label_config: &LabelConfig,
    memo: &mut TerrainMemo,
) -> labeling::Result<LabelSummary> {
    let mut manifest = ManifestWriter::create(path)?;
    let summary = label_dataset(label_config, memo, &mut manifest)?;
    manifest.into_inner()?;
    Ok(summary)
}

fn print_paths(config: &HarvestConfig, layer: &str, date: Option<NaiveDate>) -> Result<()> {
    let layer = config
        .find_layer(layer)
        .with_context(|| format!("Unknown layer: {}", layer))?;
    for extent in config.grid()?.extents() {
        let tile = TilePath::new(&config.output_dir, &layer, date, &extent)?;
        println!("{}", tile.path().display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use test_utils::{gray_uniform, layers, TileTree};
    use tile_common::{Layer, TileExtent};

    use super::*;

    fn config(tree: &TileTree) -> HarvestConfig {
        HarvestConfig {
            output_dir: tree.root(),
            manifest: tree.base().join("labeled_data.csv"),
            grid_step: 90,
            resolution: 4,
            ..Default::default()
        }
    }

    #[test]
    fn test_label_replaces_manifest_on_success() {
        let tree = TileTree::new();
        let config = config(&tree);
        let e = TileExtent::new(0, 0, 90);
        let d = test_utils::date("2022-05-01");
        tree.write_tile(&Layer::daily(layers::REFLECTANCE), Some(d), e, gray_uniform(4, 4, 200));
        tree.write_tile(&Layer::daily(layers::CLOUD), Some(d), e, gray_uniform(4, 4, 10));
        tree.write_tile(&Layer::fixed(layers::LAND_WATER), None, e, gray_uniform(4, 4, 128));
        std::fs::write(&config.manifest, "stale").unwrap();

        let summary = label(&config).unwrap();
        assert_eq!(summary.labeled, 1);
        let body = std::fs::read_to_string(&config.manifest).unwrap();
        assert!(body.starts_with("filepath,weather,terrain\n"));
        assert!(body.trim_end().ends_with(",clear,water"));
        assert!(!tree.base().join(".labeled_data.csv.part").exists());
    }

    #[test]
    fn test_failed_label_keeps_previous_manifest() {
        let tree = TileTree::new();
        let config = config(&tree);
        std::fs::write(&config.manifest, "previous run").unwrap();

        // No tiles at all: the reflectance layer directory is missing.
        assert!(label(&config).is_err());
        assert_eq!(std::fs::read_to_string(&config.manifest).unwrap(), "previous run");
        assert!(!tree.base().join(".labeled_data.csv.part").exists());
    }
}
