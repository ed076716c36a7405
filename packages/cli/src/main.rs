#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the sat-mosaic toolchain.
//!
//! Uses `indicatif-log-bridge` (via [`sat_mosaic_cli_utils::init_logger`])
//! so log lines and progress bars never fight for the terminal. Ctrl-C
//! stops new downloads; tiles already on disk are kept and reused on the
//! next run.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use sat_mosaic_aoi::load_aois;
use sat_mosaic_cli_utils::IndicatifProgress;
use sat_mosaic_coords::datum::bd09_to_gcj02;
use sat_mosaic_geo_models::{BoundsPolicy, TileKind};
use sat_mosaic_pipeline::Pipeline;
use sat_mosaic_pipeline::config::{PipelineConfig, Region};
use sat_mosaic_tiles::fetcher::is_cancelled;
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "sat_mosaic", about = "Satellite mosaics for AOI polygons")]
struct Cli {
    /// TOML file overlaid on the built-in defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory for tiles and output images (overrides `output_root`)
    #[arg(long, global = true)]
    output_root: Option<PathBuf>,
    /// Zoom level (overrides `zoom`)
    #[arg(long, global = true)]
    zoom: Option<u8>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, stitch, crop, and mask every AOI in a CSV table
    Run {
        /// CSV with `aoi_address`, `centroid`, and `wkt` columns
        aois: PathBuf,
        /// Tile layer: satellite or road
        #[arg(long)]
        kind: Option<TileKind>,
        /// Maximum concurrent tile downloads
        #[arg(long)]
        concurrency: Option<usize>,
        /// Tiling box: square or rectangle
        #[arg(long)]
        bounds_policy: Option<BoundsPolicy>,
    },
    /// Print the tile grid each AOI would need, without downloading
    Plan {
        /// CSV with `aoi_address`, `centroid`, and `wkt` columns
        aois: PathBuf,
        /// Tiling box: square or rectangle
        #[arg(long)]
        bounds_policy: Option<BoundsPolicy>,
    },
    /// Download tiles for the named regions in the config, without stitching
    FetchRegions {
        /// Comma-separated region names (e.g., "beijing,shanghai").
        /// If not specified, fetches every configured region.
        #[arg(long)]
        only: Option<String>,
        /// Tile layer: satellite or road
        #[arg(long)]
        kind: Option<TileKind>,
        /// Maximum concurrent tile downloads
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Print the geographic corners of one tile in BD-09 and GCJ-02
    TileBounds {
        /// Tile column
        x: u32,
        /// Tile row
        y: u32,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = sat_mosaic_cli_utils::init_logger();
    let cli = Cli::parse();

    let mut config = PipelineConfig::load(cli.config.as_deref())?;
    if let Some(root) = cli.output_root {
        config.output_root = root;
    }
    if let Some(zoom) = cli.zoom {
        config.zoom = zoom;
    }

    match cli.command {
        Commands::Run {
            aois,
            kind,
            concurrency,
            bounds_policy,
        } => {
            apply_fetch_overrides(&mut config, kind, concurrency);
            if let Some(policy) = bounds_policy {
                config.bounds_policy = policy;
            }
            config.validate()?;

            let start = Instant::now();
            let aois = load_aois(&aois, config.bounds_policy)?;
            let pipeline = Pipeline::from_config(&config)?;
            let cancel = cancel_on_ctrl_c();

            let aoi_bar = IndicatifProgress::steps_bar(&multi, "AOIs");
            let tile_bar = IndicatifProgress::tiles_bar(&multi, "tiles");
            let summary = pipeline
                .run_batch(aois, &cancel, aoi_bar.as_ref(), tile_bar.as_ref())
                .await;

            log::info!(
                "Batch finished in {:.1}s, outputs under {}",
                start.elapsed().as_secs_f64(),
                pipeline.layout().root().display()
            );
            println!("{summary}");
        }
        Commands::Plan {
            aois,
            bounds_policy,
        } => {
            if let Some(policy) = bounds_policy {
                config.bounds_policy = policy;
            }
            config.validate()?;

            let aois = load_aois(&aois, config.bounds_policy)?;
            let pipeline = Pipeline::from_config(&config)?;
            let mut total_tiles = 0;

            for entry in aois {
                match entry {
                    Err(e) => println!("  skip  {e}"),
                    Ok(aoi) => match pipeline.plan_aoi(&aoi).await {
                        Ok(plan) => {
                            total_tiles += plan.grid.len();
                            println!("  {}  {}  {}", aoi.output_key, plan.grid, plan.bounds);
                        }
                        Err(e) => println!("  fail  {}: {e}", aoi.address),
                    },
                }
            }
            println!("{total_tiles} tile(s) at zoom {}", config.zoom);
        }
        Commands::FetchRegions {
            only,
            kind,
            concurrency,
        } => {
            apply_fetch_overrides(&mut config, kind, concurrency);
            config.validate()?;

            let regions = select_regions(&config, only.as_deref())?;
            let pipeline = Pipeline::from_config(&config)?;
            let cancel = cancel_on_ctrl_c();

            let region_bar = IndicatifProgress::steps_bar(&multi, "regions");
            let tile_bar = IndicatifProgress::tiles_bar(&multi, "tiles");
            region_bar.set_total(regions.len() as u64);

            let mut incomplete = Vec::new();
            for region in regions {
                if is_cancelled(&cancel) {
                    break;
                }
                region_bar.set_message(region.name.clone());
                match pipeline
                    .fetch_area(&region.name, region.bounds(), &cancel, tile_bar.as_ref())
                    .await
                {
                    Ok((_, report)) if report.is_complete() => {}
                    Ok((_, report)) => {
                        log::warn!(
                            "Region '{}': {} tile(s) missing",
                            region.name,
                            report.failed.len() + report.cancelled
                        );
                        incomplete.push(region.name.clone());
                    }
                    Err(e) => {
                        log::error!("Region '{}' failed: {e}", region.name);
                        incomplete.push(region.name.clone());
                    }
                }
                region_bar.inc(1);
            }
            region_bar.finish("regions done".to_string());

            if incomplete.is_empty() {
                println!("All regions complete");
            } else {
                println!("Incomplete regions: {}", incomplete.join(", "));
            }
        }
        Commands::TileBounds { x, y } => {
            config.validate()?;
            let pipeline = Pipeline::from_config(&config)?;
            let bounds = pipeline.tile_bounds(x, y).await?;
            let (gcj_ll, gcj_ur) = (
                bd09_to_gcj02(bounds.lower_left()),
                bd09_to_gcj02(bounds.upper_right()),
            );
            println!(
                "tile {x},{y} @ z{}: lower-left {:.6},{:.6} upper-right {:.6},{:.6} (BD-09)",
                config.zoom, bounds.min_lon, bounds.min_lat, bounds.max_lon, bounds.max_lat
            );
            println!(
                "  lower-left {:.6},{:.6} upper-right {:.6},{:.6} (GCJ-02)",
                gcj_ll.lon, gcj_ll.lat, gcj_ur.lon, gcj_ur.lat
            );
        }
    }

    Ok(())
}

fn apply_fetch_overrides(
    config: &mut PipelineConfig,
    kind: Option<TileKind>,
    concurrency: Option<usize>,
) {
    if let Some(kind) = kind {
        config.kind = kind;
    }
    if let Some(concurrency) = concurrency {
        config.fetch.concurrency = concurrency;
    }
}

/// Resolves `--only` against the configured regions.
fn select_regions<'a>(
    config: &'a PipelineConfig,
    only: Option<&str>,
) -> Result<Vec<&'a Region>, String> {
    let Some(only) = only else {
        return Ok(config.regions.iter().collect());
    };
    only.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            config
                .region(name)
                .ok_or_else(|| format!("Unknown region '{name}'"))
        })
        .collect()
}

/// Flips to `true` on the first Ctrl-C.
fn cancel_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, stopping after in-flight tiles");
            let _ = tx.send(true);
        }
    });
    rx
}
