#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! AOI mosaic pipeline.
//!
//! For each AOI: plan the tile block, fetch missing tiles concurrently,
//! then (on a blocking thread) stitch, crop to the planned box, and mask
//! to the polygon. AOIs run one after another; a failing AOI is recorded
//! in the [`BatchSummary`] and the batch moves on.

pub mod config;
pub mod paths;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use sat_mosaic_aoi::{Aoi, RecordError};
use sat_mosaic_coords::baidu::BaiduGeoconv;
use sat_mosaic_coords::{CoordinateService, ExternalServiceError};
use sat_mosaic_geo_models::{GeoBounds, GeoPoint, TileKind, TilePlan};
use sat_mosaic_raster::RasterError;
use sat_mosaic_raster::crop::crop_to_plan;
use sat_mosaic_raster::mask::mask_polygon;
use sat_mosaic_raster::output::save_jpeg;
use sat_mosaic_raster::stitch::stitch;
use sat_mosaic_tiles::fetcher::{FetchOptions, FetchReport, fetch_grid, is_cancelled};
use sat_mosaic_tiles::progress::ProgressCallback;
use sat_mosaic_tiles::source::{HttpTileSource, TileSource};
use sat_mosaic_tiles::store::FsTileStore;
use sat_mosaic_tiles::{PlanError, TileDownloadError, planner};
use thiserror::Error;
use tokio::sync::watch;

use crate::config::{ConfigError, PipelineConfig};
use crate::paths::OutputLayout;

/// Errors constructing a [`Pipeline`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Bad configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The coordinate service client could not be built.
    #[error(transparent)]
    ExternalService(#[from] ExternalServiceError),

    /// The tile client could not be built.
    #[error(transparent)]
    TileSource(#[from] TileDownloadError),
}

/// Why one AOI produced no output.
#[derive(Debug, Error)]
pub enum AoiError {
    /// The AOI row itself was unusable.
    #[error(transparent)]
    Record(#[from] RecordError),

    /// Planning failed (empty range or coordinate service failure).
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// Stitching, cropping, masking, or saving failed.
    #[error(transparent)]
    Raster(#[from] RasterError),

    /// Cancellation arrived before every tile was fetched.
    #[error("Cancelled before all tiles were fetched")]
    Cancelled,

    /// The blocking raster task panicked or was aborted.
    #[error("Raster task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Artefacts written for one AOI.
#[derive(Debug)]
pub struct AoiOutput {
    /// Plan the AOI was processed with.
    pub plan: TilePlan,
    /// Tile download outcome.
    pub fetch: FetchReport,
    /// Full stitched mosaic.
    pub stitched: PathBuf,
    /// Mosaic cropped to the planned box.
    pub cropped: PathBuf,
    /// Final masked image.
    pub masked: PathBuf,
    /// Geographic extent of the masked image.
    pub masked_bounds: GeoBounds,
}

/// Outcome of a whole batch.
#[derive(Debug, Default)]
pub struct BatchSummary {
    /// Addresses processed successfully.
    pub succeeded: Vec<String>,
    /// `(label, error)` for every AOI that failed.
    pub failed: Vec<(String, String)>,
    /// The batch stopped early on request.
    pub cancelled: bool,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed",
            self.succeeded.len(),
            self.failed.len()
        )?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        for (label, error) in &self.failed {
            write!(f, "\n  - {label}: {error}")?;
        }
        Ok(())
    }
}

/// Destinations for one AOI's raster outputs.
struct RenderPaths {
    stitched: PathBuf,
    cropped: PathBuf,
    masked: PathBuf,
}

/// Runs the plan/fetch/stitch/crop/mask sequence.
pub struct Pipeline {
    zoom: u8,
    kind: TileKind,
    fetch: FetchOptions,
    layout: OutputLayout,
    service: Arc<dyn CoordinateService>,
    source: Arc<dyn TileSource>,
}

impl Pipeline {
    /// Pipeline using explicit service and source implementations.
    #[must_use]
    pub fn new(
        config: &PipelineConfig,
        service: Arc<dyn CoordinateService>,
        source: Arc<dyn TileSource>,
    ) -> Self {
        Self {
            zoom: config.zoom,
            kind: config.kind,
            fetch: config.fetch,
            layout: OutputLayout::new(&config.output_root),
            service,
            source,
        }
    }

    /// Pipeline talking to the live coordinate and tile services.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if a template is invalid or an HTTP
    /// client cannot be built.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let service = BaiduGeoconv::new(&config.geoconv)?;
        let template = config
            .templates
            .for_kind(config.kind)
            .map_err(ConfigError::from)?;
        let source = HttpTileSource::new(template, config.request_timeout())?;
        Ok(Self::new(config, Arc::new(service), Arc::new(source)))
    }

    /// Output layout in use.
    #[must_use]
    pub const fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Plans the tile block for an AOI.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError`] if the range is empty or projection fails.
    pub async fn plan_aoi(&self, aoi: &Aoi) -> Result<TilePlan, PlanError> {
        planner::plan(self.service.as_ref(), aoi.bounds, self.zoom).await
    }

    /// Geographic extent of one tile at the configured zoom.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError`] if the inverse projection fails.
    pub async fn tile_bounds(&self, tile_x: u32, tile_y: u32) -> Result<GeoBounds, PlanError> {
        planner::tile_bounds(self.service.as_ref(), self.zoom, tile_x, tile_y).await
    }

    /// Plans `bounds` and downloads its missing tiles into the `area` tile
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError`] if planning fails. Individual tile failures
    /// are reported in the [`FetchReport`] instead.
    pub async fn fetch_area(
        &self,
        area: &str,
        bounds: GeoBounds,
        cancel: &watch::Receiver<bool>,
        progress: &dyn ProgressCallback,
    ) -> Result<(TilePlan, FetchReport), PlanError> {
        let plan = planner::plan(self.service.as_ref(), bounds, self.zoom).await?;
        log::info!("'{area}': {} for {bounds}", plan.grid);

        let store = FsTileStore::new(self.layout.tiles_dir(area), self.kind);
        progress.set_message(area.to_string());
        let report = fetch_grid(
            &plan.grid,
            self.source.as_ref(),
            &store,
            &self.fetch,
            cancel,
            progress,
        )
        .await;

        Ok((plan, report))
    }

    /// Processes one AOI end to end.
    ///
    /// # Errors
    ///
    /// Returns [`AoiError`] if planning, rendering, or saving fails, or if
    /// cancellation interrupted the download.
    pub async fn process_aoi(
        &self,
        aoi: &Aoi,
        cancel: &watch::Receiver<bool>,
        progress: &dyn ProgressCallback,
    ) -> Result<AoiOutput, AoiError> {
        let (plan, fetch) = self
            .fetch_area(&aoi.output_key, aoi.bounds, cancel, progress)
            .await?;
        if fetch.cancelled > 0 {
            return Err(AoiError::Cancelled);
        }

        let paths = RenderPaths {
            stitched: self.layout.stitched(&aoi.output_key),
            cropped: self.layout.cropped(&aoi.output_key),
            masked: self.layout.masked(&aoi.output_key),
        };
        let tile_paths = fetch.tile_paths.clone();
        let vertices = aoi.vertices();

        let (paths, masked_bounds) = tokio::task::spawn_blocking(move || {
            render(&plan, &tile_paths, &vertices, &paths).map(|bounds| (paths, bounds))
        })
        .await??;

        Ok(AoiOutput {
            plan,
            fetch,
            stitched: paths.stitched,
            cropped: paths.cropped,
            masked: paths.masked,
            masked_bounds,
        })
    }

    /// Processes every loaded AOI in order.
    ///
    /// Rows that failed to load are counted as failures. Stops early once
    /// `cancel` reads `true`.
    pub async fn run_batch(
        &self,
        aois: Vec<Result<Aoi, RecordError>>,
        cancel: &watch::Receiver<bool>,
        aoi_progress: &dyn ProgressCallback,
        tile_progress: &dyn ProgressCallback,
    ) -> BatchSummary {
        let mut summary = BatchSummary::default();
        aoi_progress.set_total(aois.len() as u64);

        for entry in aois {
            if is_cancelled(cancel) {
                summary.cancelled = true;
                break;
            }

            match entry {
                Err(e) => {
                    summary
                        .failed
                        .push((format!("record {}", e.record()), e.to_string()));
                }
                Ok(aoi) => {
                    aoi_progress.set_message(aoi.address.clone());
                    match self.process_aoi(&aoi, cancel, tile_progress).await {
                        Ok(output) => {
                            log::info!(
                                "AOI '{}' done: {}",
                                aoi.address,
                                output.masked.display()
                            );
                            summary.succeeded.push(aoi.address);
                        }
                        Err(AoiError::Cancelled) => {
                            log::warn!("AOI '{}' interrupted", aoi.address);
                            summary
                                .failed
                                .push((aoi.address, AoiError::Cancelled.to_string()));
                            summary.cancelled = true;
                            break;
                        }
                        Err(e) => {
                            log::error!("AOI '{}' failed: {e}", aoi.address);
                            summary.failed.push((aoi.address, e.to_string()));
                        }
                    }
                }
            }
            aoi_progress.inc(1);
        }

        aoi_progress.finish(summary.to_string().lines().next().unwrap_or("").to_string());
        summary
    }
}

/// Stitches, crops, masks, and saves. Returns the masked image's extent.
fn render(
    plan: &TilePlan,
    tile_paths: &[PathBuf],
    vertices: &[GeoPoint],
    paths: &RenderPaths,
) -> Result<GeoBounds, RasterError> {
    let mosaic = stitch(&plan.grid, tile_paths)?;
    save_jpeg(&mosaic.image, &paths.stitched)?;

    let crop = crop_to_plan(&mosaic, plan)?;
    save_jpeg(&crop.image, &paths.cropped)?;

    let outside = vertices.iter().filter(|v| !crop.bounds.contains(**v)).count();
    if outside > 0 {
        log::warn!(
            "{outside} polygon vertices lie outside the cropped extent {}",
            crop.bounds
        );
    }

    let masked = mask_polygon(&crop.image, &crop.bounds, vertices)?;
    save_jpeg(&masked.image, &paths.masked)?;

    Ok(masked.bounds)
}
