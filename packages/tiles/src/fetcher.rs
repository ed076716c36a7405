//! Concurrent, idempotent tile download.
//!
//! Every tile of a grid is checked against the store first; only missing
//! tiles are requested. Downloads run through a bounded
//! `buffer_unordered` stream, and a failed tile is logged and left as a
//! hole rather than failing the grid.

use std::path::PathBuf;
use std::time::Duration;

use futures::stream::{self, StreamExt as _};
use rand::Rng as _;
use sat_mosaic_geo_models::{TileCoordinate, TileGrid};
use serde::Deserialize;
use tokio::sync::watch;

use crate::TileDownloadError;
use crate::progress::ProgressCallback;
use crate::retry::{RetryPolicy, with_retry};
use crate::source::TileSource;
use crate::store::TileStore;

/// Knobs for one fetch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FetchOptions {
    /// Maximum simultaneous downloads.
    pub concurrency: usize,
    /// Upper bound of the random pause after each successful download.
    pub jitter_ms: u64,
    /// Retry behaviour for failed requests.
    pub retry: RetryPolicy,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            concurrency: 16,
            jitter_ms: 1_000,
            retry: RetryPolicy::default(),
        }
    }
}

/// What happened to every tile of a grid.
#[derive(Debug, Default)]
pub struct FetchReport {
    /// Store path of every grid tile, in grid order, whether or not it
    /// exists.
    pub tile_paths: Vec<PathBuf>,
    /// Tiles fetched during this run.
    pub downloaded: usize,
    /// Tiles already present in the store.
    pub skipped: usize,
    /// Tiles that could not be fetched.
    pub failed: Vec<TileCoordinate>,
    /// Tiles not attempted because cancellation was requested.
    pub cancelled: usize,
}

impl FetchReport {
    /// Returns `true` if every grid tile is now in the store.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.cancelled == 0
    }
}

enum Outcome {
    Present,
    Downloaded,
    Failed(TileDownloadError),
    Cancelled,
}

/// A cancellation receiver that never fires.
#[must_use]
pub fn never_cancelled() -> watch::Receiver<bool> {
    let (_tx, rx) = watch::channel(false);
    rx
}

/// Returns `true` once cancellation has been requested.
#[must_use]
pub fn is_cancelled(cancel: &watch::Receiver<bool>) -> bool {
    *cancel.borrow()
}

fn jitter(max_ms: u64) -> Duration {
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}

/// Downloads every tile of `grid` missing from `store`.
///
/// Once `cancel` reads `true`, tiles that have not started are skipped;
/// in-flight downloads run to completion. Never fails as a whole:
/// per-tile errors are logged and counted in the report.
pub async fn fetch_grid(
    grid: &TileGrid,
    source: &dyn TileSource,
    store: &dyn TileStore,
    options: &FetchOptions,
    cancel: &watch::Receiver<bool>,
    progress: &dyn ProgressCallback,
) -> FetchReport {
    let coords: Vec<TileCoordinate> = grid.coordinates().collect();
    progress.set_total(coords.len() as u64);
    log::info!(
        "Fetching {grid} (concurrency={})",
        options.concurrency.max(1)
    );

    let results: Vec<(TileCoordinate, Outcome)> = stream::iter(coords.iter().copied().map(|coord| async move {
        let outcome = fetch_one(coord, source, store, options, cancel).await;
        progress.inc(1);
        (coord, outcome)
    }))
    .buffer_unordered(options.concurrency.max(1))
    .collect()
    .await;

    let mut report = FetchReport {
        tile_paths: coords.iter().map(|c| store.path(c)).collect(),
        ..FetchReport::default()
    };

    for (coord, outcome) in results {
        match outcome {
            Outcome::Present => report.skipped += 1,
            Outcome::Downloaded => report.downloaded += 1,
            Outcome::Cancelled => report.cancelled += 1,
            Outcome::Failed(e) => {
                log::warn!("Tile {coord} failed: {e}");
                report.failed.push(coord);
            }
        }
    }
    report.failed.sort_unstable();

    let summary = format!(
        "{} downloaded, {} already present, {} failed, {} cancelled",
        report.downloaded,
        report.skipped,
        report.failed.len(),
        report.cancelled
    );
    log::info!("Tiles for {grid}: {summary}");
    progress.finish(summary);

    report
}

async fn fetch_one(
    coord: TileCoordinate,
    source: &dyn TileSource,
    store: &dyn TileStore,
    options: &FetchOptions,
    cancel: &watch::Receiver<bool>,
) -> Outcome {
    if is_cancelled(cancel) {
        return Outcome::Cancelled;
    }
    if store.exists(&coord).await {
        log::trace!("Tile {coord} already present");
        return Outcome::Present;
    }

    let label = coord.to_string();
    let bytes = match with_retry(&options.retry, &label, move || source.fetch(coord)).await {
        Ok(bytes) => bytes,
        Err(e) => return Outcome::Failed(e),
    };
    if let Err(e) = store.write(&coord, &bytes).await {
        return Outcome::Failed(e);
    }
    log::debug!("Downloaded tile {coord} ({} bytes)", bytes.len());

    tokio::time::sleep(jitter(options.jitter_ms)).await;
    Outcome::Downloaded
}
