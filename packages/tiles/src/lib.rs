#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Tile planning and download.
//!
//! [`planner`] turns a geographic box into the block of provider tiles
//! covering it. [`fetcher`] downloads the block concurrently through a
//! [`source::TileSource`] into a [`store::TileStore`]; a tile already in
//! the store is never requested again, so reruns only fill holes.

pub mod fetcher;
pub mod planner;
pub mod progress;
pub mod provider;
pub mod retry;
pub mod source;
pub mod store;

use std::path::PathBuf;

use sat_mosaic_coords::ExternalServiceError;
use thiserror::Error;

/// Errors from tile range planning.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The box maps to no tiles (inverted box, antimeridian crossing, or
    /// negative tile indices).
    #[error("Empty tile range: {reason}")]
    EmptyTileRange {
        /// Which axis or bound was at fault.
        reason: String,
    },

    /// Zoom level outside what the provider serves.
    #[error("Unsupported zoom level {zoom}")]
    InvalidZoom {
        /// Requested zoom.
        zoom: u8,
    },

    /// The projection service failed.
    #[error(transparent)]
    ExternalService(#[from] ExternalServiceError),
}

/// Failure fetching or storing a single tile.
#[derive(Debug, Error)]
pub enum TileDownloadError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status.
    #[error("HTTP {status} for {url}")]
    HttpStatus {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The server answered 2xx with no bytes.
    #[error("Empty response body for {url}")]
    EmptyBody {
        /// Requested URL.
        url: String,
    },

    /// Writing the tile failed.
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        /// File being written.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
}

impl TileDownloadError {
    /// Returns `true` if retrying the same request may succeed.
    ///
    /// Connection problems, timeouts, HTTP 429, HTTP 5xx, and empty bodies
    /// are transient. Other 4xx statuses and local I/O errors are not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => {
                e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
            }
            Self::HttpStatus { status, .. } => *status == 429 || (500..600).contains(status),
            Self::EmptyBody { .. } => true,
            Self::Io { .. } => false,
        }
    }
}
