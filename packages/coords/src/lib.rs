#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Coordinate handling for Baidu map tiles.
//!
//! Three coordinate systems are involved:
//!
//! - **GCJ-02**, the national survey datum the AOI polygons are recorded in.
//! - **BD-09 lat/lon**, Baidu's offset datum. [`datum::gcj02_to_bd09`]
//!   converts into it locally with a fixed empirical formula.
//! - **BD-09 Mercator**, Baidu's projected plane. Only the remote
//!   `geoconv` service knows this projection, so conversions go through
//!   the [`CoordinateService`] trait ([`baidu::BaiduGeoconv`] in
//!   production).
//!
//! [`projection`] layers zoom scaling and tile indexing on top of the
//! service.

pub mod baidu;
pub mod datum;
pub mod projection;

use async_trait::async_trait;
use sat_mosaic_geo_models::GeoPoint;
use thiserror::Error;

/// Failure talking to the coordinate-conversion service.
#[derive(Debug, Error)]
pub enum ExternalServiceError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status.
    #[error("HTTP {status} from coordinate service")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
    },

    /// The service answered but reported an error in its payload.
    #[error("Coordinate service returned status {status}: {message}")]
    Service {
        /// Provider status code.
        status: i64,
        /// Provider message, if any.
        message: String,
    },

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },
}

/// A point in the provider's projected plane at base (zoom 18) resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MercatorPoint {
    /// Easting.
    pub x: f64,
    /// Northing.
    pub y: f64,
}

/// Converts between provider lat/lon and the provider's projected plane.
///
/// Implementations are expected to be authoritative: callers never
/// second-guess the numbers they return.
#[async_trait]
pub trait CoordinateService: Send + Sync {
    /// Projects a BD-09 lat/lon point to base-resolution Mercator.
    ///
    /// # Errors
    ///
    /// Returns [`ExternalServiceError`] if the conversion fails.
    async fn project(&self, point: GeoPoint) -> Result<MercatorPoint, ExternalServiceError>;

    /// Inverse of [`Self::project`].
    ///
    /// # Errors
    ///
    /// Returns [`ExternalServiceError`] if the conversion fails.
    async fn unproject(&self, point: MercatorPoint) -> Result<GeoPoint, ExternalServiceError>;
}
