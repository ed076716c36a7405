//! Zoom scaling and tile indexing on top of a [`CoordinateService`].
//!
//! The provider's Mercator plane is defined at zoom 18; at zoom `z` one
//! projected pixel spans `2^(18 - z)` Mercator units, and tile `(x, y)`
//! covers pixels `[x * 256, (x + 1) * 256)` on each axis.

use sat_mosaic_geo_models::{GeoPoint, PixelPoint, TILE_SIZE};

use crate::{CoordinateService, ExternalServiceError, MercatorPoint};

/// Zoom level at which one Mercator unit equals one pixel.
pub const BASE_ZOOM: u8 = 18;

/// Lowest zoom level the provider serves.
pub const MIN_ZOOM: u8 = 3;

/// Highest zoom level the provider serves.
pub const MAX_ZOOM: u8 = 19;

/// Mercator units per projected pixel at `zoom`.
#[must_use]
pub fn resolution(zoom: u8) -> f64 {
    2f64.powi(i32::from(BASE_ZOOM) - i32::from(zoom))
}

/// Returns `true` if the provider serves tiles at `zoom`.
#[must_use]
pub const fn is_valid_zoom(zoom: u8) -> bool {
    zoom >= MIN_ZOOM && zoom <= MAX_ZOOM
}

/// Scales a base-resolution Mercator point to pixels at `zoom`.
#[must_use]
pub fn mercator_to_pixel(point: MercatorPoint, zoom: u8) -> PixelPoint {
    let res = resolution(zoom);
    PixelPoint::new(point.x / res, point.y / res)
}

/// Inverse of [`mercator_to_pixel`].
#[must_use]
pub fn pixel_to_mercator(point: PixelPoint, zoom: u8) -> MercatorPoint {
    let res = resolution(zoom);
    MercatorPoint {
        x: point.x * res,
        y: point.y * res,
    }
}

/// Converts a BD-09 lat/lon point to projected pixels at `zoom`.
///
/// # Errors
///
/// Returns [`ExternalServiceError`] if the service call fails. No retry is
/// attempted here.
pub async fn to_provider_xy(
    service: &dyn CoordinateService,
    zoom: u8,
    point: GeoPoint,
) -> Result<PixelPoint, ExternalServiceError> {
    let mercator = service.project(point).await?;
    Ok(mercator_to_pixel(mercator, zoom))
}

/// Tile index containing a projected pixel (floor division by 256).
///
/// Indices are signed: points west of or south of the projection origin
/// produce negative tiles, which the planner rejects.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn to_tile_index(point: PixelPoint) -> (i64, i64) {
    let size = f64::from(TILE_SIZE);
    (
        (point.x / size).floor() as i64,
        (point.y / size).floor() as i64,
    )
}

/// Projected pixel coordinate of a tile's south-west corner.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn tile_origin_pixels(tile_x: i64, tile_y: i64) -> PixelPoint {
    let size = f64::from(TILE_SIZE);
    PixelPoint::new(tile_x as f64 * size, tile_y as f64 * size)
}

/// Geographic coordinate of a tile's south-west corner.
///
/// Used to re-derive geographic bounds from tile indices (e.g. the
/// north-east corner of tile `(x, y)` is the south-west corner of
/// `(x + 1, y + 1)`).
///
/// # Errors
///
/// Returns [`ExternalServiceError`] if the service call fails.
pub async fn from_tile_index_to_lat_lon(
    service: &dyn CoordinateService,
    zoom: u8,
    tile_x: i64,
    tile_y: i64,
) -> Result<GeoPoint, ExternalServiceError> {
    let mercator = pixel_to_mercator(tile_origin_pixels(tile_x, tile_y), zoom);
    service.unproject(mercator).await
}
