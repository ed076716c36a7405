//! Geographic box + zoom -> block of tiles.
//!
//! The range is computed from the box's projected corners, floor-divided
//! by the tile size, with the upper index bumped by one on both axes. The
//! bump means a box ending exactly on a tile boundary pulls in one extra
//! row/column.

use std::fmt::Write as _;

use sat_mosaic_coords::CoordinateService;
use sat_mosaic_coords::projection::{
    from_tile_index_to_lat_lon, is_valid_zoom, to_provider_xy, to_tile_index,
};
use sat_mosaic_geo_models::{GeoBounds, PixelBox, TileGrid};

pub use sat_mosaic_geo_models::TilePlan;

use crate::PlanError;

/// Plans the tile block covering `bounds` at `zoom`.
///
/// # Errors
///
/// Returns [`PlanError::EmptyTileRange`] if the box or its projection is
/// inverted, the range is empty on either axis, or it starts at a negative
/// index, [`PlanError::InvalidZoom`] for an
/// unsupported zoom, and [`PlanError::ExternalService`] if projecting a
/// corner fails.
pub async fn plan(
    service: &dyn CoordinateService,
    bounds: GeoBounds,
    zoom: u8,
) -> Result<TilePlan, PlanError> {
    if !is_valid_zoom(zoom) {
        return Err(PlanError::InvalidZoom { zoom });
    }

    if bounds.min_lon > bounds.max_lon || bounds.min_lat > bounds.max_lat {
        return Err(PlanError::EmptyTileRange {
            reason: format!("inverted box {bounds}"),
        });
    }

    let lower = to_provider_xy(service, zoom, bounds.lower_left()).await?;
    let upper = to_provider_xy(service, zoom, bounds.upper_right()).await?;
    if lower.x > upper.x || lower.y > upper.y {
        return Err(PlanError::EmptyTileRange {
            reason: format!(
                "projected corners ({:.1}, {:.1}) and ({:.1}, {:.1}) are inverted",
                lower.x, lower.y, upper.x, upper.y
            ),
        });
    }

    let (start_x, start_y) = to_tile_index(lower);
    let (stop_x, stop_y) = to_tile_index(upper);
    let (stop_x, stop_y) = (stop_x + 1, stop_y + 1);

    let mut reason = String::new();
    if start_x >= stop_x {
        let _ = write!(reason, "x range {start_x}..{stop_x} is empty");
    }
    if start_y >= stop_y {
        if !reason.is_empty() {
            reason.push_str("; ");
        }
        let _ = write!(reason, "y range {start_y}..{stop_y} is empty");
    }
    if !reason.is_empty() {
        return Err(PlanError::EmptyTileRange { reason });
    }

    let (Ok(origin_x), Ok(origin_y), Ok(cols), Ok(rows)) = (
        u32::try_from(start_x),
        u32::try_from(start_y),
        u32::try_from(stop_x - start_x),
        u32::try_from(stop_y - start_y),
    ) else {
        return Err(PlanError::EmptyTileRange {
            reason: format!(
                "tile range x {start_x}..{stop_x}, y {start_y}..{stop_y} is outside the tile scheme"
            ),
        });
    };

    let grid = TileGrid {
        zoom,
        origin_x,
        origin_y,
        cols,
        rows,
    };
    log::debug!("Planned {grid} for {bounds}");

    Ok(TilePlan {
        grid,
        bounds,
        pixel_box: PixelBox::from_corners(lower, upper),
    })
}

/// Geographic extent of a single tile, from its south-west corner to the
/// south-west corner of its north-east neighbour.
///
/// # Errors
///
/// Returns [`PlanError::ExternalService`] if the inverse projection fails.
pub async fn tile_bounds(
    service: &dyn CoordinateService,
    zoom: u8,
    tile_x: u32,
    tile_y: u32,
) -> Result<GeoBounds, PlanError> {
    if !is_valid_zoom(zoom) {
        return Err(PlanError::InvalidZoom { zoom });
    }
    let (x, y) = (i64::from(tile_x), i64::from(tile_y));
    let lower_left = from_tile_index_to_lat_lon(service, zoom, x, y).await?;
    let upper_right = from_tile_index_to_lat_lon(service, zoom, x + 1, y + 1).await?;
    Ok(GeoBounds::new(
        lower_left.lon,
        lower_left.lat,
        upper_right.lon,
        upper_right.lat,
    ))
}

#[cfg(test)]
pub(crate) mod tests {
    use async_trait::async_trait;
    use sat_mosaic_coords::{ExternalServiceError, MercatorPoint};
    use sat_mosaic_geo_models::GeoPoint;

    use super::*;

    /// Linear stand-in for the remote projection: one degree is 111 000
    /// base-resolution units on both axes.
    pub struct LinearService;

    pub const UNITS_PER_DEGREE: f64 = 111_000.0;

    #[async_trait]
    impl CoordinateService for LinearService {
        async fn project(&self, point: GeoPoint) -> Result<MercatorPoint, ExternalServiceError> {
            Ok(MercatorPoint {
                x: point.lon * UNITS_PER_DEGREE,
                y: point.lat * UNITS_PER_DEGREE,
            })
        }

        async fn unproject(&self, point: MercatorPoint) -> Result<GeoPoint, ExternalServiceError> {
            Ok(GeoPoint::new(
                point.x / UNITS_PER_DEGREE,
                point.y / UNITS_PER_DEGREE,
            ))
        }
    }

    /// Projects with the x axis running westward.
    struct MirroredService;

    #[async_trait]
    impl CoordinateService for MirroredService {
        async fn project(&self, point: GeoPoint) -> Result<MercatorPoint, ExternalServiceError> {
            Ok(MercatorPoint {
                x: 1_000_000.0 - point.lon * UNITS_PER_DEGREE,
                y: point.lat * UNITS_PER_DEGREE,
            })
        }

        async fn unproject(&self, point: MercatorPoint) -> Result<GeoPoint, ExternalServiceError> {
            Ok(GeoPoint::new(
                (1_000_000.0 - point.x) / UNITS_PER_DEGREE,
                point.y / UNITS_PER_DEGREE,
            ))
        }
    }

    struct FailingService;

    #[async_trait]
    impl CoordinateService for FailingService {
        async fn project(&self, _point: GeoPoint) -> Result<MercatorPoint, ExternalServiceError> {
            Err(ExternalServiceError::HttpStatus { status: 503 })
        }

        async fn unproject(&self, _point: MercatorPoint) -> Result<GeoPoint, ExternalServiceError> {
            Err(ExternalServiceError::HttpStatus { status: 503 })
        }
    }

    /// Geographic box whose zoom-18 projected pixels are exactly the given
    /// pixel rectangle.
    pub fn pixel_bounds(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> GeoBounds {
        GeoBounds::new(
            min_x / UNITS_PER_DEGREE,
            min_y / UNITS_PER_DEGREE,
            max_x / UNITS_PER_DEGREE,
            max_y / UNITS_PER_DEGREE,
        )
    }

    #[tokio::test]
    async fn box_inside_one_tile_plans_single_tile() {
        let bounds = pixel_bounds(25_610.0, 51_210.0, 25_700.0, 51_300.0);
        let plan = plan(&LinearService, bounds, 18).await.unwrap();
        assert_eq!((plan.grid.origin_x, plan.grid.origin_y), (100, 200));
        assert_eq!((plan.grid.cols, plan.grid.rows), (1, 1));
    }

    #[tokio::test]
    async fn box_across_tile_boundary_plans_two_by_two() {
        let bounds = pixel_bounds(25_700.0, 51_300.0, 25_900.0, 51_500.0);
        let plan = plan(&LinearService, bounds, 18).await.unwrap();
        assert_eq!((plan.grid.origin_x, plan.grid.origin_y), (100, 200));
        assert_eq!((plan.grid.cols, plan.grid.rows), (2, 2));
    }

    #[tokio::test]
    async fn grid_extent_covers_projected_box() {
        let boxes = [
            GeoBounds::new(116.30, 39.90, 116.31, 39.91),
            GeoBounds::new(121.4701, 31.2301, 121.4702, 31.2302),
            GeoBounds::new(113.0, 22.0, 114.5, 23.7),
            GeoBounds::new(0.001, 0.001, 0.002, 0.5),
        ];
        for bounds in boxes {
            for zoom in [3_u8, 10, 15, 16, 18, 19] {
                let plan = plan(&LinearService, bounds, zoom).await.unwrap();
                assert!(
                    plan.grid.pixel_extent().covers(&plan.pixel_box),
                    "zoom {zoom}: {} does not cover {:?}",
                    plan.grid,
                    plan.pixel_box
                );
                assert!(!plan.grid.is_empty());
            }
        }
    }

    #[tokio::test]
    async fn antimeridian_box_is_empty_range() {
        let bounds = GeoBounds::new(179.9, 10.0, -179.9, 10.1);
        let err = plan(&LinearService, bounds, 16).await.unwrap_err();
        match err {
            PlanError::EmptyTileRange { reason } => assert!(reason.contains("inverted"), "{reason}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn inverted_box_inside_one_tile_is_rejected() {
        let bounds = pixel_bounds(25_700.0, 51_300.0, 25_650.0, 51_250.0);
        assert!(matches!(
            plan(&LinearService, bounds, 18).await,
            Err(PlanError::EmptyTileRange { .. })
        ));
    }

    #[tokio::test]
    async fn inverted_projection_is_rejected() {
        let bounds = pixel_bounds(25_650.0, 51_250.0, 25_700.0, 51_300.0);
        let err = plan(&MirroredService, bounds, 18).await.unwrap_err();
        match err {
            PlanError::EmptyTileRange { reason } => assert!(reason.contains("projected"), "{reason}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn negative_indices_are_rejected() {
        let bounds = GeoBounds::new(-1.0, 10.0, -0.5, 10.1);
        assert!(matches!(
            plan(&LinearService, bounds, 16).await,
            Err(PlanError::EmptyTileRange { .. })
        ));
    }

    #[tokio::test]
    async fn rejects_unsupported_zoom() {
        let bounds = GeoBounds::new(116.30, 39.90, 116.31, 39.91);
        assert!(matches!(
            plan(&LinearService, bounds, 25).await,
            Err(PlanError::InvalidZoom { zoom: 25 })
        ));
    }

    #[tokio::test]
    async fn service_failure_is_external_error() {
        let bounds = GeoBounds::new(116.30, 39.90, 116.31, 39.91);
        assert!(matches!(
            plan(&FailingService, bounds, 16).await,
            Err(PlanError::ExternalService(_))
        ));
    }

    #[tokio::test]
    async fn tile_bounds_span_one_tile() {
        let bounds = tile_bounds(&LinearService, 18, 100, 200).await.unwrap();
        assert!((bounds.min_lon * UNITS_PER_DEGREE - 25_600.0).abs() < 1e-6);
        assert!((bounds.max_lat * UNITS_PER_DEGREE - 51_456.0).abs() < 1e-6);
    }
}
