//! Tiling boxes derived from AOI polygons.

use geo::{BoundingRect, Polygon};
use sat_mosaic_geo_models::{BoundsPolicy, GeoBounds};

/// Axis-aligned bounding rectangle of the polygon's exterior.
///
/// Returns `None` only for a polygon without vertices.
#[must_use]
pub fn bounding_rect(polygon: &Polygon<f64>) -> Option<GeoBounds> {
    polygon.bounding_rect().map(|rect| {
        GeoBounds::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    })
}

/// Smallest square (in degrees) containing `rect`, grown symmetrically
/// about its centre along the shorter axis.
#[must_use]
pub fn bounding_square(rect: GeoBounds) -> GeoBounds {
    let side = rect.width().max(rect.height());
    let centre_lon = f64::midpoint(rect.min_lon, rect.max_lon);
    let centre_lat = f64::midpoint(rect.min_lat, rect.max_lat);
    let half = side / 2.0;
    GeoBounds::new(
        centre_lon - half,
        centre_lat - half,
        centre_lon + half,
        centre_lat + half,
    )
}

/// Tiling box for `polygon` under `policy`.
#[must_use]
pub fn tiling_bounds(polygon: &Polygon<f64>, policy: BoundsPolicy) -> Option<GeoBounds> {
    let rect = bounding_rect(polygon)?;
    Some(match policy {
        BoundsPolicy::Square => bounding_square(rect),
        BoundsPolicy::Rectangle => rect,
    })
}
