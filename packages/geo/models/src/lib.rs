#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Coordinate and tile types shared across the sat-mosaic toolchain.
//!
//! Three coordinate spaces meet in this workspace:
//!
//! - **Geographic** ([`GeoPoint`], [`GeoBounds`]): longitude/latitude in
//!   degrees, in whichever datum the caller is working in.
//! - **Projected pixel** ([`PixelPoint`], [`PixelBox`]): the provider's
//!   Mercator coordinate scaled to a zoom level, so that one tile spans
//!   exactly [`TILE_SIZE`] units. The y axis increases **northward**.
//! - **Tile index** ([`TileCoordinate`], [`TileGrid`]): integer
//!   `(zoom, x, y)` triples, where tile `x` covers projected pixels
//!   `[x * 256, (x + 1) * 256)`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Edge length of one provider tile, in projected pixels.
pub const TILE_SIZE: u32 = 256;

/// A geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Longitude in degrees.
    pub lon: f64,
    /// Latitude in degrees.
    pub lat: f64,
}

impl GeoPoint {
    /// Creates a point from longitude and latitude.
    #[must_use]
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// An axis-aligned geographic box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    /// Western edge.
    pub min_lon: f64,
    /// Southern edge.
    pub min_lat: f64,
    /// Eastern edge.
    pub max_lon: f64,
    /// Northern edge.
    pub max_lat: f64,
}

impl GeoBounds {
    /// Creates bounds from explicit edges. No normalization is applied, so
    /// an inverted box stays inverted and is rejected downstream.
    #[must_use]
    pub const fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// South-west corner.
    #[must_use]
    pub const fn lower_left(&self) -> GeoPoint {
        GeoPoint::new(self.min_lon, self.min_lat)
    }

    /// North-east corner.
    #[must_use]
    pub const fn upper_right(&self) -> GeoPoint {
        GeoPoint::new(self.max_lon, self.max_lat)
    }

    /// East-west extent in degrees.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// North-south extent in degrees.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Returns `true` if the point lies inside or on the edge of the box.
    #[must_use]
    pub fn contains(&self, point: GeoPoint) -> bool {
        point.lon >= self.min_lon
            && point.lon <= self.max_lon
            && point.lat >= self.min_lat
            && point.lat <= self.max_lat
    }
}

impl fmt::Display for GeoBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.6}, {:.6}] - [{:.6}, {:.6}]",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}

/// How an AOI polygon is turned into the box used for tiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundsPolicy {
    /// Smallest square containing the polygon, with the shorter axis
    /// expanded symmetrically about the centre.
    #[default]
    Square,
    /// Plain bounding rectangle.
    Rectangle,
}

impl FromStr for BoundsPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "square" => Ok(Self::Square),
            "rectangle" | "rect" => Ok(Self::Rectangle),
            other => Err(format!(
                "unknown bounds policy '{other}' (expected square or rectangle)"
            )),
        }
    }
}

/// A projected pixel coordinate at a specific zoom level.
///
/// `y` increases northward, matching the provider's tile numbering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelPoint {
    /// Easting in projected pixels.
    pub x: f64,
    /// Northing in projected pixels.
    pub y: f64,
}

impl PixelPoint {
    /// Creates a projected pixel point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned box in projected pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelBox {
    /// South-west corner.
    pub min: PixelPoint,
    /// North-east corner.
    pub max: PixelPoint,
}

impl PixelBox {
    /// Builds a box from two arbitrary corners.
    #[must_use]
    pub const fn from_corners(min: PixelPoint, max: PixelPoint) -> Self {
        Self { min, max }
    }

    /// Returns `true` if `other` lies entirely within this box.
    #[must_use]
    pub fn covers(&self, other: &Self) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && self.max.x >= other.max.x
            && self.max.y >= other.max.y
    }
}

/// The two tile products the provider serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileKind {
    /// Satellite imagery (JPEG).
    #[default]
    Satellite,
    /// Rendered road map (PNG).
    Road,
}

impl TileKind {
    /// Single-letter suffix used in tile filenames.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Satellite => "s",
            Self::Road => "r",
        }
    }

    /// File extension of the stored tile.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Satellite => "jpg",
            Self::Road => "png",
        }
    }

    const fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix.as_bytes() {
            b"s" => Some(Self::Satellite),
            b"r" => Some(Self::Road),
            _ => None,
        }
    }
}

impl fmt::Display for TileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Satellite => f.write_str("satellite"),
            Self::Road => f.write_str("road"),
        }
    }
}

impl FromStr for TileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "satellite" | "sat" | "s" => Ok(Self::Satellite),
            "road" | "r" => Ok(Self::Road),
            other => Err(format!("unknown tile kind '{other}' (expected satellite or road)")),
        }
    }
}

/// One raster tile in the provider's tiling scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoordinate {
    /// Zoom level.
    pub zoom: u8,
    /// Column, increasing eastward.
    pub x: u32,
    /// Row, increasing northward.
    pub y: u32,
}

impl TileCoordinate {
    /// Creates a tile coordinate.
    #[must_use]
    pub const fn new(zoom: u8, x: u32, y: u32) -> Self {
        Self { zoom, x, y }
    }

    /// Filename of this tile on disk: `<zoom>_<x>_<y>_<suffix>.<ext>`.
    #[must_use]
    pub fn file_name(&self, kind: TileKind) -> String {
        format!(
            "{}_{}_{}_{}.{}",
            self.zoom,
            self.x,
            self.y,
            kind.suffix(),
            kind.extension()
        )
    }

    /// Parses a filename produced by [`Self::file_name`].
    ///
    /// Only the final path component is inspected, so full paths are
    /// accepted as well.
    #[must_use]
    pub fn parse_file_name(name: &str) -> Option<(Self, TileKind)> {
        let name = name.rsplit(['/', '\\']).next()?;
        let (stem, ext) = name.rsplit_once('.')?;
        let mut parts = stem.split('_');
        let zoom = parts.next()?.parse::<u8>().ok()?;
        let x = parts.next()?.parse::<u32>().ok()?;
        let y = parts.next()?.parse::<u32>().ok()?;
        let kind = TileKind::from_suffix(parts.next()?)?;
        if parts.next().is_some() || !ext.eq_ignore_ascii_case(kind.extension()) {
            return None;
        }
        Some((Self::new(zoom, x, y), kind))
    }
}

impl fmt::Display for TileCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "z={} x={} y={}", self.zoom, self.x, self.y)
    }
}

/// The rectangular block of tiles covering one planned area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileGrid {
    /// Zoom level of every tile in the grid.
    pub zoom: u8,
    /// Column of the western-most tile.
    pub origin_x: u32,
    /// Row of the southern-most tile.
    pub origin_y: u32,
    /// Number of columns.
    pub cols: u32,
    /// Number of rows.
    pub rows: u32,
}

impl TileGrid {
    /// Number of tiles in the grid.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.cols as usize * self.rows as usize
    }

    /// Returns `true` if the grid has no tiles.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.cols == 0 || self.rows == 0
    }

    /// Every tile in the grid, row by row from the south, west to east.
    pub fn coordinates(&self) -> impl Iterator<Item = TileCoordinate> + '_ {
        (self.origin_y..self.origin_y + self.rows).flat_map(move |y| {
            (self.origin_x..self.origin_x + self.cols)
                .map(move |x| TileCoordinate::new(self.zoom, x, y))
        })
    }

    /// Returns `true` if `coord` belongs to this grid.
    #[must_use]
    pub const fn contains(&self, coord: &TileCoordinate) -> bool {
        coord.zoom == self.zoom
            && coord.x >= self.origin_x
            && coord.x < self.origin_x + self.cols
            && coord.y >= self.origin_y
            && coord.y < self.origin_y + self.rows
    }

    /// Projected pixel extent covered by the grid.
    #[must_use]
    pub fn pixel_extent(&self) -> PixelBox {
        let size = f64::from(TILE_SIZE);
        PixelBox::from_corners(
            PixelPoint::new(
                f64::from(self.origin_x) * size,
                f64::from(self.origin_y) * size,
            ),
            PixelPoint::new(
                f64::from(self.origin_x + self.cols) * size,
                f64::from(self.origin_y + self.rows) * size,
            ),
        )
    }
}

impl fmt::Display for TileGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "z={} x={}..{} y={}..{} ({}x{} tiles)",
            self.zoom,
            self.origin_x,
            self.origin_x + self.cols,
            self.origin_y,
            self.origin_y + self.rows,
            self.cols,
            self.rows
        )
    }
}

/// A planned tile block together with the box it was planned from.
///
/// Cropping works from the same plan, so the planning and cropping boxes
/// cannot drift apart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TilePlan {
    /// Tiles to fetch and stitch.
    pub grid: TileGrid,
    /// Geographic box (provider datum) the grid was planned from.
    pub bounds: GeoBounds,
    /// `bounds` in projected pixels at `grid.zoom`.
    pub pixel_box: PixelBox,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_file_name_matches_layout() {
        let coord = TileCoordinate::new(16, 12_345, 4_321);
        assert_eq!(coord.file_name(TileKind::Satellite), "16_12345_4321_s.jpg");
        assert_eq!(coord.file_name(TileKind::Road), "16_12345_4321_r.png");
    }

    #[test]
    fn parses_tile_file_name_from_path() {
        let parsed = TileCoordinate::parse_file_name("tiles/Some Place/16_12345_4321_s.jpg");
        assert_eq!(
            parsed,
            Some((TileCoordinate::new(16, 12_345, 4_321), TileKind::Satellite))
        );
    }

    #[test]
    fn rejects_foreign_file_names() {
        assert_eq!(TileCoordinate::parse_file_name("16_1_2_s.png"), None);
        assert_eq!(TileCoordinate::parse_file_name("16_1_2_x.jpg"), None);
        assert_eq!(TileCoordinate::parse_file_name("16_1_s.jpg"), None);
        assert_eq!(TileCoordinate::parse_file_name("16_1_2_s_extra.jpg"), None);
        assert_eq!(TileCoordinate::parse_file_name("readme.txt"), None);
    }

    #[test]
    fn grid_iterates_row_major_from_south() {
        let grid = TileGrid {
            zoom: 16,
            origin_x: 10,
            origin_y: 20,
            cols: 2,
            rows: 2,
        };
        let coords: Vec<(u32, u32)> = grid.coordinates().map(|c| (c.x, c.y)).collect();
        assert_eq!(coords, vec![(10, 20), (11, 20), (10, 21), (11, 21)]);
        assert_eq!(grid.len(), 4);
        assert!(grid.contains(&TileCoordinate::new(16, 11, 21)));
        assert!(!grid.contains(&TileCoordinate::new(16, 12, 21)));
        assert!(!grid.contains(&TileCoordinate::new(17, 11, 21)));
    }

    #[test]
    fn grid_pixel_extent_is_tile_aligned() {
        let grid = TileGrid {
            zoom: 16,
            origin_x: 2,
            origin_y: 3,
            cols: 3,
            rows: 1,
        };
        let extent = grid.pixel_extent();
        assert!((extent.min.x - 512.0).abs() < f64::EPSILON);
        assert!((extent.min.y - 768.0).abs() < f64::EPSILON);
        assert!((extent.max.x - 1280.0).abs() < f64::EPSILON);
        assert!((extent.max.y - 1024.0).abs() < f64::EPSILON);
    }

    #[test]
    fn tile_kind_parses_from_cli_strings() {
        assert_eq!("satellite".parse::<TileKind>(), Ok(TileKind::Satellite));
        assert_eq!("Road".parse::<TileKind>(), Ok(TileKind::Road));
        assert!("terrain".parse::<TileKind>().is_err());
    }

    #[test]
    fn bounds_policy_parses_from_cli_strings() {
        assert_eq!("square".parse::<BoundsPolicy>(), Ok(BoundsPolicy::Square));
        assert_eq!("RECT".parse::<BoundsPolicy>(), Ok(BoundsPolicy::Rectangle));
        assert!("circle".parse::<BoundsPolicy>().is_err());
    }
}
