//! Mosaic -> exact planned box.
//!
//! The plan's projected pixel box is shifted to the grid origin, flipped to
//! image rows, and scaled by the tile size ratio (tiles are nominally 256
//! projected pixels but may be served at a higher resolution). The
//! rectangle is rounded outward so the crop never loses part of the box.

use image::{RgbImage, imageops};
use sat_mosaic_geo_models::{GeoBounds, TILE_SIZE, TilePlan};

use crate::RasterError;
use crate::stitch::Mosaic;

/// A crop of the mosaic together with its geographic extent.
#[derive(Debug, Clone)]
pub struct GeoCrop {
    /// Cropped pixels.
    pub image: RgbImage,
    /// Geographic extent of exactly these pixels.
    pub bounds: GeoBounds,
    /// `(x, y, width, height)` of the crop within the mosaic.
    pub rect: (u32, u32, u32, u32),
}

/// Converts between mosaic image pixels and the provider's projected
/// pixels for one plan.
struct Frame<'a> {
    plan: &'a TilePlan,
    scale_x: f64,
    scale_y: f64,
}

impl<'a> Frame<'a> {
    fn new(mosaic: &Mosaic, plan: &'a TilePlan) -> Self {
        let size = f64::from(TILE_SIZE);
        Self {
            plan,
            scale_x: f64::from(mosaic.tile_width) / size,
            scale_y: f64::from(mosaic.tile_height) / size,
        }
    }

    fn origin(&self) -> (f64, f64) {
        let size = f64::from(TILE_SIZE);
        (
            f64::from(self.plan.grid.origin_x) * size,
            f64::from(self.plan.grid.origin_y) * size,
        )
    }

    fn grid_height(&self) -> f64 {
        f64::from(self.plan.grid.rows) * f64::from(TILE_SIZE)
    }

    /// Image column of a projected x.
    fn column(&self, projected_x: f64) -> f64 {
        (projected_x - self.origin().0) * self.scale_x
    }

    /// Image row of a projected y.
    fn row(&self, projected_y: f64) -> f64 {
        (self.grid_height() - (projected_y - self.origin().1)) * self.scale_y
    }

    fn projected_x(&self, column: f64) -> f64 {
        self.origin().0 + column / self.scale_x
    }

    fn projected_y(&self, row: f64) -> f64 {
        self.origin().1 + self.grid_height() - row / self.scale_y
    }

    fn lon(&self, projected_x: f64) -> f64 {
        let b = &self.plan.bounds;
        let p = &self.plan.pixel_box;
        interpolate(p.min.x, p.max.x, b.min_lon, b.max_lon, projected_x)
    }

    fn lat(&self, projected_y: f64) -> f64 {
        let b = &self.plan.bounds;
        let p = &self.plan.pixel_box;
        interpolate(p.min.y, p.max.y, b.min_lat, b.max_lat, projected_y)
    }
}

fn interpolate(from_lo: f64, from_hi: f64, to_lo: f64, to_hi: f64, value: f64) -> f64 {
    let span = from_hi - from_lo;
    if span.abs() < f64::EPSILON {
        return to_lo;
    }
    to_lo + (value - from_lo) / span * (to_hi - to_lo)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_to_pixels(value: f64, limit: u32) -> u32 {
    value.clamp(0.0, f64::from(limit)) as u32
}

/// Crops `mosaic` to the geographic box `plan` was built from.
///
/// # Errors
///
/// Returns [`RasterError::DegenerateCrop`] if the box does not overlap the
/// mosaic.
pub fn crop_to_plan(mosaic: &Mosaic, plan: &TilePlan) -> Result<GeoCrop, RasterError> {
    let frame = Frame::new(mosaic, plan);
    let (width, height) = mosaic.image.dimensions();
    let pixel_box = &plan.pixel_box;

    let x0 = clamp_to_pixels(frame.column(pixel_box.min.x).floor(), width);
    let x1 = clamp_to_pixels(frame.column(pixel_box.max.x).ceil(), width);
    let y0 = clamp_to_pixels(frame.row(pixel_box.max.y).floor(), height);
    let y1 = clamp_to_pixels(frame.row(pixel_box.min.y).ceil(), height);

    if x1 <= x0 {
        return Err(RasterError::DegenerateCrop {
            reason: format!("columns {x0}..{x1} of {width}"),
        });
    }
    if y1 <= y0 {
        return Err(RasterError::DegenerateCrop {
            reason: format!("rows {y0}..{y1} of {height}"),
        });
    }

    let image = imageops::crop_imm(&mosaic.image, x0, y0, x1 - x0, y1 - y0).to_image();
    let bounds = GeoBounds::new(
        frame.lon(frame.projected_x(f64::from(x0))),
        frame.lat(frame.projected_y(f64::from(y1))),
        frame.lon(frame.projected_x(f64::from(x1))),
        frame.lat(frame.projected_y(f64::from(y0))),
    );
    log::debug!(
        "Cropped {}x{} at ({x0}, {y0}) covering {bounds}",
        x1 - x0,
        y1 - y0
    );

    Ok(GeoCrop {
        image,
        bounds,
        rect: (x0, y0, x1 - x0, y1 - y0),
    })
}
