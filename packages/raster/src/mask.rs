//! Polygon masking.
//!
//! Vertices are mapped linearly from the image's geographic bounds to
//! pixel space (north at row 0), filled with `tiny-skia` under the
//! even-odd rule, and everything outside is painted black. The result is
//! then cropped to the polygon's pixel bounding box.

use image::{GrayImage, Rgb, RgbImage, imageops};
use sat_mosaic_geo_models::{GeoBounds, GeoPoint};
use tiny_skia::{FillRule, Paint, Path, PathBuilder, Pixmap, Transform};

use crate::RasterError;

const BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);

/// The final masked raster.
#[derive(Debug, Clone)]
pub struct MaskedOutput {
    /// Pixels, black outside the polygon.
    pub image: RgbImage,
    /// Geographic extent of `image`.
    pub bounds: GeoBounds,
}

/// Maps geographic vertices into the pixel space of a `width` x `height`
/// image spanning `bounds`.
#[must_use]
pub fn to_pixel_space(
    vertices: &[GeoPoint],
    bounds: &GeoBounds,
    width: u32,
    height: u32,
) -> Vec<(f64, f64)> {
    let (w, h) = (f64::from(width), f64::from(height));
    vertices
        .iter()
        .map(|v| {
            let x_percent = (v.lon - bounds.min_lon) / bounds.width();
            let y_percent = (bounds.max_lat - v.lat) / bounds.height();
            (x_percent * w, y_percent * h)
        })
        .collect()
}

/// Rasterizes a closed pixel-space polygon into a mask (255 inside, 0
/// outside).
///
/// A pixel is inside when its centre is, by the even-odd rule. Filling is
/// aliased so the mask stays strictly binary.
#[must_use]
pub fn rasterize(polygon: &[(f64, f64)], width: u32, height: u32) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    let (Some(path), Some(mut pixmap)) = (polygon_path(polygon), Pixmap::new(width, height))
    else {
        return mask;
    };

    let mut paint = Paint::default();
    paint.set_color_rgba8(255, 255, 255, 255);
    paint.anti_alias = false;
    pixmap.fill_path(&path, &paint, FillRule::EvenOdd, Transform::identity(), None);

    for (pixel, rgba) in mask.pixels_mut().zip(pixmap.data().chunks_exact(4)) {
        pixel.0[0] = rgba[3];
    }
    mask
}

/// Closed path through `polygon`, or `None` with fewer than three vertices.
#[allow(clippy::cast_possible_truncation)]
fn polygon_path(polygon: &[(f64, f64)]) -> Option<Path> {
    let (&(x0, y0), rest) = polygon.split_first()?;
    if rest.len() < 2 {
        return None;
    }
    let mut builder = PathBuilder::new();
    builder.move_to(x0 as f32, y0 as f32);
    for &(x, y) in rest {
        builder.line_to(x as f32, y as f32);
    }
    builder.close();
    builder.finish()
}

/// Returns a copy of `image` with every pixel outside `mask` set to black.
///
/// Applying the same mask to its own output changes nothing.
#[must_use]
pub fn apply_mask(image: &RgbImage, mask: &GrayImage) -> RgbImage {
    debug_assert_eq!(image.dimensions(), mask.dimensions());
    let mut out = image.clone();
    for (pixel, m) in out.pixels_mut().zip(mask.pixels()) {
        if m.0[0] == 0 {
            *pixel = BACKGROUND;
        }
    }
    out
}

/// Smallest `(x, y, width, height)` rectangle holding every inside pixel.
fn mask_extent(mask: &GrayImage) -> Option<(u32, u32, u32, u32)> {
    let mut extent: Option<(u32, u32, u32, u32)> = None;
    for (x, y, m) in mask.enumerate_pixels() {
        if m.0[0] == 0 {
            continue;
        }
        extent = Some(match extent {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }
    extent.map(|(x0, y0, x1, y1)| (x0, y0, x1 - x0 + 1, y1 - y0 + 1))
}

/// Masks `image` (spanning `bounds`) to the polygon and crops the result
/// to the polygon's pixel bounding box.
///
/// # Errors
///
/// Returns [`RasterError::EmptyMask`] if the polygon covers no pixel
/// centre.
pub fn mask_polygon(
    image: &RgbImage,
    bounds: &GeoBounds,
    vertices: &[GeoPoint],
) -> Result<MaskedOutput, RasterError> {
    let (width, height) = image.dimensions();
    let polygon = to_pixel_space(vertices, bounds, width, height);
    let mask = rasterize(&polygon, width, height);

    let Some((x, y, w, h)) = mask_extent(&mask) else {
        return Err(RasterError::EmptyMask { width, height });
    };

    let masked = apply_mask(image, &mask);
    let cropped = imageops::crop_imm(&masked, x, y, w, h).to_image();

    let (fw, fh) = (f64::from(width), f64::from(height));
    let lon_at = |col: u32| bounds.min_lon + f64::from(col) / fw * bounds.width();
    let lat_at = |row: u32| bounds.max_lat - f64::from(row) / fh * bounds.height();
    let out_bounds = GeoBounds::new(lon_at(x), lat_at(y + h), lon_at(x + w), lat_at(y));

    log::debug!("Masked {w}x{h} at ({x}, {y}) of {width}x{height}");

    Ok(MaskedOutput {
        image: cropped,
        bounds: out_bounds,
    })
}
