//! Tile grid -> single north-up image.
//!
//! Tile rows are numbered northward while image rows run southward, so
//! grid row `r` lands at image row `rows - 1 - r`.

use std::path::{Path, PathBuf};

use image::{RgbImage, imageops};
use sat_mosaic_geo_models::{TileCoordinate, TileGrid};

use crate::RasterError;

/// A stitched grid of tiles.
#[derive(Debug, Clone)]
pub struct Mosaic {
    /// Stitched pixels; missing tiles are black.
    pub image: RgbImage,
    /// Grid the mosaic was built from.
    pub grid: TileGrid,
    /// Width of one tile in pixels.
    pub tile_width: u32,
    /// Height of one tile in pixels.
    pub tile_height: u32,
    /// Tiles actually pasted.
    pub placed: usize,
}

/// Stitches the tiles in `tile_paths` into one image covering `grid`.
///
/// Tile positions come from the file names, so the order of `tile_paths`
/// does not matter. Missing, unreadable, or foreign files are skipped and
/// leave a black cell; so does a tile whose size differs from the first
/// readable one.
///
/// # Errors
///
/// Returns [`RasterError::NoTiles`] if no tile could be read and
/// [`RasterError::TooLarge`] if the mosaic dimensions overflow.
pub fn stitch(grid: &TileGrid, tile_paths: &[PathBuf]) -> Result<Mosaic, RasterError> {
    let mut tiles: Vec<(TileCoordinate, &Path)> = tile_paths
        .iter()
        .filter_map(|path| {
            let Some((coord, _)) = TileCoordinate::parse_file_name(&path.to_string_lossy()) else {
                log::warn!("Ignoring non-tile file {}", path.display());
                return None;
            };
            if !grid.contains(&coord) {
                log::warn!("Ignoring tile {coord} outside {grid}");
                return None;
            }
            path.is_file().then_some((coord, path.as_path()))
        })
        .collect();
    tiles.sort_by_key(|(coord, _)| (coord.y, coord.x));
    tiles.dedup_by_key(|(coord, _)| *coord);

    let mut decoded = tiles
        .into_iter()
        .filter_map(|(coord, path)| match image::open(path) {
            Ok(img) => Some((coord, img.to_rgb8())),
            Err(e) => {
                log::warn!("Skipping unreadable tile {}: {e}", path.display());
                None
            }
        });

    let Some((first_coord, first)) = decoded.next() else {
        return Err(RasterError::NoTiles {
            expected: grid.len(),
        });
    };
    let (tile_width, tile_height) = first.dimensions();

    let (Some(width), Some(height)) = (
        tile_width.checked_mul(grid.cols),
        tile_height.checked_mul(grid.rows),
    ) else {
        return Err(RasterError::TooLarge {
            width: u64::from(tile_width) * u64::from(grid.cols),
            height: u64::from(tile_height) * u64::from(grid.rows),
        });
    };

    let mut image = RgbImage::new(width, height);
    let mut placed = 0;

    for (coord, tile) in std::iter::once((first_coord, first)).chain(decoded) {
        if tile.dimensions() != (tile_width, tile_height) {
            log::warn!(
                "Skipping tile {coord}: {}x{} differs from {tile_width}x{tile_height}",
                tile.width(),
                tile.height()
            );
            continue;
        }
        let col = coord.x - grid.origin_x;
        let row = grid.rows - 1 - (coord.y - grid.origin_y);
        imageops::overlay(
            &mut image,
            &tile,
            i64::from(col * tile_width),
            i64::from(row * tile_height),
        );
        placed += 1;
    }

    if placed < grid.len() {
        log::warn!(
            "{} of {} tiles missing from {grid}; leaving black cells",
            grid.len() - placed,
            grid.len()
        );
    }
    log::debug!("Stitched {placed} tiles into {width}x{height} mosaic");

    Ok(Mosaic {
        image,
        grid: *grid,
        tile_width,
        tile_height,
        placed,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use image::Rgb;
    use sat_mosaic_geo_models::TileKind;

    use super::*;

    pub fn grid(cols: u32, rows: u32) -> TileGrid {
        TileGrid {
            zoom: 16,
            origin_x: 100,
            origin_y: 200,
            cols,
            rows,
        }
    }

    fn colour(coord: &TileCoordinate) -> Rgb<u8> {
        Rgb([
            u8::try_from(coord.x - 90).unwrap() * 10,
            u8::try_from(coord.y - 190).unwrap() * 10,
            200,
        ])
    }

    /// Writes solid-colour PNG tiles for every grid cell except `skip`.
    fn write_tiles(dir: &Path, grid: &TileGrid, size: u32, skip: &[(u32, u32)]) -> Vec<PathBuf> {
        std::fs::create_dir_all(dir).unwrap();
        grid.coordinates()
            .map(|coord| {
                let path = dir.join(coord.file_name(TileKind::Road));
                if !skip.contains(&(coord.x, coord.y)) {
                    RgbImage::from_pixel(size, size, colour(&coord))
                        .save(&path)
                        .unwrap();
                }
                path
            })
            .collect()
    }

    #[test]
    fn mosaic_is_cols_by_rows_tiles() {
        let dir = std::env::temp_dir().join("sat_mosaic_stitch_dims");
        let _ = std::fs::remove_dir_all(&dir);
        let grid = grid(3, 2);
        let paths = write_tiles(&dir, &grid, 256, &[]);

        let mosaic = stitch(&grid, &paths).unwrap();
        assert_eq!(mosaic.image.dimensions(), (3 * 256, 2 * 256));
        assert_eq!(mosaic.placed, 6);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn northern_row_is_on_top() {
        let dir = std::env::temp_dir().join("sat_mosaic_stitch_orientation");
        let _ = std::fs::remove_dir_all(&dir);
        let grid = grid(2, 2);
        let mut paths = write_tiles(&dir, &grid, 256, &[]);
        paths.reverse();

        let mosaic = stitch(&grid, &paths).unwrap();
        let img = &mosaic.image;
        assert_eq!(*img.get_pixel(10, 10), colour(&TileCoordinate::new(16, 100, 201)));
        assert_eq!(*img.get_pixel(300, 10), colour(&TileCoordinate::new(16, 101, 201)));
        assert_eq!(*img.get_pixel(10, 300), colour(&TileCoordinate::new(16, 100, 200)));
        assert_eq!(*img.get_pixel(300, 300), colour(&TileCoordinate::new(16, 101, 200)));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_tile_leaves_black_cell() {
        let dir = std::env::temp_dir().join("sat_mosaic_stitch_hole");
        let _ = std::fs::remove_dir_all(&dir);
        let grid = grid(2, 2);
        let paths = write_tiles(&dir, &grid, 256, &[(101, 200)]);

        let mosaic = stitch(&grid, &paths).unwrap();
        assert_eq!(mosaic.placed, 3);
        assert_eq!(*mosaic.image.get_pixel(300, 300), Rgb([0, 0, 0]));
        assert_eq!(mosaic.image.dimensions(), (512, 512));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn mismatched_tile_is_skipped() {
        let dir = std::env::temp_dir().join("sat_mosaic_stitch_mismatch");
        let _ = std::fs::remove_dir_all(&dir);
        let grid = grid(2, 1);
        let paths = write_tiles(&dir, &grid, 256, &[]);
        RgbImage::from_pixel(128, 128, Rgb([255, 255, 255]))
            .save(&paths[1])
            .unwrap();

        let mosaic = stitch(&grid, &paths).unwrap();
        assert_eq!(mosaic.placed, 1);
        assert_eq!(*mosaic.image.get_pixel(300, 10), Rgb([0, 0, 0]));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn no_readable_tiles_is_an_error() {
        let dir = std::env::temp_dir().join("sat_mosaic_stitch_empty");
        let grid = grid(2, 2);
        let paths: Vec<PathBuf> = grid
            .coordinates()
            .map(|c| dir.join(c.file_name(TileKind::Satellite)))
            .collect();
        assert!(matches!(
            stitch(&grid, &paths),
            Err(RasterError::NoTiles { expected: 4 })
        ));
    }
}
