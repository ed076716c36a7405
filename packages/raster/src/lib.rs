#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Pixel work on downloaded tiles.
//!
//! [`stitch`] assembles a grid of tiles into one north-up image, [`crop`]
//! cuts that image down to the planned geographic box, and [`mask`]
//! blacks out everything outside the AOI polygon. All functions here are
//! synchronous and CPU-bound; async callers should run them on a blocking
//! thread.

pub mod crop;
pub mod mask;
pub mod output;
pub mod stitch;

use std::path::PathBuf;

use thiserror::Error;

/// Errors from stitching, cropping, masking, or saving.
#[derive(Debug, Error)]
pub enum RasterError {
    /// Image decode or encode failure.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Filesystem failure.
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Not a single tile of the grid could be read.
    #[error("None of the {expected} grid tiles could be read")]
    NoTiles {
        /// Tiles in the grid.
        expected: usize,
    },

    /// The mosaic would exceed the addressable image size.
    #[error("Mosaic of {width}x{height} pixels is too large")]
    TooLarge {
        /// Requested width.
        width: u64,
        /// Requested height.
        height: u64,
    },

    /// The crop rectangle has no area after clamping.
    #[error("Crop rectangle is empty: {reason}")]
    DegenerateCrop {
        /// Which edge collapsed.
        reason: String,
    },

    /// The polygon covers no pixel of the image.
    #[error("Polygon covers no pixels of the {width}x{height} image")]
    EmptyMask {
        /// Image width.
        width: u32,
        /// Image height.
        height: u32,
    },
}
