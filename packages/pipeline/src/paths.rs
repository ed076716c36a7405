//! On-disk output layout.

use std::path::{Path, PathBuf};

/// Directory holding per-area tile directories.
pub const TILES_DIR: &str = "tiles";
/// Directory holding full stitched mosaics.
pub const STITCHED_DIR: &str = "stitched_images";
/// Directory holding mosaics cropped to the planned box.
pub const CROPPED_DIR: &str = "cropped_images";
/// Directory holding the final masked images.
pub const MASKED_DIR: &str = "masked_images";

/// Paths of every artefact under one output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    /// Layout rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Output root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Tile directory for one area.
    #[must_use]
    pub fn tiles_dir(&self, area: &str) -> PathBuf {
        self.root.join(TILES_DIR).join(area)
    }

    /// Stitched mosaic for one AOI.
    #[must_use]
    pub fn stitched(&self, key: &str) -> PathBuf {
        self.root.join(STITCHED_DIR).join(format!("{key}.jpg"))
    }

    /// Cropped mosaic for one AOI.
    #[must_use]
    pub fn cropped(&self, key: &str) -> PathBuf {
        self.root.join(CROPPED_DIR).join(format!("{key}.jpg"))
    }

    /// Masked output for one AOI.
    #[must_use]
    pub fn masked(&self, key: &str) -> PathBuf {
        self.root.join(MASKED_DIR).join(format!("{key}.jpg"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_directory_scheme() {
        let layout = OutputLayout::new("/data");
        assert_eq!(layout.tiles_dir("Park"), PathBuf::from("/data/tiles/Park"));
        assert_eq!(
            layout.stitched("Park"),
            PathBuf::from("/data/stitched_images/Park.jpg")
        );
        assert_eq!(
            layout.cropped("Park"),
            PathBuf::from("/data/cropped_images/Park.jpg")
        );
        assert_eq!(
            layout.masked("Park"),
            PathBuf::from("/data/masked_images/Park.jpg")
        );
    }
}
