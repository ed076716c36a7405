//! Persisting rasters.

use std::path::Path;

use image::{ImageFormat, RgbImage};

use crate::RasterError;

/// Writes `image` as a JPEG at `path`, creating parent directories.
///
/// The file is encoded next to its destination and renamed into place, so
/// a reader never sees a half-written image.
///
/// # Errors
///
/// Returns [`RasterError::Io`] for filesystem failures and
/// [`RasterError::Image`] if encoding fails.
pub fn save_jpeg(image: &RgbImage, path: &Path) -> Result<(), RasterError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| RasterError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let mut tmp_path = path.as_os_str().to_owned();
    tmp_path.push(".part");
    let tmp_path = std::path::PathBuf::from(tmp_path);

    if let Err(e) = image.save_with_format(&tmp_path, ImageFormat::Jpeg) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    if let Err(source) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(RasterError::Io {
            path: path.to_path_buf(),
            source,
        });
    }

    log::debug!("Wrote {}", path.display());
    Ok(())
}
