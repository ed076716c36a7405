//! Where downloaded tiles live.
//!
//! The store doubles as the download ledger: a tile that [`TileStore::exists`]
//! is never fetched again. Writes must be atomic so an interrupted run
//! cannot leave a truncated tile that later passes the existence check.

#[cfg(test)]
use std::collections::HashMap;
use std::path::PathBuf;
#[cfg(test)]
use std::sync::Mutex;

use async_trait::async_trait;
use sat_mosaic_geo_models::{TileCoordinate, TileKind};

use crate::TileDownloadError;

/// Persistent set of tiles for one area and tile kind.
#[async_trait]
pub trait TileStore: Send + Sync {
    /// Path the tile is (or would be) stored at.
    fn path(&self, coord: &TileCoordinate) -> PathBuf;

    /// Returns `true` if the tile has already been stored.
    async fn exists(&self, coord: &TileCoordinate) -> bool;

    /// Stores a tile, replacing nothing that is already complete.
    ///
    /// # Errors
    ///
    /// Returns [`TileDownloadError::Io`] if the tile cannot be written.
    async fn write(&self, coord: &TileCoordinate, bytes: &[u8]) -> Result<(), TileDownloadError>;
}

/// Tiles as individual files under one directory.
#[derive(Debug, Clone)]
pub struct FsTileStore {
    dir: PathBuf,
    kind: TileKind,
}

impl FsTileStore {
    /// Store rooted at `dir` holding tiles of `kind`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, kind: TileKind) -> Self {
        Self {
            dir: dir.into(),
            kind,
        }
    }
}

#[async_trait]
impl TileStore for FsTileStore {
    fn path(&self, coord: &TileCoordinate) -> PathBuf {
        self.dir.join(coord.file_name(self.kind))
    }

    async fn exists(&self, coord: &TileCoordinate) -> bool {
        tokio::fs::metadata(self.path(coord))
            .await
            .is_ok_and(|meta| meta.is_file())
    }

    async fn write(&self, coord: &TileCoordinate, bytes: &[u8]) -> Result<(), TileDownloadError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| TileDownloadError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let path = self.path(coord);
        let tmp_path = self.dir.join(format!(
            ".{}.{}.part",
            coord.file_name(self.kind),
            std::process::id()
        ));

        tokio::fs::write(&tmp_path, bytes)
            .await
            .map_err(|source| TileDownloadError::Io {
                path: tmp_path.clone(),
                source,
            })?;

        if let Err(source) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(TileDownloadError::Io { path, source });
        }

        Ok(())
    }
}

/// In-memory store for fetcher tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryTileStore {
    dir: PathBuf,
    kind: TileKind,
    tiles: Mutex<HashMap<TileCoordinate, Vec<u8>>>,
}

#[cfg(test)]
impl MemoryTileStore {
    /// Empty store whose paths are reported under `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, kind: TileKind) -> Self {
        Self {
            dir: dir.into(),
            kind,
            tiles: Mutex::new(HashMap::new()),
        }
    }

    /// Number of stored tiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.lock().map_or(0, |tiles| tiles.len())
    }

    /// Returns `true` if nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[async_trait]
impl TileStore for MemoryTileStore {
    fn path(&self, coord: &TileCoordinate) -> PathBuf {
        self.dir.join(coord.file_name(self.kind))
    }

    async fn exists(&self, coord: &TileCoordinate) -> bool {
        self.tiles
            .lock()
            .is_ok_and(|tiles| tiles.contains_key(coord))
    }

    async fn write(&self, coord: &TileCoordinate, bytes: &[u8]) -> Result<(), TileDownloadError> {
        let mut tiles = self.tiles.lock().map_err(|_| TileDownloadError::Io {
            path: self.path(coord),
            source: std::io::Error::other("tile map lock poisoned"),
        })?;
        tiles.insert(*coord, bytes.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fs_store_writes_atomically_named_file() {
        let dir = std::env::temp_dir().join("sat_mosaic_fs_store");
        let _ = std::fs::remove_dir_all(&dir);
        let store = FsTileStore::new(&dir, TileKind::Satellite);
        let coord = TileCoordinate::new(16, 10, 20);

        assert!(!store.exists(&coord).await);
        store.write(&coord, b"jpeg bytes").await.unwrap();
        assert!(store.exists(&coord).await);
        assert_eq!(store.path(&coord), dir.join("16_10_20_s.jpg"));
        assert_eq!(std::fs::read(store.path(&coord)).unwrap(), b"jpeg bytes");

        let leftovers: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
            .collect();
        assert!(leftovers.is_empty());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn memory_store_tracks_tiles() {
        let store = MemoryTileStore::new("tiles/park", TileKind::Road);
        let coord = TileCoordinate::new(17, 1, 2);
        assert!(store.is_empty());
        store.write(&coord, &[1, 2, 3]).await.unwrap();
        assert!(store.exists(&coord).await);
        assert_eq!(store.len(), 1);
        assert!(!store.exists(&TileCoordinate::new(17, 2, 2)).await);
        assert_eq!(store.path(&coord), PathBuf::from("tiles/park/17_1_2_r.png"));
    }
}
