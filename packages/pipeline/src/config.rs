//! Pipeline configuration.
//!
//! Defaults are compiled in from `config/default.toml`. A user file is
//! merged over them key by key (tables merge, everything else replaces),
//! and `SAT_MOSAIC_AK` overrides the geoconv access key.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sat_mosaic_coords::baidu::GeoconvConfig;
use sat_mosaic_coords::projection::{MAX_ZOOM, MIN_ZOOM, is_valid_zoom};
use sat_mosaic_geo_models::{BoundsPolicy, GeoBounds, TileKind};
use sat_mosaic_tiles::fetcher::FetchOptions;
use sat_mosaic_tiles::provider::{TemplateError, UrlTemplate};
use serde::Deserialize;
use thiserror::Error;

/// Built-in configuration.
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Environment variable holding the geoconv access key.
pub const API_KEY_ENV: &str = "SAT_MOSAIC_AK";

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config {}: {source}", .path.display())]
    Io {
        /// Config file path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The TOML is malformed or has the wrong shape.
    #[error("Invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A URL template lacks a placeholder.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// A value is out of range.
    #[error("Invalid config: {message}")]
    Invalid {
        /// What is wrong.
        message: String,
    },
}

/// URL templates per tile kind.
#[derive(Debug, Clone, Deserialize)]
pub struct Templates {
    /// Satellite imagery template.
    pub satellite: String,
    /// Road map template.
    pub road: String,
}

impl Templates {
    /// Validated template for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] if the template lacks a placeholder.
    pub fn for_kind(&self, kind: TileKind) -> Result<UrlTemplate, TemplateError> {
        match kind {
            TileKind::Satellite => UrlTemplate::new(self.satellite.clone()),
            TileKind::Road => UrlTemplate::new(self.road.clone()),
        }
    }
}

/// A named download box for `fetch-regions`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Region {
    /// Name, also used as the tile directory.
    pub name: String,
    /// Southern edge.
    pub min_lat: f64,
    /// Northern edge.
    pub max_lat: f64,
    /// Western edge.
    pub min_lon: f64,
    /// Eastern edge.
    pub max_lon: f64,
}

impl Region {
    /// The region as geographic bounds.
    #[must_use]
    pub const fn bounds(&self) -> GeoBounds {
        GeoBounds::new(self.min_lon, self.min_lat, self.max_lon, self.max_lat)
    }
}

/// Everything the pipeline needs to run.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Root of all output directories.
    pub output_root: PathBuf,
    /// Provider zoom level.
    pub zoom: u8,
    /// Which tile layer to fetch.
    pub kind: TileKind,
    /// How AOI polygons become tiling boxes.
    pub bounds_policy: BoundsPolicy,
    /// Per-request timeout for tile downloads, in seconds.
    pub request_timeout_secs: u64,
    /// Download concurrency, jitter, and retry.
    pub fetch: FetchOptions,
    /// Coordinate service connection.
    pub geoconv: GeoconvConfig,
    /// Tile URL templates.
    pub templates: Templates,
    /// Named boxes for region downloads.
    #[serde(default)]
    pub regions: Vec<Region>,
}

impl PipelineConfig {
    /// Loads the built-in defaults, overlaid by `path` if given, then
    /// applies the environment override and validates.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, does not parse,
    /// or produces invalid values.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let overlay = match path {
            Some(path) => {
                log::info!("Loading config from {}", path.display());
                Some(std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?)
            }
            None => None,
        };

        let mut config = Self::from_toml(overlay.as_deref())?;

        if let Ok(key) = std::env::var(API_KEY_ENV)
            && !key.trim().is_empty()
        {
            log::debug!("Using geoconv key from {API_KEY_ENV}");
            config.geoconv.api_key = key.trim().to_string();
        }

        config.validate()?;
        Ok(config)
    }

    /// Parses the built-in defaults merged with `overlay`. No environment
    /// lookup or validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if either document is malformed.
    pub fn from_toml(overlay: Option<&str>) -> Result<Self, ConfigError> {
        let mut merged: toml::Table = toml::de::from_str(DEFAULT_CONFIG)?;
        if let Some(overlay) = overlay {
            let overlay: toml::Table = toml::de::from_str(overlay)?;
            merge_tables(&mut merged, overlay);
        }
        Ok(toml::Value::Table(merged).try_into()?)
    }

    /// Checks value ranges and templates.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_zoom(self.zoom) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "zoom {} outside {MIN_ZOOM}..={MAX_ZOOM}",
                    self.zoom
                ),
            });
        }
        if self.fetch.concurrency == 0 {
            return Err(ConfigError::Invalid {
                message: "fetch.concurrency must be at least 1".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                message: "request_timeout_secs must be at least 1".to_string(),
            });
        }
        self.templates.for_kind(TileKind::Satellite)?;
        self.templates.for_kind(TileKind::Road)?;
        Ok(())
    }

    /// Tile request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Region by name, case-insensitively.
    #[must_use]
    pub fn region(&self, name: &str) -> Option<&Region> {
        self.regions
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
    }
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(base_table)), toml::Value::Table(overlay_table)) => {
                merge_tables(base_table, overlay_table);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
