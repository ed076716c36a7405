#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! AOI table loading.
//!
//! Reads a CSV with `aoi_address`, `centroid`, and `wkt` columns, parses
//! each polygon, shifts it from GCJ-02 into Baidu's BD-09 datum, and
//! computes the box used for tile planning. Rows fail individually; only
//! an unreadable file or a missing column fails the whole load.

pub mod bounds;
pub mod preprocess;
pub mod wkt;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use geo::{LineString, Polygon};
use sat_mosaic_coords::datum::gcj02_to_bd09;
use sat_mosaic_geo_models::{BoundsPolicy, GeoBounds, GeoPoint};
use serde::Deserialize;
use thiserror::Error;

pub use wkt::GeometryError;

/// Columns every AOI table must carry.
pub const REQUIRED_COLUMNS: [&str; 3] = ["aoi_address", "centroid", "wkt"];

/// Errors that abort loading the whole table.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file could not be read.
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The header row could not be parsed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A required column is absent from the header.
    #[error("Missing required column '{column}'")]
    MissingColumn {
        /// Name of the missing column.
        column: String,
    },
}

/// A row that could not be turned into an [`Aoi`].
#[derive(Debug, Error)]
pub enum RecordError {
    /// The row itself is malformed (wrong field count, bad encoding).
    #[error("Record {record}: {source}")]
    Csv {
        /// 1-based data row number.
        record: usize,
        /// Underlying error.
        source: csv::Error,
    },

    /// The row's WKT is not a usable polygon.
    #[error("Record {record} ({address}): {source}")]
    Geometry {
        /// 1-based data row number.
        record: usize,
        /// Address of the failing row.
        address: String,
        /// Why the geometry was rejected.
        source: GeometryError,
    },
}

impl RecordError {
    /// 1-based data row number of the failing record.
    #[must_use]
    pub const fn record(&self) -> usize {
        match self {
            Self::Csv { record, .. } | Self::Geometry { record, .. } => *record,
        }
    }
}

/// One raw row of the AOI table.
#[derive(Debug, Clone, Deserialize)]
pub struct AoiRecord {
    /// Human-readable address; the AOI's identity.
    pub aoi_address: String,
    /// Centroid as written in the table (informational only).
    #[serde(default)]
    pub centroid: String,
    /// Polygon in GCJ-02, as WKT.
    pub wkt: String,
}

/// A loaded area of interest, in Baidu's BD-09 datum.
#[derive(Debug, Clone)]
pub struct Aoi {
    /// Address from the table.
    pub address: String,
    /// Filesystem-safe, batch-unique name for this AOI's outputs.
    pub output_key: String,
    /// Centroid string from the table.
    pub centroid: String,
    /// Corrected polygon (exterior ring only).
    pub polygon: Polygon<f64>,
    /// Box used for tile planning.
    pub bounds: GeoBounds,
}

impl Aoi {
    /// Builds an AOI from a raw record.
    ///
    /// The output key starts as the sanitized address; [`parse_aois`]
    /// makes it unique across the batch.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError`] if the WKT is rejected.
    pub fn from_record(record: AoiRecord, policy: BoundsPolicy) -> Result<Self, GeometryError> {
        let ring: Vec<(f64, f64)> = wkt::parse_polygon(&record.wkt)?
            .into_iter()
            .map(gcj02_to_bd09)
            .map(|p| (p.lon, p.lat))
            .collect();
        let polygon = Polygon::new(LineString::from(ring), vec![]);
        let bounds = bounds::tiling_bounds(&polygon, policy).ok_or(GeometryError::Empty)?;

        Ok(Self {
            output_key: sanitize_key(&record.aoi_address),
            address: record.aoi_address,
            centroid: record.centroid,
            polygon,
            bounds,
        })
    }

    /// Exterior ring vertices, closing vertex included.
    #[must_use]
    pub fn vertices(&self) -> Vec<GeoPoint> {
        self.polygon
            .exterior()
            .coords()
            .map(|c| GeoPoint::new(c.x, c.y))
            .collect()
    }
}

/// Reads and parses an AOI table from disk.
///
/// # Errors
///
/// Returns [`LoadError`] if the file cannot be read or lacks a required
/// column. Per-row problems are returned inside the vector instead.
pub fn load_aois(
    path: &Path,
    policy: BoundsPolicy,
) -> Result<Vec<Result<Aoi, RecordError>>, LoadError> {
    let raw = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("Loading AOIs from {}", path.display());
    parse_aois(&raw, policy)
}

/// Parses an AOI table held in memory. Output preserves row order.
///
/// # Errors
///
/// Returns [`LoadError`] if the header is unreadable or lacks a required
/// column.
pub fn parse_aois(
    raw: &str,
    policy: BoundsPolicy,
) -> Result<Vec<Result<Aoi, RecordError>>, LoadError> {
    let (text, changed) = preprocess::normalize(raw);
    if changed {
        log::debug!("Normalized non-breaking spaces in AOI table");
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(LoadError::MissingColumn {
                column: column.to_string(),
            });
        }
    }

    let mut used_keys = HashSet::new();
    let mut results = Vec::new();

    for (i, row) in reader.deserialize::<AoiRecord>().enumerate() {
        let record = i + 1;
        let result = match row {
            Err(source) => Err(RecordError::Csv { record, source }),
            Ok(row) => {
                let address = row.aoi_address.clone();
                Aoi::from_record(row, policy)
                    .map(|mut aoi| {
                        aoi.output_key = unique_key(&aoi.output_key, record, &mut used_keys);
                        aoi
                    })
                    .map_err(|source| RecordError::Geometry {
                        record,
                        address,
                        source,
                    })
            }
        };

        match &result {
            Ok(aoi) => log::debug!("Loaded AOI '{}' bounds {}", aoi.address, aoi.bounds),
            Err(e) => log::warn!("Skipping AOI row: {e}"),
        }
        results.push(result);
    }

    log::info!(
        "Loaded {} AOI row(s), {} usable",
        results.len(),
        results.iter().filter(|r| r.is_ok()).count()
    );

    Ok(results)
}

/// Replaces characters that are unsafe in file names.
fn sanitize_key(address: &str) -> String {
    address
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .trim_matches('.')
        .to_string()
}

/// Picks a key not yet used in this batch, suffixing `_2`, `_3`, ... on
/// collision.
fn unique_key(base: &str, record: usize, used: &mut HashSet<String>) -> String {
    let base = if base.is_empty() {
        format!("aoi_{record}")
    } else {
        base.to_string()
    };

    if used.insert(base.clone()) {
        return base;
    }

    let mut n = 2;
    loop {
        let candidate = format!("{base}_{n}");
        if used.insert(candidate.clone()) {
            log::warn!("Duplicate AOI key '{base}' at record {record}; writing outputs as '{candidate}'");
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = "\"POLYGON ((116.30 39.90, 116.31 39.90, 116.31 39.91, 116.30 39.91, 116.30 39.90))\"";

    fn table(rows: &[String]) -> String {
        let mut text = String::from("aoi_address,centroid,wkt\n");
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        text
    }

    #[test]
    fn loads_and_corrects_polygon() {
        let text = table(&[format!("Park,\"116.305,39.905\",{SQUARE}")]);
        let aois = parse_aois(&text, BoundsPolicy::Square).unwrap();
        assert_eq!(aois.len(), 1);
        let aoi = aois[0].as_ref().unwrap();
        assert_eq!(aoi.address, "Park");
        assert_eq!(aoi.output_key, "Park");
        assert_eq!(aoi.centroid, "116.305,39.905");

        let first = aoi.vertices()[0];
        let expected = gcj02_to_bd09(GeoPoint::new(116.30, 39.90));
        assert!((first.lon - expected.lon).abs() < 1e-12);
        assert!((first.lat - expected.lat).abs() < 1e-12);
        assert!(first.lon > 116.30);
    }

    #[test]
    fn bounds_cover_corrected_vertices() {
        let text = table(&[format!("Park,,{SQUARE}")]);
        let aois = parse_aois(&text, BoundsPolicy::Square).unwrap();
        let aoi = aois[0].as_ref().unwrap();
        for v in aoi.vertices() {
            assert!(aoi.bounds.contains(v), "{v:?} outside {}", aoi.bounds);
        }
        assert!((aoi.bounds.width() - aoi.bounds.height()).abs() < 1e-12);
    }

    #[test]
    fn bad_rows_are_reported_in_order() {
        let text = table(&[
            format!("A,,{SQUARE}"),
            "B,,\"POLYGON ((0 0, 1 0, 1 1, 0 1))\"".to_string(),
            "C,,\"POINT (1 2)\"".to_string(),
            format!("D,,{SQUARE}"),
        ]);
        let aois = parse_aois(&text, BoundsPolicy::Square).unwrap();
        assert_eq!(aois.len(), 4);
        assert!(aois[0].is_ok());
        assert!(matches!(
            &aois[1],
            Err(RecordError::Geometry {
                record: 2,
                source: GeometryError::UnclosedRing { .. },
                ..
            })
        ));
        assert!(matches!(
            &aois[2],
            Err(RecordError::Geometry {
                source: GeometryError::UnsupportedGeometry { .. },
                ..
            })
        ));
        assert_eq!(aois[3].as_ref().unwrap().address, "D");
    }

    #[test]
    fn missing_column_fails_fast() {
        let text = "aoi_address,wkt\nA,\"POLYGON ((0 0, 1 0, 1 1, 0 0))\"\n";
        let err = parse_aois(text, BoundsPolicy::Square).unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn { column } if column == "centroid"));
    }

    #[test]
    fn extra_columns_are_ignored() {
        let text = format!("id,aoi_address,centroid,wkt,notes\n7,Park,,{SQUARE},x\n");
        let aois = parse_aois(&text, BoundsPolicy::Square).unwrap();
        assert_eq!(aois[0].as_ref().unwrap().address, "Park");
    }

    #[test]
    fn non_breaking_spaces_are_normalized() {
        let wkt = SQUARE.replace(' ', "\u{a0}").replace("POLYGON\u{a0}", "POLYGON ");
        let text = table(&[format!("Park,,{wkt}")]);
        let aois = parse_aois(&text, BoundsPolicy::Square).unwrap();
        assert!(aois[0].is_ok());
    }

    #[test]
    fn duplicate_addresses_get_unique_keys() {
        let text = table(&[
            format!("Park,,{SQUARE}"),
            format!("Park,,{SQUARE}"),
            format!("Park_2,,{SQUARE}"),
        ]);
        let keys: Vec<String> = parse_aois(&text, BoundsPolicy::Square)
            .unwrap()
            .into_iter()
            .map(|r| r.unwrap().output_key)
            .collect();
        assert_eq!(keys, vec!["Park", "Park_2", "Park_2_2"]);
    }

    #[test]
    fn keys_are_filesystem_safe() {
        assert_eq!(sanitize_key("Block 3/East: Gate"), "Block 3_East_ Gate");
        assert_eq!(sanitize_key(".."), "");
        let mut used = HashSet::new();
        assert_eq!(unique_key("", 5, &mut used), "aoi_5");
    }

    #[test]
    fn load_reports_missing_file() {
        let path = std::env::temp_dir().join("sat_mosaic_aoi_missing.csv");
        let _ = std::fs::remove_file(&path);
        assert!(matches!(
            load_aois(&path, BoundsPolicy::Square),
            Err(LoadError::Io { .. })
        ));
    }

    #[test]
    fn loads_from_disk() {
        let dir = std::env::temp_dir().join("sat_mosaic_aoi_load");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("aois.csv");
        std::fs::write(&path, table(&[format!("Park,,{SQUARE}")])).unwrap();
        let aois = load_aois(&path, BoundsPolicy::Rectangle).unwrap();
        assert!(aois[0].is_ok());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
