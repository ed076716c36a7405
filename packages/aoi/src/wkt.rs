//! Minimal WKT reader for single polygons.
//!
//! Only `POLYGON ((x y, ...), ...)` is accepted. The exterior ring is
//! returned; interior rings are dropped with a warning because the masker
//! fills the exterior only.

use sat_mosaic_geo_models::GeoPoint;
use thiserror::Error;

/// Smallest closed ring: a triangle plus the repeated first vertex.
pub const MIN_RING_VERTICES: usize = 4;

/// Reasons a WKT string is rejected.
#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    /// The geometry tag is not `POLYGON`.
    #[error("Unsupported geometry type '{kind}' (expected POLYGON)")]
    UnsupportedGeometry {
        /// Tag found at the start of the text.
        kind: String,
    },

    /// `POLYGON EMPTY` or an empty ring list.
    #[error("Polygon has no rings")]
    Empty,

    /// Parentheses or separators are malformed.
    #[error("Malformed WKT: {message}")]
    Syntax {
        /// What was wrong.
        message: String,
    },

    /// A coordinate token is not a finite number.
    #[error("Invalid coordinate '{token}'")]
    InvalidNumber {
        /// Offending token.
        token: String,
    },

    /// The exterior ring has too few vertices.
    #[error("Ring has {count} vertices, at least {MIN_RING_VERTICES} required")]
    TooFewVertices {
        /// Vertex count found.
        count: usize,
    },

    /// First and last vertices differ.
    #[error("Ring is not closed: first {first:?}, last {last:?}")]
    UnclosedRing {
        /// First vertex `(lon, lat)`.
        first: (f64, f64),
        /// Last vertex `(lon, lat)`.
        last: (f64, f64),
    },
}

/// `POLYGON`, optionally followed by a `Z`, `M`, or `ZM` dimension tag.
fn is_polygon_tag(tag: &str) -> bool {
    let mut words = tag.split_whitespace();
    let polygon = words
        .next()
        .is_some_and(|w| w.eq_ignore_ascii_case("POLYGON"));
    let dims_ok = match words.next() {
        None => true,
        Some(dims) => ["Z", "M", "ZM"].iter().any(|d| dims.eq_ignore_ascii_case(d)),
    };
    polygon && dims_ok && words.next().is_none()
}

/// Parses the exterior ring of a WKT polygon.
///
/// Coordinates are read as `lon lat`; any extra ordinates (Z/M) are
/// ignored, whether or not the tag declares them (`POLYGON Z`, `POLYGON M`,
/// `POLYGON ZM`).
///
/// # Errors
///
/// Returns [`GeometryError`] if the text is not a well-formed, closed
/// polygon with at least [`MIN_RING_VERTICES`] vertices.
pub fn parse_polygon(text: &str) -> Result<Vec<GeoPoint>, GeometryError> {
    let text = text.trim();

    let Some(open) = text.find('(') else {
        let kind = text.split_whitespace().next().unwrap_or("").to_string();
        if kind.eq_ignore_ascii_case("POLYGON") {
            return Err(GeometryError::Empty);
        }
        return Err(GeometryError::UnsupportedGeometry { kind });
    };

    let kind = text[..open].trim();
    if !is_polygon_tag(kind) {
        return Err(GeometryError::UnsupportedGeometry {
            kind: kind.to_string(),
        });
    }

    let inner = text[open..]
        .strip_prefix('(')
        .and_then(|rest| rest.trim_end().strip_suffix(')'))
        .ok_or_else(|| GeometryError::Syntax {
            message: "unbalanced outer parentheses".to_string(),
        })?;

    let rings = split_rings(inner)?;
    let Some(exterior) = rings.first() else {
        return Err(GeometryError::Empty);
    };
    if rings.len() > 1 {
        log::warn!("Ignoring {} interior ring(s)", rings.len() - 1);
    }

    parse_ring(exterior)
}

/// Splits `(a b, c d), (e f, ...)` into the text inside each pair of
/// parentheses.
fn split_rings(inner: &str) -> Result<Vec<&str>, GeometryError> {
    let mut rings = Vec::new();
    let mut rest = inner.trim();

    while !rest.is_empty() {
        let body = rest.strip_prefix('(').ok_or_else(|| GeometryError::Syntax {
            message: format!("expected '(' before ring, found '{}'", preview(rest)),
        })?;
        let close = body.find(')').ok_or_else(|| GeometryError::Syntax {
            message: "unterminated ring".to_string(),
        })?;
        let ring = &body[..close];
        if ring.contains('(') {
            return Err(GeometryError::Syntax {
                message: "nested parentheses inside ring".to_string(),
            });
        }
        rings.push(ring);

        rest = body[close + 1..].trim_start();
        if let Some(after_comma) = rest.strip_prefix(',') {
            rest = after_comma.trim_start();
            if rest.is_empty() {
                return Err(GeometryError::Syntax {
                    message: "trailing comma after ring".to_string(),
                });
            }
        } else if !rest.is_empty() {
            return Err(GeometryError::Syntax {
                message: format!("unexpected '{}' after ring", preview(rest)),
            });
        }
    }

    Ok(rings)
}

fn parse_ring(ring: &str) -> Result<Vec<GeoPoint>, GeometryError> {
    let mut points = Vec::new();

    for vertex in ring.split(',') {
        let mut ordinates = vertex.split_whitespace();
        let (Some(lon), Some(lat)) = (ordinates.next(), ordinates.next()) else {
            return Err(GeometryError::Syntax {
                message: format!("vertex '{}' needs two ordinates", vertex.trim()),
            });
        };
        points.push(GeoPoint::new(parse_number(lon)?, parse_number(lat)?));
    }

    if points.len() < MIN_RING_VERTICES {
        return Err(GeometryError::TooFewVertices {
            count: points.len(),
        });
    }

    if let (Some(first), Some(last)) = (points.first(), points.last())
        && first != last
    {
        return Err(GeometryError::UnclosedRing {
            first: (first.lon, first.lat),
            last: (last.lon, last.lat),
        });
    }

    Ok(points)
}

fn parse_number(token: &str) -> Result<f64, GeometryError> {
    token
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| GeometryError::InvalidNumber {
            token: token.to_string(),
        })
}

fn preview(text: &str) -> String {
    text.chars().take(16).collect()
}
