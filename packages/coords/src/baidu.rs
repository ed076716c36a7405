//! Baidu `geoconv` coordinate-conversion client.
//!
//! A single GET converts one coordinate pair between Baidu's numbered
//! coordinate systems:
//!
//! ```text
//! GET https://api.map.baidu.com/geoconv/v1/?coords=116.40,39.91&from=5&to=6&ak=KEY
//! {"status":0,"result":[{"x":12958175.0,"y":4825923.7}]}
//! ```
//!
//! See <https://lbs.baidu.com/faq/api?title=webapi/guide/changeposition-base>

use std::time::Duration;

use async_trait::async_trait;
use sat_mosaic_geo_models::GeoPoint;
use serde::Deserialize;

use crate::{CoordinateService, ExternalServiceError, MercatorPoint};

/// Public `geoconv` endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.map.baidu.com/geoconv/v1/";

/// Coordinate systems understood by `geoconv`, with their numeric codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordSystem {
    /// GPS lat/lon.
    Wgs84,
    /// National survey datum lat/lon.
    Gcj02,
    /// Baidu lat/lon.
    Bd09Ll,
    /// Baidu Mercator metres.
    Bd09Mc,
}

impl CoordSystem {
    /// Numeric code used in the `from` / `to` query parameters.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Wgs84 => 1,
            Self::Gcj02 => 3,
            Self::Bd09Ll => 5,
            Self::Bd09Mc => 6,
        }
    }
}

/// Connection settings for [`BaiduGeoconv`].
#[derive(Debug, Clone, Deserialize)]
pub struct GeoconvConfig {
    /// Endpoint URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Baidu access key (`ak`).
    #[serde(default)]
    pub api_key: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

const fn default_timeout_secs() -> u64 {
    15
}

impl Default for GeoconvConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// [`CoordinateService`] backed by Baidu's `geoconv` API.
#[derive(Debug, Clone)]
pub struct BaiduGeoconv {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl BaiduGeoconv {
    /// Builds a client with the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ExternalServiceError::Http`] if the HTTP client cannot be
    /// constructed.
    pub fn new(config: &GeoconvConfig) -> Result<Self, ExternalServiceError> {
        if config.api_key.is_empty() {
            log::warn!("No geoconv access key configured; requests will be rejected");
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Converts one coordinate pair from `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`ExternalServiceError`] on transport failure, a non-2xx
    /// status, a non-zero provider status, or a malformed payload.
    pub async fn convert(
        &self,
        x: f64,
        y: f64,
        from: CoordSystem,
        to: CoordSystem,
    ) -> Result<(f64, f64), ExternalServiceError> {
        let coords = format!("{x},{y}");
        let from_code = from.code().to_string();
        let to_code = to.code().to_string();
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("coords", coords.as_str()),
                ("from", from_code.as_str()),
                ("to", to_code.as_str()),
                ("ak", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ExternalServiceError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let body: serde_json::Value = resp.json().await?;
        log::trace!("geoconv {coords} {from:?}->{to:?}: {body}");
        parse_response(&body)
    }
}

#[async_trait]
impl CoordinateService for BaiduGeoconv {
    async fn project(&self, point: GeoPoint) -> Result<MercatorPoint, ExternalServiceError> {
        let (x, y) = self
            .convert(point.lon, point.lat, CoordSystem::Bd09Ll, CoordSystem::Bd09Mc)
            .await?;
        Ok(MercatorPoint { x, y })
    }

    async fn unproject(&self, point: MercatorPoint) -> Result<GeoPoint, ExternalServiceError> {
        let (lon, lat) = self
            .convert(point.x, point.y, CoordSystem::Bd09Mc, CoordSystem::Bd09Ll)
            .await?;
        Ok(GeoPoint::new(lon, lat))
    }
}

/// Extracts the first converted pair from a `geoconv` response.
///
/// The pair is read from `x`/`y`, falling back to `lng`/`lat`.
fn parse_response(body: &serde_json::Value) -> Result<(f64, f64), ExternalServiceError> {
    if let Some(status) = body["status"].as_i64()
        && status != 0
    {
        let message = body["message"]
            .as_str()
            .or_else(|| body["msg"].as_str())
            .unwrap_or("")
            .to_string();
        return Err(ExternalServiceError::Service { status, message });
    }

    let first = body["result"]
        .as_array()
        .and_then(|results| results.first())
        .ok_or_else(|| ExternalServiceError::Parse {
            message: "Missing result array in geoconv response".to_string(),
        })?;

    let x = first["x"]
        .as_f64()
        .or_else(|| first["lng"].as_f64())
        .ok_or_else(|| ExternalServiceError::Parse {
            message: "Missing x coordinate in geoconv response".to_string(),
        })?;
    let y = first["y"]
        .as_f64()
        .or_else(|| first["lat"].as_f64())
        .ok_or_else(|| ExternalServiceError::Parse {
            message: "Missing y coordinate in geoconv response".to_string(),
        })?;

    Ok((x, y))
}
