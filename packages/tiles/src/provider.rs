//! Tile URL templates for the provider's satellite and road layers.

use sat_mosaic_geo_models::{TileCoordinate, TileKind};
use thiserror::Error;

/// Satellite imagery endpoint.
pub const SATELLITE_TEMPLATE: &str = "http://shangetu0.map.bdimg.com/it/u=x={x};y={y};z={z};v=009;type=sate&fm=46&udt=20150504&app=webearth2&v=009&udt=20150601";

/// Rendered road map endpoint.
pub const ROAD_TEMPLATE: &str =
    "http://online3.map.bdimg.com/tile/?qt=tile&x={x}&y={y}&z={z}&styles=pl&scaler=1&udt=20180810";

/// The tile servers reject requests without a browser-like agent.
pub const USER_AGENT: &str = "Mozilla/5.0";

const PLACEHOLDERS: [&str; 3] = ["{x}", "{y}", "{z}"];

/// Invalid URL template.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// A required placeholder does not appear in the template.
    #[error("URL template '{template}' is missing the {placeholder} placeholder")]
    MissingPlaceholder {
        /// Template as configured.
        template: String,
        /// Placeholder that was not found.
        placeholder: &'static str,
    },
}

/// Built-in template for `kind`.
#[must_use]
pub const fn default_template(kind: TileKind) -> &'static str {
    match kind {
        TileKind::Satellite => SATELLITE_TEMPLATE,
        TileKind::Road => ROAD_TEMPLATE,
    }
}

/// A validated tile URL template with `{x}`, `{y}`, and `{z}` slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    template: String,
}

impl UrlTemplate {
    /// Validates `template`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::MissingPlaceholder`] if any of `{x}`,
    /// `{y}`, or `{z}` is absent.
    pub fn new(template: impl Into<String>) -> Result<Self, TemplateError> {
        let template = template.into();
        if let Some(placeholder) = PLACEHOLDERS.into_iter().find(|p| !template.contains(p)) {
            return Err(TemplateError::MissingPlaceholder {
                template,
                placeholder,
            });
        }
        Ok(Self { template })
    }

    /// Template for `kind` using the built-in endpoint.
    #[must_use]
    pub fn for_kind(kind: TileKind) -> Self {
        Self {
            template: default_template(kind).to_string(),
        }
    }

    /// URL of one tile.
    #[must_use]
    pub fn render(&self, coord: &TileCoordinate) -> String {
        self.template
            .replace("{x}", &coord.x.to_string())
            .replace("{y}", &coord.y.to_string())
            .replace("{z}", &coord.zoom.to_string())
    }
}
