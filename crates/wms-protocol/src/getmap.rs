//! WMS GetMap request construction
//!
//! Builds the key-value query for fetching one square tile from a WMS 1.3.0
//! endpoint in EPSG:4326.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tile_common::time::format_date;
use tile_common::{Layer, TemporalMode, TileExtent};

pub const WMS_VERSION: &str = "1.3.0";
pub const GEOGRAPHIC_CRS: &str = "EPSG:4326";
pub const DEFAULT_STYLE: &str = "default";

#[derive(Debug, Error)]
pub enum GetMapError {
    #[error("Layer name '{0}' contains characters not allowed in a query value")]
    InvalidLayerName(String),

    #[error("Image size must be at least 1 pixel")]
    EmptyImage,

    #[error("Layer '{0}' is daily and needs a TIME value")]
    MissingTime(String),

    #[error("Layer '{0}' is static and does not take a TIME value")]
    UnexpectedTime(String),
}

/// Output formats we request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MapFormat {
    #[serde(rename = "image/png")]
    #[default]
    Png,
}

impl MapFormat {
    pub fn to_mime(&self) -> &'static str {
        match self {
            MapFormat::Png => "image/png",
        }
    }
}

/// GetMap request for a single tile.
#[derive(Debug, Clone, PartialEq)]
pub struct GetMapRequest {
    pub layer: String,
    pub bbox: TileExtent,
    pub crs: &'static str,
    pub style: &'static str,
    pub format: MapFormat,
    /// Output width and height in pixels (tiles are square)
    pub size: u32,
    /// TIME dimension, daily layers only
    pub time: Option<NaiveDate>,
}

impl GetMapRequest {
    /// Build the request for one tile of `layer`.
    pub fn for_tile(
        layer: &Layer,
        date: Option<NaiveDate>,
        bbox: TileExtent,
        size: u32,
    ) -> Result<Self, GetMapError> {
        if !is_query_safe(&layer.name) {
            return Err(GetMapError::InvalidLayerName(layer.name.clone()));
        }
        if size == 0 {
            return Err(GetMapError::EmptyImage);
        }
        match (layer.temporal, date) {
            (TemporalMode::Daily, None) => return Err(GetMapError::MissingTime(layer.name.clone())),
            (TemporalMode::Static, Some(_)) => {
                return Err(GetMapError::UnexpectedTime(layer.name.clone()))
            }
            _ => {}
        }

        Ok(Self {
            layer: layer.name.clone(),
            bbox,
            crs: GEOGRAPHIC_CRS,
            style: DEFAULT_STYLE,
            format: MapFormat::Png,
            size,
            time: date,
        })
    }

    /// Query parameters in the order the service documents them.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("version", WMS_VERSION.to_string()),
            ("service", "WMS".to_string()),
            ("request", "GetMap".to_string()),
            ("format", self.format.to_mime().to_string()),
            ("STYLE", self.style.to_string()),
            ("bbox", self.bbox.wms_bbox()),
            ("CRS", self.crs.to_string()),
            ("HEIGHT", self.size.to_string()),
            ("WIDTH", self.size.to_string()),
        ];
        if let Some(time) = self.time {
            pairs.push(("TIME", format_date(time)));
        }
        pairs.push(("layers", self.layer.clone()));
        pairs
    }

    /// Render the query string. Every value is made of characters that are
    /// legal unescaped in a URL query (commas, slashes, colons included).
    pub fn to_query_string(&self) -> String {
        self.query_pairs()
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Full request URL against `endpoint`.
    pub fn to_url(&self, endpoint: &str) -> String {
        let sep = if endpoint.ends_with('?') || endpoint.ends_with('&') {
            ""
        } else if endpoint.contains('?') {
            "&"
        } else {
            "?"
        };
        format!("{}{}{}", endpoint, sep, self.to_query_string())
    }
}

fn is_query_safe(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
