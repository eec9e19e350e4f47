//! Tile extents on the global EPSG:4326 grid.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A square tile on the whole-degree lat/lon grid.
///
/// Stored as the lower-left corner plus the edge length. WMS 1.3.0 with
/// EPSG:4326 uses latitude-first axis order, so the BBOX string is
/// `min_lat,min_lon,max_lat,max_lon`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileExtent {
    pub lat: i32,
    pub lon: i32,
    pub step: u32,
}

impl TileExtent {
    pub fn new(lat: i32, lon: i32, step: u32) -> Self {
        Self { lat, lon, step }
    }

    pub fn max_lat(&self) -> i32 {
        self.lat + self.step as i32
    }

    pub fn max_lon(&self) -> i32 {
        self.lon + self.step as i32
    }

    /// Render the WMS 1.3.0 BBOX parameter: "minlat,minlon,maxlat,maxlon"
    pub fn wms_bbox(&self) -> String {
        format!(
            "{},{},{},{}",
            self.lat,
            self.lon,
            self.max_lat(),
            self.max_lon()
        )
    }

    /// Parse a BBOX token produced by [`TileExtent::wms_bbox`].
    ///
    /// Both axes must span the same positive whole number of degrees.
    pub fn from_wms_string(s: &str) -> Result<Self, BboxParseError> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 4 {
            return Err(BboxParseError::InvalidFormat(s.to_string()));
        }

        let parse = |p: &str| -> Result<i32, BboxParseError> {
            p.parse()
                .map_err(|_| BboxParseError::InvalidNumber(p.to_string()))
        };

        let min_lat = parse(parts[0])?;
        let min_lon = parse(parts[1])?;
        let max_lat = parse(parts[2])?;
        let max_lon = parse(parts[3])?;

        let not_square = || BboxParseError::NotSquare(s.to_string());
        let lat_span = max_lat.checked_sub(min_lat).ok_or_else(not_square)?;
        let lon_span = max_lon.checked_sub(min_lon).ok_or_else(not_square)?;
        if lat_span <= 0 || lat_span != lon_span {
            return Err(not_square());
        }

        Ok(Self::new(min_lat, min_lon, lat_span as u32))
    }
}

impl fmt::Display for TileExtent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wms_bbox())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BboxParseError {
    #[error("Invalid BBOX format: {0}. Expected 'minlat,minlon,maxlat,maxlon'")]
    InvalidFormat(String),

    #[error("Invalid number in BBOX: {0}")]
    InvalidNumber(String),

    #[error("BBOX is not a square whole-degree tile: {0}")]
    NotSquare(String),
}
