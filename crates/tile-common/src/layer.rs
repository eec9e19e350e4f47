//! Layer definitions for the remote tile service.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether a layer changes from day to day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporalMode {
    /// One snapshot per day, requested with a TIME parameter
    Daily,
    /// A single snapshot reused for every date
    Static,
}

impl TemporalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Static => "static",
        }
    }
}

/// A named raster source on the remote WMS.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Layer {
    /// Layer name exactly as the WMS `LAYERS` parameter expects it
    pub name: String,

    #[serde(default = "default_temporal")]
    pub temporal: TemporalMode,
}

fn default_temporal() -> TemporalMode {
    TemporalMode::Daily
}

impl Layer {
    pub fn new(name: impl Into<String>, temporal: TemporalMode) -> Self {
        Self {
            name: name.into(),
            temporal,
        }
    }

    pub fn daily(name: impl Into<String>) -> Self {
        Self::new(name, TemporalMode::Daily)
    }

    pub fn fixed(name: impl Into<String>) -> Self {
        Self::new(name, TemporalMode::Static)
    }

    pub fn is_daily(&self) -> bool {
        self.temporal == TemporalMode::Daily
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
