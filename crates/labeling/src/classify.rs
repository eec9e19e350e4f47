//! Pixel-intensity heuristics.
//!
//! All decisions are made on an 8-bit grayscale histogram of the tile, so the
//! classifiers are pure functions of pixel counts.

use std::fmt;

use image::{DynamicImage, GrayImage, Luma};
use serde::Serialize;

/// Upper bound of the "dark" (clear sky) intensity band, inclusive.
pub const CLEAR_MAX: u8 = 127;
/// Lower bound of the "light" (cloudy) intensity band, inclusive.
pub const CLOUDY_MIN: u8 = 128;
/// Gray level of water in the land/water map.
pub const WATER_LEVEL: u8 = 128;
/// Gray level of land in the land/water map.
pub const LAND_LEVEL: u8 = 75;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Weather {
    Clear,
    Cloudy,
}

impl Weather {
    pub fn as_str(&self) -> &'static str {
        match self {
            Weather::Clear => "clear",
            Weather::Cloudy => "cloudy",
        }
    }
}

impl fmt::Display for Weather {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Terrain {
    Land,
    Water,
}

impl Terrain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Terrain::Land => "land",
            Terrain::Water => "water",
        }
    }
}

impl fmt::Display for Terrain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Convert any decoded tile to 8-bit gray.
///
/// Uses BT.601 weights in 14-bit fixed point, which is what common imaging
/// libraries produce for a grayscale read. Exact gray levels matter here: the
/// land/water palette is matched on single values (75 and 128). Alpha is
/// dropped and single-channel 8-bit images pass through unchanged. 16-bit
/// samples are reduced by dropping the low byte, not by rounding.
pub fn to_gray(image: &DynamicImage) -> GrayImage {
    let high = |v: u16| (v >> 8) as u8;
    match image {
        DynamicImage::ImageLuma8(gray) => gray.clone(),
        DynamicImage::ImageLuma16(gray) => GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
            Luma([high(gray.get_pixel(x, y).0[0])])
        }),
        DynamicImage::ImageLumaA16(gray) => GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
            Luma([high(gray.get_pixel(x, y).0[0])])
        }),
        DynamicImage::ImageRgb16(rgb) => GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
            let [r, g, b] = rgb.get_pixel(x, y).0;
            Luma([bt601_luma(high(r), high(g), high(b))])
        }),
        DynamicImage::ImageRgba16(rgba) => GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| {
            let [r, g, b, _] = rgba.get_pixel(x, y).0;
            Luma([bt601_luma(high(r), high(g), high(b))])
        }),
        _ => {
            let rgb = image.to_rgb8();
            GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
                let [r, g, b] = rgb.get_pixel(x, y).0;
                Luma([bt601_luma(r, g, b)])
            })
        }
    }
}

/// `(4899 R + 9617 G + 1868 B + 8192) >> 14`
pub fn bt601_luma(r: u8, g: u8, b: u8) -> u8 {
    let y = 4899 * r as u32 + 9617 * g as u32 + 1868 * b as u32 + (1 << 13);
    (y >> 14) as u8
}

/// Count of pixels at each gray level.
#[derive(Clone, PartialEq, Eq)]
pub struct Histogram {
    bins: [u64; 256],
}

impl Histogram {
    pub fn of(gray: &GrayImage) -> Self {
        let mut bins = [0u64; 256];
        for p in gray.pixels() {
            bins[p.0[0] as usize] += 1;
        }
        Self { bins }
    }

    pub fn count(&self, level: u8) -> u64 {
        self.bins[level as usize]
    }

    /// Pixels with level in `lo..=hi`.
    pub fn count_range(&self, lo: u8, hi: u8) -> u64 {
        if lo > hi {
            return 0;
        }
        self.bins[lo as usize..=hi as usize].iter().sum()
    }

    pub fn nonzero(&self) -> u64 {
        self.count_range(1, 255)
    }
}

impl fmt::Debug for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let used: Vec<(usize, u64)> = self
            .bins
            .iter()
            .enumerate()
            .filter(|(_, n)| **n > 0)
            .map(|(level, n)| (level, *n))
            .collect();
        f.debug_struct("Histogram").field("bins", &used).finish()
    }
}

/// Clear when dark pixels strictly outnumber light ones; ties are cloudy.
pub fn classify_weather(hist: &Histogram) -> Weather {
    let dark = hist.count_range(0, CLEAR_MAX);
    let light = hist.count_range(CLOUDY_MIN, 255);
    if dark > light {
        Weather::Clear
    } else {
        Weather::Cloudy
    }
}

/// Water when water-level pixels strictly outnumber land-level ones; ties
/// (including a tile with neither level) are land.
pub fn classify_terrain(hist: &Histogram) -> Terrain {
    if hist.count(WATER_LEVEL) > hist.count(LAND_LEVEL) {
        Terrain::Water
    } else {
        Terrain::Land
    }
}

/// Minimum non-zero pixel count a reflectance tile needs to be kept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoDataThreshold {
    min_valid: f64,
}

impl NoDataThreshold {
    /// `fraction` of a `resolution` x `resolution` tile must be non-zero.
    pub fn new(resolution: u32, fraction: f64) -> Self {
        let pixels = resolution as f64 * resolution as f64;
        Self {
            min_valid: pixels * fraction,
        }
    }

    pub fn min_valid(&self) -> f64 {
        self.min_valid
    }

    /// True when the tile has too few valid pixels to be labeled.
    pub fn is_no_data(&self, hist: &Histogram) -> bool {
        (hist.nonzero() as f64) < self.min_valid
    }
}
