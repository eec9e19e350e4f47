//! Generators for synthetic raster tiles.
//!
//! Tiles are built from explicit pixel histograms so tests can state exactly
//! how many pixels fall into each classification bucket.

use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};

/// Creates a grayscale tile whose pixels, in row-major order, are `values`.
///
/// # Panics
///
/// Panics if `values.len() != width * height`.
///
/// # Example
///
/// ```
/// use test_utils::gray_from_values;
///
/// let img = gray_from_values(2, 2, &[10, 10, 200, 200]);
/// assert_eq!(img.get_pixel(1, 1).0, [200]);
/// ```
pub fn gray_from_values(width: u32, height: u32, values: &[u8]) -> GrayImage {
    assert_eq!(
        values.len(),
        (width * height) as usize,
        "pixel count does not match dimensions"
    );
    GrayImage::from_raw(width, height, values.to_vec()).expect("buffer size checked above")
}

/// Creates a grayscale tile from a histogram.
///
/// Pixels are laid out in row-major order: `counts[0].1` pixels of value
/// `counts[0].0`, then the next bucket, and so on. Remaining pixels are set
/// to `fill`.
///
/// # Example
///
/// ```
/// use test_utils::gray_from_counts;
///
/// let img = gray_from_counts(4, 4, &[(128, 3), (75, 2)], 0);
/// assert_eq!(img.pixels().filter(|p| p.0[0] == 128).count(), 3);
/// assert_eq!(img.pixels().filter(|p| p.0[0] == 0).count(), 11);
/// ```
pub fn gray_from_counts(width: u32, height: u32, counts: &[(u8, usize)], fill: u8) -> GrayImage {
    let total = (width * height) as usize;
    let mut data = Vec::with_capacity(total);
    for &(value, count) in counts {
        data.extend(std::iter::repeat(value).take(count));
    }
    assert!(data.len() <= total, "histogram exceeds tile size");
    data.resize(total, fill);
    GrayImage::from_raw(width, height, data).expect("buffer sized to width * height")
}

/// Creates a uniform grayscale tile.
pub fn gray_uniform(width: u32, height: u32, value: u8) -> GrayImage {
    GrayImage::from_pixel(width, height, Luma([value]))
}

/// Creates a uniform RGB tile.
pub fn rgb_uniform(width: u32, height: u32, rgb: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb(rgb))
}

/// Encodes an image as PNG bytes, the way the remote service returns it.
pub fn encode_png(image: &DynamicImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("PNG encoding of an in-memory image");
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gray_from_counts_fills_remainder() {
        let img = gray_from_counts(3, 3, &[(200, 4)], 10);
        assert_eq!(img.pixels().filter(|p| p.0[0] == 200).count(), 4);
        assert_eq!(img.pixels().filter(|p| p.0[0] == 10).count(), 5);
    }

    #[test]
    #[should_panic(expected = "histogram exceeds tile size")]
    fn test_gray_from_counts_overflow() {
        gray_from_counts(2, 2, &[(1, 5)], 0);
    }

    #[test]
    fn test_encode_png_decodes_back() {
        let img = DynamicImage::ImageLuma8(gray_uniform(4, 4, 42));
        let bytes = encode_png(&img);
        let decoded = image::load_from_memory(&bytes).unwrap().to_luma8();
        assert!(decoded.pixels().all(|p| p.0[0] == 42));
    }
}
