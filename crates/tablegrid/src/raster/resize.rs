//! Longest-side bounding and resampling.

use image::imageops::FilterType;
use image::GrayImage;

/// Target size for an image whose longest side must lie in `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundedSize {
    pub width: u32,
    pub height: u32,
    /// `new / old` along the longest side; 1.0 when already in range.
    pub factor: f64,
}

/// Clamp the longest side into `[min_len, max_len]` and scale the other side
/// by the same factor (truncated).
pub fn bound_dimensions(width: u32, height: u32, min_len: u32, max_len: u32) -> BoundedSize {
    let (long, short) = if width >= height { (width, height) } else { (height, width) };
    let (new_long, factor) = if long < min_len {
        (min_len, min_len as f64 / long.max(1) as f64)
    } else if long > max_len {
        (max_len, max_len as f64 / long as f64)
    } else {
        (long, 1.0)
    };
    let new_short = (short as f64 * factor) as u32;
    if width >= height {
        BoundedSize { width: new_long, height: new_short, factor }
    } else {
        BoundedSize { width: new_short, height: new_long, factor }
    }
}

/// Resample to `(width, height)`: Catmull-Rom when enlarging, triangle
/// (area-like) when shrinking.
pub fn resize_gray(img: &GrayImage, width: u32, height: u32) -> GrayImage {
    if img.dimensions() == (width, height) {
        return img.clone();
    }
    let filter = if width as u64 * height as u64 > img.width() as u64 * img.height() as u64 {
        FilterType::CatmullRom
    } else {
        FilterType::Triangle
    };
    image::imageops::resize(img, width.max(1), height.max(1), filter)
}
