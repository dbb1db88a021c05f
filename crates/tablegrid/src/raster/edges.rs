//! Edge maps: light blur, Canny hysteresis, and the dilation used to join
//! ruling strokes into connected regions.

use image::GrayImage;
use imageproc::distance_transform::Norm;
use imageproc::morphology::grayscale_dilate;

use super::rect_mask;

/// Sigma matching a 5×5 Gaussian kernel.
const PRE_BLUR_SIGMA: f32 = 1.1;

/// The light blur applied before every Canny pass. Sweeps that run Canny
/// many times on one image blur once and reuse the result.
pub fn pre_blur(gray: &GrayImage) -> GrayImage {
    imageproc::filter::gaussian_blur_f32(gray, PRE_BLUR_SIGMA)
}

/// Canny edges of a [`pre_blur`]red image, dilated by a 3×3 square,
/// optionally closed, optionally dilated again by an `extra_dilate`-sided
/// square (0 or 1 disables).
pub fn dilated_edges(
    blurred: &GrayImage,
    low: f32,
    high: f32,
    close: bool,
    extra_dilate: u32,
) -> GrayImage {
    let edges = imageproc::edges::canny(blurred, low, high.max(low));
    let mut out = imageproc::morphology::dilate(&edges, Norm::LInf, 1);
    if close {
        out = imageproc::morphology::close(&out, Norm::LInf, 1);
    }
    if extra_dilate > 1 {
        out = grayscale_dilate(&out, &rect_mask(extra_dilate, extra_dilate));
    }
    out
}
