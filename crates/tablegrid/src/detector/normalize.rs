//! Perspective normalization: warp the quadrilateral spanned by a table's
//! corners onto an axis-aligned image of bounded size.

use image::{GrayImage, Luma};
use imageproc::geometric_transformations::{warp_into, Interpolation};
use nalgebra::Matrix3;

use super::config::DetectConfig;
use super::error::DetectError;
use crate::homography::{invert, to_projection};
use crate::raster::bound_dimensions;

/// A table rectified to its own pixel grid.
#[derive(Debug, Clone)]
pub(crate) struct NormalizedTable {
    pub image: GrayImage,
    /// Source-image corners `[tl, tr, br, bl]`.
    pub corners: [[f64; 2]; 4],
    /// Normalized table → source image.
    pub h_inv: Matrix3<f64>,
}

impl NormalizedTable {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Table size implied by its corners: mean horizontal extent of the top and
/// bottom walls, mean vertical extent of the side walls.
pub(crate) fn table_size(corners: &[[f64; 2]; 4]) -> (u32, u32) {
    let [tl, tr, br, bl] = *corners;
    let width = ((tr[0] - tl[0]).abs() + (br[0] - bl[0]).abs()) / 2.0;
    let height = ((bl[1] - tl[1]).abs() + (br[1] - tr[1]).abs()) / 2.0;
    (width as u32, height as u32)
}

pub(crate) fn normalize_table(
    gray: &GrayImage,
    corners: &[[f64; 2]; 4],
    cfg: &DetectConfig,
) -> Result<NormalizedTable, DetectError> {
    let (w, h) = table_size(corners);
    if w == 0 || h == 0 {
        return Err(DetectError::DegenerateTransform(format!("table collapsed to {w}x{h}")));
    }
    let size = bound_dimensions(w, h, cfg.table_bounds.min_len, cfg.table_bounds.max_len);
    let forward = cfg
        .solver()
        .quad_to_rect(corners, size.width as f64, size.height as f64)?;
    let inverse = invert(&forward)?;
    let projection = to_projection(&forward)?;

    let mut image = GrayImage::new(size.width, size.height);
    warp_into(gray, &projection, Interpolation::Bilinear, Luma([0]), &mut image);
    tracing::debug!(
        width = size.width,
        height = size.height,
        factor = size.factor,
        "table normalized"
    );
    Ok(NormalizedTable {
        image,
        corners: *corners,
        h_inv: inverse,
    })
}
