//! Mapping fitted cells from the normalized table back into the source
//! image.

use nalgebra::Matrix3;

use super::config::DetectConfig;
use super::error::DetectError;
use super::fitting::FittedRectangle;
use super::normalize::NormalizedTable;
use crate::homography::project_finite;
use crate::template::{DataType, TableTemplate};

/// One table cell in source-image pixels.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ReprojectedCell {
    pub rect_id: i64,
    /// Cell corners, each reprojected on its own.
    pub tl: [i32; 2],
    pub tr: [i32; 2],
    pub br: [i32; 2],
    pub bl: [i32; 2],
    /// Axis-aligned box of the cell, inside the table's bounding box and
    /// the image.
    pub x0: i32,
    pub y0: i32,
    pub w: i32,
    pub h: i32,
    pub data_type: DataType,
    #[serde(rename = "opts", default, skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,
    /// Whether every wall of the cell was found on a detected ruling.
    pub fitted: bool,
}

fn truncated(p: [f64; 2]) -> [i32; 2] {
    [p[0] as i32, p[1] as i32]
}

fn project_corners(h: &Matrix3<f64>, quad: &[[f64; 2]; 4], rect_id: i64) -> Result<[[i32; 2]; 4], DetectError> {
    let mut out = [[0; 2]; 4];
    for (o, p) in out.iter_mut().zip(quad) {
        let q = project_finite(h, p).ok_or_else(|| {
            DetectError::InvalidCellGeometry(format!("cell {rect_id} projects to infinity"))
        })?;
        *o = truncated(q);
    }
    Ok(out)
}

/// Reproject `cells` of `table` into a source image of
/// `image_width × image_height`.
///
/// Every corner goes through the inverse table homography. The axis-aligned
/// boxes keep each cell's relative position in the normalized table,
/// rescaled onto the bounding box of all reprojected corners. A box
/// narrower or shorter than `min_cell_size_px`, before or after clipping
/// to the image, fails the whole table.
pub(crate) fn reproject_cells(
    cells: &[FittedRectangle],
    table: &NormalizedTable,
    image_width: u32,
    image_height: u32,
    min_cell_size_px: i32,
) -> Result<Vec<ReprojectedCell>, DetectError> {
    let (table_w, table_h) = (table.width() as f64, table.height() as f64);
    let mut projected = Vec::with_capacity(cells.len());
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (i32::MAX, i32::MAX, 0i32, 0i32);
    for cell in cells {
        let rect = cell.rect();
        let [tl, tr, br, bl] = project_corners(&table.h_inv, &rect.quad(), cell.rectangle.id)?;
        min_x = min_x.min(tl[0]).min(bl[0]);
        min_y = min_y.min(tl[1]).min(tr[1]);
        max_x = max_x.max(tr[0]).max(br[0]);
        max_y = max_y.max(br[1]).max(bl[1]);
        projected.push((cell, [tl, tr, br, bl]));
    }
    if max_x == 0 || max_y == 0 || min_x >= max_x || min_y >= max_y {
        return Err(DetectError::InvalidCellGeometry(format!(
            "reprojected table spans ({min_x}, {min_y})-({max_x}, {max_y})"
        )));
    }
    let (span_w, span_h) = (max_x - min_x, max_y - min_y);

    projected
        .into_iter()
        .map(|(cell, [tl, tr, br, bl])| {
            let r = cell.rect();
            let id = cell.rectangle.id;
            let mut x0 = (r.x0 / table_w * span_w as f64) as i32;
            let mut y0 = (r.y0 / table_h * span_h as f64) as i32;
            let mut w = (r.w / table_w * span_w as f64) as i32;
            let mut h = (r.h / table_h * span_h as f64) as i32;
            if w < min_cell_size_px || h < min_cell_size_px {
                return Err(DetectError::InvalidCellGeometry(format!(
                    "cell {id} collapsed to {w}x{h} px"
                )));
            }
            x0 = x0.min(span_w);
            y0 = y0.min(span_h);
            w = w.min(span_w - x0);
            h = h.min(span_h - y0);

            let left = (min_x + x0).max(0);
            let top = (min_y + y0).max(0);
            let right = (min_x + x0 + w).min(image_width as i32);
            let bottom = (min_y + y0 + h).min(image_height as i32);
            if right <= left || bottom <= top {
                return Err(DetectError::InvalidCellGeometry(format!(
                    "cell {id} lies outside the image"
                )));
            }
            if right - left < min_cell_size_px || bottom - top < min_cell_size_px {
                return Err(DetectError::InvalidCellGeometry(format!(
                    "cell {id} clipped to {}x{} px at the image border",
                    right - left,
                    bottom - top
                )));
            }
            Ok(ReprojectedCell {
                rect_id: id,
                tl,
                tr,
                br,
                bl,
                x0: left,
                y0: top,
                w: right - left,
                h: bottom - top,
                data_type: cell.rectangle.data_type,
                options: cell.rectangle.options.clone(),
                fitted: cell.fitted,
            })
        })
        .collect()
}

/// Project every rectangle of `template` straight onto the table spanned by
/// source `corners` (`[tl, tr, br, bl]`), without looking for rulings.
pub(crate) fn project_template(
    template: &TableTemplate,
    corners: &[[f64; 2]; 4],
    cfg: &DetectConfig,
) -> Result<Vec<ReprojectedCell>, DetectError> {
    let (tw, th) = template.dimensions();
    let extent = [[0.0, 0.0], [tw, 0.0], [tw, th], [0.0, th]];
    let h = cfg.solver().quad(&extent, corners)?;
    template
        .rectangles
        .iter()
        .map(|r| {
            let quad = project_corners(&h, &r.rect().quad(), r.id)?;
            let xs = quad.map(|p| p[0]);
            let ys = quad.map(|p| p[1]);
            let (x0, y0) = (xs.into_iter().min().unwrap_or(0), ys.into_iter().min().unwrap_or(0));
            let (x1, y1) = (xs.into_iter().max().unwrap_or(0), ys.into_iter().max().unwrap_or(0));
            let [tl, tr, br, bl] = quad;
            Ok(ReprojectedCell {
                rect_id: r.id,
                tl,
                tr,
                br,
                bl,
                x0,
                y0,
                w: x1 - x0,
                h: y1 - y0,
                data_type: r.data_type,
                options: r.options.clone(),
                fitted: false,
            })
        })
        .collect()
}
