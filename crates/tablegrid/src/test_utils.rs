//! Shared fixtures for image-based unit tests: ruled grids on a light page,
//! matching templates and perspective warps.

use image::{GrayImage, Luma};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use nalgebra::Matrix3;

use crate::geometry::Segment;
use crate::raster::draw_segments;
use crate::template::{DataType, Rectangle, TableTemplate, TemplateId};

pub(crate) const PAPER: u8 = 235;
pub(crate) const INK: u8 = 25;

/// Column and row boundaries of a grid whose top-left corner is `origin`.
pub(crate) fn grid_boundaries(origin: [f64; 2], col_widths: &[f64], row_heights: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut xs = vec![origin[0]];
    for w in col_widths {
        xs.push(xs[xs.len() - 1] + w);
    }
    let mut ys = vec![origin[1]];
    for h in row_heights {
        ys.push(ys[ys.len() - 1] + h);
    }
    (xs, ys)
}

/// Render a ruled table: `stroke`-pixel dark lines on a light page.
pub(crate) fn render_grid(
    w: u32,
    h: u32,
    origin: [f64; 2],
    col_widths: &[f64],
    row_heights: &[f64],
    stroke: u32,
) -> GrayImage {
    let (xs, ys) = grid_boundaries(origin, col_widths, row_heights);
    let (left, right) = (xs[0], xs[xs.len() - 1]);
    let (top, bottom) = (ys[0], ys[ys.len() - 1]);
    let mut segments = Vec::new();
    for &y in &ys {
        segments.push(Segment::from_coords(left, y, right, y));
    }
    for &x in &xs {
        segments.push(Segment::from_coords(x, top, x, bottom));
    }

    let mut ink = GrayImage::new(w, h);
    draw_segments(&mut ink, &segments, stroke);
    GrayImage::from_fn(w, h, |x, y| {
        if ink.get_pixel(x, y)[0] > 0 {
            Luma([INK])
        } else {
            Luma([PAPER])
        }
    })
}

/// A template with one rectangle per grid cell, in template units,
/// ids assigned row-major from zero.
pub(crate) fn grid_template(id: i64, col_widths: &[f64], row_heights: &[f64]) -> TableTemplate {
    let (xs, ys) = grid_boundaries([0.0, 0.0], col_widths, row_heights);
    let mut rectangles = Vec::new();
    for r in 0..row_heights.len() {
        for c in 0..col_widths.len() {
            rectangles.push(Rectangle {
                id: (r * col_widths.len() + c) as i64,
                x0: xs[c],
                y0: ys[r],
                w: col_widths[c],
                h: row_heights[r],
                data_type: DataType::Bubble,
                options: None,
                aoi: None,
            });
        }
    }
    TableTemplate {
        id: TemplateId::Int(id),
        name: None,
        description: None,
        rectangles,
    }
}

/// Warp `img` into a `w × h` canvas with `h_src_to_dst`, filling uncovered
/// pixels with paper.
pub(crate) fn warp_gray(img: &GrayImage, h_src_to_dst: &Matrix3<f64>, w: u32, h: u32) -> GrayImage {
    let m = h_src_to_dst;
    let coeffs = [
        m[(0, 0)] as f32,
        m[(0, 1)] as f32,
        m[(0, 2)] as f32,
        m[(1, 0)] as f32,
        m[(1, 1)] as f32,
        m[(1, 2)] as f32,
        m[(2, 0)] as f32,
        m[(2, 1)] as f32,
        m[(2, 2)] as f32,
    ];
    let projection = Projection::from_matrix(coeffs).expect("invertible test warp");
    let mut out = GrayImage::from_pixel(w, h, Luma([PAPER]));
    warp_into(img, &projection, Interpolation::Bilinear, Luma([PAPER]), &mut out);
    out
}
