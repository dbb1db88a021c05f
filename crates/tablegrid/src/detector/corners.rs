//! Four-corner estimation for a table outline.
//!
//! The smoothed outline is rasterized and searched for near-horizontal and
//! near-vertical segments. Their pairwise intersections are grouped by
//! quadrant around the outline's centroid, and each quadrant is reduced to
//! its outermost cluster center.

use image::GrayImage;

use super::config::CornerConfig;
use super::contour::Contour;
use super::error::DetectError;
use crate::geometry::{
    approximate_by_area, area, centroid, distance, horz_vert_intersections, kmeans,
    min_area_rect, split_quadrants, squared_distance, Segment,
};
use crate::hough::{probabilistic_hough, HoughParams};
use crate::raster::draw_closed_polyline;

/// Smoothing tolerance of the outline before it is rasterized, as a fraction
/// of `sqrt(area)`.
const OUTLINE_SMOOTH_FACTOR: f64 = 0.02;

/// Corners `[tl, tr, br, bl]` of every contour that yields four of them,
/// in input order.
pub(crate) fn table_corners(
    contours: &[Contour],
    width: u32,
    height: u32,
    cfg: &CornerConfig,
) -> Result<Vec<[[f64; 2]; 4]>, DetectError> {
    let corners: Vec<_> = contours
        .iter()
        .filter_map(|c| estimate_corners(c, width, height, cfg))
        .collect();
    if corners.is_empty() {
        return Err(DetectError::NoCornersFound);
    }
    Ok(corners)
}

/// Corners `[tl, tr, br, bl]` of one outline in a `width × height` image.
pub(crate) fn estimate_corners(
    contour: &[[f64; 2]],
    width: u32,
    height: u32,
    cfg: &CornerConfig,
) -> Option<[[f64; 2]; 4]> {
    let center = centroid(contour);
    let rect = min_area_rect(contour);
    let poly = approximate_by_area(contour, OUTLINE_SMOOTH_FACTOR);

    let mut mask = GrayImage::new(width, height);
    draw_closed_polyline(&mut mask, &poly, cfg.stroke_thickness);

    let base = HoughParams {
        theta: cfg.hough_theta,
        threshold: cfg.hough_threshold,
        seed: cfg.hough_seed,
        ..HoughParams::default()
    };
    let horz = oriented_lines(&mask, base.with_min_line_length(rect.width * cfg.min_line_length_fraction))?
        .into_iter()
        .filter(|s| s.is_horizontal(cfg.max_horizontal_slope))
        .collect::<Vec<_>>();
    let vert = oriented_lines(&mask, base.with_min_line_length(rect.height * cfg.min_line_length_fraction))?
        .into_iter()
        .filter(|s| s.is_vertical(cfg.min_vertical_slope))
        .collect::<Vec<_>>();

    let points = horz_vert_intersections(&horz, &vert, cfg.extension_factor);
    if points.len() < 4 {
        tracing::debug!(points = points.len(), "too few line intersections for corners");
        return None;
    }
    let Some(quadrants) = split_quadrants(&points, center) else {
        tracing::debug!("a quadrant has no line intersection");
        return None;
    };

    let mut corners = [[0.0; 2]; 4];
    for (corner, quadrant) in corners.iter_mut().zip(&quadrants) {
        *corner = if quadrant.len() == 1 {
            quadrant[0]
        } else {
            outermost(&kmeans(quadrant, &cfg.kmeans), &center)?
        };
    }
    lower_top_corners(&mut corners, contour);
    Some(corners)
}

fn oriented_lines(mask: &GrayImage, params: HoughParams) -> Option<Vec<Segment>> {
    let lines = probabilistic_hough(mask, &params);
    (!lines.is_empty()).then_some(lines)
}

/// The center farthest from `center`; the first one wins ties.
fn outermost(centers: &[[f64; 2]], center: &[f64; 2]) -> Option<[f64; 2]> {
    let first = *centers.first()?;
    let mut best = (first, 0.0);
    for c in centers {
        let d = distance(center, c);
        if d > best.1 {
            best = (*c, d);
        }
    }
    Some(best.0)
}

fn nearest_index(point: &[f64; 2], contour: &[[f64; 2]]) -> usize {
    let mut best = (0usize, f64::INFINITY);
    for (i, p) in contour.iter().enumerate() {
        let d = squared_distance(point, p);
        if d < best.1 {
            best = (i, d);
        }
    }
    best.0
}

/// The top wall of a photographed table tends to bow. Lower both top
/// corners by the farthest the top wall dips below the line joining them.
///
/// Each top corner is pinned to its nearest outline point. Of the two arcs
/// of the outline between those points, the one with the smaller vertical
/// spread is taken as the top wall.
fn lower_top_corners(corners: &mut [[f64; 2]; 4], contour: &[[f64; 2]]) {
    let a = nearest_index(&corners[0], contour);
    let b = nearest_index(&corners[1], contour);
    let (lo, hi) = (a.min(b), a.max(b));

    let (inner, outer): (Vec<(usize, &[f64; 2])>, Vec<(usize, &[f64; 2])>) =
        contour.iter().enumerate().partition(|(i, _)| (lo..=hi).contains(i));
    let y_spread = |part: &[(usize, &[f64; 2])]| {
        let (min, max) = part
            .iter()
            .fold((f64::INFINITY, 0.0f64), |(mn, mx), (_, p)| (mn.min(p[1]), mx.max(p[1])));
        max - min
    };
    // The wall between the two corners varies least in y.
    let top = if y_spread(&inner[..]) > y_spread(&outer[..]) { outer } else { inner };

    let (slope, intercept) = Segment::new(corners[0], corners[1]).slope_intercept();
    let dip = top
        .iter()
        .map(|(_, p)| p[1] - (slope * p[0] + intercept))
        .filter(|d| *d >= 0.0)
        .fold(0.0f64, f64::max)
        .ceil();
    corners[0][1] += dip;
    corners[1][1] += dip;
}

/// Area of the quadrilateral spanned by `corners`.
pub(crate) fn quad_area(corners: &[[f64; 2]; 4]) -> f64 {
    area(corners)
}
