//! Ruling detection on a normalized table.
//!
//! Every pass edge-detects the table at one Canny threshold, splits the edge
//! map into a horizontal and a vertical mask with thin directional kernels,
//! and runs the probabilistic Hough transform over a small grid of vote
//! thresholds and gap tolerances. Detections from all passes are merged by
//! rasterizing them thickly and fitting one segment per connected blob.

use image::{GrayImage, Luma};
use imageproc::morphology::{grayscale_close, grayscale_erode, grayscale_open, Mask};
use imageproc::region_labelling::{connected_components, Connectivity};

use super::config::GridLineConfig;
use crate::geometry::{horz_vert_intersections, principal_axis, sort_horizontal, sort_vertical, Segment};
use crate::hough::{probabilistic_hough, HoughParams};
use crate::raster::{dilated_edges, draw_segments, pre_blur, rect_mask};

/// Merged rulings of one table, sorted top-to-bottom and left-to-right.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct GridLines {
    pub horizontal: Vec<Segment>,
    pub vertical: Vec<Segment>,
}

impl GridLines {
    pub fn is_empty(&self) -> bool {
        self.horizontal.is_empty() && self.vertical.is_empty()
    }

    /// Crossing points, after extending every line by `extension_factor`.
    pub fn intersections(&self, extension_factor: f64) -> Vec<[f64; 2]> {
        horz_vert_intersections(&self.horizontal, &self.vertical, extension_factor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    /// Table extent along the ruling direction.
    fn extent(self, w: u32, h: u32) -> u32 {
        match self {
            Self::Horizontal => w,
            Self::Vertical => h,
        }
    }

    /// `(along, across)` structuring elements.
    fn kernels(self, len: u32) -> (Mask, Mask) {
        let (wide, tall) = (rect_mask(len, 1), rect_mask(1, len));
        match self {
            Self::Horizontal => (wide, tall),
            Self::Vertical => (tall, wide),
        }
    }

    fn accepts(self, s: &Segment, cfg: &GridLineConfig) -> bool {
        match self {
            Self::Horizontal => s.is_horizontal(cfg.max_horizontal_slope),
            Self::Vertical => s.is_vertical(cfg.min_vertical_slope),
        }
    }

    /// The table's own walls along this axis, one pixel inside the image.
    fn borders(self, w: u32, h: u32) -> [Segment; 2] {
        let (w, h) = (w as f64, h as f64);
        match self {
            Self::Horizontal => [
                Segment::from_coords(1.0, 1.0, w - 1.0, 1.0),
                Segment::from_coords(1.0, h - 1.0, w - 1.0, h - 1.0),
            ],
            Self::Vertical => [
                Segment::from_coords(1.0, 1.0, 1.0, h - 1.0),
                Segment::from_coords(w - 1.0, 1.0, w - 1.0, h - 1.0),
            ],
        }
    }
}

/// Detect and merge the rulings of a normalized table.
pub(crate) fn detect_grid_lines(table: &GrayImage, cfg: &GridLineConfig) -> GridLines {
    let (w, h) = table.dimensions();
    let blurred = pre_blur(table);
    let mut horizontal = Vec::new();
    let mut vertical = Vec::new();
    for bank in [&cfg.short_bank, &cfg.long_bank] {
        for &high in &bank.canny_high {
            let edges = dilated_edges(&blurred, cfg.canny_low, high, bank.close, 0);
            horizontal.extend(axis_lines(&edges, Axis::Horizontal, bank.min_length_fraction, cfg));
            vertical.extend(axis_lines(&edges, Axis::Vertical, bank.min_length_fraction, cfg));
        }
    }
    tracing::trace!(
        raw_horizontal = horizontal.len(),
        raw_vertical = vertical.len(),
        "grid line passes done"
    );
    let lines = group_lines(&horizontal, &vertical, w, h, cfg);
    tracing::debug!(
        horizontal = lines.horizontal.len(),
        vertical = lines.vertical.len(),
        "grid lines merged"
    );
    lines
}

/// One pass along one axis: the richest Hough result over the threshold
/// grid, widening the gap tolerance only while too few distinct lines were
/// found. The table walls are appended whenever anything was found.
fn axis_lines(edges: &GrayImage, axis: Axis, min_length_fraction: f64, cfg: &GridLineConfig) -> Vec<Segment> {
    let (w, h) = edges.dimensions();
    let (along, across) = axis.kernels(cfg.directional_kernel);
    let mask = grayscale_close(&grayscale_open(&grayscale_erode(edges, &along), &along), &across);

    let extent = axis.extent(w, h) as f64;
    let min_len = (extent * min_length_fraction).trunc();
    let max_gap = ((extent * cfg.max_gap_fraction) as u32).max(cfg.min_gap_px);
    let base = HoughParams {
        theta: cfg.hough_theta,
        seed: cfg.hough_seed,
        ..HoughParams::default()
    }
    .with_min_line_length(min_len);

    let mut best: Vec<Segment> = Vec::new();
    for gap in [0, max_gap] {
        for &threshold in &cfg.hough_thresholds {
            let params = base.with_threshold(threshold).with_max_line_gap(gap);
            let found: Vec<Segment> = probabilistic_hough(&mask, &params)
                .into_iter()
                .filter(|s| axis.accepts(s, cfg))
                .collect();
            if found.len() > best.len() {
                best = found;
            }
        }
        if reduce_lines(&best, w, h, cfg.group_thickness).len() > cfg.min_lines {
            break;
        }
    }
    if !best.is_empty() {
        best.extend(axis.borders(w, h));
    }
    best
}

/// Collapse overlapping and near-duplicate segments.
///
/// Segments are drawn `thickness` pixels wide; each 8-connected blob becomes
/// one segment through its centroid along its principal axis, spanning the
/// blob's extent on that axis. Endpoints are clipped to the `w × h` image.
pub fn reduce_lines(lines: &[Segment], w: u32, h: u32, thickness: u32) -> Vec<Segment> {
    if lines.is_empty() || w == 0 || h == 0 {
        return Vec::new();
    }
    let mut mask = GrayImage::new(w, h);
    draw_segments(&mut mask, lines, thickness);

    let (x_max, y_max) = ((w - 1) as f64, (h - 1) as f64);
    blobs(&mask)
        .iter()
        .filter_map(|pixels| {
            let (c, angle) = principal_axis(pixels)?;
            let dir = [angle.cos(), angle.sin()];
            let (lo, hi) = pixels
                .iter()
                .map(|p| (p[0] - c[0]) * dir[0] + (p[1] - c[1]) * dir[1])
                .fold((f64::MAX, f64::MIN), |(lo, hi), t| (lo.min(t), hi.max(t)));
            let end = |t: f64| {
                [
                    (c[0] + t * dir[0]).round().clamp(0.0, x_max),
                    (c[1] + t * dir[1]).round().clamp(0.0, y_max),
                ]
            };
            Some(Segment::new(end(lo), end(hi)))
        })
        .collect()
}

/// Pixel coordinates of every 8-connected foreground region.
fn blobs(mask: &GrayImage) -> Vec<Vec<[f64; 2]>> {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));
    let mut out: Vec<Vec<[f64; 2]>> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0] as usize;
        if label == 0 {
            continue;
        }
        if out.len() < label {
            out.resize_with(label, Vec::new);
        }
        out[label - 1].push([x as f64, y as f64]);
    }
    out
}

/// Merge each orientation, then keep lines long enough and straight enough.
fn group_lines(horz: &[Segment], vert: &[Segment], w: u32, h: u32, cfg: &GridLineConfig) -> GridLines {
    let min_horz = cfg.min_length_fraction * w as f64;
    let min_vert = cfg.min_length_fraction * h as f64;
    let mut horizontal: Vec<Segment> = reduce_lines(horz, w, h, cfg.group_thickness)
        .into_iter()
        .filter(|s| s.length() >= min_horz && s.is_horizontal(cfg.max_horizontal_slope))
        .collect();
    let mut vertical: Vec<Segment> = reduce_lines(vert, w, h, cfg.group_thickness)
        .into_iter()
        .filter(|s| s.length() >= min_vert && s.is_vertical(cfg.min_vertical_slope))
        .collect();
    sort_horizontal(&mut horizontal);
    sort_vertical(&mut vertical);
    GridLines { horizontal, vertical }
}
