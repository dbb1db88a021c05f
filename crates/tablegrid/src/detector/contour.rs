//! Table outline extraction.
//!
//! The page is edge-detected over a sweep of Canny thresholds. For every
//! edge map the contour hierarchy is searched for regions that own many
//! cell-like holes; those regions are smoothed, validated and collected.
//! The sweep keeps the edge configuration producing the most tables, and
//! among equals the largest and tightest ones.

use std::cmp::Ordering;
use std::collections::HashSet;

use image::GrayImage;

use super::config::ContourConfig;
use super::error::DetectError;
use crate::geometry::{
    accumulate_angles, approximate_by_area, area, convex_hull_indices, convexity_defects,
    distance_point_to_segment, index_range_between, min_area_rect, perimeter, Segment,
};
use crate::raster::{
    dilated_edges, fill_polygon, open_square, pre_blur, trace_contours, trace_outer_contours,
};

pub(crate) type Contour = Vec<[f64; 2]>;

/// Aggregate of one sweep step's accepted contours.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SetScore {
    count: usize,
    area: f64,
    rect_area: f64,
}

impl SetScore {
    const EMPTY: Self = Self {
        count: 0,
        area: f64::INFINITY,
        rect_area: f64::INFINITY,
    };

    fn of(contours: &[Contour]) -> Self {
        Self {
            count: contours.len(),
            area: contours.iter().map(|c| area(c)).sum(),
            rect_area: contours.iter().map(|c| min_area_rect(c).area()).sum(),
        }
    }

    /// Whether this set replaces the incumbent `best`.
    ///
    /// More tables always win. Fewer tables win only with at least the same
    /// total area. With as many tables, a smaller total area loses, and so
    /// does a near-equal area whose enclosing rectangles grew past
    /// `tie_factor`.
    fn beats(&self, best: &Self, tie_factor: f64) -> bool {
        match self.count.cmp(&best.count) {
            Ordering::Greater => true,
            Ordering::Less => self.area >= best.area,
            Ordering::Equal => {
                if self.area < best.area {
                    return false;
                }
                let similar = (self.area - best.area).abs() < self.area * (tie_factor - 1.0);
                !(similar && self.rect_area > best.rect_area * tie_factor)
            }
        }
    }
}

/// Find every table outline on the page.
///
/// Runs the threshold sweep, then once more with extra dilation if nothing
/// was found. Contours are in `gray`'s pixel coordinates.
pub(crate) fn extract_table_contours(
    gray: &GrayImage,
    cfg: &ContourConfig,
) -> Result<Vec<Contour>, DetectError> {
    let blurred = pre_blur(gray);
    let mut found = sweep(&blurred, cfg, 0);
    if found.is_empty() && cfg.extra_dilate_kernel > 1 {
        tracing::debug!(kernel = cfg.extra_dilate_kernel, "no table contour, retrying with extra dilation");
        found = sweep(&blurred, cfg, cfg.extra_dilate_kernel);
    }
    if found.is_empty() {
        return Err(DetectError::NoContoursFound);
    }
    Ok(found)
}

fn sweep(blurred: &GrayImage, cfg: &ContourConfig, extra_dilate: u32) -> Vec<Contour> {
    let mut best: Vec<Contour> = Vec::new();
    let mut best_score = SetScore::EMPTY;
    for &low in &cfg.canny_low {
        for &high in &cfg.canny_high {
            for &close in &cfg.close_flags {
                let edges = dilated_edges(blurred, low, high, close, extra_dilate);
                let found = table_candidates(&edges, cfg);
                if found.is_empty() {
                    continue;
                }
                let score = SetScore::of(&found);
                if score.beats(&best_score, cfg.min_rect_tie_factor) {
                    tracing::trace!(
                        low,
                        high,
                        close,
                        tables = score.count,
                        area = score.area,
                        "sweep candidate accepted"
                    );
                    best = found;
                    best_score = score;
                }
            }
        }
    }
    if !best.is_empty() {
        tracing::debug!(tables = best_score.count, area = best_score.area, "table contours selected");
    }
    best
}

/// Table-like regions of one dilated edge map.
fn table_candidates(edges: &GrayImage, cfg: &ContourConfig) -> Vec<Contour> {
    let (w, h) = edges.dimensions();
    let contours = trace_contours(edges);
    if contours.is_empty() {
        return Vec::new();
    }
    let areas: Vec<f64> = contours.iter().map(|c| area(&c.points)).collect();

    // Cell-like children per contour.
    let mut children = vec![0usize; contours.len()];
    for (i, c) in contours.iter().enumerate() {
        let Some(parent) = c.parent else { continue };
        if areas[parent] <= 0.0 || areas[i] / areas[parent] < cfg.min_cell_parent_fraction {
            continue;
        }
        let rect_area = min_area_rect(&c.points).area();
        if rect_area <= 0.0 || areas[i] / rect_area < cfg.min_cell_rect_fill {
            continue;
        }
        children[parent] += 1;
    }

    let mut order: Vec<usize> = (0..contours.len()).collect();
    order.sort_by_key(|&i| children[i]);

    let mut accepted = Vec::new();
    let mut ancestors: HashSet<usize> = HashSet::new();
    let mut added: HashSet<usize> = HashSet::new();
    let budget = (cfg.max_tables + 1).min(order.len().saturating_sub(1));
    for &idx in order.iter().rev().take(budget) {
        if children[idx] < cfg.min_children || ancestors.contains(&idx) {
            continue;
        }

        // Ancestors are recorded even when this candidate is rejected below.
        let mut nested_in_accepted = false;
        let mut parent = contours[idx].parent;
        while let Some(p) = parent {
            nested_in_accepted |= added.contains(&p);
            ancestors.insert(p);
            parent = contours[p].parent;
        }
        if nested_in_accepted {
            continue;
        }

        let Some(simplified) = simplify_contour(&contours[idx].points, w, h, cfg) else {
            continue;
        };
        if let Err(reason) = validate_contour(&simplified, w, h, cfg) {
            tracing::trace!(children = children[idx], reason, "table candidate rejected");
            continue;
        }
        added.insert(idx);
        accepted.push(simplified);
    }
    accepted
}

/// Fill the contour and open it with a square kernel proportional to its
/// size, removing thin appendages. Returns the largest remaining outline.
fn simplify_contour(points: &[[f64; 2]], w: u32, h: u32, cfg: &ContourConfig) -> Option<Contour> {
    let side = (area(points).sqrt() * cfg.simplification_factor) as u32;
    let kernel = side.max(cfg.min_simplification_kernel);

    let mut mask = GrayImage::new(w, h);
    fill_polygon(&mut mask, points);
    let opened = open_square(&mask, kernel);

    let mut best: Option<(f64, Contour)> = None;
    for c in trace_outer_contours(&opened) {
        let a = area(&c);
        if best.as_ref().map_or(true, |(ba, _)| a > *ba) {
            best = Some((a, c));
        }
    }
    best.map(|(_, c)| c)
}

/// Geometric gates for a simplified table outline in a `w × h` image.
fn validate_contour(contour: &[[f64; 2]], w: u32, h: u32, cfg: &ContourConfig) -> Result<(), &'static str> {
    if contour.len() < 4 {
        return Err("fewer than four points");
    }
    let poly = approximate_by_area(contour, cfg.smooth_factor);
    if poly.len() < 4 {
        return Err("polygon has fewer than four vertices");
    }
    if min_area_rect(&poly).aspect_ratio() < cfg.min_aspect_ratio {
        return Err("too elongated");
    }
    let a = area(contour);
    if a <= 0.0 || a / (w as f64 * h as f64) < cfg.min_area_fraction {
        return Err("too small");
    }
    if perimeter(contour) / a > cfg.max_perimeter_area_ratio {
        return Err("perimeter too long for its area");
    }
    if accumulate_angles(&poly) > cfg.max_poly_angle {
        return Err("too many turns");
    }
    let opened = open_hull_defects(&poly, cfg.defect_chord_distance, cfg.max_defect_span);
    if accumulate_angles(&opened) > cfg.max_open_angle {
        return Err("too many turns after filling defects");
    }
    Ok(())
}

/// Drop the vertices inside convexity defects that are really missing
/// outer walls: either some vertex of the defect lies within
/// `chord_distance` of the hull chord, or the defect spans at most
/// `max_span` vertices.
pub(crate) fn open_hull_defects(poly: &[[f64; 2]], chord_distance: f64, max_span: usize) -> Contour {
    let hull = convex_hull_indices(poly);
    if hull.len() <= 3 {
        return poly.to_vec();
    }
    let n = poly.len();
    let mut removed = vec![false; n];
    for d in convexity_defects(poly, &hull) {
        let range = index_range_between(d.start, d.end, n);
        let chord = Segment::new(poly[d.start], poly[d.end]);
        let touches = range
            .iter()
            .any(|&i| distance_point_to_segment(&poly[i], &chord) < chord_distance);
        if touches || range.len() <= max_span {
            for i in range {
                removed[i] = true;
            }
        }
    }
    poly.iter()
        .zip(&removed)
        .filter(|(_, &r)| !r)
        .map(|(p, _)| *p)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{render_grid, PAPER};
    use std::f64::consts::FRAC_PI_2;

    fn fast_config() -> ContourConfig {
        ContourConfig {
            canny_low: vec![30.0],
            canny_high: vec![150.0, 100.0],
            close_flags: vec![false],
            ..ContourConfig::default()
        }
    }

    fn score(count: usize, area: f64, rect_area: f64) -> SetScore {
        SetScore { count, area, rect_area }
    }

    #[test]
    fn sweep_tie_break_rules() {
        let best = score(2, 1000.0, 1100.0);
        assert!(score(3, 10.0, 10.0).beats(&best, 1.02));
        assert!(!score(1, 999.0, 999.0).beats(&best, 1.02));
        assert!(score(1, 1000.0, 5000.0).beats(&best, 1.02));
        assert!(!score(2, 990.0, 990.0).beats(&best, 1.02));
        // Similar area but a looser enclosing rectangle.
        assert!(!score(2, 1010.0, 1200.0).beats(&best, 1.02));
        assert!(score(2, 1010.0, 1110.0).beats(&best, 1.02));
        assert!(score(2, 1100.0, 1300.0).beats(&best, 1.02));
        assert!(score(1, 5.0, 5.0).beats(&SetScore::EMPTY, 1.02));
    }

    #[test]
    fn blank_page_has_no_table() {
        let page = GrayImage::from_pixel(400, 300, image::Luma([PAPER]));
        assert_eq!(
            extract_table_contours(&page, &fast_config()),
            Err(DetectError::NoContoursFound)
        );
    }

    #[test]
    fn ruled_grid_yields_one_table() {
        let cols = [80.0; 6];
        let rows = [60.0; 5];
        let page = render_grid(640, 480, [80.0, 60.0], &cols, &rows, 3);
        let found = extract_table_contours(&page, &fast_config()).unwrap();
        assert_eq!(found.len(), 1);
        let a = area(&found[0]);
        let expected = 480.0 * 300.0;
        assert!((a - expected).abs() / expected < 0.08, "area {a}");
    }

    #[test]
    fn validation_gates() {
        let cfg = ContourConfig::default();
        let rect = |x0: f64, y0: f64, w: f64, h: f64| vec![[x0, y0], [x0 + w, y0], [x0 + w, y0 + h], [x0, y0 + h]];
        assert_eq!(validate_contour(&rect(100.0, 100.0, 500.0, 300.0), 800, 600, &cfg), Ok(()));
        assert_eq!(
            validate_contour(&rect(100.0, 100.0, 600.0, 100.0), 800, 600, &cfg),
            Err("too elongated")
        );
        assert_eq!(
            validate_contour(&rect(100.0, 100.0, 60.0, 60.0), 800, 600, &cfg),
            Err("too small")
        );
        assert_eq!(
            validate_contour(&rect(0.0, 0.0, 5.0, 5.0)[..3], 800, 600, &cfg),
            Err("fewer than four points")
        );
    }

    #[test]
    fn notch_in_bottom_wall_is_opened() {
        let poly = vec![
            [0.0, 0.0],
            [100.0, 0.0],
            [100.0, 100.0],
            [55.0, 100.0],
            [52.0, 40.0],
            [48.0, 40.0],
            [45.0, 100.0],
            [0.0, 100.0],
        ];
        let opened = open_hull_defects(&poly, 4.0, 2);
        assert_eq!(opened, vec![[0.0, 0.0], [100.0, 0.0], [100.0, 100.0], [0.0, 100.0]]);
        assert!((accumulate_angles(&opened) - 4.0 * FRAC_PI_2).abs() < 1e-9);
        assert!(accumulate_angles(&poly) > accumulate_angles(&opened));
    }
}
