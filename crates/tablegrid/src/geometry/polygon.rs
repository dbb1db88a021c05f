//! Closed polygons: area, perimeter, moments centroid, interior-angle
//! accumulation, convex hull (by index), convexity defects, minimum-area
//! rectangle and Douglas-Peucker simplification.

use super::segment::{distance, distance_point_to_segment, Segment};

/// Absolute shoelace area of a closed polygon.
pub fn area(poly: &[[f64; 2]]) -> f64 {
    signed_area(poly).abs()
}

fn signed_area(poly: &[[f64; 2]]) -> f64 {
    if poly.len() < 3 {
        return 0.0;
    }
    let mut acc = 0.0;
    for i in 0..poly.len() {
        let a = poly[i];
        let b = poly[(i + 1) % poly.len()];
        acc += a[0] * b[1] - b[0] * a[1];
    }
    acc / 2.0
}

/// Length of the closed boundary.
pub fn perimeter(poly: &[[f64; 2]]) -> f64 {
    if poly.len() < 2 {
        return 0.0;
    }
    (0..poly.len())
        .map(|i| distance(&poly[i], &poly[(i + 1) % poly.len()]))
        .sum()
}

/// Centroid from the polygon's first-order moments, truncated to whole
/// pixels. Degenerate polygons fall back to the vertex mean.
pub fn centroid(poly: &[[f64; 2]]) -> [f64; 2] {
    let n = poly.len();
    if n == 0 {
        return [0.0, 0.0];
    }
    let mut m00 = 0.0;
    let mut m10 = 0.0;
    let mut m01 = 0.0;
    for i in 0..n {
        let a = poly[i];
        let b = poly[(i + 1) % n];
        let cross = a[0] * b[1] - b[0] * a[1];
        m00 += cross;
        m10 += (a[0] + b[0]) * cross;
        m01 += (a[1] + b[1]) * cross;
    }
    m00 /= 2.0;
    m10 /= 6.0;
    m01 /= 6.0;
    if m00.abs() < 1e-7 {
        let sx: f64 = poly.iter().map(|p| p[0]).sum();
        let sy: f64 = poly.iter().map(|p| p[1]).sum();
        return [(sx / n as f64).trunc(), (sy / n as f64).trunc()];
    }
    [(m10 / m00).trunc(), (m01 / m00).trunc()]
}

/// Unsigned angle (radians) at `p2` between rays `p2→p1` and `p2→p3`.
/// Zero-length rays contribute no angle.
pub fn angle_between(p1: &[f64; 2], p2: &[f64; 2], p3: &[f64; 2]) -> f64 {
    let ba = [p1[0] - p2[0], p1[1] - p2[1]];
    let bc = [p3[0] - p2[0], p3[1] - p2[1]];
    let norms = ba[0].hypot(ba[1]) * bc[0].hypot(bc[1]);
    if norms < f64::EPSILON {
        return 0.0;
    }
    ((ba[0] * bc[0] + ba[1] * bc[1]) / norms).clamp(-1.0, 1.0).acos()
}

/// Sum of the interior angles at every vertex of a closed polygon.
///
/// A rectangle accumulates 4·π/2; ragged outlines with many sharp turns
/// accumulate far more, which makes this a cheap squareness signal.
pub fn accumulate_angles(poly: &[[f64; 2]]) -> f64 {
    let n = poly.len();
    match n {
        0..=2 => 0.0,
        3 => {
            angle_between(&poly[0], &poly[1], &poly[2])
                + angle_between(&poly[1], &poly[2], &poly[0])
                + angle_between(&poly[2], &poly[0], &poly[1])
        }
        _ => (0..n)
            .map(|i| angle_between(&poly[i], &poly[(i + 1) % n], &poly[(i + 2) % n]))
            .sum(),
    }
}

// ── Convex hull & defects ────────────────────────────────────────────────

fn cross(o: &[f64; 2], a: &[f64; 2], b: &[f64; 2]) -> f64 {
    (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

/// Indices of the convex hull vertices (Andrew's monotone chain), sorted in
/// ascending contour order.
pub fn convex_hull_indices(points: &[[f64; 2]]) -> Vec<usize> {
    if points.len() < 3 {
        return (0..points.len()).collect();
    }
    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&a, &b| {
        points[a][0]
            .total_cmp(&points[b][0])
            .then_with(|| points[a][1].total_cmp(&points[b][1]))
    });

    let mut lower: Vec<usize> = Vec::new();
    for &i in &order {
        while lower.len() >= 2
            && cross(&points[lower[lower.len() - 2]], &points[lower[lower.len() - 1]], &points[i]) <= 0.0
        {
            lower.pop();
        }
        lower.push(i);
    }
    let mut upper: Vec<usize> = Vec::new();
    for &i in order.iter().rev() {
        while upper.len() >= 2
            && cross(&points[upper[upper.len() - 2]], &points[upper[upper.len() - 1]], &points[i]) <= 0.0
        {
            upper.pop();
        }
        upper.push(i);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower.sort_unstable();
    lower.dedup();
    lower
}

pub fn convex_hull(points: &[[f64; 2]]) -> Vec<[f64; 2]> {
    let mut idx = convex_hull_indices(points);
    // Re-walk in angular order for area/caliper consumers.
    let c = {
        let n = idx.len().max(1) as f64;
        let sx: f64 = idx.iter().map(|&i| points[i][0]).sum();
        let sy: f64 = idx.iter().map(|&i| points[i][1]).sum();
        [sx / n, sy / n]
    };
    idx.sort_by(|&a, &b| {
        let ta = (points[a][1] - c[1]).atan2(points[a][0] - c[0]);
        let tb = (points[b][1] - c[1]).atan2(points[b][0] - c[0]);
        ta.total_cmp(&tb)
    });
    idx.into_iter().map(|i| points[i]).collect()
}

/// A concavity between two consecutive hull vertices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvexityDefect {
    pub start: usize,
    pub end: usize,
    pub farthest: usize,
    pub depth: f64,
}

/// Contour indices strictly between `start` and `end`, walking forward and
/// wrapping past the end of the contour.
pub fn index_range_between(start: usize, end: usize, len: usize) -> Vec<usize> {
    if start > end {
        ((start + 1)..len).chain(0..end).collect()
    } else {
        ((start + 1)..end).collect()
    }
}

/// Convexity defects of `contour` relative to its hull (`hull` as returned
/// by [`convex_hull_indices`]). Only hull edges that skip over at least one
/// contour point with non-zero depth are reported.
pub fn convexity_defects(contour: &[[f64; 2]], hull: &[usize]) -> Vec<ConvexityDefect> {
    let n = contour.len();
    if hull.len() < 3 || n < 4 {
        return Vec::new();
    }
    let mut defects = Vec::new();
    for k in 0..hull.len() {
        let start = hull[k];
        let end = hull[(k + 1) % hull.len()];
        let between = index_range_between(start, end, n);
        if between.is_empty() {
            continue;
        }
        let edge = Segment::new(contour[start], contour[end]);
        let mut best = (between[0], 0.0f64);
        for &i in &between {
            let d = distance_point_to_segment(&contour[i], &edge);
            if d > best.1 {
                best = (i, d);
            }
        }
        if best.1 > 0.0 {
            defects.push(ConvexityDefect {
                start,
                end,
                farthest: best.0,
                depth: best.1,
            });
        }
    }
    defects
}

// ── Minimum-area rectangle ───────────────────────────────────────────────

/// Rotated rectangle of minimum area enclosing a point set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinAreaRect {
    pub center: [f64; 2],
    pub width: f64,
    pub height: f64,
    /// Orientation of the `width` side, radians.
    pub angle: f64,
}

impl MinAreaRect {
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// `min side / max side`, in `[0, 1]`.
    pub fn aspect_ratio(&self) -> f64 {
        self.width.min(self.height) / (self.width.max(self.height) + 1e-7)
    }
}

/// Rotating calipers over the convex hull.
pub fn min_area_rect(points: &[[f64; 2]]) -> MinAreaRect {
    let hull = convex_hull(points);
    if hull.len() < 3 {
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (f64::MAX, f64::MIN, f64::MAX, f64::MIN);
        for p in points {
            min_x = min_x.min(p[0]);
            max_x = max_x.max(p[0]);
            min_y = min_y.min(p[1]);
            max_y = max_y.max(p[1]);
        }
        if points.is_empty() {
            return MinAreaRect {
                center: [0.0, 0.0],
                width: 0.0,
                height: 0.0,
                angle: 0.0,
            };
        }
        return MinAreaRect {
            center: [(min_x + max_x) / 2.0, (min_y + max_y) / 2.0],
            width: max_x - min_x,
            height: max_y - min_y,
            angle: 0.0,
        };
    }

    let n = hull.len();
    let mut best: Option<MinAreaRect> = None;
    for i in 0..n {
        let a = hull[i];
        let b = hull[(i + 1) % n];
        let len = distance(&a, &b);
        if len < f64::EPSILON {
            continue;
        }
        let (ux, uy) = ((b[0] - a[0]) / len, (b[1] - a[1]) / len);
        let (vx, vy) = (-uy, ux);

        let (mut min_u, mut max_u, mut min_v, mut max_v) = (f64::MAX, f64::MIN, f64::MAX, f64::MIN);
        for p in &hull {
            let du = ux * (p[0] - a[0]) + uy * (p[1] - a[1]);
            let dv = vx * (p[0] - a[0]) + vy * (p[1] - a[1]);
            min_u = min_u.min(du);
            max_u = max_u.max(du);
            min_v = min_v.min(dv);
            max_v = max_v.max(dv);
        }
        let width = max_u - min_u;
        let height = max_v - min_v;
        if best.map_or(true, |r| width * height < r.area()) {
            let cu = (min_u + max_u) / 2.0;
            let cv = (min_v + max_v) / 2.0;
            best = Some(MinAreaRect {
                center: [a[0] + cu * ux + cv * vx, a[1] + cu * uy + cv * vy],
                width,
                height,
                angle: uy.atan2(ux),
            });
        }
    }
    best.unwrap_or(MinAreaRect {
        center: hull[0],
        width: 0.0,
        height: 0.0,
        angle: 0.0,
    })
}

// ── Simplification ───────────────────────────────────────────────────────

fn douglas_peucker(points: &[[f64; 2]], epsilon: f64, out: &mut Vec<[f64; 2]>) {
    if points.len() < 3 {
        out.push(points[0]);
        return;
    }
    let last = points.len() - 1;
    let chord = Segment::new(points[0], points[last]);
    let mut split = (0usize, -1.0f64);
    for (i, p) in points.iter().enumerate().take(last).skip(1) {
        let d = distance_point_to_segment(p, &chord);
        if d > split.1 {
            split = (i, d);
        }
    }
    if split.1 > epsilon {
        douglas_peucker(&points[..=split.0], epsilon, out);
        douglas_peucker(&points[split.0..], epsilon, out);
    } else {
        out.push(points[0]);
    }
}

/// Douglas-Peucker simplification of a closed polygon.
///
/// The curve is split at the vertex farthest from the first one and each
/// half simplified separately, so the result does not depend on a single
/// closing chord.
pub fn approximate_polygon(poly: &[[f64; 2]], epsilon: f64) -> Vec<[f64; 2]> {
    if poly.len() < 3 {
        return poly.to_vec();
    }
    let far = (1..poly.len())
        .max_by(|&a, &b| distance(&poly[0], &poly[a]).total_cmp(&distance(&poly[0], &poly[b])))
        .unwrap_or(1);

    let first: Vec<[f64; 2]> = poly[..=far].to_vec();
    let mut second: Vec<[f64; 2]> = poly[far..].to_vec();
    second.push(poly[0]);

    let mut out = Vec::new();
    douglas_peucker(&first, epsilon, &mut out);
    douglas_peucker(&second, epsilon, &mut out);
    out.dedup();
    if out.len() > 1 && out.first() == out.last() {
        out.pop();
    }
    out
}

/// Polygon approximation with tolerance `sqrt(area) * smooth_factor`.
pub fn approximate_by_area(poly: &[[f64; 2]], smooth_factor: f64) -> Vec<[f64; 2]> {
    approximate_polygon(poly, area(poly).sqrt() * smooth_factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::FRAC_PI_2;

    fn rect(x0: f64, y0: f64, w: f64, h: f64) -> Vec<[f64; 2]> {
        vec![[x0, y0], [x0 + w, y0], [x0 + w, y0 + h], [x0, y0 + h]]
    }

    #[test]
    fn rectangle_area_perimeter_centroid() {
        let r = rect(10.0, 20.0, 30.0, 40.0);
        assert_relative_eq!(area(&r), 1200.0);
        assert_relative_eq!(perimeter(&r), 140.0);
        assert_eq!(centroid(&r), [25.0, 40.0]);
    }

    #[test]
    fn rectangle_accumulates_four_right_angles() {
        let r = rect(0.0, 0.0, 50.0, 20.0);
        assert_relative_eq!(accumulate_angles(&r), 4.0 * FRAC_PI_2, epsilon = 1e-9);
        let tri = vec![[0.0, 0.0], [4.0, 0.0], [0.0, 3.0]];
        assert_relative_eq!(accumulate_angles(&tri), std::f64::consts::PI, epsilon = 1e-9);
    }

    #[test]
    fn aspect_ratio_of_random_rectangles_is_in_unit_interval() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let w = rng.gen_range(1.0..500.0);
            let h = rng.gen_range(1.0..500.0);
            let r = min_area_rect(&rect(rng.gen_range(-50.0..50.0), rng.gen_range(-50.0..50.0), w, h));
            let ar = r.aspect_ratio();
            assert!(ar > 0.0 && ar <= 1.0, "aspect {ar} for {w}x{h}");
            assert_relative_eq!(ar, w.min(h) / w.max(h), epsilon = 1e-6);
        }
    }

    #[test]
    fn min_area_rect_of_rotated_square() {
        let c = [100.0, 100.0];
        let t = 0.3f64;
        let pts: Vec<[f64; 2]> = [[-10.0, -10.0], [10.0, -10.0], [10.0, 10.0], [-10.0, 10.0]]
            .iter()
            .map(|p| {
                [
                    c[0] + p[0] * t.cos() - p[1] * t.sin(),
                    c[1] + p[0] * t.sin() + p[1] * t.cos(),
                ]
            })
            .collect();
        let r = min_area_rect(&pts);
        assert_relative_eq!(r.area(), 400.0, epsilon = 1e-6);
        assert_relative_eq!(r.center[0], 100.0, epsilon = 1e-9);
    }

    #[test]
    fn hull_of_notched_rectangle_skips_notch() {
        let pts = vec![
            [0.0, 0.0],
            [10.0, 0.0],
            [10.0, 10.0],
            [6.0, 10.0],
            [5.0, 6.0],
            [4.0, 10.0],
            [0.0, 10.0],
        ];
        let hull = convex_hull_indices(&pts);
        // collinear points on the top edge are not hull vertices
        assert_eq!(hull, vec![0, 1, 2, 6]);
        let defects = convexity_defects(&pts, &hull);
        assert_eq!(defects.len(), 1);
        assert_eq!(defects[0].farthest, 4);
        assert_relative_eq!(defects[0].depth, 4.0);
    }

    #[test]
    fn wrapping_index_range() {
        assert_eq!(index_range_between(5, 2, 7), vec![6, 0, 1]);
        assert_eq!(index_range_between(1, 4, 7), vec![2, 3]);
    }

    #[test]
    fn approximation_drops_collinear_points() {
        let mut pts = Vec::new();
        for x in 0..=20 {
            pts.push([x as f64 * 5.0, 0.0]);
        }
        for y in 1..=20 {
            pts.push([100.0, y as f64 * 5.0]);
        }
        for x in (0..20).rev() {
            pts.push([x as f64 * 5.0, 100.0]);
        }
        for y in (1..20).rev() {
            pts.push([0.0, y as f64 * 5.0]);
        }
        let approx = approximate_by_area(&pts, 0.02);
        assert_eq!(approx.len(), 4);
        assert_relative_eq!(area(&approx), 10_000.0);
    }
}
