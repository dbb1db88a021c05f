//! Line segments: orientation-based intersection, distances, slopes and
//! the horizontal/vertical helpers used by corner and grid-line detection.

/// Tiny offset added to slope denominators so vertical segments keep a
/// finite (very large) slope.
pub const SLOPE_EPS: f64 = 1e-6;

/// Directed segment between two points in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Segment {
    pub p1: [f64; 2],
    pub p2: [f64; 2],
}

impl Segment {
    pub fn new(p1: [f64; 2], p2: [f64; 2]) -> Self {
        Self { p1, p2 }
    }

    pub fn from_coords(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::new([x1, y1], [x2, y2])
    }

    pub fn length(&self) -> f64 {
        distance(&self.p1, &self.p2)
    }

    /// `dy / (dx + eps)`.
    pub fn slope(&self) -> f64 {
        (self.p2[1] - self.p1[1]) / (self.p2[0] - self.p1[0] + SLOPE_EPS)
    }

    /// Slope and y-intercept of the supporting line `y = a*x + b`.
    pub fn slope_intercept(&self) -> (f64, f64) {
        let slope = self.slope();
        (slope, self.p1[1] - slope * self.p1[0])
    }

    pub fn is_horizontal(&self, max_slope: f64) -> bool {
        self.slope().abs() < max_slope
    }

    pub fn is_vertical(&self, min_slope: f64) -> bool {
        self.slope().abs() > min_slope
    }

    pub fn mid_y(&self) -> f64 {
        (self.p1[1] + self.p2[1]) / 2.0
    }

    pub fn mid_x(&self) -> f64 {
        (self.p1[0] + self.p2[0]) / 2.0
    }

    /// y of the supporting line at `x`, or `None` when `x` falls outside the
    /// segment's x-range.
    pub fn y_at_x(&self, x: f64) -> Option<f64> {
        let (x1, x2) = (self.p1[0], self.p2[0]);
        if x > x1.max(x2) || x < x1.min(x2) {
            return None;
        }
        let (slope, intercept) = self.slope_intercept();
        Some(slope * x + intercept)
    }

    /// x of the supporting line at `y`, or `None` when `y` falls outside the
    /// segment's y-range.
    pub fn x_at_y(&self, y: f64) -> Option<f64> {
        let (y1, y2) = (self.p1[1], self.p2[1]);
        if y > y1.max(y2) || y < y1.min(y2) {
            return None;
        }
        let (slope, intercept) = self.slope_intercept();
        Some((y - intercept) / (slope + 1e-8))
    }
}

pub fn distance(a: &[f64; 2], b: &[f64; 2]) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
}

pub fn squared_distance(a: &[f64; 2], b: &[f64; 2]) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)
}

// ── Intersection ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Orientation {
    Collinear,
    Clockwise,
    CounterClockwise,
}

fn orientation(p: &[f64; 2], q: &[f64; 2], r: &[f64; 2]) -> Orientation {
    let val = (q[1] - p[1]) * (r[0] - q[0]) - (q[0] - p[0]) * (r[1] - q[1]);
    if val == 0.0 {
        Orientation::Collinear
    } else if val > 0.0 {
        Orientation::Clockwise
    } else {
        Orientation::CounterClockwise
    }
}

/// `q` lies within the bounding box of `p`-`r` (used for collinear triples).
fn on_segment(p: &[f64; 2], q: &[f64; 2], r: &[f64; 2]) -> bool {
    q[0] <= p[0].max(r[0]) && q[0] >= p[0].min(r[0]) && q[1] <= p[1].max(r[1]) && q[1] >= p[1].min(r[1])
}

/// True when the two closed segments share at least one point.
pub fn segments_intersect(s1: &Segment, s2: &Segment) -> bool {
    let (p1, q1, p2, q2) = (&s1.p1, &s1.p2, &s2.p1, &s2.p2);
    let o1 = orientation(p1, q1, p2);
    let o2 = orientation(p1, q1, q2);
    let o3 = orientation(p2, q2, p1);
    let o4 = orientation(p2, q2, q1);

    if o1 != o2 && o3 != o4 {
        return true;
    }

    (o1 == Orientation::Collinear && on_segment(p1, p2, q1))
        || (o2 == Orientation::Collinear && on_segment(p1, q2, q1))
        || (o3 == Orientation::Collinear && on_segment(p2, p1, q2))
        || (o4 == Orientation::Collinear && on_segment(p2, q1, q2))
}

fn det(a: [f64; 2], b: [f64; 2]) -> f64 {
    a[0] * b[1] - a[1] * b[0]
}

/// Intersection point of two segments.
///
/// Returns `None` for disjoint segments and for parallel (including
/// overlapping collinear) segments, which have no single crossing point.
pub fn intersection_point(s1: &Segment, s2: &Segment) -> Option<[f64; 2]> {
    if !segments_intersect(s1, s2) {
        return None;
    }
    let xdiff = [s1.p1[0] - s1.p2[0], s2.p1[0] - s2.p2[0]];
    let ydiff = [s1.p1[1] - s1.p2[1], s2.p1[1] - s2.p2[1]];
    let div = det(xdiff, ydiff);
    if div == 0.0 {
        return None;
    }
    let d = [det(s1.p1, s1.p2), det(s2.p1, s2.p2)];
    Some([det(d, xdiff) / div, det(d, ydiff) / div])
}

/// Shortest distance from `point` to the closed segment.
pub fn distance_point_to_segment(point: &[f64; 2], segment: &Segment) -> f64 {
    let (a, b) = (segment.p1, segment.p2);
    let len = distance(&a, &b);
    let endpoint_dist = distance(&a, point).min(distance(&b, point));
    if len < f64::EPSILON {
        return endpoint_dist;
    }
    let ux = (b[0] - a[0]) / len;
    let uy = (b[1] - a[1]) / len;

    let cross = (b[0] - a[0]) * (a[1] - point[1]) - (b[1] - a[1]) * (a[0] - point[0]);
    let line_dist = cross.abs() / len;

    let along = ux * (point[0] - a[0]) + uy * (point[1] - a[1]);
    let foot = [a[0] + ux * along, a[1] + uy * along];
    let between_x = (a[0] <= foot[0] && foot[0] <= b[0]) || (b[0] <= foot[0] && foot[0] <= a[0]);
    let between_y = (a[1] <= foot[1] && foot[1] <= b[1]) || (b[1] <= foot[1] && foot[1] <= a[1]);
    if between_x && between_y {
        line_dist
    } else {
        endpoint_dist
    }
}

/// Index of the segment nearest to `point`, if it is closer than `max_dist`.
pub fn closest_segment_to_point(point: &[f64; 2], segments: &[Segment], max_dist: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, s) in segments.iter().enumerate() {
        let d = distance_point_to_segment(point, s);
        if best.map_or(true, |(_, bd)| d < bd) {
            best = Some((i, d));
        }
    }
    match best {
        Some((i, d)) if d < max_dist => Some(i),
        _ => None,
    }
}

// ── Extension & ordering ─────────────────────────────────────────────────

/// Lengthen each segment at both ends by `factor` times its length
/// (truncated to whole pixels), along its own direction.
pub fn extend_segments(segments: &[Segment], factor: f64) -> Vec<Segment> {
    segments
        .iter()
        .map(|s| {
            let (a, b) = if s.p2[0] < s.p1[0] { (s.p2, s.p1) } else { (s.p1, s.p2) };
            let ext = (distance(&a, &b) * factor).trunc();
            let theta = Segment::new(a, b).slope().atan();
            let (dx, dy) = (theta.cos() * ext, theta.sin() * ext);
            Segment::from_coords(
                (a[0] - dx).trunc(),
                (a[1] - dy).trunc(),
                (b[0] + dx).trunc(),
                (b[1] + dy).trunc(),
            )
        })
        .collect()
}

/// Stretch horizontal segments to span `x ∈ [0, width]` and vertical ones to
/// span `y ∈ [0, height]`.
pub fn extend_to_borders(
    horz: &[Segment],
    vert: &[Segment],
    width: f64,
    height: f64,
) -> (Vec<Segment>, Vec<Segment>) {
    let horz = horz
        .iter()
        .map(|s| {
            let (slope, intercept) = s.slope_intercept();
            Segment::from_coords(0.0, intercept.trunc(), width.trunc(), (slope * width + intercept).trunc())
        })
        .collect();
    let vert = vert
        .iter()
        .map(|s| {
            let (slope, intercept) = s.slope_intercept();
            Segment::from_coords(
                (-intercept / slope).trunc(),
                0.0,
                ((height - intercept) / slope).trunc(),
                height,
            )
        })
        .collect();
    (horz, vert)
}

/// Top-to-bottom by mean y.
pub fn sort_horizontal(segments: &mut [Segment]) {
    segments.sort_by(|a, b| a.mid_y().total_cmp(&b.mid_y()));
}

/// Left-to-right by mean x.
pub fn sort_vertical(segments: &mut [Segment]) {
    segments.sort_by(|a, b| a.mid_x().total_cmp(&b.mid_x()));
}

/// All crossing points between horizontal and vertical segments, optionally
/// after extending both sets by `extension_factor`. Coordinates are
/// truncated to whole pixels.
pub fn horz_vert_intersections(horz: &[Segment], vert: &[Segment], extension_factor: f64) -> Vec<[f64; 2]> {
    let (horz, vert) = if extension_factor > 0.0 {
        (extend_segments(horz, extension_factor), extend_segments(vert, extension_factor))
    } else {
        (horz.to_vec(), vert.to_vec())
    };
    let mut points = Vec::new();
    for h in &horz {
        for v in &vert {
            if let Some(p) = intersection_point(h, v) {
                points.push([p[0].trunc(), p[1].trunc()]);
            }
        }
    }
    points
}
