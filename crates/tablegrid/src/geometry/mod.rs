//! Stateless geometry used by every detector stage.
//!
//! Points are `[x, y]` pairs in whichever pixel space the caller works in
//! (source image, normalized table or template).

mod cluster;
mod polygon;
mod segment;

pub use cluster::{
    kmeans, nearest_indices, nearest_point, nearest_points, principal_axis, split_quadrants,
    KMeansParams,
};
pub use polygon::{
    accumulate_angles, angle_between, approximate_by_area, approximate_polygon, area, centroid,
    convex_hull, convex_hull_indices, convexity_defects, index_range_between, min_area_rect,
    perimeter, ConvexityDefect, MinAreaRect,
};
pub use segment::{
    closest_segment_to_point, distance, distance_point_to_segment, extend_segments,
    extend_to_borders, horz_vert_intersections, intersection_point, segments_intersect,
    sort_horizontal, sort_vertical, squared_distance, Segment, SLOPE_EPS,
};

/// Axis-aligned rectangle as origin plus size.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RectXywh {
    pub x0: f64,
    pub y0: f64,
    pub w: f64,
    pub h: f64,
}

impl RectXywh {
    pub fn new(x0: f64, y0: f64, w: f64, h: f64) -> Self {
        Self { x0, y0, w, h }
    }

    /// Build from opposite corners `(x1, y1)`-`(x2, y2)`.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    /// `(x1, y1, x2, y2)`.
    pub fn corners(&self) -> (f64, f64, f64, f64) {
        (self.x0, self.y0, self.x0 + self.w, self.y0 + self.h)
    }

    pub fn center(&self) -> [f64; 2] {
        [self.x0 + self.w / 2.0, self.y0 + self.h / 2.0]
    }

    pub fn area(&self) -> f64 {
        self.w * self.h
    }

    /// Corner points in `[tl, tr, br, bl]` order.
    pub fn quad(&self) -> [[f64; 2]; 4] {
        let (x1, y1, x2, y2) = self.corners();
        [[x1, y1], [x2, y1], [x2, y2], [x1, y2]]
    }

    /// `min side / max side`.
    pub fn aspect_ratio(&self) -> f64 {
        let (w, h) = (self.w.abs(), self.h.abs());
        w.min(h) / w.max(h).max(f64::MIN_POSITIVE)
    }
}
