//! Progressive probabilistic Hough transform (PPHT).
//!
//! Edge pixels are visited in a seeded random order. Each one votes in a
//! `(theta, rho)` accumulator; once a bin reaches the threshold the pixel's
//! line is walked in both directions through the mask, tolerating up to
//! `max_line_gap` missing pixels. Pixels on an accepted segment are removed
//! from the mask and their votes withdrawn, so every edge pixel contributes
//! to at most one output segment.

use image::GrayImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geometry::Segment;

/// Fixed-point shift used while walking along a line.
const SHIFT: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct HoughParams {
    /// Distance resolution of the accumulator in pixels.
    pub rho: f64,
    /// Angle resolution of the accumulator in radians.
    pub theta: f64,
    /// Minimum accumulator votes for a line.
    pub threshold: u32,
    /// Minimum extent along x or y of an accepted segment.
    pub min_line_length: f64,
    /// Largest run of missing pixels bridged while walking a line.
    pub max_line_gap: u32,
    /// Seed for the pixel visiting order.
    pub seed: u64,
}

impl Default for HoughParams {
    fn default() -> Self {
        Self {
            rho: 1.0,
            theta: std::f64::consts::PI / 360.0,
            threshold: 60,
            min_line_length: 0.0,
            max_line_gap: 0,
            seed: 0,
        }
    }
}

impl HoughParams {
    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_min_line_length(mut self, min_line_length: f64) -> Self {
        self.min_line_length = min_line_length;
        self
    }

    pub fn with_max_line_gap(mut self, max_line_gap: u32) -> Self {
        self.max_line_gap = max_line_gap;
        self
    }
}

struct Accumulator {
    num_rho: usize,
    trig: Vec<(f64, f64)>,
    votes: Vec<i32>,
}

impl Accumulator {
    fn new(width: u32, height: u32, params: &HoughParams) -> Self {
        let num_angle = ((std::f64::consts::PI / params.theta).round() as usize).max(1);
        let num_rho = (((width + height) as f64 * 2.0 + 1.0) / params.rho).round() as usize;
        let irho = 1.0 / params.rho;
        let trig = (0..num_angle)
            .map(|n| {
                let a = n as f64 * params.theta;
                (a.cos() * irho, a.sin() * irho)
            })
            .collect();
        Self {
            num_rho,
            trig,
            votes: vec![0; num_angle * num_rho],
        }
    }

    fn bin(&self, n: usize, x: i64, y: i64) -> Option<usize> {
        let (c, s) = self.trig[n];
        let r = (x as f64 * c + y as f64 * s).round() as i64 + (self.num_rho as i64 - 1) / 2;
        (r >= 0 && (r as usize) < self.num_rho).then(|| n * self.num_rho + r as usize)
    }

    /// Add one vote per angle; returns `(best votes, best angle index)`.
    fn vote(&mut self, x: i64, y: i64) -> (i32, usize) {
        let mut best = (i32::MIN, 0usize);
        for n in 0..self.trig.len() {
            if let Some(idx) = self.bin(n, x, y) {
                self.votes[idx] += 1;
                if self.votes[idx] > best.0 {
                    best = (self.votes[idx], n);
                }
            }
        }
        best
    }

    fn unvote(&mut self, x: i64, y: i64) {
        for n in 0..self.trig.len() {
            if let Some(idx) = self.bin(n, x, y) {
                self.votes[idx] -= 1;
            }
        }
    }
}

/// Stepping state along one line in fixed point. With `x_major` the x
/// coordinate advances one pixel per step and y is fixed point.
#[derive(Clone, Copy)]
struct Walker {
    x0: i64,
    y0: i64,
    dx0: i64,
    dy0: i64,
    x_major: bool,
}

impl Walker {
    fn new(px: i64, py: i64, cos_t: f64, sin_t: f64) -> Self {
        let a = -sin_t;
        let b = cos_t;
        let one = (1i64 << SHIFT) as f64;
        if a.abs() > b.abs() {
            Self {
                x0: px,
                y0: (py << SHIFT) + (1 << (SHIFT - 1)),
                dx0: if a > 0.0 { 1 } else { -1 },
                dy0: (b * one / a.abs()).round() as i64,
                x_major: true,
            }
        } else {
            Self {
                x0: (px << SHIFT) + (1 << (SHIFT - 1)),
                y0: py,
                dx0: (a * one / b.abs()).round() as i64,
                dy0: if b > 0.0 { 1 } else { -1 },
                x_major: false,
            }
        }
    }

    fn direction(&self, k: usize) -> (i64, i64) {
        if k == 0 {
            (self.dx0, self.dy0)
        } else {
            (-self.dx0, -self.dy0)
        }
    }

    fn pixel(&self, x: i64, y: i64) -> (i64, i64) {
        if self.x_major {
            (x, y >> SHIFT)
        } else {
            (x >> SHIFT, y)
        }
    }
}

/// Detect line segments among the non-zero pixels of `edges`.
pub fn probabilistic_hough(edges: &GrayImage, params: &HoughParams) -> Vec<Segment> {
    let (width, height) = edges.dimensions();
    if width == 0 || height == 0 || params.rho <= 0.0 || params.theta <= 0.0 {
        return Vec::new();
    }
    let (w, h) = (width as i64, height as i64);
    let threshold = params.threshold.max(1) as i32;

    let mut mask = vec![false; (width * height) as usize];
    let mut pending: Vec<(i64, i64)> = Vec::new();
    for (x, y, p) in edges.enumerate_pixels() {
        if p[0] > 0 {
            mask[(y * width + x) as usize] = true;
            pending.push((x as i64, y as i64));
        }
    }

    let mut acc = Accumulator::new(width, height, params);
    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut lines = Vec::new();
    let at = |x: i64, y: i64| (y * w + x) as usize;

    while !pending.is_empty() {
        let idx = rng.gen_range(0..pending.len());
        let (px, py) = pending.swap_remove(idx);

        // Already consumed by an earlier segment.
        if !mask[at(px, py)] {
            continue;
        }

        let (max_votes, max_n) = acc.vote(px, py);
        if max_votes < threshold {
            continue;
        }

        let (cos_t, sin_t) = acc.trig[max_n];
        let walker = Walker::new(px, py, cos_t, sin_t);

        let mut line_end = [(px, py); 2];
        for (k, end) in line_end.iter_mut().enumerate() {
            let (dx, dy) = walker.direction(k);
            let (mut x, mut y) = (walker.x0, walker.y0);
            let mut gap = 0u32;
            loop {
                let (j, i) = walker.pixel(x, y);
                if j < 0 || j >= w || i < 0 || i >= h {
                    break;
                }
                if mask[at(j, i)] {
                    gap = 0;
                    *end = (j, i);
                } else {
                    gap += 1;
                    if gap > params.max_line_gap {
                        break;
                    }
                }
                x += dx;
                y += dy;
            }
        }

        let good_line = ((line_end[1].0 - line_end[0].0).abs() as f64) >= params.min_line_length
            || ((line_end[1].1 - line_end[0].1).abs() as f64) >= params.min_line_length;

        for (k, end) in line_end.iter().enumerate() {
            let (dx, dy) = walker.direction(k);
            let (mut x, mut y) = (walker.x0, walker.y0);
            loop {
                let (j, i) = walker.pixel(x, y);
                if j < 0 || j >= w || i < 0 || i >= h {
                    break;
                }
                let m = at(j, i);
                if mask[m] {
                    if good_line {
                        acc.unvote(j, i);
                    }
                    mask[m] = false;
                }
                if (j, i) == *end {
                    break;
                }
                x += dx;
                y += dy;
            }
        }

        if good_line {
            lines.push(Segment::from_coords(
                line_end[0].0 as f64,
                line_end[0].1 as f64,
                line_end[1].0 as f64,
                line_end[1].1 as f64,
            ));
        }
    }

    lines
}
