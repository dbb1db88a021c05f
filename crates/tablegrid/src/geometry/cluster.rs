//! Point-set statistics: nearest neighbours, quadrant partitioning,
//! Lloyd k-means with k-means++ seeding, and 2-D PCA.

use nalgebra::{Matrix2, SymmetricEigen};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::segment::squared_distance;

/// Indices of the `k` pool points closest to `point` (squared Euclidean
/// distance). Ties keep pool order.
pub fn nearest_indices(point: &[f64; 2], pool: &[[f64; 2]], k: usize) -> Vec<usize> {
    let mut order: Vec<(usize, f64)> = pool
        .iter()
        .enumerate()
        .map(|(i, p)| (i, squared_distance(point, p)))
        .collect();
    order.sort_by(|a, b| a.1.total_cmp(&b.1));
    order.into_iter().take(k).map(|(i, _)| i).collect()
}

/// The `k` pool points closest to `point`.
pub fn nearest_points(point: &[f64; 2], pool: &[[f64; 2]], k: usize) -> Vec<[f64; 2]> {
    nearest_indices(point, pool, k).into_iter().map(|i| pool[i]).collect()
}

/// Single nearest pool point.
pub fn nearest_point(point: &[f64; 2], pool: &[[f64; 2]]) -> Option<[f64; 2]> {
    let mut best: Option<([f64; 2], f64)> = None;
    for p in pool {
        let d = squared_distance(point, p);
        if best.map_or(true, |(_, bd)| d < bd) {
            best = Some((*p, d));
        }
    }
    best.map(|(p, _)| p)
}

/// Points grouped by position relative to `center`, in
/// `[top-left, top-right, bottom-right, bottom-left]` order.
///
/// Points on either axis through `center` belong to no quadrant. Returns
/// `None` with fewer than four points or when any quadrant is empty.
pub fn split_quadrants(points: &[[f64; 2]], center: [f64; 2]) -> Option<[Vec<[f64; 2]>; 4]> {
    if points.len() < 4 {
        return None;
    }
    let mut quadrants: [Vec<[f64; 2]>; 4] = Default::default();
    for p in points {
        let (x, y) = (p[0], p[1]);
        let (cx, cy) = (center[0], center[1]);
        let slot = if x < cx && y < cy {
            0
        } else if x > cx && y < cy {
            1
        } else if x > cx && y > cy {
            2
        } else if x < cx && y > cy {
            3
        } else {
            continue;
        };
        quadrants[slot].push(*p);
    }
    if quadrants.iter().any(Vec::is_empty) {
        return None;
    }
    Some(quadrants)
}

// ── k-means ──────────────────────────────────────────────────────────────

/// Lloyd k-means parameters.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct KMeansParams {
    pub k: usize,
    /// Iteration cap per attempt.
    pub max_iters: usize,
    /// Stop when no center moves farther than this.
    pub epsilon: f64,
    /// Independent restarts; the most compact labelling wins.
    pub attempts: usize,
    pub seed: u64,
}

impl Default for KMeansParams {
    fn default() -> Self {
        Self {
            k: 3,
            max_iters: 10,
            epsilon: 1.0,
            attempts: 10,
            seed: 0x7ab1e,
        }
    }
}

fn nearest_center(p: &[f64; 2], centers: &[[f64; 2]]) -> (usize, f64) {
    let mut best = (0usize, f64::INFINITY);
    for (i, c) in centers.iter().enumerate() {
        let d = squared_distance(p, c);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

fn kmeans_pp_init(points: &[[f64; 2]], k: usize, rng: &mut StdRng) -> Vec<[f64; 2]> {
    let mut centers = Vec::with_capacity(k);
    centers.push(points[rng.gen_range(0..points.len())]);
    while centers.len() < k {
        let weights: Vec<f64> = points.iter().map(|p| nearest_center(p, &centers).1).collect();
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            // Remaining points coincide with existing centers.
            centers.push(points[rng.gen_range(0..points.len())]);
            continue;
        }
        let mut target = rng.gen_range(0.0..total);
        let mut chosen = points.len() - 1;
        for (i, w) in weights.iter().enumerate() {
            if target < *w {
                chosen = i;
                break;
            }
            target -= w;
        }
        centers.push(points[chosen]);
    }
    centers
}

/// Cluster `points` into `min(k, n)` centers. Empty input yields no centers.
pub fn kmeans(points: &[[f64; 2]], params: &KMeansParams) -> Vec<[f64; 2]> {
    let k = params.k.min(points.len());
    if k == 0 {
        return Vec::new();
    }
    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut best: Option<(f64, Vec<[f64; 2]>)> = None;

    for _ in 0..params.attempts.max(1) {
        let mut centers = kmeans_pp_init(points, k, &mut rng);
        for _ in 0..params.max_iters.max(1) {
            let mut sums = vec![[0.0f64; 2]; k];
            let mut counts = vec![0usize; k];
            for p in points {
                let (c, _) = nearest_center(p, &centers);
                sums[c][0] += p[0];
                sums[c][1] += p[1];
                counts[c] += 1;
            }
            let mut max_shift = 0.0f64;
            for c in 0..k {
                if counts[c] == 0 {
                    continue;
                }
                let next = [sums[c][0] / counts[c] as f64, sums[c][1] / counts[c] as f64];
                max_shift = max_shift.max(squared_distance(&next, &centers[c]).sqrt());
                centers[c] = next;
            }
            if max_shift <= params.epsilon {
                break;
            }
        }
        let compactness: f64 = points.iter().map(|p| nearest_center(p, &centers).1).sum();
        if best.as_ref().map_or(true, |(b, _)| compactness < *b) {
            best = Some((compactness, centers));
        }
    }
    best.map(|(_, c)| c).unwrap_or_default()
}

// ── PCA ──────────────────────────────────────────────────────────────────

/// Mean and principal-axis angle (radians) of a 2-D point cloud.
pub fn principal_axis(points: &[[f64; 2]]) -> Option<([f64; 2], f64)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let mx = points.iter().map(|p| p[0]).sum::<f64>() / n;
    let my = points.iter().map(|p| p[1]).sum::<f64>() / n;
    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for p in points {
        let (dx, dy) = (p[0] - mx, p[1] - my);
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }
    let cov = Matrix2::new(sxx / n, sxy / n, sxy / n, syy / n);
    let eig = SymmetricEigen::new(cov);
    let major = if eig.eigenvalues[0] >= eig.eigenvalues[1] { 0 } else { 1 };
    let v = eig.eigenvectors.column(major);
    Some(([mx, my], v[1].atan2(v[0])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn nearest_points_break_ties_by_pool_order() {
        let pool = [[1.0, 0.0], [0.0, 1.0], [5.0, 5.0], [-1.0, 0.0]];
        assert_eq!(nearest_indices(&[0.0, 0.0], &pool, 2), vec![0, 1]);
        assert_eq!(nearest_points(&[4.0, 4.0], &pool, 1), vec![[5.0, 5.0]]);
        assert_eq!(nearest_indices(&[0.0, 0.0], &pool, 10).len(), 4);
    }

    #[test]
    fn quadrant_split_requires_all_four() {
        let pts = [[1.0, 1.0], [9.0, 1.0], [9.0, 9.0], [1.0, 9.0], [2.0, 2.0]];
        let q = split_quadrants(&pts, [5.0, 5.0]).unwrap();
        assert_eq!(q[0].len(), 2);
        assert_eq!(q[2], vec![[9.0, 9.0]]);

        let missing_br = [[1.0, 1.0], [9.0, 1.0], [1.0, 9.0], [2.0, 2.0], [5.0, 9.0]];
        assert!(split_quadrants(&missing_br, [5.0, 5.0]).is_none());
    }

    #[test]
    fn kmeans_separates_well_spaced_blobs() {
        let mut pts = Vec::new();
        for &(cx, cy) in &[(0.0, 0.0), (100.0, 0.0), (50.0, 80.0)] {
            for i in 0..5 {
                pts.push([cx + i as f64 * 0.5, cy - i as f64 * 0.5]);
            }
        }
        let mut centers = kmeans(&pts, &KMeansParams::default());
        assert_eq!(centers.len(), 3);
        centers.sort_by(|a, b| a[0].total_cmp(&b[0]));
        assert_relative_eq!(centers[0][0], 1.0, epsilon = 1e-9);
        assert_relative_eq!(centers[1][1], 79.0, epsilon = 1e-9);
        assert_relative_eq!(centers[2][0], 101.0, epsilon = 1e-9);
    }

    #[test]
    fn kmeans_caps_k_at_point_count() {
        let centers = kmeans(&[[3.0, 4.0], [5.0, 6.0]], &KMeansParams::default());
        assert_eq!(centers.len(), 2);
        assert!(kmeans(&[], &KMeansParams::default()).is_empty());
    }

    #[test]
    fn pca_axis_follows_elongated_cloud() {
        let pts: Vec<[f64; 2]> = (0..50)
            .flat_map(|i| [[i as f64, 10.0], [i as f64, 11.0]])
            .collect();
        let (mean, angle) = principal_axis(&pts).unwrap();
        assert_relative_eq!(mean[0], 24.5);
        assert_relative_eq!(mean[1], 10.5);
        assert_relative_eq!(angle.sin().abs(), 0.0, epsilon = 1e-9);
    }
}
