//! Homographies from point correspondences.
//!
//! [`HomographySolver`] conditions both point sets, solves the linear
//! system by SVD, and with more than four correspondences runs a seeded
//! consensus search whose trial count shrinks as better models turn up,
//! then refits on the agreeing points. Entries of the returned matrix
//! smaller in magnitude than the solver's floor are raised to it.

use nalgebra::{DMatrix, Matrix3};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;

use super::transform::reprojection_error;

/// Failure to produce a usable homography.
#[derive(Debug, Clone, PartialEq)]
pub enum HomographyError {
    /// Fewer than four correspondences, or point lists of different length.
    Underdetermined { src: usize, dst: usize },
    /// The correspondences or the solved matrix are degenerate.
    Degenerate(String),
    /// No model agreed with enough correspondences.
    NoConsensus { inliers: usize, needed: usize },
}

impl std::fmt::Display for HomographyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Underdetermined { src, dst } => {
                write!(f, "need four matching point pairs, got {src} source and {dst} target points")
            }
            Self::Degenerate(msg) => write!(f, "degenerate homography: {msg}"),
            Self::NoConsensus { inliers, needed } => {
                write!(f, "only {inliers} correspondences agree, need {needed}")
            }
        }
    }
}

impl std::error::Error for HomographyError {}

/// Consensus search settings, used when more than four correspondences are
/// given.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct HomographyConfig {
    /// Upper bound on sampled models.
    pub max_iters: usize,
    /// Reprojection distance, in target pixels, that counts as agreement.
    pub inlier_threshold: f64,
    /// Smallest agreeing set accepted.
    pub min_inliers: usize,
    /// Probability of drawing at least one clean sample; bounds the trial
    /// count once the agreeing fraction is known.
    pub confidence: f64,
    pub seed: u64,
}

impl Default for HomographyConfig {
    fn default() -> Self {
        Self {
            max_iters: 2000,
            inlier_threshold: 3.0,
            min_inliers: 4,
            confidence: 0.999,
            seed: 0,
        }
    }
}

/// A solved homography and the correspondences it explains.
#[derive(Debug, Clone)]
pub struct HomographyFit {
    pub h: Matrix3<f64>,
    pub inliers: Vec<bool>,
    /// Root-mean-square reprojection error over the inliers.
    pub rms_error: f64,
}

impl HomographyFit {
    pub fn n_inliers(&self) -> usize {
        self.inliers.iter().filter(|&&b| b).count()
    }
}

/// Similarity moving a point set to zero mean and RMS radius √2.
#[derive(Debug, Clone, Copy)]
struct Conditioner {
    center: [f64; 2],
    scale: f64,
}

impl Conditioner {
    fn of(points: &[[f64; 2]]) -> Self {
        let n = points.len().max(1) as f64;
        let center = [
            points.iter().map(|p| p[0]).sum::<f64>() / n,
            points.iter().map(|p| p[1]).sum::<f64>() / n,
        ];
        let ms = points
            .iter()
            .map(|p| (p[0] - center[0]).powi(2) + (p[1] - center[1]).powi(2))
            .sum::<f64>()
            / n;
        let scale = if ms > f64::EPSILON { (2.0 / ms).sqrt() } else { 1.0 };
        Self { center, scale }
    }

    fn apply(&self, p: &[f64; 2]) -> [f64; 2] {
        [(p[0] - self.center[0]) * self.scale, (p[1] - self.center[1]) * self.scale]
    }

    fn matrix(&self) -> Matrix3<f64> {
        let s = self.scale;
        Matrix3::new(s, 0.0, -s * self.center[0], 0.0, s, -s * self.center[1], 0.0, 0.0, 1.0)
    }

    fn inverse(&self) -> Matrix3<f64> {
        let r = 1.0 / self.scale;
        Matrix3::new(r, 0.0, self.center[0], 0.0, r, self.center[1], 0.0, 0.0, 1.0)
    }
}

/// Least-squares algebraic solution over all given pairs.
fn solve_linear(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<Matrix3<f64>, HomographyError> {
    let (cs, cd) = (Conditioner::of(src), Conditioner::of(dst));
    // Padded to at least nine rows so the SVD exposes the null vector.
    let mut a = DMatrix::<f64>::zeros((2 * src.len()).max(9), 9);
    for (i, (s, d)) in src.iter().zip(dst).enumerate() {
        let [x, y] = cs.apply(s);
        let [u, v] = cd.apply(d);
        let rows = [
            [x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y, -u],
            [0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y, -v],
        ];
        for (k, row) in rows.iter().enumerate() {
            for (j, &val) in row.iter().enumerate() {
                a[(2 * i + k, j)] = val;
            }
        }
    }

    let svd = a.svd(false, true);
    let v_t = svd
        .v_t
        .ok_or_else(|| HomographyError::Degenerate("SVD did not converge".into()))?;
    let (null, _) = svd.singular_values.argmin();
    let e = |j: usize| v_t[(null, j)];
    let conditioned = Matrix3::new(e(0), e(1), e(2), e(3), e(4), e(5), e(6), e(7), e(8));

    let h = cd.inverse() * conditioned * cs.matrix();
    let w = h[(2, 2)];
    let h = if w.abs() > f64::EPSILON { h / w } else { h / h.norm() };
    if h.iter().any(|v| !v.is_finite()) {
        return Err(HomographyError::Degenerate("non-finite entry".into()));
    }
    Ok(h)
}

/// Trials needed to draw one all-inlier sample of `k` points with
/// probability `confidence`, when a fraction `w` of the points agree.
fn needed_trials(w: f64, k: i32, confidence: f64) -> usize {
    let clean = w.powi(k);
    if clean >= 1.0 {
        return 1;
    }
    let miss = (1.0 - clean).ln();
    if miss >= 0.0 || !miss.is_finite() {
        return usize::MAX;
    }
    ((1.0 - confidence).ln() / miss).ceil().max(1.0) as usize
}

/// Agreement mask and summed squared error of the agreeing pairs.
fn agreement(h: &Matrix3<f64>, src: &[[f64; 2]], dst: &[[f64; 2]], threshold: f64) -> (Vec<bool>, f64) {
    let mut sse = 0.0;
    let mask = src
        .iter()
        .zip(dst)
        .map(|(s, d)| {
            let e = reprojection_error(h, s, d);
            let ok = e < threshold;
            if ok {
                sse += e * e;
            }
            ok
        })
        .collect();
    (mask, sse)
}

/// Homography solver bound to one configuration and entry floor.
#[derive(Debug, Clone, Copy)]
pub struct HomographySolver<'a> {
    config: &'a HomographyConfig,
    entry_floor: f64,
}

impl<'a> HomographySolver<'a> {
    pub fn new(config: &'a HomographyConfig) -> Self {
        Self { config, entry_floor: 0.0 }
    }

    /// Raise every entry smaller than `floor` in magnitude to `+floor`.
    /// An axis-aligned quad otherwise yields exact zeros.
    pub fn with_entry_floor(mut self, floor: f64) -> Self {
        self.entry_floor = floor.max(0.0);
        self
    }

    /// Solve `dst ≈ H · src`. Exactly four pairs are solved directly; more
    /// go through the consensus search.
    pub fn solve(&self, src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<HomographyFit, HomographyError> {
        if src.len() < 4 || src.len() != dst.len() {
            return Err(HomographyError::Underdetermined { src: src.len(), dst: dst.len() });
        }
        let h = if src.len() == 4 {
            solve_linear(src, dst)?
        } else {
            self.consensus(src, dst)?
        };
        let h = self.finish(h)?;

        let (inliers, sse) = agreement(&h, src, dst, self.config.inlier_threshold);
        let n_in = inliers.iter().filter(|&&b| b).count();
        let rms_error = if n_in > 0 { (sse / n_in as f64).sqrt() } else { f64::INFINITY };
        Ok(HomographyFit { h, inliers, rms_error })
    }

    /// Homography taking quad `src` onto quad `dst` (both `[tl, tr, br, bl]`).
    pub fn quad(&self, src: &[[f64; 2]; 4], dst: &[[f64; 2]; 4]) -> Result<Matrix3<f64>, HomographyError> {
        Ok(self.solve(src, dst)?.h)
    }

    /// Homography taking `corners` onto `[0, width] × [0, height]`.
    pub fn quad_to_rect(
        &self,
        corners: &[[f64; 2]; 4],
        width: f64,
        height: f64,
    ) -> Result<Matrix3<f64>, HomographyError> {
        self.quad(corners, &[[0.0, 0.0], [width, 0.0], [width, height], [0.0, height]])
    }

    fn consensus(&self, src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<Matrix3<f64>, HomographyError> {
        let cfg = self.config;
        let n = src.len();
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let mut best: Option<(usize, f64, Vec<bool>)> = None;
        let mut budget = cfg.max_iters.max(1);
        let mut trials = 0;
        while trials < budget {
            trials += 1;
            let pick = index::sample(&mut rng, n, 4);
            let s4: [[f64; 2]; 4] = std::array::from_fn(|k| src[pick.index(k)]);
            let d4: [[f64; 2]; 4] = std::array::from_fn(|k| dst[pick.index(k)]);
            let Ok(h) = solve_linear(&s4, &d4) else {
                continue;
            };
            let (mask, sse) = agreement(&h, src, dst, cfg.inlier_threshold);
            let count = mask.iter().filter(|&&b| b).count();
            let better = best
                .as_ref()
                .map_or(true, |(c, e, _)| count > *c || (count == *c && sse < *e));
            if better {
                budget = budget.min(needed_trials(count as f64 / n as f64, 4, cfg.confidence));
                best = Some((count, sse, mask));
            }
        }

        let (count, _, mask) =
            best.ok_or_else(|| HomographyError::Degenerate("every sample was degenerate".into()))?;
        tracing::trace!(trials, inliers = count, points = n, "homography consensus");
        if count < cfg.min_inliers {
            return Err(HomographyError::NoConsensus { inliers: count, needed: cfg.min_inliers });
        }
        let (s_in, d_in): (Vec<[f64; 2]>, Vec<[f64; 2]>) = src
            .iter()
            .zip(dst)
            .zip(&mask)
            .filter(|(_, ok)| **ok)
            .map(|((s, d), _)| (*s, *d))
            .unzip();
        solve_linear(&s_in, &d_in)
    }

    /// Reject rank-deficient solutions, then apply the entry floor.
    fn finish(&self, h: Matrix3<f64>) -> Result<Matrix3<f64>, HomographyError> {
        let sv = h.singular_values();
        if sv.max() <= 0.0 || sv.min() / sv.max() < 1e-10 {
            return Err(HomographyError::Degenerate("singular matrix".into()));
        }
        let floor = self.entry_floor;
        Ok(h.map(|v| if v.abs() < floor { floor } else { v }))
    }
}
