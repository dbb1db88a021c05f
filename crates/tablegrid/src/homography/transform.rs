//! Applying, inverting and exporting solved homographies.

use imageproc::geometric_transformations::Projection;
use nalgebra::Matrix3;

use super::solve::HomographyError;

/// Map `(x, y)` through `h` with the homogeneous divide. Points sent to the
/// line at infinity come back as NaN.
pub fn project(h: &Matrix3<f64>, x: f64, y: f64) -> [f64; 2] {
    let w = h[(2, 0)] * x + h[(2, 1)] * y + h[(2, 2)];
    if w.abs() < 1e-15 {
        return [f64::NAN, f64::NAN];
    }
    [
        (h[(0, 0)] * x + h[(0, 1)] * y + h[(0, 2)]) / w,
        (h[(1, 0)] * x + h[(1, 1)] * y + h[(1, 2)]) / w,
    ]
}

/// [`project`], with `None` for points sent to infinity.
pub fn project_finite(h: &Matrix3<f64>, p: &[f64; 2]) -> Option<[f64; 2]> {
    let q = project(h, p[0], p[1]);
    (q[0].is_finite() && q[1].is_finite()).then_some(q)
}

/// Distance between `h · src` and `dst`.
pub fn reprojection_error(h: &Matrix3<f64>, src: &[f64; 2], dst: &[f64; 2]) -> f64 {
    let q = project(h, src[0], src[1]);
    (q[0] - dst[0]).hypot(q[1] - dst[1])
}

pub fn invert(h: &Matrix3<f64>) -> Result<Matrix3<f64>, HomographyError> {
    h.try_inverse()
        .filter(|inv| inv.iter().all(|v| v.is_finite()))
        .ok_or_else(|| HomographyError::Degenerate("matrix not invertible".into()))
}

/// The same mapping as an `imageproc` warp, in `f32`.
pub fn to_projection(h: &Matrix3<f64>) -> Result<Projection, HomographyError> {
    let m: [f32; 9] = std::array::from_fn(|i| h[(i / 3, i % 3)] as f32);
    Projection::from_matrix(m)
        .ok_or_else(|| HomographyError::Degenerate("projection not invertible in f32".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn keystone() -> Matrix3<f64> {
        Matrix3::new(1.1, 0.08, 120.0, -0.05, 0.95, 80.0, 2e-4, -1e-4, 1.0)
    }

    #[test]
    fn inverse_undoes_the_mapping() {
        let h = keystone();
        let inv = invert(&h).unwrap();
        for p in [[0.0, 0.0], [640.0, 0.0], [320.0, 240.0], [0.0, 480.0]] {
            let q = project(&h, p[0], p[1]);
            let back = project(&inv, q[0], q[1]);
            assert_relative_eq!(back[0], p[0], epsilon = 1e-8);
            assert_relative_eq!(back[1], p[1], epsilon = 1e-8);
            assert_relative_eq!(reprojection_error(&h, &p, &q), 0.0, epsilon = 1e-9);
        }
        assert!(invert(&Matrix3::zeros()).is_err());
    }

    #[test]
    fn horizon_points_are_not_finite() {
        // w = 1 - x / 1000 vanishes at x = 1000.
        let h = Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, -1e-3, 0.0, 1.0);
        assert!(project_finite(&h, &[1000.0, 5.0]).is_none());
        assert!(project_finite(&h, &[500.0, 5.0]).is_some());
    }

    #[test]
    fn warp_projection_matches_projection() {
        let h = keystone();
        let projection = to_projection(&h).unwrap();
        let (x, y) = projection * (200.0f32, 150.0f32);
        let q = project(&h, 200.0, 150.0);
        assert!((x as f64 - q[0]).abs() < 1e-2 && (y as f64 - q[1]).abs() < 1e-2);
    }
}
