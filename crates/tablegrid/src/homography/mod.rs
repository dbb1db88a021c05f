//! Plane homographies: solving them from correspondences, applying them to
//! points, and handing them to the image warper.

mod solve;
mod transform;

pub use solve::{HomographyConfig, HomographyError, HomographyFit, HomographySolver};
pub use transform::{invert, project, project_finite, reprojection_error, to_projection};
