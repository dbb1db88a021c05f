//! tablegrid: pure-Rust detector for printed tables in photographed forms.
//!
//! Given a photo of a form and a set of table templates, finds the table,
//! decides which template it is and returns every template cell in source
//! image pixels. The pipeline stages are:
//!
//! 1. **Contours** – threshold sweep over Canny edge maps, keeping outlines
//!    with many cell-like children.
//! 2. **Corners** – Hough lines along the outline, intersected and clustered
//!    per quadrant.
//! 3. **Normalize** – homography onto an axis-aligned table of bounded size.
//! 4. **Grid lines** – multi-pass Hough detection of the rulings, merged by
//!    principal-axis fitting.
//! 5. **Match** – nearest-neighbour cosine score between ruling crossings
//!    and template corners.
//! 6. **Fit** – template cells snapped to rulings, repaired from neighbours.
//! 7. **Reproject** – fitted cells mapped back through the inverse
//!    homography.
//!
//! # Public API
//! - [`Detector`] as the primary entry point
//! - [`TemplateLibrary`] and the template types it holds
//! - [`DetectConfig`] for advanced tuning
//! - [`TableDetection`], [`ShardedTable`] and [`DetectError`] as results
//!
//! The [`geometry`], [`homography`] and [`hough`] modules expose the
//! numeric primitives the stages are built on.

mod api;
mod detector;
pub mod geometry;
pub mod homography;
pub mod hough;
mod pipeline;
mod raster;
mod shard;
mod template;

#[cfg(test)]
pub(crate) mod test_utils;

pub use api::Detector;
pub use detector::{
    reduce_lines, score_template_fit, ContourConfig, CornerConfig, DetectConfig, DetectError,
    DimensionBounds, FittingConfig, GridLineConfig, LineBank, MatchingConfig, ReprojectedCell,
};
pub use geometry::{KMeansParams, RectXywh, Segment};
pub use homography::HomographyConfig;
pub use pipeline::{ShardedTable, TableDetection};
pub use raster::{bound_dimensions, BoundedSize};
pub use template::{
    rectangle_intersections, Aoi, DataType, Rectangle, TableTemplate, TemplateId, TemplateLibrary,
};
