//! Detection stages, each a pure function of its inputs and configuration.
//!
//! The `pipeline` module owns the call order. This module provides the
//! stage primitives and the shared configuration and error types.

pub(crate) mod contour;
pub(crate) mod corners;
pub(crate) mod fitting;
pub(crate) mod grid_lines;
pub(crate) mod matching;
pub(crate) mod normalize;
pub(crate) mod reproject;

pub(crate) mod config;
mod error;

pub use config::{
    ContourConfig, CornerConfig, DetectConfig, DimensionBounds, FittingConfig, GridLineConfig,
    LineBank, MatchingConfig,
};
pub(crate) use contour::extract_table_contours;
pub(crate) use corners::{quad_area, table_corners};
pub use error::DetectError;
pub(crate) use fitting::{crop_to_aoi, fit_rectangles};
pub(crate) use grid_lines::{detect_grid_lines, GridLines};
pub(crate) use matching::{match_templates, score_rectangles_fit};
pub use grid_lines::reduce_lines;
pub use matching::score_template_fit;
pub(crate) use normalize::{normalize_table, NormalizedTable};
pub(crate) use reproject::{project_template, reproject_cells};
pub use reproject::ReprojectedCell;
