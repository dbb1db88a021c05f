//! High-level detection pipeline.
//!
//! This module is the glue layer that wires the detector stages together:
//! bound/resize → contours → corners → normalize → grid lines → match →
//! fit → reproject.
//!
//! Algorithmic primitives live in `crate::detector`. The pipeline layer
//! focuses on stage boundaries, call order and data flow. Every stage
//! either hands a usable value to the next one or stops the image with a
//! [`DetectError`](crate::DetectError).
//!
//! Entry points:
//! - `detect_table`: template matching, fitting and reprojection
//! - `shard_table`: template-free cells from the table's own rulings
//! - `project_only`: a template projected straight onto the table corners

mod result;
mod run;

pub use result::{ShardedTable, TableDetection};

pub(crate) use run::{detect_table, project_only, shard_table};
