//! Template-free sharding: one rectangle per grid cell bounded by
//! consecutive rulings. Used to author templates from a blank form.

use crate::detector::GridLines;
use crate::geometry::{extend_to_borders, intersection_point, sort_horizontal, sort_vertical};
use crate::template::{DataType, Rectangle};

/// Cut a `width × height` table into the cells formed by its rulings.
///
/// Rulings are stretched to the table borders first, so every horizontal
/// crosses every vertical. Cells are numbered row-major from zero and
/// carry [`DataType::Float`]; coordinates are truncated to whole pixels.
pub(crate) fn shard_grid(lines: &GridLines, width: u32, height: u32) -> Vec<Rectangle> {
    let (mut horz, mut vert) =
        extend_to_borders(&lines.horizontal, &lines.vertical, width as f64, height as f64);
    sort_horizontal(&mut horz);
    sort_vertical(&mut vert);

    let mut rectangles = Vec::new();
    for rows in horz.windows(2) {
        for cols in vert.windows(2) {
            let Some(tl) = intersection_point(&rows[0], &cols[0]) else {
                continue;
            };
            let Some(br) = intersection_point(&rows[1], &cols[1]) else {
                continue;
            };
            let (x0, y0) = (tl[0].trunc(), tl[1].trunc());
            let (w, h) = ((br[0] - tl[0]).trunc(), (br[1] - tl[1]).trunc());
            if w <= 0.0 || h <= 0.0 {
                continue;
            }
            rectangles.push(Rectangle {
                id: rectangles.len() as i64,
                x0,
                y0,
                w,
                h,
                data_type: DataType::Float,
                options: None,
                aoi: None,
            });
        }
    }
    tracing::debug!(cells = rectangles.len(), "grid sharded");
    rectangles
}
