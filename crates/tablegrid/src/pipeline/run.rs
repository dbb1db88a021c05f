//! Stage wiring: bound/resize → contours → corners → normalize → grid lines
//! → match → fit → reproject.

use image::GrayImage;

use super::result::{ShardedTable, TableDetection};
use crate::detector::{
    crop_to_aoi, detect_grid_lines, extract_table_contours, fit_rectangles, match_templates,
    normalize_table, project_template, quad_area, reproject_cells, score_rectangles_fit,
    table_corners, DetectConfig, DetectError, GridLines, NormalizedTable,
};
use crate::raster::{bound_dimensions, resize_gray};
use crate::shard::shard_grid;
use crate::template::{Rectangle, TableTemplate};

/// Corners `[tl, tr, br, bl]`, in `gray`'s pixels, of the largest table.
///
/// Detection runs on a copy resampled so its longest side lies within
/// `image_bounds`; corners are scaled back and truncated.
pub(crate) fn locate_table(gray: &GrayImage, config: &DetectConfig) -> Result<[[f64; 2]; 4], DetectError> {
    let (w, h) = gray.dimensions();
    let bounds = &config.image_bounds;
    let size = bound_dimensions(w, h, bounds.min_len, bounds.max_len);
    let work = resize_gray(gray, size.width, size.height);
    tracing::debug!(
        width = size.width,
        height = size.height,
        factor = size.factor,
        "working image"
    );

    let contours = extract_table_contours(&work, &config.contour)?;
    tracing::info!(contours = contours.len(), "table contours found");
    let corners = table_corners(&contours, size.width, size.height, &config.corners)?;

    let inv = 1.0 / size.factor;
    let mut scaled: Vec<[[f64; 2]; 4]> = corners
        .iter()
        .map(|quad| quad.map(|p| [(p[0] * inv).trunc(), (p[1] * inv).trunc()]))
        .collect();
    scaled.sort_by(|a, b| quad_area(b).total_cmp(&quad_area(a)));
    let best = scaled.into_iter().next().ok_or(DetectError::NoCornersFound)?;
    tracing::info!(corners = ?best, "table located");
    Ok(best)
}

/// Locate, rectify and rule the largest table.
fn rule_table(gray: &GrayImage, config: &DetectConfig) -> Result<(NormalizedTable, GridLines), DetectError> {
    let corners = locate_table(gray, config)?;
    let table = normalize_table(gray, &corners, config)?;
    let lines = detect_grid_lines(&table.image, &config.grid_lines);
    tracing::info!(
        horizontal = lines.horizontal.len(),
        vertical = lines.vertical.len(),
        "grid lines detected"
    );
    Ok((table, lines))
}

fn detect_table_inner(
    gray: &GrayImage,
    templates: &[TableTemplate],
    config: &DetectConfig,
) -> Result<TableDetection, DetectError> {
    let (table, lines) = rule_table(gray, config)?;
    let (tw, th) = (table.width(), table.height());

    let matched = match_templates(templates, &lines, tw, th, &config.matching)?;
    let fitted = fit_rectangles(&matched.rectangles, &lines, tw, th, &config.fitting)?;
    let fitted_rects: Vec<Rectangle> = fitted.iter().map(|f| f.rectangle.clone()).collect();
    let fit_score = score_rectangles_fit(
        &fitted_rects,
        &matched.rectangles,
        tw as f64,
        th as f64,
        config.matching.min_intersection_fraction,
    );
    tracing::info!(fit_score, "cells fitted");

    let cells = crop_to_aoi(&fitted, &matched.rectangles);
    let (w, h) = gray.dimensions();
    let rectangles = reproject_cells(&cells, &table, w, h, config.min_cell_size_px)?;
    Ok(TableDetection {
        height: h,
        width: w,
        table_template_id: matched.template.id.clone(),
        score: matched.score,
        fit_score,
        corners: table.corners,
        rectangles,
    })
}

fn log_failure<T>(result: Result<T, DetectError>) -> Result<T, DetectError> {
    if let Err(e) = &result {
        tracing::warn!(stage = e.stage(), "{e}");
    }
    result
}

/// Full detection: find the table, match it to one of `templates` and
/// reproject the fitted cells into `gray`'s pixels.
pub(crate) fn detect_table(
    gray: &GrayImage,
    templates: &[TableTemplate],
    config: &DetectConfig,
) -> Result<TableDetection, DetectError> {
    if templates.is_empty() {
        return Err(DetectError::InvalidTemplate("no templates loaded".into()));
    }
    log_failure(detect_table_inner(gray, templates, config))
}

/// Cut the largest table into the cells formed by its own rulings.
pub(crate) fn shard_table(gray: &GrayImage, config: &DetectConfig) -> Result<ShardedTable, DetectError> {
    log_failure(rule_table(gray, config).map(|(table, lines)| {
        let (w, h) = gray.dimensions();
        ShardedTable {
            height: h,
            width: w,
            corners: table.corners,
            table_width: table.width(),
            table_height: table.height(),
            rectangles: shard_grid(&lines, table.width(), table.height()),
        }
    }))
}

/// Project `template` onto the largest table without fitting it to rulings.
/// Scores are reported as zero.
pub(crate) fn project_only(
    gray: &GrayImage,
    template: &TableTemplate,
    config: &DetectConfig,
) -> Result<TableDetection, DetectError> {
    log_failure(locate_table(gray, config).and_then(|corners| {
        let rectangles = project_template(template, &corners, config)?;
        let (w, h) = gray.dimensions();
        Ok(TableDetection {
            height: h,
            width: w,
            table_template_id: template.id.clone(),
            score: 0.0,
            fit_score: 0.0,
            corners,
            rectangles,
        })
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{DimensionBounds, LineBank};
    use crate::test_utils::{grid_template, render_grid, warp_gray};
    use nalgebra::Matrix3;

    const COLS: [f64; 3] = [170.0; 3];
    const ROWS: [f64; 3] = [120.0; 3];

    fn fast_config() -> DetectConfig {
        let mut cfg = DetectConfig {
            image_bounds: DimensionBounds::new(600, 1000),
            table_bounds: DimensionBounds::new(300, 600),
            ..DetectConfig::default()
        };
        cfg.contour.canny_low = vec![30.0];
        cfg.contour.canny_high = vec![150.0, 100.0];
        cfg.contour.close_flags = vec![false];
        let bank = |b: &LineBank| LineBank {
            canny_high: vec![100.0],
            ..b.clone()
        };
        cfg.grid_lines.short_bank = bank(&cfg.grid_lines.short_bank);
        cfg.grid_lines.long_bank = bank(&cfg.grid_lines.long_bank);
        cfg.grid_lines.hough_thresholds = vec![60, 90];
        cfg
    }

    fn page() -> GrayImage {
        render_grid(800, 600, [150.0, 120.0], &COLS, &ROWS, 3)
    }

    #[test]
    fn fitted_cells_keep_template_area() {
        let cfg = fast_config();
        let templates = [grid_template(7, &COLS, &ROWS)];
        let (table, lines) = rule_table(&page(), &cfg).unwrap();
        let (tw, th) = (table.width(), table.height());
        let matched = match_templates(&templates, &lines, tw, th, &cfg.matching).unwrap();
        let fitted = fit_rectangles(&matched.rectangles, &lines, tw, th, &cfg.fitting).unwrap();

        assert_eq!(fitted.len(), 9);
        for (f, t) in fitted.iter().zip(&matched.rectangles) {
            assert!(f.fitted, "cell {} not fitted", t.id);
            let ratio = f.rect().area() / t.rect().area();
            assert!((1.0 - ratio).abs() < 0.02, "cell {} area ratio {ratio}", t.id);
        }
    }

    #[test]
    fn detection_reports_every_cell_in_source_pixels() {
        let templates = [grid_template(7, &COLS, &ROWS)];
        let found = detect_table(&page(), &templates, &fast_config()).unwrap();

        assert_eq!((found.width, found.height), (800, 600));
        assert!(found.score >= 0.992, "score {}", found.score);
        assert!(found.fit_score > 0.99, "fit score {}", found.fit_score);
        assert_eq!(found.n_fitted(), 9);
        for (i, cell) in found.rectangles.iter().enumerate() {
            let (r, c) = (i / 3, i % 3);
            let (x, y) = (150.0 + 170.0 * c as f64, 120.0 + 120.0 * r as f64);
            assert_eq!(cell.rect_id, i as i64);
            assert!((cell.tl[0] as f64 - x).abs() <= 4.0, "cell {i} tl {:?}", cell.tl);
            assert!((cell.tl[1] as f64 - y).abs() <= 4.0, "cell {i} tl {:?}", cell.tl);
        }
    }

    #[test]
    fn warped_table_is_located() {
        let h = Matrix3::new(1.02, 0.03, -12.0, -0.02, 0.98, 14.0, 2e-5, -1e-5, 1.0);
        let warped = warp_gray(&page(), &h, 800, 600);
        let corners = locate_table(&warped, &fast_config()).unwrap();

        let truth = [[150.0, 120.0], [660.0, 120.0], [660.0, 480.0], [150.0, 480.0]].map(|[x, y]| {
            let w = h[(2, 0)] * x + h[(2, 1)] * y + h[(2, 2)];
            [
                (h[(0, 0)] * x + h[(0, 1)] * y + h[(0, 2)]) / w,
                (h[(1, 0)] * x + h[(1, 1)] * y + h[(1, 2)]) / w,
            ]
        });
        for (c, t) in corners.iter().zip(&truth) {
            let d = ((c[0] - t[0]).powi(2) + (c[1] - t[1]).powi(2)).sqrt();
            assert!(d < 6.0, "corner {c:?} vs {t:?}");
        }
    }

    #[test]
    fn no_templates_is_rejected_up_front() {
        assert!(matches!(
            detect_table(&page(), &[], &fast_config()),
            Err(DetectError::InvalidTemplate(_))
        ));
    }

    #[test]
    fn shard_cuts_the_table_into_ruled_cells() {
        let sharded = shard_table(&page(), &fast_config()).unwrap();
        // Outer rulings may survive next to the table walls as slivers.
        assert!(sharded.rectangles.len() >= 9, "{} cells", sharded.rectangles.len());
        let big = sharded.rectangles.iter().filter(|r| r.w > 100.0 && r.h > 80.0).count();
        assert_eq!(big, 9);
        let template = sharded.to_template(crate::template::TemplateId::Int(3));
        assert!(template.validate().is_ok());
    }
}
