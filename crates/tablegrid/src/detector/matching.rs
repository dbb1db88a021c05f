//! Template scoring and selection.
//!
//! A template is scored by how well the crossings of the detected rulings
//! line up with the corners of its (rescaled) rectangles, nearest-neighbour
//! matched in both directions.

use super::config::MatchingConfig;
use super::error::DetectError;
use super::grid_lines::GridLines;
use crate::geometry::nearest_point;
use crate::template::{rectangle_intersections, Rectangle, TableTemplate};

/// The winning template, with its rectangles rescaled onto the table.
#[derive(Debug, Clone)]
pub(crate) struct TemplateMatch<'a> {
    pub template: &'a TableTemplate,
    pub rectangles: Vec<Rectangle>,
    pub score: f64,
}

/// Cosine similarity of two equally long point lists after centering them
/// on the `width × height` frame and scaling it to unit size.
fn cosine_similarity(a: &[[f64; 2]], b: &[[f64; 2]], width: f64, height: f64) -> f64 {
    let unit = |p: &[f64; 2]| [(p[0] - width / 2.0) / width, (p[1] - height / 2.0) / height];
    let (mut dot, mut norm_a, mut norm_b) = (0.0, 0.0, 0.0);
    for (p, q) in a.iter().zip(b) {
        let (p, q) = (unit(p), unit(q));
        dot += p[0] * q[0] + p[1] * q[1];
        norm_a += p[0] * p[0] + p[1] * p[1];
        norm_b += q[0] * q[0] + q[1] * q[1];
    }
    dot / (norm_a.sqrt() * norm_b.sqrt() + 1e-8)
}

/// `from` points paired with their nearest `to` point, mapped into `[0, 1]`.
fn one_way_score(from: &[[f64; 2]], to: &[[f64; 2]], width: f64, height: f64) -> f64 {
    let analogs: Vec<[f64; 2]> = from.iter().filter_map(|p| nearest_point(p, to)).collect();
    (cosine_similarity(from, &analogs, width, height) + 1.0) / 2.0
}

/// Agreement in `[0, 1]` between detected crossings and template corners.
///
/// Scores zero when either set is empty or the detected crossings number
/// at most `min_fraction` of the template corners.
pub fn score_template_fit(
    table_points: &[[f64; 2]],
    template_points: &[[f64; 2]],
    width: f64,
    height: f64,
    min_fraction: f64,
) -> f64 {
    if table_points.is_empty() || template_points.is_empty() {
        return 0.0;
    }
    if table_points.len() as f64 <= template_points.len() as f64 * min_fraction {
        return 0.0;
    }
    let forward = one_way_score(table_points, template_points, width, height);
    let backward = one_way_score(template_points, table_points, width, height);
    (forward + backward) / 2.0
}

/// Agreement between fitted cells and the template cells they came from,
/// on a `width × height` table.
pub(crate) fn score_rectangles_fit(
    fitted: &[Rectangle],
    template: &[Rectangle],
    width: f64,
    height: f64,
    min_fraction: f64,
) -> f64 {
    score_template_fit(
        &rectangle_intersections(fitted),
        &rectangle_intersections(template),
        width,
        height,
        min_fraction,
    )
}

/// Whether the template's aspect ratio is close enough to the table's.
pub(crate) fn aspect_compatible(template: &TableTemplate, width: f64, height: f64, min_ratio: f64) -> bool {
    let table = width / height.max(f64::MIN_POSITIVE);
    let candidate = template.aspect();
    let ratio = table.min(candidate) / table.max(candidate).max(f64::MIN_POSITIVE);
    ratio >= min_ratio
}

/// Best-scoring aspect-compatible template for a table of `width × height`
/// with rulings `lines`.
pub(crate) fn match_templates<'a>(
    templates: &'a [TableTemplate],
    lines: &GridLines,
    width: u32,
    height: u32,
    cfg: &MatchingConfig,
) -> Result<TemplateMatch<'a>, DetectError> {
    let (w, h) = (width as f64, height as f64);
    let table_points = lines.intersections(cfg.extension_factor);

    let mut best: Option<TemplateMatch<'a>> = None;
    let mut best_score = 0.0;
    for template in templates {
        if !aspect_compatible(template, w, h, cfg.min_aspect_compatibility) {
            tracing::debug!(template = %template.id, "aspect ratio incompatible");
            continue;
        }
        let rectangles = template.scaled_rectangles(w, h);
        let template_points = rectangle_intersections(&rectangles);
        let score = score_template_fit(
            &table_points,
            &template_points,
            w,
            h,
            cfg.min_intersection_fraction,
        );
        tracing::debug!(template = %template.id, score, "template scored");
        if score > best_score {
            best_score = score;
            best = Some(TemplateMatch { template, rectangles, score });
        }
    }

    match best {
        Some(m) if m.score >= cfg.min_score => {
            tracing::info!(template = %m.template.id, score = m.score, "template matched");
            Ok(m)
        }
        _ => Err(DetectError::NoTemplateMatch { best_score }),
    }
}
