//! Fitting template cells onto the detected rulings of a normalized table.
//!
//! Stages, in order:
//! 1. every side midpoint snaps to the nearest ruling within a tolerance
//!    proportional to the cell's own size;
//! 2. cells that did not fully snap borrow walls from adjacent fitted cells;
//! 3. fitted cells whose area drifted too far from the template revert;
//! 4. cells are clamped to the table, and the fit fails outright when one
//!    collapses or leaves it.
//!
//! [`crop_to_aoi`] then shrinks cells with an area of interest.

use std::f64::consts::FRAC_PI_2;

use super::config::FittingConfig;
use super::error::DetectError;
use super::grid_lines::GridLines;
use crate::geometry::{angle_between, closest_segment_to_point, RectXywh};
use crate::template::Rectangle;

/// A template cell after fitting, in normalized-table pixels.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FittedRectangle {
    pub rectangle: Rectangle,
    /// All four walls were found on detected rulings.
    pub fitted: bool,
}

impl FittedRectangle {
    pub fn rect(&self) -> RectXywh {
        self.rectangle.rect()
    }
}

/// Which wall two template cells share, seen from the first one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wall {
    Right,
    Left,
    Bottom,
    Top,
}

/// Fit the scaled template `rectangles` onto `lines` of a `width × height`
/// table.
pub(crate) fn fit_rectangles(
    rectangles: &[Rectangle],
    lines: &GridLines,
    width: u32,
    height: u32,
    cfg: &FittingConfig,
) -> Result<Vec<FittedRectangle>, DetectError> {
    let mut fitted: Vec<FittedRectangle> = rectangles
        .iter()
        .map(|r| snap_to_lines(r, lines, cfg.closeness_factor))
        .collect();
    tracing::debug!(
        snapped = fitted.iter().filter(|f| f.fitted).count(),
        total = fitted.len(),
        "cells snapped to rulings"
    );

    for _ in 0..cfg.repair_passes {
        fitted = repair_from_neighbours(&fitted, rectangles, cfg);
    }
    revert_area_outliers(&mut fitted, rectangles, cfg.max_area_ratio_diff);
    clamp_to_table(&mut fitted, width as f64, height as f64)?;

    tracing::debug!(
        fitted = fitted.iter().filter(|f| f.fitted).count(),
        unfitted = fitted.iter().filter(|f| !f.fitted).count(),
        "cells fitted"
    );
    Ok(fitted)
}

/// Move each wall of `r` onto the nearest ruling crossing its midpoint.
fn snap_to_lines(r: &Rectangle, lines: &GridLines, closeness: f64) -> FittedRectangle {
    let (x1, y1, x2, y2) = r.rect().corners();
    let [mid_x, mid_y] = r.rect().center();
    let row_tol = r.h * closeness;
    let col_tol = r.w * closeness;

    let horizontal = |y: f64| {
        closest_segment_to_point(&[mid_x, y], &lines.horizontal, row_tol)
            .and_then(|i| lines.horizontal[i].y_at_x(mid_x))
    };
    let vertical = |x: f64| {
        closest_segment_to_point(&[x, mid_y], &lines.vertical, col_tol)
            .and_then(|i| lines.vertical[i].x_at_y(mid_y))
    };
    let top = horizontal(y1);
    let bottom = horizontal(y2);
    let left = vertical(x1);
    let right = vertical(x2);

    let new_x1 = left.unwrap_or(x1);
    let new_x2 = right.unwrap_or(x2);
    let new_y1 = top.unwrap_or(y1);
    let new_y2 = bottom.unwrap_or(y2);

    let mut rect = r.rect();
    let x_valid = new_x2 > new_x1;
    if x_valid {
        rect.x0 = new_x1;
        rect.w = new_x2 - new_x1;
    }
    let y_valid = new_y2 > new_y1;
    if y_valid {
        rect.y0 = new_y1;
        rect.h = new_y2 - new_y1;
    }
    let all_sides = top.is_some() && bottom.is_some() && left.is_some() && right.is_some();
    FittedRectangle {
        rectangle: r.with_rect(rect),
        fitted: all_sides && x_valid && y_valid,
    }
}

/// The wall `a` shares with `b`, if their facing edges are within `tol`
/// and their centers line up.
fn shared_wall(a: &RectXywh, b: &RectXywh, tol: f64) -> Option<Wall> {
    let (ca, cb) = (a.center(), b.center());
    if ca == cb {
        return None;
    }
    let (ax1, ay1, ax2, ay2) = a.corners();
    let (bx1, by1, bx2, by2) = b.corners();
    let same_row = (ca[1] - cb[1]).abs() < tol;
    let same_col = (ca[0] - cb[0]).abs() < tol;
    if same_row && (ax2 - bx1).abs() < tol {
        Some(Wall::Right)
    } else if same_row && (ax1 - bx2).abs() < tol {
        Some(Wall::Left)
    } else if same_col && (ay2 - by1).abs() < tol {
        Some(Wall::Bottom)
    } else if same_col && (ay1 - by2).abs() < tol {
        Some(Wall::Top)
    } else {
        None
    }
}

/// Where `other` lies as seen from `cell`: 0 right, 1 above, 2 left,
/// 3 below. `None` unless the direction is close to a whole number of
/// quarter turns.
fn quarter_turns(cell: &RectXywh, other: &RectXywh, tolerance: f64) -> Option<u8> {
    let c = cell.center();
    let o = other.center();
    let turns = angle_between(&[c[0] + 100.0, c[1]], &c, &o) / FRAC_PI_2;
    if (turns - turns.round()).abs() > tolerance {
        return None;
    }
    let turns = turns.round() as u8;
    Some(if turns == 1 && o[1] > c[1] { 3 } else { turns })
}

/// One repair pass: every unfitted cell takes the facing wall of each
/// adjacent fitted cell, as long as the move stays within the snap
/// tolerance of its template cell.
fn repair_from_neighbours(
    current: &[FittedRectangle],
    template: &[Rectangle],
    cfg: &FittingConfig,
) -> Vec<FittedRectangle> {
    let mut next = current.to_vec();
    for (i, cell) in current.iter().enumerate() {
        if cell.fitted {
            continue;
        }
        let t = template[i].rect();
        let neighbours: Vec<usize> = template
            .iter()
            .enumerate()
            .filter(|(j, other)| {
                current[*j].fitted && shared_wall(&t, &other.rect(), cfg.adjacency_tolerance).is_some()
            })
            .map(|(j, _)| j)
            .collect();
        if neighbours.is_empty() {
            continue;
        }

        let old = cell.rect();
        let mut new = old;
        for &j in &neighbours {
            let n = current[j].rect();
            match quarter_turns(&old, &n, cfg.quarter_turn_tolerance) {
                Some(0) => new.w = n.x0 - old.x0,
                Some(1) => new.y0 = n.y0 + n.h,
                Some(2) => new.x0 = n.x0 + n.w,
                Some(3) => new.h = n.y0 - old.y0,
                _ => {}
            }
        }

        let max_dx = t.w * cfg.closeness_factor;
        let max_dy = t.h * cfg.closeness_factor;
        let mut out = old;
        if (old.x0 - new.x0).abs() < max_dx {
            out.x0 = new.x0;
        }
        if (old.w - new.w).abs() < max_dx {
            out.w = new.w;
        }
        if (old.y0 - new.y0).abs() < max_dy {
            out.y0 = new.y0;
        }
        if (old.h - new.h).abs() < max_dy {
            out.h = new.h;
        }
        next[i].rectangle = cell.rectangle.with_rect(out);
    }
    next
}

fn revert_area_outliers(fitted: &mut [FittedRectangle], template: &[Rectangle], max_ratio_diff: f64) {
    for (f, t) in fitted.iter_mut().zip(template) {
        let template_area = t.rect().area();
        if !f.fitted || template_area <= 1.0 {
            continue;
        }
        let diff = (1.0 - f.rect().area() / template_area).abs();
        if diff > max_ratio_diff {
            tracing::trace!(rect = t.id, diff, "fitted area drifted, reverting");
            f.rectangle = t.clone();
            f.fitted = false;
        }
    }
}

fn clamp_to_table(fitted: &mut [FittedRectangle], width: f64, height: f64) -> Result<(), DetectError> {
    for f in fitted.iter_mut() {
        let (x1, y1, x2, y2) = f.rect().corners();
        if x2 < 0.0 || y2 < 0.0 || x1 > width || y1 > height || x1 == x2 || y1 == y2 {
            return Err(DetectError::InvalidCellGeometry(format!(
                "cell {} at ({x1}, {y1})-({x2}, {y2}) outside {width}x{height} table",
                f.rectangle.id
            )));
        }
        let clamped = RectXywh::from_corners(x1.max(0.0), y1.max(0.0), x2.min(width), y2.min(height));
        f.rectangle = f.rectangle.with_rect(clamped);
    }
    Ok(())
}

/// Shrink every cell whose template carries an area of interest to that
/// area, rescaled by how much the cell itself was resized. The AOI stays
/// anchored to the top-left corner unless it was detached from the left
/// (then it hugs the right wall) or from the top (then the bottom wall).
pub(crate) fn crop_to_aoi(fitted: &[FittedRectangle], template: &[Rectangle]) -> Vec<FittedRectangle> {
    fitted
        .iter()
        .zip(template)
        .map(|(f, t)| {
            let Some(aoi) = t.aoi else {
                return f.clone();
            };
            let cell = f.rect();
            let (_, _, x2, y2) = cell.corners();
            let w = aoi.w / t.w * cell.w;
            let h = aoi.h / t.h * cell.h;
            let (mut x0, mut y0) = (cell.x0, cell.y0);
            if (t.x0 - aoi.x0).abs() > 1.0 {
                x0 = x2 - w;
            } else if (t.y0 - aoi.y0).abs() > 1.0 {
                y0 = y2 - h;
            }
            FittedRectangle {
                rectangle: f.rectangle.with_rect(RectXywh::new(x0, y0, w, h)),
                fitted: f.fitted,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Segment;
    use crate::template::{Aoi, DataType};
    use approx::assert_relative_eq;

    fn cell(id: i64, x0: f64, y0: f64, w: f64, h: f64) -> Rectangle {
        Rectangle {
            id,
            x0,
            y0,
            w,
            h,
            data_type: DataType::Integer,
            options: None,
            aoi: None,
        }
    }

    /// Two columns of 100 px, one row of 80 px.
    fn pair() -> Vec<Rectangle> {
        vec![cell(0, 0.0, 0.0, 100.0, 80.0), cell(1, 100.0, 0.0, 100.0, 80.0)]
    }

    fn lines(ys: &[f64], xs: &[f64], w: f64, h: f64) -> GridLines {
        GridLines {
            horizontal: ys.iter().map(|&y| Segment::from_coords(0.0, y, w, y)).collect(),
            vertical: xs.iter().map(|&x| Segment::from_coords(x, 0.0, x, h)).collect(),
        }
    }

    #[test]
    fn walls_snap_to_nearby_rulings() {
        let grid = lines(&[3.0, 84.0], &[2.0, 96.0, 198.0], 200.0, 90.0);
        let out = fit_rectangles(&pair(), &grid, 200, 90, &FittingConfig::default()).unwrap();
        assert!(out.iter().all(|f| f.fitted));
        let r = out[0].rect();
        assert_relative_eq!(r.x0, 2.0, epsilon = 1e-3);
        assert_relative_eq!(r.w, 94.0, epsilon = 1e-3);
        assert_relative_eq!(r.y0, 3.0, epsilon = 1e-6);
        assert_relative_eq!(r.h, 81.0, epsilon = 1e-6);
        assert_relative_eq!(out[1].rect().x0, 96.0, epsilon = 1e-3);
    }

    #[test]
    fn distant_rulings_are_ignored() {
        // The middle ruling is 20 px off, beyond 10 % of the cell width.
        let grid = lines(&[0.0, 80.0], &[0.0, 120.0, 200.0], 200.0, 80.0);
        let out = fit_rectangles(&pair(), &grid, 200, 80, &FittingConfig::default()).unwrap();
        assert!(!out[0].fitted && !out[1].fitted);
        let r = out[0].rect();
        assert_relative_eq!(r.x0, 0.0, epsilon = 1e-3);
        assert_relative_eq!(r.y0, 0.0, epsilon = 1e-3);
        assert_relative_eq!(r.w, 100.0, epsilon = 1e-3);
        assert_relative_eq!(r.h, 80.0, epsilon = 1e-3);
    }

    #[test]
    fn adjacency_and_direction() {
        let a = RectXywh::new(0.0, 0.0, 100.0, 50.0);
        let right = RectXywh::new(101.0, 0.0, 100.0, 50.0);
        let below = RectXywh::new(0.0, 52.0, 100.0, 50.0);
        assert_eq!(shared_wall(&a, &right, 4.0), Some(Wall::Right));
        assert_eq!(shared_wall(&right, &a, 4.0), Some(Wall::Left));
        assert_eq!(shared_wall(&a, &below, 4.0), Some(Wall::Bottom));
        assert_eq!(shared_wall(&below, &a, 4.0), Some(Wall::Top));
        assert_eq!(shared_wall(&a, &a, 4.0), None);
        assert_eq!(shared_wall(&a, &RectXywh::new(300.0, 0.0, 10.0, 50.0), 4.0), None);

        let tol = FRAC_PI_2 * 0.1;
        assert_eq!(quarter_turns(&a, &right, tol), Some(0));
        assert_eq!(quarter_turns(&below, &a, tol), Some(1));
        assert_eq!(quarter_turns(&right, &a, tol), Some(2));
        assert_eq!(quarter_turns(&a, &below, tol), Some(3));
        assert_eq!(quarter_turns(&a, &RectXywh::new(100.0, 50.0, 100.0, 50.0), tol), None);
    }

    #[test]
    fn unfitted_cell_borrows_neighbour_wall() {
        let template = pair();
        let mut current = vec![
            FittedRectangle {
                rectangle: template[0].clone(),
                fitted: false,
            },
            FittedRectangle {
                rectangle: template[1].with_rect(RectXywh::new(95.0, 0.0, 105.0, 80.0)),
                fitted: true,
            },
        ];
        current = repair_from_neighbours(&current, &template, &FittingConfig::default());
        assert_eq!(current[0].rect(), RectXywh::new(0.0, 0.0, 95.0, 80.0));
        assert!(!current[0].fitted);
        assert_eq!(current[1].rect().x0, 95.0);
    }

    #[test]
    fn drifted_area_reverts_to_template() {
        let template = pair();
        let mut fitted = vec![
            FittedRectangle {
                rectangle: template[0].with_rect(RectXywh::new(0.0, 0.0, 60.0, 80.0)),
                fitted: true,
            },
            FittedRectangle {
                rectangle: template[1].with_rect(RectXywh::new(100.0, 0.0, 90.0, 80.0)),
                fitted: true,
            },
        ];
        revert_area_outliers(&mut fitted, &template, 0.25);
        assert_eq!(fitted[0].rectangle, template[0]);
        assert!(!fitted[0].fitted);
        assert!(fitted[1].fitted);
    }

    #[test]
    fn cells_are_clamped_or_rejected() {
        let mut cells = vec![FittedRectangle {
            rectangle: cell(0, -5.0, 10.0, 50.0, 200.0),
            fitted: true,
        }];
        clamp_to_table(&mut cells, 100.0, 100.0).unwrap();
        assert_eq!(cells[0].rect(), RectXywh::new(0.0, 10.0, 45.0, 90.0));

        let mut outside = vec![FittedRectangle {
            rectangle: cell(7, 120.0, 0.0, 10.0, 10.0),
            fitted: true,
        }];
        let err = clamp_to_table(&mut outside, 100.0, 100.0).unwrap_err();
        assert!(matches!(err, DetectError::InvalidCellGeometry(_)));
    }

    #[test]
    fn aoi_follows_the_walls_it_touches() {
        let mut left = cell(0, 0.0, 0.0, 100.0, 50.0);
        left.aoi = Some(Aoi { x0: 0.0, y0: 0.0, w: 50.0, h: 25.0 });
        let mut right = cell(1, 100.0, 0.0, 100.0, 50.0);
        right.aoi = Some(Aoi { x0: 150.0, y0: 0.0, w: 50.0, h: 50.0 });
        let mut low = cell(2, 0.0, 50.0, 100.0, 50.0);
        low.aoi = Some(Aoi { x0: 0.0, y0: 75.0, w: 100.0, h: 25.0 });
        let template = vec![left, right, low, cell(3, 100.0, 50.0, 100.0, 50.0)];

        let fitted: Vec<FittedRectangle> = template
            .iter()
            .map(|t| {
                let r = t.rect();
                FittedRectangle {
                    rectangle: t.with_rect(RectXywh::new(r.x0, r.y0, r.w * 1.2, r.h * 0.8)),
                    fitted: true,
                }
            })
            .collect();
        let out = crop_to_aoi(&fitted, &template);
        assert_eq!(out[0].rect(), RectXywh::new(0.0, 0.0, 60.0, 20.0));
        assert_eq!(out[1].rect(), RectXywh::new(160.0, 0.0, 60.0, 40.0));
        assert_eq!(out[2].rect(), RectXywh::new(0.0, 70.0, 120.0, 20.0));
        assert_eq!(out[3], fitted[3]);
    }
}
