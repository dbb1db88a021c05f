//! Binary-mask rasterization of contours and segments.

use image::{GrayImage, Luma};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;

use crate::geometry::Segment;

const ON: Luma<u8> = Luma([255]);

fn to_int_polygon(poly: &[[f64; 2]]) -> Vec<Point<i32>> {
    let mut pts: Vec<Point<i32>> = Vec::with_capacity(poly.len());
    for p in poly {
        let q = Point::new(p[0].round() as i32, p[1].round() as i32);
        if pts.last() != Some(&q) {
            pts.push(q);
        }
    }
    while pts.len() > 1 && pts.first() == pts.last() {
        pts.pop();
    }
    pts
}

/// Fill the interior of a closed polygon (boundary included).
pub fn fill_polygon(mask: &mut GrayImage, poly: &[[f64; 2]]) {
    let pts = to_int_polygon(poly);
    match pts.len() {
        0 => {}
        1 => {
            let p = pts[0];
            if p.x >= 0 && p.y >= 0 && (p.x as u32) < mask.width() && (p.y as u32) < mask.height() {
                mask.put_pixel(p.x as u32, p.y as u32, ON);
            }
        }
        2 => draw_line_segment_mut(
            mask,
            (pts[0].x as f32, pts[0].y as f32),
            (pts[1].x as f32, pts[1].y as f32),
            ON,
        ),
        _ => draw_polygon_mut(mask, &pts, ON),
    }
}

/// Stroke a segment `thickness` pixels wide with round caps.
pub fn draw_thick_segment(mask: &mut GrayImage, seg: &Segment, thickness: u32) {
    let (a, b) = (seg.p1, seg.p2);
    if thickness <= 1 {
        draw_line_segment_mut(mask, (a[0] as f32, a[1] as f32), (b[0] as f32, b[1] as f32), ON);
        return;
    }
    let r = thickness as f64 / 2.0;
    let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
    let len = (dx * dx + dy * dy).sqrt();
    if len > 0.0 {
        let (nx, ny) = (-dy / len * r, dx / len * r);
        let quad = [
            [a[0] + nx, a[1] + ny],
            [b[0] + nx, b[1] + ny],
            [b[0] - nx, b[1] - ny],
            [a[0] - nx, a[1] - ny],
        ];
        fill_polygon(mask, &quad);
    }
    let cap = (thickness / 2) as i32;
    for p in [a, b] {
        draw_filled_circle_mut(mask, (p[0].round() as i32, p[1].round() as i32), cap, ON);
    }
}

/// Stroke the closed outline of `poly`.
pub fn draw_closed_polyline(mask: &mut GrayImage, poly: &[[f64; 2]], thickness: u32) {
    let n = poly.len();
    if n < 2 {
        return;
    }
    for i in 0..n {
        let seg = Segment::new(poly[i], poly[(i + 1) % n]);
        draw_thick_segment(mask, &seg, thickness);
    }
}

/// Stroke every segment.
pub fn draw_segments(mask: &mut GrayImage, segments: &[Segment], thickness: u32) {
    for s in segments {
        draw_thick_segment(mask, s, thickness);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filled_square_covers_interior() {
        let mut mask = GrayImage::new(20, 20);
        fill_polygon(&mut mask, &[[2.0, 2.0], [12.0, 2.0], [12.0, 12.0], [2.0, 12.0], [2.0, 2.0]]);
        assert_eq!(mask.get_pixel(7, 7)[0], 255);
        assert_eq!(mask.get_pixel(15, 15)[0], 0);
        let n = mask.pixels().filter(|p| p[0] > 0).count();
        assert!((100..=121).contains(&n), "filled {n}");
    }

    #[test]
    fn thick_segment_has_requested_width() {
        let mut mask = GrayImage::new(60, 20);
        draw_thick_segment(&mut mask, &Segment::from_coords(10.0, 10.0, 50.0, 10.0), 5);
        let column: Vec<u32> = (0..20).filter(|&y| mask.get_pixel(30, y)[0] > 0).collect();
        assert!((5..=6).contains(&column.len()), "column {column:?}");
        assert!(column.contains(&10));
    }

    #[test]
    fn closed_outline_leaves_interior_empty() {
        let mut mask = GrayImage::new(40, 40);
        draw_closed_polyline(&mut mask, &[[5.0, 5.0], [35.0, 5.0], [35.0, 35.0], [5.0, 35.0]], 3);
        assert_eq!(mask.get_pixel(20, 5)[0], 255);
        assert_eq!(mask.get_pixel(35, 20)[0], 255);
        assert_eq!(mask.get_pixel(20, 20)[0], 0);
    }
}
