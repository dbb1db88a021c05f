//! Raster operations on 8-bit masks: edges, morphology, drawing, resizing
//! and contour tracing.

mod draw;
mod edges;
mod resize;

pub(crate) use draw::{draw_closed_polyline, draw_segments, fill_polygon};
pub(crate) use edges::{dilated_edges, pre_blur};
pub use resize::{bound_dimensions, resize_gray, BoundedSize};

use image::{GrayImage, Luma};
use imageproc::contours::BorderType;
use imageproc::morphology::{grayscale_dilate, grayscale_erode, Mask};

/// Largest mask side `Mask::from_image` accepts.
const MAX_MASK_SIDE: u32 = 511;

/// Rectangular `width × height` structuring element anchored at
/// `(width / 2, height / 2)`. Sides are clamped to `1..=511`.
pub(crate) fn rect_mask(width: u32, height: u32) -> Mask {
    let (w, h) = (width.clamp(1, MAX_MASK_SIDE), height.clamp(1, MAX_MASK_SIDE));
    let shape = GrayImage::from_pixel(w, h, Luma([255]));
    Mask::from_image(&shape, (w / 2) as u8, (h / 2) as u8)
}

/// Opening by a `side × side` square, run as a row pass and a column pass
/// for each of the erosion and the dilation.
pub(crate) fn open_square(mask: &GrayImage, side: u32) -> GrayImage {
    let (row, col) = (rect_mask(side, 1), rect_mask(1, side));
    let eroded = grayscale_erode(&grayscale_erode(mask, &row), &col);
    grayscale_dilate(&grayscale_dilate(&eroded, &row), &col)
}

/// One traced border with its position in the nesting tree.
#[derive(Debug, Clone)]
pub(crate) struct TracedContour {
    pub points: Vec<[f64; 2]>,
    pub parent: Option<usize>,
    pub is_hole: bool,
}

/// Trace every border of the non-zero regions of `mask`, outer borders and
/// hole borders alike, keeping the full parent hierarchy.
///
/// The mask is traced inside a one-pixel empty frame: `find_contours` never
/// opens an outer border on column 0, so a region touching the left edge
/// would otherwise come back as a hole.
pub(crate) fn trace_contours(mask: &GrayImage) -> Vec<TracedContour> {
    let (w, h) = mask.dimensions();
    let mut framed = GrayImage::new(w + 2, h + 2);
    image::imageops::replace(&mut framed, mask, 1, 1);
    imageproc::contours::find_contours::<i32>(&framed)
        .into_iter()
        .map(|c| TracedContour {
            points: c.points.iter().map(|p| [(p.x - 1) as f64, (p.y - 1) as f64]).collect(),
            parent: c.parent,
            is_hole: c.border_type == BorderType::Hole,
        })
        .collect()
}

/// Outer borders only, without hierarchy.
pub(crate) fn trace_outer_contours(mask: &GrayImage) -> Vec<Vec<[f64; 2]>> {
    trace_contours(mask)
        .into_iter()
        .filter(|c| !c.is_hole)
        .map(|c| c.points)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::morphology::{grayscale_close, grayscale_open};

    #[test]
    fn ring_has_outer_border_and_hole_child() {
        let mut mask = GrayImage::new(30, 30);
        for y in 5..25 {
            for x in 5..25 {
                if !(8..22).contains(&x) || !(8..22).contains(&y) {
                    mask.put_pixel(x, y, Luma([255]));
                }
            }
        }
        let contours = trace_contours(&mask);
        assert_eq!(contours.len(), 2);
        let outer = contours.iter().position(|c| !c.is_hole).unwrap();
        let hole = contours.iter().position(|c| c.is_hole).unwrap();
        assert_eq!(contours[hole].parent, Some(outer));
        assert_eq!(trace_outer_contours(&mask).len(), 1);
    }

    #[test]
    fn region_on_the_left_edge_is_an_outer_border() {
        let mut mask = GrayImage::new(40, 12);
        for y in 4..8 {
            for x in 0..40 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        let contours = trace_contours(&mask);
        assert_eq!(contours.len(), 1);
        assert!(!contours[0].is_hole);
        let xs = contours[0].points.iter().map(|p| p[0]);
        assert_eq!(xs.clone().fold(f64::MAX, f64::min), 0.0);
        assert_eq!(xs.fold(f64::MIN, f64::max), 39.0);
    }

    #[test]
    fn rect_mask_opens_along_one_axis() {
        let mut img = GrayImage::new(40, 40);
        for x in 2..38 {
            img.put_pixel(x, 10, Luma([255]));
        }
        for y in 2..38 {
            img.put_pixel(25, y, Luma([255]));
        }
        let opened = grayscale_open(&img, &rect_mask(7, 1));
        assert_eq!(opened.get_pixel(15, 10)[0], 255);
        assert_eq!(opened.get_pixel(25, 30)[0], 0);
        assert_eq!(opened.pixels().filter(|p| p[0] > 0).count(), 36);
    }

    #[test]
    fn rect_mask_close_bridges_small_gap() {
        let mut img = GrayImage::new(30, 5);
        for x in (0..30).filter(|x| !(14..16).contains(x)) {
            img.put_pixel(x, 2, Luma([255]));
        }
        let closed = grayscale_close(&img, &rect_mask(5, 1));
        assert_eq!(closed.get_pixel(14, 2)[0], 255);
        assert_eq!(closed.get_pixel(15, 2)[0], 255);
    }

    #[test]
    fn square_opening_matches_the_full_mask() {
        let mut img = GrayImage::new(30, 30);
        for y in 5..20 {
            for x in 4..22 {
                img.put_pixel(x, y, Luma([255]));
            }
        }
        // A spur thinner than the kernel.
        for x in 22..29 {
            img.put_pixel(x, 10, Luma([255]));
            img.put_pixel(x, 11, Luma([255]));
        }
        let separable = open_square(&img, 6);
        assert_eq!(separable, grayscale_open(&img, &rect_mask(6, 6)));
        assert_eq!(separable.get_pixel(10, 10)[0], 255);
        assert_eq!(separable.get_pixel(25, 10)[0], 0);
    }

    #[test]
    fn oversized_mask_is_clamped() {
        let mut img = GrayImage::new(9, 9);
        img.put_pixel(4, 4, Luma([255]));
        let grown = grayscale_dilate(&img, &rect_mask(3, 3));
        assert_eq!(grown.pixels().filter(|p| p[0] > 0).count(), 9);
        // Larger than the image and than the accepted mask side.
        let flooded = grayscale_dilate(&img, &rect_mask(2000, 3));
        assert!(flooded.enumerate_pixels().all(|(_, y, p)| (3..=5).contains(&y) == (p[0] > 0)));
    }
}
