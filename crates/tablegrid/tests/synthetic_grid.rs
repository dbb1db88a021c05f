//! End-to-end detection on rendered forms through the public API.

use image::{GrayImage, Luma};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use imageproc::rect::Rect;
use nalgebra::Matrix3;

use tablegrid::homography::project;
use tablegrid::{
    DataType, DetectConfig, DetectError, Detector, DimensionBounds, Rectangle, TableTemplate,
    TemplateId, TemplateLibrary,
};

const PAPER: u8 = 235;
const INK: u8 = 25;
const ORIGIN: [i32; 2] = [150, 120];
const CELL: [i32; 2] = [170, 120];

fn fast_config() -> DetectConfig {
    let mut cfg = DetectConfig {
        image_bounds: DimensionBounds::new(600, 1000),
        table_bounds: DimensionBounds::new(300, 600),
        ..DetectConfig::default()
    };
    cfg.contour.canny_low = vec![30.0];
    cfg.contour.canny_high = vec![150.0, 100.0];
    cfg.contour.close_flags = vec![false];
    cfg.grid_lines.short_bank.canny_high = vec![100.0];
    cfg.grid_lines.long_bank.canny_high = vec![100.0];
    cfg.grid_lines.hough_thresholds = vec![60, 90];
    cfg
}

/// A 3 × 3 ruled grid with 3-pixel strokes on an 800 × 600 page.
fn render_form() -> GrayImage {
    let mut page = GrayImage::from_pixel(800, 600, Luma([PAPER]));
    let (w, h) = (CELL[0] * 3, CELL[1] * 3);
    for i in 0..4 {
        let y = ORIGIN[1] + i * CELL[1];
        draw_filled_rect_mut(&mut page, Rect::at(ORIGIN[0] - 1, y - 1).of_size(w as u32 + 3, 3), Luma([INK]));
        let x = ORIGIN[0] + i * CELL[0];
        draw_filled_rect_mut(&mut page, Rect::at(x - 1, ORIGIN[1] - 1).of_size(3, h as u32 + 3), Luma([INK]));
    }
    page
}

fn warp(img: &GrayImage, h: &Matrix3<f64>) -> GrayImage {
    let coeffs: [f32; 9] = std::array::from_fn(|i| h[(i / 3, i % 3)] as f32);
    let projection = Projection::from_matrix(coeffs).expect("invertible warp");
    let mut out = GrayImage::from_pixel(img.width(), img.height(), Luma([PAPER]));
    warp_into(img, &projection, Interpolation::Bilinear, Luma([PAPER]), &mut out);
    out
}

fn grid_template(id: i64, cols: usize, rows: usize, cell: [f64; 2]) -> TableTemplate {
    let rectangles = (0..rows * cols)
        .map(|i| Rectangle {
            id: i as i64,
            x0: (i % cols) as f64 * cell[0],
            y0: (i / cols) as f64 * cell[1],
            w: cell[0],
            h: cell[1],
            data_type: DataType::Bubble,
            options: None,
            aoi: None,
        })
        .collect();
    TableTemplate {
        id: TemplateId::Int(id),
        name: None,
        description: None,
        rectangles,
    }
}

fn detector() -> Detector {
    let library = TemplateLibrary::new(vec![
        grid_template(1, 2, 2, [10.0, 10.0]),
        grid_template(2, 3, 3, [17.0, 12.0]),
        grid_template(3, 4, 3, [17.0, 12.0]),
    ])
    .unwrap();
    Detector::with_config(library, fast_config())
}

/// Top-left corner of cell `i` on the unwarped page.
fn cell_origin(i: usize) -> [f64; 2] {
    [
        (ORIGIN[0] + (i % 3) as i32 * CELL[0]) as f64,
        (ORIGIN[1] + (i / 3) as i32 * CELL[1]) as f64,
    ]
}

#[test]
fn flat_form_matches_its_template() {
    let found = detector().detect(&render_form()).unwrap();

    assert_eq!(found.table_template_id, TemplateId::Int(2));
    assert_eq!(found.rectangles.len(), 9);
    assert_eq!(found.n_fitted(), 9);
    let truth_area = (CELL[0] * CELL[1]) as f64;
    for (i, cell) in found.rectangles.iter().enumerate() {
        let [x, y] = cell_origin(i);
        assert!((cell.tl[0] as f64 - x).abs() <= 4.0, "cell {i}: {cell:?}");
        assert!((cell.tl[1] as f64 - y).abs() <= 4.0, "cell {i}: {cell:?}");
        let ratio = (cell.w * cell.h) as f64 / truth_area;
        assert!((1.0 - ratio).abs() < 0.06, "cell {i} area ratio {ratio}");
        assert!(cell.x0 >= 0 && cell.y0 >= 0);
        assert!(cell.x0 + cell.w <= 800 && cell.y0 + cell.h <= 600);
    }
}

#[test]
fn tilted_form_cells_follow_the_perspective() {
    let h = Matrix3::new(1.02, 0.03, -12.0, -0.02, 0.98, 14.0, 2e-5, -1e-5, 1.0);
    let found = detector().detect(&warp(&render_form(), &h)).unwrap();

    assert_eq!(found.table_template_id, TemplateId::Int(2));
    assert_eq!(found.n_fitted(), 9);
    for (i, cell) in found.rectangles.iter().enumerate() {
        let [x, y] = cell_origin(i);
        let expected = project(&h, x, y);
        let d = ((cell.tl[0] as f64 - expected[0]).powi(2) + (cell.tl[1] as f64 - expected[1]).powi(2)).sqrt();
        assert!(d < 5.0, "cell {i}: tl {:?} vs {expected:?}", cell.tl);
    }
}

#[test]
fn blank_page_has_no_table() {
    let page = GrayImage::from_pixel(800, 600, Luma([PAPER]));
    assert_eq!(detector().detect(&page).unwrap_err(), DetectError::NoContoursFound);
}

#[test]
fn mismatched_aspect_is_not_matched() {
    // Only a tall single-column layout is on offer.
    let library = TemplateLibrary::new(vec![grid_template(9, 1, 10, [10.0, 30.0])]).unwrap();
    let detector = Detector::with_config(library, fast_config());
    match detector.detect(&render_form()) {
        Err(DetectError::NoTemplateMatch { best_score }) => assert_eq!(best_score, 0.0),
        other => panic!("expected no match, got {other:?}"),
    }
}

#[test]
fn projection_skips_fitting() {
    let detector = detector();
    let found = detector
        .project_template(&render_form(), Some(&TemplateId::Int(2)))
        .unwrap();
    assert_eq!(found.rectangles.len(), 9);
    assert_eq!(found.n_fitted(), 0);
    assert_eq!(found.score, 0.0);
    // Corners sit on the outline, a couple of pixels outside the rulings.
    for (i, cell) in found.rectangles.iter().enumerate() {
        let [x, y] = cell_origin(i);
        assert!((cell.tl[0] as f64 - x).abs() <= 8.0, "cell {i}: {cell:?}");
        assert!((cell.tl[1] as f64 - y).abs() <= 8.0, "cell {i}: {cell:?}");
    }

    assert!(matches!(
        detector.project_template(&render_form(), Some(&TemplateId::Text("missing".into()))),
        Err(DetectError::InvalidTemplate(_))
    ));
}

#[test]
fn sharded_cells_round_trip_as_a_template() {
    let sharded = Detector::for_sharding(fast_config()).shard(&render_form()).unwrap();
    let template = sharded.to_template(TemplateId::Text("blank-form".into()));
    let json = serde_json::to_string(&vec![template]).unwrap();
    let library = TemplateLibrary::from_json_str(&json).unwrap();
    assert_eq!(library.len(), 1);
    let cells = &library.templates()[0].rectangles;
    assert!(cells.len() >= 9);
    assert!(cells.iter().all(|r| r.data_type == DataType::Float));
}
