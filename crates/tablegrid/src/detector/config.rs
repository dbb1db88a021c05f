use std::f64::consts::{FRAC_PI_2, PI};
use std::path::Path;

use crate::geometry::KMeansParams;
use crate::homography::{HomographyConfig, HomographySolver};

/// Allowed range for the longest side of an image, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DimensionBounds {
    pub min_len: u32,
    pub max_len: u32,
}

impl DimensionBounds {
    pub fn new(min_len: u32, max_len: u32) -> Self {
        Self { min_len, max_len }
    }
}

/// Threshold sweep and geometric gates for table contours.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ContourConfig {
    /// Canny low thresholds, outer sweep loop.
    pub canny_low: Vec<f32>,
    /// Canny high thresholds, middle sweep loop.
    pub canny_high: Vec<f32>,
    /// Whether to morphologically close the edge map, inner sweep loop.
    pub close_flags: Vec<bool>,
    /// Minimum child area over its min-area-rect area for a "cell".
    pub min_cell_rect_fill: f64,
    /// Minimum child area over its parent's area for a "cell".
    pub min_cell_parent_fraction: f64,
    /// Minimum number of cell children for a table candidate.
    pub min_children: usize,
    /// Maximum number of tables accepted per image.
    pub max_tables: usize,
    /// Sweep tie-break: a candidate set with similar area loses when its
    /// min-area-rect sum exceeds the incumbent's by this factor.
    pub min_rect_tie_factor: f64,
    /// Opening kernel side as a fraction of `sqrt(contour area)`.
    pub simplification_factor: f64,
    /// Lower bound for the opening kernel side.
    pub min_simplification_kernel: u32,
    /// Polygon approximation tolerance as a fraction of `sqrt(area)`.
    pub smooth_factor: f64,
    /// Minimum min-side/max-side ratio of the table's enclosing rectangle.
    pub min_aspect_ratio: f64,
    /// Minimum table area as a fraction of the image area.
    pub min_area_fraction: f64,
    /// Maximum perimeter/area ratio.
    pub max_perimeter_area_ratio: f64,
    /// Maximum accumulated interior angle of the smoothed polygon.
    pub max_poly_angle: f64,
    /// Maximum accumulated interior angle after opening hull defects.
    pub max_open_angle: f64,
    /// A defect is opened when a skipped vertex lies this close to its hull
    /// chord (pixels).
    pub defect_chord_distance: f64,
    /// Defects spanning at most this many vertices are always opened.
    pub max_defect_span: usize,
    /// Side of the extra dilation used when the first sweep finds nothing.
    pub extra_dilate_kernel: u32,
}

impl Default for ContourConfig {
    fn default() -> Self {
        Self {
            canny_low: vec![40.0, 30.0, 20.0, 10.0],
            canny_high: (0..14).map(|i| 200.0 - 10.0 * i as f32).collect(),
            close_flags: vec![false, true],
            min_cell_rect_fill: 0.95,
            min_cell_parent_fraction: 0.001,
            min_children: 6,
            max_tables: 4,
            min_rect_tie_factor: 1.02,
            simplification_factor: 0.05,
            min_simplification_kernel: 6,
            smooth_factor: 0.02,
            min_aspect_ratio: 0.4,
            min_area_fraction: 0.03,
            max_perimeter_area_ratio: 0.05,
            max_poly_angle: 12.0 * FRAC_PI_2,
            max_open_angle: 9.0 * FRAC_PI_2,
            defect_chord_distance: 4.0,
            max_defect_span: 2,
            extra_dilate_kernel: 5,
        }
    }
}

/// Line detection and clustering around a table contour.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CornerConfig {
    /// Minimum line length as a fraction of the contour's enclosing
    /// rectangle side.
    pub min_line_length_fraction: f64,
    pub hough_threshold: u32,
    /// Angle resolution of the Hough accumulator (radians).
    pub hough_theta: f64,
    pub hough_seed: u64,
    pub max_horizontal_slope: f64,
    pub min_vertical_slope: f64,
    /// Stroke width used when rasterizing the contour polygon.
    pub stroke_thickness: u32,
    /// Lines are extended by this fraction of their length before
    /// intersecting.
    pub extension_factor: f64,
    pub kmeans: KMeansParams,
}

impl Default for CornerConfig {
    fn default() -> Self {
        Self {
            min_line_length_fraction: 0.1,
            hough_threshold: 60,
            hough_theta: PI / 360.0,
            hough_seed: 0,
            max_horizontal_slope: 0.35,
            min_vertical_slope: 2.5,
            stroke_thickness: 3,
            extension_factor: 0.5,
            kmeans: KMeansParams::default(),
        }
    }
}

/// One bank of grid-line passes sharing a minimum length and closing flag.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LineBank {
    /// Canny high thresholds, one pass each.
    pub canny_high: Vec<f32>,
    /// Minimum line length as a fraction of the table side.
    pub min_length_fraction: f64,
    /// Close the edge map before line detection.
    pub close: bool,
}

/// Multi-pass grid-line detection on the normalized table.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GridLineConfig {
    pub canny_low: f32,
    /// Faint and short rulings.
    pub short_bank: LineBank,
    /// Long solid rulings, with gap closing.
    pub long_bank: LineBank,
    /// Hough vote thresholds tried within every pass.
    pub hough_thresholds: Vec<u32>,
    pub hough_theta: f64,
    pub hough_seed: u64,
    /// Maximum bridged gap as a fraction of the table side.
    pub max_gap_fraction: f64,
    pub min_gap_px: u32,
    /// Length of the directional kernels that suppress cross-direction
    /// strokes before line detection.
    pub directional_kernel: u32,
    /// A pass stops widening its gap once more than this many distinct
    /// lines are found.
    pub min_lines: usize,
    /// Stroke width used to merge near-duplicate detections.
    pub group_thickness: u32,
    pub max_horizontal_slope: f64,
    pub min_vertical_slope: f64,
    /// Merged lines shorter than this fraction of the table side are dropped.
    pub min_length_fraction: f64,
}

impl Default for GridLineConfig {
    fn default() -> Self {
        let bank: Vec<f32> = (0..8).map(|i| 130.0 - 10.0 * i as f32).collect();
        Self {
            canny_low: 20.0,
            short_bank: LineBank {
                canny_high: bank.clone(),
                min_length_fraction: 0.2,
                close: false,
            },
            long_bank: LineBank {
                canny_high: bank,
                min_length_fraction: 0.8,
                close: true,
            },
            hough_thresholds: vec![60, 70, 80, 90, 100, 110],
            hough_theta: PI / 360.0,
            hough_seed: 0,
            max_gap_fraction: 0.02,
            min_gap_px: 4,
            directional_kernel: 7,
            min_lines: 3,
            group_thickness: 5,
            max_horizontal_slope: 0.2,
            min_vertical_slope: 5.0,
            min_length_fraction: 0.2,
        }
    }
}

/// Template scoring and selection.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum smaller/larger ratio of table and template aspect ratios.
    pub min_aspect_compatibility: f64,
    /// Minimum score for a template to be accepted.
    pub min_score: f64,
    /// Line extension before intersecting detected grid lines.
    pub extension_factor: f64,
    /// Detected intersections must outnumber this fraction of the
    /// template's, otherwise the score is zero.
    pub min_intersection_fraction: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            min_aspect_compatibility: 0.6,
            min_score: 0.992,
            extension_factor: 0.25,
            min_intersection_fraction: 0.02,
        }
    }
}

/// Snapping template cells onto detected grid lines.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FittingConfig {
    /// Snap tolerance as a fraction of the cell's own size (must be < 0.5).
    pub closeness_factor: f64,
    /// Fitted cells whose area differs from the template by more than this
    /// ratio are reverted.
    pub max_area_ratio_diff: f64,
    pub repair_passes: usize,
    /// Two template cells share a wall when their edges are this close (px).
    pub adjacency_tolerance: f64,
    /// Allowed deviation from a whole number of quarter turns when deciding
    /// where a neighbour lies.
    pub quarter_turn_tolerance: f64,
}

impl Default for FittingConfig {
    fn default() -> Self {
        Self {
            closeness_factor: 0.1,
            max_area_ratio_diff: 0.25,
            repair_passes: 2,
            adjacency_tolerance: 4.0,
            quarter_turn_tolerance: FRAC_PI_2 * 0.1,
        }
    }
}

/// Top-level detection configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    /// Longest-side range the input image is resampled into.
    pub image_bounds: DimensionBounds,
    /// Longest-side range of the normalized table.
    pub table_bounds: DimensionBounds,
    pub contour: ContourConfig,
    pub corners: CornerConfig,
    pub grid_lines: GridLineConfig,
    pub matching: MatchingConfig,
    pub fitting: FittingConfig,
    /// Homography solver settings.
    pub homography: HomographyConfig,
    /// Homography entries smaller than this in magnitude are raised to it.
    pub matrix_entry_floor: f64,
    /// Reprojected cells narrower or shorter than this fail the table.
    pub min_cell_size_px: i32,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            image_bounds: DimensionBounds::new(1080, 2160),
            table_bounds: DimensionBounds::new(900, 1800),
            contour: ContourConfig::default(),
            corners: CornerConfig::default(),
            grid_lines: GridLineConfig::default(),
            matching: MatchingConfig::default(),
            fitting: FittingConfig::default(),
            homography: HomographyConfig::default(),
            matrix_entry_floor: 1e-6,
            min_cell_size_px: 2,
        }
    }
}

impl DetectConfig {
    /// Solver for every table homography, with the entry floor applied.
    pub(crate) fn solver(&self) -> HomographySolver<'_> {
        HomographySolver::new(&self.homography).with_entry_floor(self.matrix_entry_floor)
    }

    /// Load a (possibly partial) configuration from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}
