use crate::homography::HomographyError;

/// Why a table could not be extracted from an image.
///
/// Each variant names the stage that gave up; processing of the image stops
/// there and no partial result is produced.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectError {
    /// No region passed contour validation, even after the extra dilation.
    NoContoursFound,
    /// Corner estimation failed for every candidate contour.
    NoCornersFound,
    /// The table homography could not be computed or inverted.
    DegenerateTransform(String),
    /// The best template scored below the acceptance threshold.
    NoTemplateMatch { best_score: f64 },
    /// A fitted or reprojected cell collapsed or left the table.
    InvalidCellGeometry(String),
    /// Template configuration rejected before processing.
    InvalidTemplate(String),
}

impl DetectError {
    /// Short name of the failing stage.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::NoContoursFound => "contour extraction",
            Self::NoCornersFound => "corner estimation",
            Self::DegenerateTransform(_) => "perspective normalization",
            Self::NoTemplateMatch { .. } => "template matching",
            Self::InvalidCellGeometry(_) => "cell fitting",
            Self::InvalidTemplate(_) => "template validation",
        }
    }
}

impl std::fmt::Display for DetectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: ", self.stage())?;
        match self {
            Self::NoContoursFound => write!(f, "no table-like contour found"),
            Self::NoCornersFound => write!(f, "no contour yielded four corners"),
            Self::DegenerateTransform(msg) => write!(f, "degenerate transform ({msg})"),
            Self::NoTemplateMatch { best_score } => {
                write!(f, "no template matched (best score {best_score:.4})")
            }
            Self::InvalidCellGeometry(msg) => write!(f, "invalid cell geometry ({msg})"),
            Self::InvalidTemplate(msg) => write!(f, "invalid template ({msg})"),
        }
    }
}

impl std::error::Error for DetectError {}

impl From<HomographyError> for DetectError {
    fn from(e: HomographyError) -> Self {
        Self::DegenerateTransform(e.to_string())
    }
}
