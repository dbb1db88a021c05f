//! Table templates: static layouts of expected cell rectangles.
//!
//! Templates are JSON, either a single template object or an array of them:
//!
//! ```json
//! { "id": 7, "name": "attendance", "rectangles": [
//!     { "id": 0, "x0": 0, "y0": 0, "w": 120, "h": 40, "data_type": "info" },
//!     { "id": 1, "x0": 120, "y0": 0, "w": 80, "h": 40, "data_type": "bubble",
//!       "opts": "yes|no", "aoi": { "x0": 130, "y0": 5, "w": 60, "h": 30 } } ] }
//! ```
//!
//! Coordinates are in the template's own units; only their ratios matter.

use std::collections::HashSet;
use std::path::Path;

use crate::geometry::RectXywh;

/// Template identifier, numeric or textual in the JSON.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum TemplateId {
    Int(i64),
    Text(String),
}

impl std::fmt::Display for TemplateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// What a cell holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Info,
    String,
    Blackout,
    Bubble,
    Float,
    Integer,
}

/// Sub-rectangle of a cell holding the meaningful content.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Aoi {
    pub x0: f64,
    pub y0: f64,
    pub w: f64,
    pub h: f64,
}

impl Aoi {
    pub fn rect(&self) -> RectXywh {
        RectXywh::new(self.x0, self.y0, self.w, self.h)
    }
}

/// One expected cell of a template.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Rectangle {
    pub id: i64,
    pub x0: f64,
    pub y0: f64,
    pub w: f64,
    pub h: f64,
    pub data_type: DataType,
    #[serde(default, alias = "opts", skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aoi: Option<Aoi>,
}

impl Rectangle {
    pub fn rect(&self) -> RectXywh {
        RectXywh::new(self.x0, self.y0, self.w, self.h)
    }

    pub fn with_rect(&self, r: RectXywh) -> Self {
        Self {
            x0: r.x0,
            y0: r.y0,
            w: r.w,
            h: r.h,
            ..self.clone()
        }
    }
}

/// A table layout.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TableTemplate {
    pub id: TemplateId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub rectangles: Vec<Rectangle>,
}

impl TableTemplate {
    /// `(width, height)`: the far corner of the outermost rectangles.
    pub fn dimensions(&self) -> (f64, f64) {
        self.rectangles.iter().fold((0.0f64, 0.0f64), |(w, h), r| {
            (w.max(r.x0 + r.w), h.max(r.y0 + r.h))
        })
    }

    /// Width over height of the template's extent.
    pub fn aspect(&self) -> f64 {
        let (w, h) = self.dimensions();
        w / h.max(f64::MIN_POSITIVE)
    }

    /// Rectangles rescaled onto a `width × height` table, coordinates
    /// truncated to whole pixels.
    pub fn scaled_rectangles(&self, width: f64, height: f64) -> Vec<Rectangle> {
        let (tw, th) = self.dimensions();
        let sx = width / tw.max(f64::MIN_POSITIVE);
        let sy = height / th.max(f64::MIN_POSITIVE);
        let scale = |r: RectXywh| {
            RectXywh::new(
                (r.x0 * sx).trunc(),
                (r.y0 * sy).trunc(),
                (r.w * sx).trunc(),
                (r.h * sy).trunc(),
            )
        };
        self.rectangles
            .iter()
            .map(|r| {
                let mut out = r.with_rect(scale(r.rect()));
                out.aoi = r.aoi.map(|a| {
                    let s = scale(a.rect());
                    Aoi { x0: s.x0, y0: s.y0, w: s.w, h: s.h }
                });
                out
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.rectangles.is_empty() {
            return Err(format!("template {}: no rectangles", self.id));
        }
        let mut ids = HashSet::new();
        for r in &self.rectangles {
            let ctx = || format!("template {} rectangle {}", self.id, r.id);
            if !ids.insert(r.id) {
                return Err(format!("{}: duplicate rectangle id", ctx()));
            }
            let fields = [r.x0, r.y0, r.w, r.h];
            if fields.iter().any(|v| !v.is_finite()) {
                return Err(format!("{}: coordinates must be finite", ctx()));
            }
            if r.w <= 0.0 || r.h <= 0.0 {
                return Err(format!("{}: w and h must be > 0", ctx()));
            }
            if r.x0 < 0.0 || r.y0 < 0.0 {
                return Err(format!("{}: x0 and y0 must be >= 0", ctx()));
            }
            if let Some(a) = &r.aoi {
                if a.w <= 0.0 || a.h <= 0.0 {
                    return Err(format!("{}: aoi w and h must be > 0", ctx()));
                }
                let inside = a.x0 >= r.x0
                    && a.y0 >= r.y0
                    && a.x0 + a.w <= r.x0 + r.w
                    && a.y0 + a.h <= r.y0 + r.h;
                if !inside {
                    return Err(format!("{}: aoi must lie inside its rectangle", ctx()));
                }
            }
        }
        Ok(())
    }
}

/// All distinct corners of `rects`, sorted by `(x, y)`.
pub fn rectangle_intersections(rects: &[Rectangle]) -> Vec<[f64; 2]> {
    let mut points: Vec<[f64; 2]> = rects
        .iter()
        .flat_map(|r| {
            let (x1, y1, x2, y2) = r.rect().corners();
            [[x1, y1], [x1, y2], [x2, y1], [x2, y2]]
        })
        .collect();
    sort_dedup_points(&mut points);
    points
}

pub(crate) fn sort_dedup_points(points: &mut Vec<[f64; 2]>) {
    points.sort_by(|a, b| a[0].total_cmp(&b[0]).then(a[1].total_cmp(&b[1])));
    points.dedup();
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum TemplateFile {
    Many(Vec<TableTemplate>),
    One(TableTemplate),
}

/// Validated, read-only set of templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateLibrary {
    templates: Vec<TableTemplate>,
}

impl TemplateLibrary {
    pub fn new(templates: Vec<TableTemplate>) -> Result<Self, String> {
        if templates.is_empty() {
            return Err("template library is empty".to_string());
        }
        let mut ids = HashSet::new();
        for t in &templates {
            if !ids.insert(t.id.clone()) {
                return Err(format!("duplicate template id {}", t.id));
            }
            t.validate()?;
        }
        Ok(Self { templates })
    }

    /// Parse a single template object or an array of templates.
    pub fn from_json_str(data: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let templates = match serde_json::from_str::<TemplateFile>(data)? {
            TemplateFile::Many(v) => v,
            TemplateFile::One(t) => vec![t],
        };
        Self::new(templates).map_err(Into::into)
    }

    /// Load templates from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    pub fn templates(&self) -> &[TableTemplate] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn get(&self, id: &TemplateId) -> Option<&TableTemplate> {
        self.templates.iter().find(|t| &t.id == id)
    }
}
