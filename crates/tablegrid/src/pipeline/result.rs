use crate::detector::ReprojectedCell;
use crate::template::{Rectangle, TableTemplate, TemplateId};

/// A table found in an image and matched to a template.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TableDetection {
    /// Source image height in pixels.
    pub height: u32,
    /// Source image width in pixels.
    pub width: u32,
    pub table_template_id: TemplateId,
    /// Template match score in `[0, 1]`.
    pub score: f64,
    /// Agreement between the fitted cells and the template, in `[0, 1]`.
    pub fit_score: f64,
    /// Table corners `[tl, tr, br, bl]` in source pixels.
    pub corners: [[f64; 2]; 4],
    /// Template cells in source pixels, in template order.
    pub rectangles: Vec<ReprojectedCell>,
}

impl TableDetection {
    pub fn n_fitted(&self) -> usize {
        self.rectangles.iter().filter(|c| c.fitted).count()
    }
}

/// Cells cut from a table's own rulings, without any template.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ShardedTable {
    /// Source image height in pixels.
    pub height: u32,
    /// Source image width in pixels.
    pub width: u32,
    /// Table corners `[tl, tr, br, bl]` in source pixels.
    pub corners: [[f64; 2]; 4],
    /// Size of the normalized table the cells are expressed in.
    pub table_width: u32,
    pub table_height: u32,
    /// One cell per pair of consecutive rulings, in normalized-table pixels.
    pub rectangles: Vec<Rectangle>,
}

impl ShardedTable {
    /// The cells as a template, ready to be edited and loaded back.
    pub fn to_template(&self, id: TemplateId) -> TableTemplate {
        TableTemplate {
            id,
            name: None,
            description: None,
            rectangles: self.rectangles.clone(),
        }
    }
}
