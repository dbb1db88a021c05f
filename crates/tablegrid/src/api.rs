//! High-level detection API.
//!
//! [`Detector`] is the primary entry point. It wraps a validated
//! [`TemplateLibrary`] and a [`DetectConfig`]; create it once and run it on
//! many images. Detectors share no mutable state, so one instance can be
//! used from several threads.

use image::GrayImage;
use std::path::Path;

use crate::detector::{DetectConfig, DetectError};
use crate::pipeline::{self, ShardedTable, TableDetection};
use crate::template::{TemplateId, TemplateLibrary};

/// Primary detection interface.
///
/// # Examples
///
/// ```no_run
/// use tablegrid::Detector;
/// use std::path::Path;
///
/// let detector = Detector::from_templates_json_file(Path::new("templates.json")).unwrap();
/// let image = image::open("form.jpg").unwrap().to_luma8();
/// match detector.detect(&image) {
///     Ok(table) => println!("template {}: {} cells", table.table_template_id, table.rectangles.len()),
///     Err(e) => eprintln!("{e}"),
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Detector {
    templates: TemplateLibrary,
    config: DetectConfig,
}

impl Detector {
    /// Create a detector with default configuration.
    pub fn new(templates: TemplateLibrary) -> Self {
        Self::with_config(templates, DetectConfig::default())
    }

    /// Create with full config control.
    pub fn with_config(templates: TemplateLibrary, config: DetectConfig) -> Self {
        Self { templates, config }
    }

    /// A detector without templates, for [`Detector::shard`] only.
    pub fn for_sharding(config: DetectConfig) -> Self {
        Self::with_config(TemplateLibrary::default(), config)
    }

    /// Load templates from JSON and create a detector in one step.
    pub fn from_templates_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self::new(TemplateLibrary::from_json_file(path)?))
    }

    /// Access the current configuration.
    pub fn config(&self) -> &DetectConfig {
        &self.config
    }

    /// Mutable access to configuration for post-construction tuning.
    pub fn config_mut(&mut self) -> &mut DetectConfig {
        &mut self.config
    }

    pub fn templates(&self) -> &TemplateLibrary {
        &self.templates
    }

    /// Find the largest table in `image`, match it against the templates and
    /// return the matched template's cells in `image` pixels.
    pub fn detect(&self, image: &GrayImage) -> Result<TableDetection, DetectError> {
        pipeline::detect_table(image, self.templates.templates(), &self.config)
    }

    /// Cut the largest table in `image` into the cells formed by its own
    /// rulings. Templates are not used.
    pub fn shard(&self, image: &GrayImage) -> Result<ShardedTable, DetectError> {
        pipeline::shard_table(image, &self.config)
    }

    /// Project one template straight onto the largest table in `image`,
    /// skipping ruling detection and fitting. Without an `id` the first
    /// template is used.
    pub fn project_template(
        &self,
        image: &GrayImage,
        id: Option<&TemplateId>,
    ) -> Result<TableDetection, DetectError> {
        let template = match id {
            Some(id) => self.templates.get(id),
            None => self.templates.templates().first(),
        }
        .ok_or_else(|| match id {
            Some(id) => DetectError::InvalidTemplate(format!("unknown template id {id}")),
            None => DetectError::InvalidTemplate("no templates loaded".into()),
        })?;
        pipeline::project_only(image, template, &self.config)
    }
}
