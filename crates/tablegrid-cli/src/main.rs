//! tablegrid CLI: command-line interface for table detection in form photos.

use clap::{Args, Parser, Subcommand};
use image::GrayImage;
use std::path::{Path, PathBuf};

use tablegrid::{DetectConfig, Detector, TemplateId, TemplateLibrary};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpeg", "jpg", "png"];
const MIN_IMAGE_SIDE: u32 = 600;
const MAX_IMAGE_SIDE: u32 = 10_000;

#[derive(Parser)]
#[command(name = "tablegrid")]
#[command(about = "Detect printed tables in photographed forms and locate their template cells")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect the table in an image and reproject the matched template's cells.
    Detect(CliDetectArgs),

    /// Print id, cell count, size and aspect of every template in a file.
    TemplateInfo {
        /// Path to the templates JSON.
        #[arg(long)]
        templates: PathBuf,
    },

    /// Cut the table into the cells formed by its own rulings.
    Shard(CliShardArgs),

    /// Print the default detection configuration as JSON.
    DefaultConfig,
}

#[derive(Debug, Clone, Args)]
struct CliDetectArgs {
    /// Path to the input image (jpeg, jpg or png).
    #[arg(long)]
    image: PathBuf,

    /// Path to the templates JSON (one template or an array).
    #[arg(long)]
    templates: PathBuf,

    /// Path to write detection results (JSON).
    #[arg(long)]
    out: PathBuf,

    /// Optional detection config JSON; missing fields take defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Project a template onto the table corners without fitting it to rulings.
    #[arg(long)]
    project_only: bool,

    /// Template to project with --project-only (defaults to the first one).
    #[arg(long, requires = "project_only")]
    template_id: Option<String>,
}

#[derive(Debug, Clone, Args)]
struct CliShardArgs {
    /// Path to the input image (jpeg, jpg or png).
    #[arg(long)]
    image: PathBuf,

    /// Path to write the sharded cells (JSON).
    #[arg(long)]
    out: PathBuf,

    /// Optional detection config JSON; missing fields take defaults.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Detect(args) => run_detect(&args),
        Commands::TemplateInfo { templates } => run_template_info(&templates),
        Commands::Shard(args) => run_shard(&args),
        Commands::DefaultConfig => run_default_config(),
    }
}

// ── input ──────────────────────────────────────────────────────────────

fn load_config(path: Option<&Path>) -> CliResult<DetectConfig> {
    match path {
        Some(p) => {
            tracing::info!("Loading config: {}", p.display());
            DetectConfig::from_json_file(p)
                .map_err(|e| -> CliError { format!("Failed to load config {}: {}", p.display(), e).into() })
        }
        None => Ok(DetectConfig::default()),
    }
}

/// Open `path` as grayscale after checking it exists, has an accepted
/// extension and a size within the accepted range on both sides.
fn load_image(path: &Path) -> CliResult<GrayImage> {
    tracing::info!("Loading image: {}", path.display());
    if !path.is_file() {
        return Err(format!("Image not found: {}", path.display()).into());
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        return Err(format!(
            "Unsupported image extension {:?}; expected one of {:?}",
            ext, IMAGE_EXTENSIONS
        )
        .into());
    }

    let img = image::open(path)
        .map_err(|e| -> CliError { format!("Failed to open image {}: {}", path.display(), e).into() })?;
    let gray = img.to_luma8();
    let (w, h) = gray.dimensions();
    tracing::info!("Image size: {}x{}", w, h);

    let side_ok = |s: u32| (MIN_IMAGE_SIDE..=MAX_IMAGE_SIDE).contains(&s);
    if !side_ok(w) || !side_ok(h) {
        return Err(format!(
            "Image size {}x{} outside the accepted {}..{} px per side",
            w, h, MIN_IMAGE_SIDE, MAX_IMAGE_SIDE
        )
        .into());
    }
    Ok(gray)
}

fn load_templates(path: &Path) -> CliResult<TemplateLibrary> {
    tracing::info!("Loading templates: {}", path.display());
    TemplateLibrary::from_json_file(path)
        .map_err(|e| -> CliError { format!("Invalid templates {}: {}", path.display(), e).into() })
}

/// Numeric ids in the templates file are matched as numbers.
fn parse_template_id(raw: &str) -> TemplateId {
    raw.parse::<i64>()
        .map(TemplateId::Int)
        .unwrap_or_else(|_| TemplateId::Text(raw.to_string()))
}

fn write_json<T: serde::Serialize>(value: &T, out: &Path) -> CliResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(out, &json)?;
    tracing::info!("Results written to {}", out.display());
    Ok(())
}

// ── detect ─────────────────────────────────────────────────────────────

fn run_detect(args: &CliDetectArgs) -> CliResult<()> {
    let config = load_config(args.config.as_deref())?;
    let templates = load_templates(&args.templates)?;
    let gray = load_image(&args.image)?;
    let detector = Detector::with_config(templates, config);

    let result = if args.project_only {
        let id = args.template_id.as_deref().map(parse_template_id);
        detector.project_template(&gray, id.as_ref())?
    } else {
        detector.detect(&gray)?
    };

    tracing::info!(
        "Template {} (score {:.4}, fit {:.4}): {} cells, {} fitted",
        result.table_template_id,
        result.score,
        result.fit_score,
        result.rectangles.len(),
        result.n_fitted(),
    );
    write_json(&result, &args.out)
}

// ── shard ──────────────────────────────────────────────────────────────

fn run_shard(args: &CliShardArgs) -> CliResult<()> {
    let config = load_config(args.config.as_deref())?;
    let gray = load_image(&args.image)?;

    let sharded = Detector::for_sharding(config).shard(&gray)?;
    tracing::info!(
        "Sharded {}x{} table into {} cells",
        sharded.table_width,
        sharded.table_height,
        sharded.rectangles.len(),
    );
    write_json(&sharded, &args.out)
}

// ── template-info ──────────────────────────────────────────────────────

fn run_template_info(path: &Path) -> CliResult<()> {
    let library = load_templates(path)?;

    println!("{} template(s) in {}", library.len(), path.display());
    for t in library.templates() {
        let (w, h) = t.dimensions();
        println!("  id {}", t.id);
        if let Some(name) = &t.name {
            println!("    name:        {}", name);
        }
        println!("    rectangles:  {}", t.rectangles.len());
        println!("    size:        {}x{}", w, h);
        println!("    aspect:      {:.4}", t.aspect());
    }

    Ok(())
}

// ── default-config ─────────────────────────────────────────────────────

fn run_default_config() -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(&DetectConfig::default())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_template_ids_parse_as_numbers() {
        assert_eq!(parse_template_id("12"), TemplateId::Int(12));
        assert_eq!(parse_template_id("attendance"), TemplateId::Text("attendance".into()));
    }

    #[test]
    fn image_input_is_validated_before_decoding() {
        let missing = std::env::temp_dir().join("tablegrid-cli-missing.png");
        assert!(load_image(&missing).is_err());

        let wrong_ext = std::env::temp_dir().join("tablegrid-cli-form.gif");
        std::fs::write(&wrong_ext, b"GIF89a").unwrap();
        let err = load_image(&wrong_ext).unwrap_err().to_string();
        std::fs::remove_file(&wrong_ext).unwrap();
        assert!(err.contains("Unsupported image extension"), "{err}");

        let small = std::env::temp_dir().join("tablegrid-cli-small.png");
        GrayImage::new(100, 800).save(&small).unwrap();
        let err = load_image(&small).unwrap_err().to_string();
        std::fs::remove_file(&small).unwrap();
        assert!(err.contains("outside the accepted"), "{err}");
    }
}
