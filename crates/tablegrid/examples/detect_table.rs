use image::ImageReader;
use std::error::Error;
use std::path::Path;
use tablegrid::Detector;

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <templates.json> <form.jpg> [out.json]", args[0]);
        std::process::exit(2);
    }

    let detector = Detector::from_templates_json_file(Path::new(&args[1]))?;
    let image = ImageReader::open(&args[2])?.decode()?.to_luma8();

    let table = match detector.detect(&image) {
        Ok(table) => table,
        Err(e) => {
            eprintln!("No table: {e}");
            std::process::exit(1);
        }
    };
    println!(
        "Template {} (score {:.4}): {} cells, {} fitted.",
        table.table_template_id,
        table.score,
        table.rectangles.len(),
        table.n_fitted()
    );
    for cell in table.rectangles.iter().take(5) {
        println!(
            "  cell {:>3}: {}x{} at ({}, {})",
            cell.rect_id, cell.w, cell.h, cell.x0, cell.y0
        );
    }

    if let Some(out_path) = args.get(3) {
        let json = serde_json::to_string_pretty(&table)?;
        std::fs::write(out_path, json)?;
        println!("Wrote {out_path}");
    }
    Ok(())
}
