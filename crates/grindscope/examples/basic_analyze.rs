use grindscope::{AnalysisConfig, AnalysisPipeline, DetectionParameters, Image, PixelFormat};
use image::ImageReader;
use std::error::Error;
use std::path::Path;

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!(
            "Usage: {} <image.png> <reference_diameter_mm> [params.json] [out.json]",
            args[0]
        );
        std::process::exit(2);
    }

    let rgb = ImageReader::open(&args[1])?.decode()?.to_rgb8();
    let (w, h) = rgb.dimensions();
    let image = Image::new(w, h, PixelFormat::Rgb8, rgb.into_raw())?;
    let reference_mm: f64 = args[2].parse()?;
    let params = match args.get(3) {
        Some(path) => DetectionParameters::from_json_file(Path::new(path))?,
        None => DetectionParameters::default(),
    };

    let pipeline = AnalysisPipeline::new(params, AnalysisConfig::with_reference(reference_mm, 8));
    let result = match pipeline.analyze(&image) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{e} (suggested action: {:?})", e.user_action());
            std::process::exit(1);
        }
    };

    let d = &result.distribution;
    println!(
        "{} particles, median {:.3} {:?}, uniformity {:.0}%",
        d.count,
        d.median,
        d.unit,
        d.uniformity * 100.0
    );
    match result.category {
        Some(cat) => println!("Grind: {:?} ({})", cat, cat.suggested_brew()),
        None => println!("No reference found; sizes are in pixels."),
    }

    if let Some(out_path) = args.get(4) {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(out_path, json)?;
        println!("Wrote {out_path}");
    }
    Ok(())
}
