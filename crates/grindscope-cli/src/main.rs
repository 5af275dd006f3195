//! grindscope CLI — command-line interface for coffee-grounds particle sizing.

use clap::{Args, Parser, Subcommand, ValueEnum};
use grindscope::{
    AnalysisConfig, AnalysisError, AnalysisPipeline, DetectionParameters, EdgePolarity, Image,
    PixelFormat,
};
use std::path::{Path, PathBuf};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "grindscope")]
#[command(
    about = "Detect coffee-grounds particles and a reference coin, then report a size distribution"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect circles in an image.
    Detect(CliDetectArgs),

    /// Detect, calibrate against a reference coin, and summarize particle sizes.
    Analyze(CliAnalyzeArgs),

    /// Print default detection parameters as JSON.
    Params,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolarityArg {
    Both,
    DarkOnLight,
    LightOnDark,
}

impl PolarityArg {
    fn to_core(self) -> EdgePolarity {
        match self {
            Self::Both => EdgePolarity::Both,
            Self::DarkOnLight => EdgePolarity::DarkOnLight,
            Self::LightOnDark => EdgePolarity::LightOnDark,
        }
    }
}

#[derive(Debug, Clone, Args)]
struct DetectionArgs {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    /// Detection parameters JSON file; CLI overrides apply on top.
    #[arg(long)]
    params: Option<PathBuf>,

    /// Path to write results (JSON). Printed to stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Smallest radius searched (px).
    #[arg(long)]
    min_radius: Option<u32>,

    /// Largest radius searched (px).
    #[arg(long)]
    max_radius: Option<u32>,

    /// Minimum accumulator support for a candidate.
    #[arg(long)]
    accumulator: Option<f32>,

    /// Canny high threshold.
    #[arg(long)]
    edge: Option<f32>,

    /// Minimum distance between accepted centers (px).
    #[arg(long)]
    min_dist: Option<f32>,

    /// Which side of an edge the vote is cast toward.
    #[arg(long, value_enum)]
    polarity: Option<PolarityArg>,

    /// Keep at most this many circles.
    #[arg(long)]
    max_candidates: Option<usize>,
}

impl DetectionArgs {
    fn to_params(&self) -> CliResult<DetectionParameters> {
        let mut params = match &self.params {
            Some(path) => DetectionParameters::from_json_file(path)?,
            None => DetectionParameters::default(),
        };
        if let Some(v) = self.min_radius {
            params.min_radius_px = v;
        }
        if let Some(v) = self.max_radius {
            params.max_radius_px = v;
        }
        if let Some(v) = self.accumulator {
            params.accumulator_threshold = v;
        }
        if let Some(v) = self.edge {
            params.edge_threshold = v;
        }
        if let Some(v) = self.min_dist {
            params.min_center_distance_px = v;
        }
        if let Some(v) = self.polarity {
            params.polarity = v.to_core();
        }
        if self.max_candidates.is_some() {
            params.max_candidates = self.max_candidates;
        }
        params.validate()?;
        Ok(params)
    }
}

#[derive(Debug, Clone, Args)]
struct CliDetectArgs {
    #[command(flatten)]
    detection: DetectionArgs,
}

#[derive(Debug, Clone, Args)]
struct CliAnalyzeArgs {
    #[command(flatten)]
    detection: DetectionArgs,

    /// Physical diameter of the reference object (mm). Default: US quarter.
    #[arg(long, default_value = "24.26")]
    reference_mm: f64,

    /// Use the circle at this index (detection order) as the reference
    /// instead of the largest one.
    #[arg(long)]
    reference_index: Option<usize>,

    /// Histogram bin count.
    #[arg(long, default_value = "8")]
    bins: usize,

    /// Minimum relative diameter gap between reference and next-largest circle.
    #[arg(long, default_value = "0.15")]
    separation: f64,
}

impl CliAnalyzeArgs {
    fn to_config(&self) -> CliResult<AnalysisConfig> {
        let mut config = AnalysisConfig::with_reference(self.reference_mm, self.bins);
        config.min_reference_separation = self.separation;
        if let Some(i) = self.reference_index {
            config.reference = grindscope::ReferenceSelection::Index(i);
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Detect(args) => run_detect(&args),
        Commands::Analyze(args) => run_analyze(&args),
        Commands::Params => run_params(),
    };
    if let Err(e) = &outcome {
        if let Some(err) = e.downcast_ref::<AnalysisError>() {
            tracing::error!("{} (suggested action: {:?})", err, err.user_action());
        }
    }
    outcome
}

// ── image loading ──────────────────────────────────────────────────────

fn load_image(path: &Path) -> CliResult<Image> {
    tracing::info!("Loading image: {}", path.display());

    let img = image::open(path).map_err(|e| -> CliError {
        format!("Failed to open image {}: {}", path.display(), e).into()
    })?;
    let rgb = img.to_rgb8();
    let (w, h) = rgb.dimensions();

    tracing::info!("Image size: {}x{}", w, h);

    Ok(Image::new(w, h, PixelFormat::Rgb8, rgb.into_raw())?)
}

fn write_json<T: serde::Serialize>(value: &T, out: Option<&Path>) -> CliResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => {
            std::fs::write(path, &json)?;
            tracing::info!("Results written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

// ── params ─────────────────────────────────────────────────────────────

fn run_params() -> CliResult<()> {
    write_json(&DetectionParameters::default(), None)
}

// ── detect ─────────────────────────────────────────────────────────────

fn run_detect(args: &CliDetectArgs) -> CliResult<()> {
    let params = args.detection.to_params()?;
    let image = load_image(&args.detection.image)?;

    let circles = grindscope::detect(&image, &params)?;
    if circles.is_empty() {
        let action = AnalysisError::NoCircleDetected.user_action();
        tracing::warn!("No circles detected (suggested action: {:?})", action);
    }

    write_json(&circles, args.detection.out.as_deref())
}

// ── analyze ────────────────────────────────────────────────────────────

fn run_analyze(args: &CliAnalyzeArgs) -> CliResult<()> {
    let params = args.detection.to_params()?;
    let config = args.to_config()?;
    let image = load_image(&args.detection.image)?;

    let pipeline = AnalysisPipeline::new(params, config);
    let result = pipeline.analyze(&image)?;

    if let Some(err) = &result.calibration_error {
        tracing::warn!(
            "Sizes reported in pixels: {} (suggested action: {:?})",
            err,
            err.user_action()
        );
    }
    let d = &result.distribution;
    tracing::info!(
        "{} particles: median={:.3} mean={:.3} sd={:.3} d10={:.3} d90={:.3} ({:?})",
        d.count,
        d.median,
        d.mean,
        d.std_dev,
        d.d10,
        d.d90,
        d.unit
    );
    if let Some(cat) = result.category {
        tracing::info!("Grind: {:?}, suited to {}", cat, cat.suggested_brew());
    }

    write_json(&result, args.detection.out.as_deref())
}
