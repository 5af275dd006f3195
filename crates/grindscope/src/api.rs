//! High-level analysis API.
//!
//! [`AnalysisPipeline`] is the primary entry point. It wraps a
//! [`DetectionParameters`] / [`AnalysisConfig`] pair and can be reused for
//! many images; it holds no mutable state, so one instance may be shared
//! across threads. The free functions [`detect`] and [`analyze`] expose the
//! two halves of the pipeline independently.

use crate::cancel::CancelToken;
use crate::detector::{DetectedCircle, DetectionParameters};
use crate::error::Result;
use crate::image_input::Image;
use crate::pipeline::{self, AnalysisConfig, AnalysisResult};

/// Primary analysis interface.
///
/// # Examples
///
/// ```no_run
/// use grindscope::{AnalysisConfig, AnalysisPipeline, DetectionParameters, Image, PixelFormat};
///
/// let image = Image::new(640, 480, PixelFormat::Gray8, vec![255; 640 * 480]).unwrap();
/// let pipeline = AnalysisPipeline::new(
///     DetectionParameters::default(),
///     AnalysisConfig::with_reference(24.26, 8),
/// );
/// match pipeline.analyze(&image) {
///     Ok(result) => println!("{} particles", result.particle_count()),
///     Err(e) => println!("{e} -> {:?}", e.user_action()),
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct AnalysisPipeline {
    params: DetectionParameters,
    config: AnalysisConfig,
}

impl AnalysisPipeline {
    /// Create a pipeline with explicit detection and analysis settings.
    pub fn new(params: DetectionParameters, config: AnalysisConfig) -> Self {
        Self { params, config }
    }

    /// Access the detection parameters.
    pub fn params(&self) -> &DetectionParameters {
        &self.params
    }

    /// Mutable access to detection parameters for post-construction tuning.
    pub fn params_mut(&mut self) -> &mut DetectionParameters {
        &mut self.params
    }

    /// Access the analysis configuration.
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Mutable access to the analysis configuration.
    pub fn config_mut(&mut self) -> &mut AnalysisConfig {
        &mut self.config
    }

    /// Detect circles only.
    pub fn detect(&self, image: &Image) -> Result<Vec<DetectedCircle>> {
        pipeline::detect_circles(image, &self.params, &CancelToken::new())
    }

    /// Run the full pipeline.
    pub fn analyze(&self, image: &Image) -> Result<AnalysisResult> {
        self.run(image, &CancelToken::new())
    }

    /// Run the full pipeline, observing `cancel` between stages and radius
    /// buckets.
    pub fn run(&self, image: &Image, cancel: &CancelToken) -> Result<AnalysisResult> {
        pipeline::run(image, &self.params, &self.config, cancel)
    }
}

/// Preprocess, detect and filter circles in `image`.
///
/// Output is ordered by confidence desc, radius desc. An image without
/// circles yields an empty list, not an error.
pub fn detect(image: &Image, params: &DetectionParameters) -> Result<Vec<DetectedCircle>> {
    pipeline::detect_circles(image, params, &CancelToken::new())
}

/// Like [`detect`], but returns `Cancelled` if `cancel` fires mid-scan.
pub fn detect_with_cancel(
    image: &Image,
    params: &DetectionParameters,
    cancel: &CancelToken,
) -> Result<Vec<DetectedCircle>> {
    pipeline::detect_circles(image, params, cancel)
}

/// Calibrate against a reference of `reference_diameter_mm` and summarize
/// the remaining circles into `bins` histogram bins.
pub fn analyze(
    circles: &[DetectedCircle],
    reference_diameter_mm: f64,
    bins: usize,
) -> Result<AnalysisResult> {
    analyze_with_config(
        circles,
        &AnalysisConfig::with_reference(reference_diameter_mm, bins),
    )
}

/// [`analyze`] with full control over selection policy and thresholds.
pub fn analyze_with_config(
    circles: &[DetectedCircle],
    config: &AnalysisConfig,
) -> Result<AnalysisResult> {
    pipeline::analyze_circles(circles, config)
}
