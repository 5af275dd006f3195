//! Top-level orchestrator: preprocess → vote → filter → calibrate → measure.

use crate::calibration::resolve_calibration;
use crate::cancel::CancelToken;
use crate::detector::{
    detect_candidates, filter_candidates, preprocess, validate_circles, DetectedCircle,
    DetectionParameters,
};
use crate::distribution::analyze_distribution;
use crate::error::{AnalysisError, Result};
use crate::image_input::Image;

use super::{AnalysisConfig, AnalysisResult};

/// Preprocess, vote and filter. Parameters are validated before any work.
pub(crate) fn detect_circles(
    image: &Image,
    params: &DetectionParameters,
    cancel: &CancelToken,
) -> Result<Vec<DetectedCircle>> {
    params.validate()?;
    scan(image, params, cancel)
}

/// Calibrate (degrading gracefully) and summarize caller-supplied circles.
pub(crate) fn analyze_circles(
    circles: &[DetectedCircle],
    config: &AnalysisConfig,
) -> Result<AnalysisResult> {
    config.validate()?;
    validate_circles(circles)?;
    measure(circles, config)
}

/// Full pipeline on one image. Both configurations are checked up front.
pub(crate) fn run(
    image: &Image,
    params: &DetectionParameters,
    config: &AnalysisConfig,
    cancel: &CancelToken,
) -> Result<AnalysisResult> {
    params.validate()?;
    config.validate()?;
    let circles = scan(image, params, cancel)?;
    cancel.check()?;
    let mut result = measure(&circles, config)?;
    result.image_size = Some([image.width(), image.height()]);
    Ok(result)
}

/// Detection stages on already-validated parameters.
fn scan(
    image: &Image,
    params: &DetectionParameters,
    cancel: &CancelToken,
) -> Result<Vec<DetectedCircle>> {
    cancel.check()?;
    let gray = preprocess(image, &params.smoothing)?;
    cancel.check()?;
    let candidates = detect_candidates(&gray, params, cancel)?;
    let circles = filter_candidates(
        &candidates,
        params.min_center_distance_px,
        params.max_candidates,
    );
    tracing::info!(
        "Detected {} circles ({} raw candidates) in {}x{} image",
        circles.len(),
        candidates.len(),
        image.width(),
        image.height()
    );
    Ok(circles)
}

/// Calibration and statistics on a validated config and well-formed circles.
fn measure(circles: &[DetectedCircle], config: &AnalysisConfig) -> Result<AnalysisResult> {
    let (calibration, calibration_error) = match resolve_calibration(
        circles,
        config.reference_diameter_mm,
        config.reference,
        config.min_reference_separation,
    ) {
        Ok(c) => (Some(c), None),
        Err(e @ AnalysisError::CalibrationReferenceNotFound { .. }) => {
            tracing::warn!("{}; reporting sizes in pixels", e);
            (None, Some(e))
        }
        Err(e) => return Err(e),
    };

    let distribution = analyze_distribution(
        circles,
        calibration.as_ref(),
        config.bins,
        config.uniformity_tolerance,
    )?;
    let category = calibration
        .as_ref()
        .map(|_| config.thresholds.classify(distribution.median));

    if let Some(cat) = category {
        tracing::info!(
            "Analysis: {} particles, median {:.3} mm -> {:?} ({})",
            distribution.count,
            distribution.median,
            cat,
            cat.suggested_brew()
        );
    } else {
        tracing::info!(
            "Analysis: {} particles, median {:.1} px (uncalibrated)",
            distribution.count,
            distribution.median
        );
    }

    Ok(AnalysisResult {
        circles: circles.to_vec(),
        image_size: None,
        calibrated: calibration.is_some(),
        calibration,
        calibration_error,
        distribution,
        category,
    })
}
