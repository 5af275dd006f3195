//! grindscope — pure-Rust particle sizing for coffee-grounds photographs.
//!
//! A photo of grounds spread on a plain background, with one circular
//! reference object of known size (a coin) in the frame, is turned into a
//! particle size distribution and a grind category. The pipeline stages are:
//!
//! 1. **Preprocess** – grayscale conversion and Gaussian smoothing.
//! 2. **Vote** – Canny edges plus gradient-directed Hough voting over a
//!    discrete radius range.
//! 3. **Filter** – confidence normalization and center-distance suppression.
//! 4. **Calibrate** – pick the reference circle and derive a mm/px scale.
//! 5. **Measure** – per-particle diameters, summary statistics, histogram and
//!    grind classification.
//!
//! # Public API
//! - [`AnalysisPipeline`] as the primary entry point
//! - [`detect`] / [`analyze`] for running the two halves independently
//! - [`DetectionParameters`] and [`AnalysisConfig`] for tuning
//! - [`AnalysisError`] with a [`UserAction`] hint for every failure
//!
//! Accumulator internals are not part of the public surface.

mod api;
mod calibration;
mod cancel;
mod detector;
mod distribution;
mod error;
mod image_input;
mod pipeline;

#[cfg(test)]
pub(crate) mod test_utils;

pub use api::{analyze, analyze_with_config, detect, detect_with_cancel, AnalysisPipeline};
pub use calibration::{resolve_calibration, CalibrationReference, ReferenceSelection};
pub use cancel::CancelToken;
pub use detector::{
    detect_candidates, filter_candidates, preprocess, smooth, CircleCandidate, DetectedCircle,
    DetectionParameters, EdgePolarity, SmoothingParams,
};
pub use distribution::{
    analyze_distribution, GrindCategory, GrindThresholds, Histogram, MeasurementUnit,
    ParticleMeasurement, SizeDistribution,
};
pub use error::{AnalysisError, Result, UserAction};
pub use image_input::{Image, PixelFormat};
pub use pipeline::{AnalysisConfig, AnalysisResult};
