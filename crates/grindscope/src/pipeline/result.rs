use crate::calibration::CalibrationReference;
use crate::detector::DetectedCircle;
use crate::distribution::{GrindCategory, SizeDistribution};
use crate::error::AnalysisError;

/// Full analysis result for a single image.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnalysisResult {
    /// Filtered circles, confidence desc / radius desc.
    pub circles: Vec<DetectedCircle>,
    /// Image dimensions [width, height], when the result came from an image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_size: Option<[u32; 2]>,
    /// Resolved calibration, absent when no reference qualified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calibration: Option<CalibrationReference>,
    /// Why calibration failed, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calibration_error: Option<AnalysisError>,
    /// Particle size statistics (mm when calibrated, pixels otherwise).
    pub distribution: SizeDistribution,
    /// Grind band of the median diameter; only available when calibrated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<GrindCategory>,
    /// `false` when sizes are in pixels because no reference qualified.
    pub calibrated: bool,
}

impl AnalysisResult {
    /// Returns `true` when sizes are in millimeters.
    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    /// Number of measured particles (reference excluded).
    pub fn particle_count(&self) -> usize {
        self.distribution.count
    }
}
