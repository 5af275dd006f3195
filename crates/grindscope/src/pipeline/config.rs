use crate::calibration::{validate_known_diameter, ReferenceSelection};
use crate::distribution::GrindThresholds;
use crate::error::{AnalysisError, Result};

/// Analysis controls consumed after detection.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Physical diameter (mm) of the reference object in the frame.
    pub reference_diameter_mm: f64,
    /// Reference selection policy.
    pub reference: ReferenceSelection,
    /// Minimum relative diameter gap between the reference and the
    /// next-largest circle, in `[0, 1)`.
    pub min_reference_separation: f64,
    /// Histogram bin count (>= 1).
    pub bins: usize,
    /// Median-diameter band boundaries for grind classification.
    pub thresholds: GrindThresholds,
    /// Half-width of the uniformity band as a fraction of the median.
    pub uniformity_tolerance: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            // US quarter
            reference_diameter_mm: 24.26,
            reference: ReferenceSelection::default(),
            min_reference_separation: 0.15,
            bins: 8,
            thresholds: GrindThresholds::default(),
            uniformity_tolerance: 0.2,
        }
    }
}

impl AnalysisConfig {
    /// Default configuration with a specific reference diameter and bin count.
    pub fn with_reference(reference_diameter_mm: f64, bins: usize) -> Self {
        Self {
            reference_diameter_mm,
            bins,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_known_diameter(self.reference_diameter_mm)?;
        if self.bins == 0 {
            return Err(AnalysisError::param("bins", "must be >= 1"));
        }
        let sep = self.min_reference_separation;
        if !(sep.is_finite() && (0.0..1.0).contains(&sep)) {
            return Err(AnalysisError::param(
                "min_reference_separation",
                format!("must be in [0, 1), got {sep}"),
            ));
        }
        let tol = self.uniformity_tolerance;
        if !(tol.is_finite() && tol > 0.0) {
            return Err(AnalysisError::param(
                "uniformity_tolerance",
                format!("must be positive, got {tol}"),
            ));
        }
        self.thresholds.validate()
    }
}
