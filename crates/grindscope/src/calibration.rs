//! Pixel-to-millimeter scale from a reference object of known diameter.
//!
//! Capture convention places the reference (a coin or disc) prominently in
//! the frame, so the automatic policy picks the largest detected circle and
//! requires it to be clearly larger than the runner-up.

use serde::{Deserialize, Serialize};

use crate::detector::DetectedCircle;
use crate::error::{AnalysisError, Result};

/// How the reference circle is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceSelection {
    /// Largest circle, provided it is separated from the next-largest.
    #[default]
    Largest,
    /// Caller-chosen circle by index into the filtered list.
    Index(usize),
}

/// Resolved calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReference {
    /// Physical diameter of the reference object (mm).
    pub known_diameter_mm: f64,
    /// Circle used as the reference.
    pub circle: DetectedCircle,
    /// Index of `circle` in the filtered circle list.
    pub index: usize,
    /// Millimeters per pixel, always > 0.
    pub scale_mm_per_px: f64,
}

impl CalibrationReference {
    /// Convert a pixel length to millimeters.
    pub fn to_mm(&self, px: f64) -> f64 {
        px * self.scale_mm_per_px
    }
}

pub(crate) fn validate_known_diameter(known_diameter_mm: f64) -> Result<()> {
    if known_diameter_mm.is_finite() && known_diameter_mm > 0.0 {
        Ok(())
    } else {
        Err(AnalysisError::param(
            "reference_diameter_mm",
            format!("must be positive, got {known_diameter_mm}"),
        ))
    }
}

fn reference_at(
    circles: &[DetectedCircle],
    index: usize,
    known_diameter_mm: f64,
) -> Result<CalibrationReference> {
    let circle = circles.get(index).copied().ok_or_else(|| {
        AnalysisError::no_reference(format!(
            "reference index {index} out of range ({} circles)",
            circles.len()
        ))
    })?;
    let diameter_px = circle.diameter() as f64;
    if !(diameter_px.is_finite() && diameter_px > 0.0) {
        return Err(AnalysisError::no_reference("reference circle has no extent"));
    }
    Ok(CalibrationReference {
        known_diameter_mm,
        circle,
        index,
        scale_mm_per_px: known_diameter_mm / diameter_px,
    })
}

/// Pick the reference circle and derive the scale.
///
/// `min_separation` is the minimum relative gap `(d1 - d2) / d1` between the
/// largest diameter `d1` and the next-largest `d2`. A lone circle always
/// qualifies. Ties on radius resolve to the earlier (higher-confidence) entry.
pub fn resolve_calibration(
    circles: &[DetectedCircle],
    known_diameter_mm: f64,
    selection: ReferenceSelection,
    min_separation: f64,
) -> Result<CalibrationReference> {
    validate_known_diameter(known_diameter_mm)?;
    if circles.is_empty() {
        return Err(AnalysisError::no_reference("no circles detected"));
    }

    let index = match selection {
        ReferenceSelection::Index(i) => i,
        ReferenceSelection::Largest => {
            let mut best = 0usize;
            for (i, c) in circles.iter().enumerate().skip(1) {
                if c.radius > circles[best].radius {
                    best = i;
                }
            }
            let d1 = circles[best].diameter() as f64;
            let runner_up = circles
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != best)
                .map(|(_, c)| c.diameter() as f64)
                .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.max(d))));
            if let Some(d2) = runner_up {
                let gap = (d1 - d2) / d1;
                if gap < min_separation {
                    return Err(AnalysisError::no_reference(format!(
                        "largest circle ({d1:.1}px) is not separated from the next ({d2:.1}px): \
                         gap {gap:.3} < {min_separation:.3}"
                    )));
                }
            }
            best
        }
    };

    let reference = reference_at(circles, index, known_diameter_mm)?;
    tracing::debug!(
        "Calibration: circle #{} d={:.1}px -> {:.5} mm/px",
        reference.index,
        reference.circle.diameter(),
        reference.scale_mm_per_px
    );
    Ok(reference)
}
