use std::path::Path;

use crate::error::{AnalysisError, Result};

/// Fixed-kernel Gaussian smoothing applied before edge analysis.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SmoothingParams {
    /// Kernel width in pixels (odd, >= 1). A width of 1 disables smoothing.
    pub kernel_size: usize,
    /// Gaussian standard deviation in pixels.
    pub sigma: f32,
}

impl Default for SmoothingParams {
    fn default() -> Self {
        Self {
            kernel_size: 5,
            sigma: 1.0,
        }
    }
}

/// Which side of an edge the circle center is expected on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgePolarity {
    /// Vote on both sides of every edge pixel.
    #[default]
    Both,
    /// Dark particles on a light background (center lies against the gradient).
    DarkOnLight,
    /// Light particles on a dark background (center lies along the gradient).
    LightOnDark,
}

impl EdgePolarity {
    /// Signs applied to the unit gradient when stepping toward a center.
    pub(crate) fn vote_signs(self) -> &'static [f32] {
        match self {
            Self::Both => &[-1.0, 1.0],
            Self::DarkOnLight => &[-1.0],
            Self::LightOnDark => &[1.0],
        }
    }
}

/// Circle detection parameters.
///
/// Defaults follow the classic two-threshold Hough setup: Canny high
/// threshold 100, accumulator threshold 30.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DetectionParameters {
    /// Canny high threshold on Sobel gradient magnitude.
    pub edge_threshold: f32,
    /// Canny low threshold as a fraction of `edge_threshold`, in (0, 1].
    pub edge_low_ratio: f32,
    /// Minimum number of votes within one pixel of an accumulator peak.
    pub accumulator_threshold: f32,
    /// Smallest radius searched (pixels).
    pub min_radius_px: u32,
    /// Largest radius searched (pixels).
    pub max_radius_px: u32,
    /// Accepted circles must be strictly farther apart than this (pixels).
    pub min_center_distance_px: f32,
    /// Pre-detection noise suppression.
    pub smoothing: SmoothingParams,
    /// Voting direction relative to the edge gradient.
    pub polarity: EdgePolarity,
    /// Optional cap on the number of circles kept after filtering.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_candidates: Option<usize>,
}

impl Default for DetectionParameters {
    fn default() -> Self {
        Self {
            edge_threshold: 100.0,
            edge_low_ratio: 0.5,
            accumulator_threshold: 30.0,
            min_radius_px: 5,
            max_radius_px: 60,
            min_center_distance_px: 10.0,
            smoothing: SmoothingParams::default(),
            polarity: EdgePolarity::default(),
            max_candidates: None,
        }
    }
}

impl DetectionParameters {
    /// Canny `(low, high)` thresholds.
    pub fn edge_thresholds(&self) -> (f32, f32) {
        (self.edge_threshold * self.edge_low_ratio, self.edge_threshold)
    }

    /// Check every field; the first violation is reported.
    pub fn validate(&self) -> Result<()> {
        positive("edge_threshold", self.edge_threshold)?;
        positive("accumulator_threshold", self.accumulator_threshold)?;
        positive("min_center_distance_px", self.min_center_distance_px)?;
        positive("smoothing.sigma", self.smoothing.sigma)?;
        if !(self.edge_low_ratio > 0.0 && self.edge_low_ratio <= 1.0) {
            return Err(AnalysisError::param(
                "edge_low_ratio",
                format!("must be in (0, 1], got {}", self.edge_low_ratio),
            ));
        }
        if self.min_radius_px == 0 {
            return Err(AnalysisError::param("min_radius_px", "must be > 0"));
        }
        if self.min_radius_px > self.max_radius_px {
            return Err(AnalysisError::param(
                "min_radius_px",
                format!(
                    "min radius {} exceeds max radius {}",
                    self.min_radius_px, self.max_radius_px
                ),
            ));
        }
        let k = self.smoothing.kernel_size;
        if k == 0 || k % 2 == 0 {
            return Err(AnalysisError::param(
                "smoothing.kernel_size",
                format!("must be odd and >= 1, got {k}"),
            ));
        }
        if self.max_candidates == Some(0) {
            return Err(AnalysisError::param("max_candidates", "must be >= 1 when set"));
        }
        Ok(())
    }

    /// Parse parameters from a JSON document; missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Load parameters from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }
}

fn positive(field: &str, v: f32) -> Result<()> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(AnalysisError::param(field, format!("must be positive, got {v}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let p = DetectionParameters::default();
        assert!(p.validate().is_ok());
        assert_eq!(p.edge_thresholds(), (50.0, 100.0));
    }

    #[test]
    fn inverted_radius_range_is_rejected() {
        let p = DetectionParameters {
            min_radius_px: 40,
            max_radius_px: 10,
            ..Default::default()
        };
        match p.validate() {
            Err(AnalysisError::InvalidParameterRange { field, .. }) => {
                assert_eq!(field, "min_radius_px")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn non_positive_thresholds_are_rejected() {
        for p in [
            DetectionParameters {
                edge_threshold: 0.0,
                ..Default::default()
            },
            DetectionParameters {
                accumulator_threshold: -1.0,
                ..Default::default()
            },
            DetectionParameters {
                min_center_distance_px: 0.0,
                ..Default::default()
            },
            DetectionParameters {
                edge_threshold: f32::NAN,
                ..Default::default()
            },
        ] {
            assert!(p.validate().is_err(), "{p:?}");
        }
    }

    #[test]
    fn even_kernel_is_rejected() {
        let p = DetectionParameters {
            smoothing: SmoothingParams {
                kernel_size: 4,
                sigma: 1.0,
            },
            ..Default::default()
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let p = DetectionParameters::from_json_str(
            r#"{"min_radius_px": 8, "max_radius_px": 90, "polarity": "dark_on_light"}"#,
        )
        .unwrap();
        assert_eq!(p.min_radius_px, 8);
        assert_eq!(p.max_radius_px, 90);
        assert_eq!(p.polarity, EdgePolarity::DarkOnLight);
        assert_eq!(p.accumulator_threshold, 30.0);
    }

    #[test]
    fn invalid_json_values_fail_validation() {
        let err = DetectionParameters::from_json_str(r#"{"min_radius_px": 0}"#).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidParameterRange { .. }));
        let err = DetectionParameters::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, AnalysisError::Config { .. }));
    }
}
