//! Particle measurements, size statistics and grind classification.

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationReference;
use crate::detector::DetectedCircle;
use crate::error::{AnalysisError, Result};

/// Unit of every diameter in a [`SizeDistribution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementUnit {
    Millimeters,
    /// Uncalibrated: raw pixel diameters.
    Pixels,
}

/// One measured particle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParticleMeasurement {
    /// Diameter in the distribution's unit.
    pub diameter: f64,
    /// Index of the source circle in the filtered list.
    pub circle_index: usize,
}

/// Fixed-bin histogram over the observed `[min, max]` range.
///
/// Bins are half-open except the last, which is closed on the right.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// `bins + 1` ascending edges.
    pub bin_edges: Vec<f64>,
    /// Per-bin counts.
    pub counts: Vec<usize>,
}

impl Histogram {
    /// Bin `values` into `bins` equal-width bins spanning their range.
    ///
    /// A degenerate range (all values equal) puts everything in the first bin.
    pub fn from_values(values: &[f64], bins: usize) -> Self {
        let bins = bins.max(1);
        let mut counts = vec![0usize; bins];
        if values.is_empty() {
            return Self {
                bin_edges: vec![0.0; bins + 1],
                counts,
            };
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let width = (max - min) / bins as f64;
        let bin_edges = (0..=bins).map(|i| min + width * i as f64).collect();
        for &v in values {
            let idx = if width > 0.0 {
                (((v - min) / width).floor() as usize).min(bins - 1)
            } else {
                0
            };
            counts[idx] += 1;
        }
        Self { bin_edges, counts }
    }
}

/// Summary statistics of the measured particles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeDistribution {
    pub unit: MeasurementUnit,
    /// Measurements in filtered-circle order.
    pub measurements: Vec<ParticleMeasurement>,
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    /// 10th percentile diameter.
    pub d10: f64,
    /// 90th percentile diameter.
    pub d90: f64,
    /// Share of particles within the uniformity tolerance of the median.
    pub uniformity: f64,
    pub histogram: Histogram,
}

/// Linear-interpolated percentile of an ascending slice, `q` in `[0, 1]`.
pub(crate) fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let t = pos - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * t
        }
    }
}

impl SizeDistribution {
    /// Summarize a set of measurements.
    ///
    /// Fails with [`AnalysisError::NoCircleDetected`] when `measurements` is
    /// empty.
    pub fn from_measurements(
        measurements: Vec<ParticleMeasurement>,
        unit: MeasurementUnit,
        bins: usize,
        uniformity_tolerance: f64,
    ) -> Result<Self> {
        if measurements.is_empty() {
            return Err(AnalysisError::NoCircleDetected);
        }
        let mut sorted: Vec<f64> = measurements.iter().map(|m| m.diameter).collect();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len() as f64;

        let mean = sorted.iter().sum::<f64>() / n;
        let var = sorted.iter().map(|d| (d - mean) * (d - mean)).sum::<f64>() / n;
        let median = percentile_sorted(&sorted, 0.5);
        let band = median.abs() * uniformity_tolerance;
        let within = sorted.iter().filter(|d| (*d - median).abs() <= band).count();

        Ok(Self {
            unit,
            count: sorted.len(),
            mean,
            median,
            std_dev: var.sqrt(),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            d10: percentile_sorted(&sorted, 0.1),
            d90: percentile_sorted(&sorted, 0.9),
            uniformity: within as f64 / n,
            histogram: Histogram::from_values(&sorted, bins),
            measurements,
        })
    }

    /// Convenience constructor from bare diameters.
    pub fn from_diameters(
        diameters: &[f64],
        unit: MeasurementUnit,
        bins: usize,
        uniformity_tolerance: f64,
    ) -> Result<Self> {
        let measurements = diameters
            .iter()
            .enumerate()
            .map(|(circle_index, &diameter)| ParticleMeasurement {
                diameter,
                circle_index,
            })
            .collect();
        Self::from_measurements(measurements, unit, bins, uniformity_tolerance)
    }
}

/// Grind band derived from the median particle diameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrindCategory {
    ExtraFine,
    Fine,
    Medium,
    Coarse,
    ExtraCoarse,
}

impl GrindCategory {
    /// Brew method this grind size is typically used for.
    pub fn suggested_brew(self) -> &'static str {
        match self {
            Self::ExtraFine => "turkish",
            Self::Fine => "espresso",
            Self::Medium => "drip / pour-over filter",
            Self::Coarse => "french press",
            Self::ExtraCoarse => "cold brew",
        }
    }
}

/// Upper diameter bounds (mm, exclusive) of each band below `ExtraCoarse`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrindThresholds {
    pub extra_fine_below_mm: f64,
    pub fine_below_mm: f64,
    pub medium_below_mm: f64,
    pub coarse_below_mm: f64,
}

impl Default for GrindThresholds {
    fn default() -> Self {
        Self {
            extra_fine_below_mm: 0.25,
            fine_below_mm: 0.5,
            medium_below_mm: 0.85,
            coarse_below_mm: 1.2,
        }
    }
}

impl GrindThresholds {
    pub fn validate(&self) -> Result<()> {
        let t = [
            self.extra_fine_below_mm,
            self.fine_below_mm,
            self.medium_below_mm,
            self.coarse_below_mm,
        ];
        if t.iter().any(|v| !(v.is_finite() && *v > 0.0)) {
            return Err(AnalysisError::param(
                "thresholds",
                "every grind threshold must be positive",
            ));
        }
        if t.windows(2).any(|p| p[0] >= p[1]) {
            return Err(AnalysisError::param(
                "thresholds",
                "grind thresholds must be strictly increasing",
            ));
        }
        Ok(())
    }

    /// Band for a median diameter in millimeters.
    pub fn classify(&self, median_mm: f64) -> GrindCategory {
        if median_mm < self.extra_fine_below_mm {
            GrindCategory::ExtraFine
        } else if median_mm < self.fine_below_mm {
            GrindCategory::Fine
        } else if median_mm < self.medium_below_mm {
            GrindCategory::Medium
        } else if median_mm < self.coarse_below_mm {
            GrindCategory::Coarse
        } else {
            GrindCategory::ExtraCoarse
        }
    }
}

/// Measure every non-reference circle and summarize.
///
/// Diameters are converted with the calibration scale when present;
/// otherwise they stay in pixels.
pub fn analyze_distribution(
    circles: &[DetectedCircle],
    calibration: Option<&CalibrationReference>,
    bins: usize,
    uniformity_tolerance: f64,
) -> Result<SizeDistribution> {
    let excluded = calibration.map(|c| c.index);
    let (unit, scale) = match calibration {
        Some(c) => (MeasurementUnit::Millimeters, c.scale_mm_per_px),
        None => (MeasurementUnit::Pixels, 1.0),
    };
    let measurements: Vec<ParticleMeasurement> = circles
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != excluded)
        .map(|(circle_index, c)| ParticleMeasurement {
            diameter: c.diameter() as f64 * scale,
            circle_index,
        })
        .collect();
    let dist = SizeDistribution::from_measurements(measurements, unit, bins, uniformity_tolerance)?;
    tracing::debug!(
        "Distribution: n={} mean={:.4} median={:.4} sd={:.4} ({:?})",
        dist.count,
        dist.mean,
        dist.median,
        dist.std_dev,
        dist.unit
    );
    Ok(dist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn statistics_of_one_two_three() {
        let d = SizeDistribution::from_diameters(
            &[3.0, 1.0, 2.0],
            MeasurementUnit::Millimeters,
            8,
            0.2,
        )
        .unwrap();
        assert_eq!(d.count, 3);
        assert_relative_eq!(d.mean, 2.0, epsilon = 1e-12);
        assert_relative_eq!(d.median, 2.0, epsilon = 1e-12);
        assert_relative_eq!(d.std_dev, 0.816_496_580_9, epsilon = 1e-6);
        assert_eq!(d.min, 1.0);
        assert_eq!(d.max, 3.0);
        // measurements keep input order
        assert_eq!(d.measurements[0].diameter, 3.0);
    }

    #[test]
    fn even_count_median_averages_middle_pair() {
        let d = SizeDistribution::from_diameters(
            &[4.0, 1.0, 3.0, 2.0],
            MeasurementUnit::Pixels,
            4,
            0.2,
        )
        .unwrap();
        assert_relative_eq!(d.median, 2.5, epsilon = 1e-12);
        assert_relative_eq!(d.d10, 1.3, epsilon = 1e-12);
        assert_relative_eq!(d.d90, 3.7, epsilon = 1e-12);
    }

    #[test]
    fn empty_measurements_report_no_circle() {
        let err =
            SizeDistribution::from_diameters(&[], MeasurementUnit::Pixels, 8, 0.2).unwrap_err();
        assert_eq!(err, AnalysisError::NoCircleDetected);
    }

    #[test]
    fn histogram_spans_observed_range() {
        let h = Histogram::from_values(&[0.0, 1.0, 2.0, 3.0, 4.0, 8.0], 4);
        assert_eq!(h.bin_edges, vec![0.0, 2.0, 4.0, 6.0, 8.0]);
        assert_eq!(h.counts, vec![2, 2, 1, 1]);
        assert_eq!(h.counts.iter().sum::<usize>(), 6);
    }

    #[test]
    fn degenerate_histogram_uses_first_bin() {
        let h = Histogram::from_values(&[1.5, 1.5, 1.5], 8);
        assert_eq!(h.counts[0], 3);
        assert_eq!(h.counts.iter().sum::<usize>(), 3);
        assert_eq!(h.bin_edges.len(), 9);
    }

    #[test]
    fn uniformity_counts_particles_near_median() {
        let d = SizeDistribution::from_diameters(
            &[1.0, 0.95, 1.05, 1.5, 0.4],
            MeasurementUnit::Millimeters,
            8,
            0.2,
        )
        .unwrap();
        assert_relative_eq!(d.uniformity, 0.6, epsilon = 1e-12);
    }

    #[test]
    fn classification_bands() {
        let t = GrindThresholds::default();
        assert_eq!(t.classify(0.1), GrindCategory::ExtraFine);
        assert_eq!(t.classify(0.3), GrindCategory::Fine);
        assert_eq!(t.classify(0.5), GrindCategory::Medium);
        assert_eq!(t.classify(1.0), GrindCategory::Coarse);
        assert_eq!(t.classify(1.2), GrindCategory::ExtraCoarse);
        assert_eq!(GrindCategory::Fine.suggested_brew(), "espresso");
    }

    #[test]
    fn thresholds_must_increase() {
        let t = GrindThresholds {
            fine_below_mm: 0.2,
            ..Default::default()
        };
        assert!(t.validate().is_err());
        assert!(GrindThresholds::default().validate().is_ok());
    }

    #[test]
    fn reference_circle_is_excluded_and_scaled() {
        let circles = [
            DetectedCircle {
                x: 10.0,
                y: 10.0,
                radius: 50.0,
                confidence: 1.0,
            },
            DetectedCircle {
                x: 200.0,
                y: 10.0,
                radius: 2.0,
                confidence: 0.5,
            },
        ];
        let cal = CalibrationReference {
            known_diameter_mm: 24.26,
            circle: circles[0],
            index: 0,
            scale_mm_per_px: 0.2426,
        };
        let d = analyze_distribution(&circles, Some(&cal), 8, 0.2).unwrap();
        assert_eq!(d.unit, MeasurementUnit::Millimeters);
        assert_eq!(d.count, 1);
        assert_eq!(d.measurements[0].circle_index, 1);
        assert_relative_eq!(d.mean, 4.0 * 0.2426, epsilon = 1e-6);

        let only_reference = analyze_distribution(&circles[..1], Some(&cal), 8, 0.2).unwrap_err();
        assert_eq!(only_reference, AnalysisError::NoCircleDetected);
    }

    #[test]
    fn uncalibrated_sizes_stay_in_pixels() {
        let circles = [DetectedCircle {
            x: 0.0,
            y: 0.0,
            radius: 3.5,
            confidence: 1.0,
        }];
        let d = analyze_distribution(&circles, None, 8, 0.2).unwrap();
        assert_eq!(d.unit, MeasurementUnit::Pixels);
        assert_relative_eq!(d.median, 7.0, epsilon = 1e-12);
    }
}
