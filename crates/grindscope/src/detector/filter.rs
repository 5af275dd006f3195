//! Center-distance non-maximum suppression and confidence normalization.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::hough::CircleCandidate;
use crate::error::{AnalysisError, Result};

/// A filtered circle with a normalized confidence in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectedCircle {
    /// Center x (pixels).
    pub x: f32,
    /// Center y (pixels).
    pub y: f32,
    /// Radius (pixels), always > 0.
    pub radius: f32,
    /// Support relative to the strongest candidate of the same run.
    pub confidence: f32,
}

impl DetectedCircle {
    /// Diameter in pixels.
    pub fn diameter(&self) -> f32 {
        2.0 * self.radius
    }

    fn dist_sq(&self, x: f32, y: f32) -> f32 {
        let dx = self.x - x;
        let dy = self.y - y;
        dx * dx + dy * dy
    }
}

/// Total order used for both acceptance and output:
/// strength desc, radius desc, x asc, y asc.
fn rank(a_strength: f32, a: [f32; 3], b_strength: f32, b: [f32; 3]) -> Ordering {
    b_strength
        .total_cmp(&a_strength)
        .then_with(|| b[2].total_cmp(&a[2]))
        .then_with(|| a[0].total_cmp(&b[0]))
        .then_with(|| a[1].total_cmp(&b[1]))
}

fn is_valid(c: &CircleCandidate) -> bool {
    c.x.is_finite()
        && c.y.is_finite()
        && c.radius.is_finite()
        && c.radius > 0.0
        && c.support.is_finite()
        && c.support >= 0.0
}

/// Reject caller-supplied circles with non-finite geometry, a non-positive
/// radius, or a confidence outside `[0, 1]`.
pub(crate) fn validate_circles(circles: &[DetectedCircle]) -> Result<()> {
    for (i, c) in circles.iter().enumerate() {
        let geometry_ok =
            c.x.is_finite() && c.y.is_finite() && c.radius.is_finite() && c.radius > 0.0;
        let confidence_ok = c.confidence.is_finite() && (0.0..=1.0).contains(&c.confidence);
        if !(geometry_ok && confidence_ok) {
            return Err(AnalysisError::param(
                &format!("circles[{i}]"),
                format!(
                    "needs finite center, radius > 0 and confidence in [0, 1], got {:?}",
                    c
                ),
            ));
        }
    }
    Ok(())
}

/// Deduplicate near-coincident candidates and normalize confidence.
///
/// The result does not depend on the input order. Confidence is each
/// survivor's support divided by the maximum support over all valid
/// candidates, so the strongest detection always has confidence 1.0.
/// Output is sorted by confidence desc, radius desc (then x, y asc).
pub fn filter_candidates(
    candidates: &[CircleCandidate],
    min_center_distance: f32,
    max_candidates: Option<usize>,
) -> Vec<DetectedCircle> {
    let mut sorted: Vec<CircleCandidate> = candidates.iter().copied().filter(is_valid).collect();
    if sorted.is_empty() {
        return Vec::new();
    }
    sorted.sort_by(|a, b| {
        rank(
            a.support,
            [a.x, a.y, a.radius],
            b.support,
            [b.x, b.y, b.radius],
        )
    });
    let max_support = sorted[0].support;

    let min_d2 = min_center_distance * min_center_distance;
    let mut accepted: Vec<DetectedCircle> = Vec::new();
    for c in &sorted {
        if accepted.iter().any(|a| a.dist_sq(c.x, c.y) <= min_d2) {
            continue;
        }
        let confidence = if max_support > 0.0 {
            (c.support / max_support).clamp(0.0, 1.0)
        } else {
            1.0
        };
        accepted.push(DetectedCircle {
            x: c.x,
            y: c.y,
            radius: c.radius,
            confidence,
        });
    }

    accepted.sort_by(|a, b| {
        rank(
            a.confidence,
            [a.x, a.y, a.radius],
            b.confidence,
            [b.x, b.y, b.radius],
        )
    });
    if let Some(cap) = max_candidates {
        accepted.truncate(cap);
    }

    tracing::debug!(
        "Filter: {} candidates -> {} circles (min_dist={:.1}px)",
        candidates.len(),
        accepted.len(),
        min_center_distance
    );
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    fn cand(x: f32, y: f32, radius: f32, support: f32) -> CircleCandidate {
        CircleCandidate {
            x,
            y,
            radius,
            support,
        }
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(filter_candidates(&[], 10.0, None).is_empty());
    }

    #[test]
    fn single_candidate_has_full_confidence() {
        let out = filter_candidates(&[cand(5.0, 5.0, 3.0, 12.0)], 10.0, None);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].confidence, 1.0);
    }

    #[test]
    fn close_centers_collapse_to_strongest() {
        let out = filter_candidates(
            &[
                cand(10.0, 10.0, 5.0, 40.0),
                cand(13.0, 10.0, 6.0, 80.0),
                cand(50.0, 50.0, 5.0, 20.0),
            ],
            8.0,
            None,
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].x, 13.0);
        assert_eq!(out[0].confidence, 1.0);
        assert!((out[1].confidence - 0.25).abs() < 1e-6);
    }

    #[test]
    fn distance_equal_to_threshold_is_suppressed() {
        let out = filter_candidates(
            &[cand(0.0, 0.0, 5.0, 10.0), cand(10.0, 0.0, 5.0, 9.0)],
            10.0,
            None,
        );
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn strongest_survivor_has_full_confidence() {
        let out = filter_candidates(
            &[cand(0.0, 0.0, 5.0, 50.0), cand(1.0, 0.0, 5.0, 30.0)],
            5.0,
            None,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].confidence, 1.0);
    }

    #[test]
    fn ties_break_on_radius_then_position() {
        let out = filter_candidates(
            &[
                cand(40.0, 0.0, 4.0, 10.0),
                cand(20.0, 0.0, 9.0, 10.0),
                cand(0.0, 0.0, 4.0, 10.0),
            ],
            1.0,
            None,
        );
        let xs: Vec<f32> = out.iter().map(|c| c.x).collect();
        assert_eq!(xs, vec![20.0, 0.0, 40.0]);
    }

    #[test]
    fn output_is_order_independent_and_sorted() {
        let mut cands = Vec::new();
        for i in 0..40 {
            let f = i as f32;
            cands.push(cand(
                (f * 7.3) % 90.0,
                (f * 3.1) % 70.0,
                3.0 + (i % 5) as f32,
                (10 + (i * 13) % 17) as f32,
            ));
        }
        let reference = filter_candidates(&cands, 6.0, None);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10 {
            cands.shuffle(&mut rng);
            assert_eq!(filter_candidates(&cands, 6.0, None), reference);
        }
        for pair in reference.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
            if pair[0].confidence == pair[1].confidence {
                assert!(pair[0].radius >= pair[1].radius);
            }
        }
    }

    #[test]
    fn invalid_candidates_are_dropped_and_cap_applies() {
        let out = filter_candidates(
            &[
                cand(0.0, 0.0, 0.0, 99.0),
                cand(f32::NAN, 0.0, 3.0, 99.0),
                cand(0.0, 0.0, 3.0, 10.0),
                cand(30.0, 0.0, 3.0, 8.0),
                cand(60.0, 0.0, 3.0, 6.0),
            ],
            5.0,
            Some(2),
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].confidence, 1.0);
        assert!(out.iter().all(|c| c.radius > 0.0));
    }

    #[test]
    fn circle_validation_names_the_offending_entry() {
        let ok = DetectedCircle {
            x: 1.0,
            y: 2.0,
            radius: 3.0,
            confidence: 0.5,
        };
        assert!(validate_circles(&[ok]).is_ok());
        for bad in [
            DetectedCircle { radius: -3.0, ..ok },
            DetectedCircle { radius: f32::NAN, ..ok },
            DetectedCircle { x: f32::INFINITY, ..ok },
            DetectedCircle { confidence: 1.5, ..ok },
        ] {
            match validate_circles(&[ok, bad]) {
                Err(AnalysisError::InvalidParameterRange { field, .. }) => {
                    assert_eq!(field, "circles[1]")
                }
                other => panic!("expected InvalidParameterRange, got {other:?}"),
            }
        }
    }
}
