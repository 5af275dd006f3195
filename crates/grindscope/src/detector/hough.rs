//! Gradient-directed Hough voting for circles.
//!
//! Each Canny edge pixel casts one vote per radius plane at the point that
//! lies `r` pixels away along (or against) its Sobel gradient. Circles
//! produce dense vote clusters at their centers in the plane matching their
//! radius. Peaks are 3x3x3 local maxima of the box-summed accumulator, so the
//! support score of a candidate is the number of votes landing within one
//! pixel of the peak.
//!
//! Radius planes are independent, so they are accumulated in parallel chunks.
//! The cancellation flag is polled before each chunk and before each plane.

use image::GrayImage;
use rayon::prelude::*;

use super::config::{DetectionParameters, EdgePolarity};
use crate::cancel::CancelToken;
use crate::error::{AnalysisError, Result};

/// Raw circle hypothesis straight out of the accumulator.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CircleCandidate {
    /// Center x (pixels, sub-pixel refined).
    pub x: f32,
    /// Center y (pixels, sub-pixel refined).
    pub y: f32,
    /// Radius (pixels, refined from supporting edge distances).
    pub radius: f32,
    /// Votes within one pixel of the accumulator peak.
    pub support: f32,
}

/// Edge pixel with its unit gradient direction.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EdgePoint {
    pub x: f32,
    pub y: f32,
    pub ux: f32,
    pub uy: f32,
}

/// Extract Canny edge pixels and attach Sobel gradient directions.
pub(crate) fn edge_points(gray: &GrayImage, params: &DetectionParameters) -> Vec<EdgePoint> {
    let (w, h) = gray.dimensions();
    if w < 3 || h < 3 {
        return Vec::new();
    }
    let (low, high) = params.edge_thresholds();
    let edges = imageproc::edges::canny(gray, low, high);
    let gx = imageproc::gradients::horizontal_sobel(gray);
    let gy = imageproc::gradients::vertical_sobel(gray);
    let (edges_raw, gx_raw, gy_raw) = (edges.as_raw(), gx.as_raw(), gy.as_raw());

    let mut points = Vec::new();
    for (idx, &e) in edges_raw.iter().enumerate() {
        if e == 0 {
            continue;
        }
        let gxv = gx_raw[idx] as f32;
        let gyv = gy_raw[idx] as f32;
        let mag = (gxv * gxv + gyv * gyv).sqrt();
        if mag < 1e-6 {
            continue;
        }
        points.push(EdgePoint {
            x: (idx % w as usize) as f32,
            y: (idx / w as usize) as f32,
            ux: gxv / mag,
            uy: gyv / mag,
        });
    }
    points
}

/// Single-radius accumulator plane (raw votes, nearest-pixel deposit).
fn accumulate_plane(
    edges: &[EdgePoint],
    w: usize,
    h: usize,
    r: f32,
    polarity: EdgePolarity,
) -> Vec<u32> {
    let mut plane = vec![0u32; w * h];
    for e in edges {
        for &sign in polarity.vote_signs() {
            let vx = (e.x + sign * r * e.ux).round();
            let vy = (e.y + sign * r * e.uy).round();
            if vx < 0.0 || vy < 0.0 || vx >= w as f32 || vy >= h as f32 {
                continue;
            }
            plane[vy as usize * w + vx as usize] += 1;
        }
    }
    plane
}

/// 3x3 box sum with zero padding.
fn box_sum_3x3(raw: &[u32], w: usize, h: usize) -> Vec<u32> {
    let mut horiz = vec![0u32; w * h];
    for y in 0..h {
        let row = &raw[y * w..(y + 1) * w];
        for x in 0..w {
            let mut s = row[x];
            if x > 0 {
                s += row[x - 1];
            }
            if x + 1 < w {
                s += row[x + 1];
            }
            horiz[y * w + x] = s;
        }
    }
    let mut out = vec![0u32; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut s = horiz[y * w + x];
            if y > 0 {
                s += horiz[(y - 1) * w + x];
            }
            if y + 1 < h {
                s += horiz[(y + 1) * w + x];
            }
            out[y * w + x] = s;
        }
    }
    out
}

#[derive(Debug)]
struct Plane {
    index: usize,
    raw: Vec<u32>,
    support: Vec<u32>,
}

/// Peak of `cur` at `idx` beats every 26-neighbor. Ties go to the lower
/// `(radius, y, x)` position so the result is independent of scan order.
fn is_local_max(
    prev: Option<&Plane>,
    cur: &Plane,
    next: Option<&Plane>,
    w: usize,
    h: usize,
    x: usize,
    y: usize,
) -> bool {
    let idx = y * w + x;
    let v = cur.support[idx];
    let x0 = x.saturating_sub(1);
    let x1 = (x + 1).min(w - 1);
    let y0 = y.saturating_sub(1);
    let y1 = (y + 1).min(h - 1);
    for ny in y0..=y1 {
        for nx in x0..=x1 {
            let nidx = ny * w + nx;
            if let Some(p) = prev {
                if p.support[nidx] >= v {
                    return false;
                }
            }
            if let Some(n) = next {
                if n.support[nidx] > v {
                    return false;
                }
            }
            if nidx == idx {
                continue;
            }
            let nv = cur.support[nidx];
            if nv > v || (nv == v && nidx < idx) {
                return false;
            }
        }
    }
    true
}

/// Vote-weighted centroid of the raw 3x3 window, and mean distance from it
/// to the edge pixels whose vote landed in that window.
#[allow(clippy::too_many_arguments)]
fn refine_peak(
    plane: &Plane,
    r: f32,
    edges: &[EdgePoint],
    polarity: EdgePolarity,
    w: usize,
    h: usize,
    x: usize,
    y: usize,
) -> Option<(f32, f32, f32)> {
    let (mut sx, mut sy, mut sw) = (0.0f64, 0.0f64, 0.0f64);
    for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
        for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
            let v = plane.raw[ny * w + nx] as f64;
            sx += v * nx as f64;
            sy += v * ny as f64;
            sw += v;
        }
    }
    if sw <= 0.0 {
        return None;
    }
    let cx = (sx / sw) as f32;
    let cy = (sy / sw) as f32;

    let (mut dist_sum, mut n) = (0.0f64, 0usize);
    for e in edges {
        for &sign in polarity.vote_signs() {
            let vx = (e.x + sign * r * e.ux).round();
            let vy = (e.y + sign * r * e.uy).round();
            if (vx - x as f32).abs() <= 1.0 && (vy - y as f32).abs() <= 1.0 {
                let dx = (e.x - cx) as f64;
                let dy = (e.y - cy) as f64;
                dist_sum += (dx * dx + dy * dy).sqrt();
                n += 1;
            }
        }
    }
    let radius = if n > 0 { (dist_sum / n as f64) as f32 } else { r };
    (radius > 0.0).then_some((cx, cy, radius))
}

/// Upper bound on accumulator memory held by one parallel chunk.
const CHUNK_BUDGET_BYTES: usize = 256 << 20;

/// Number of radius planes built per parallel chunk: one per worker thread,
/// reduced so that `raw` + `support` buffers stay within the chunk budget.
fn chunk_len(w: usize, h: usize, threads: usize) -> usize {
    let plane_bytes = (w * h).saturating_mul(2 * std::mem::size_of::<u32>());
    (CHUNK_BUDGET_BYTES / plane_bytes.max(1)).clamp(1, threads.max(1))
}

fn build_plane(
    index: usize,
    r: f32,
    edges: &[EdgePoint],
    w: usize,
    h: usize,
    polarity: EdgePolarity,
    cancel: &CancelToken,
) -> Option<Plane> {
    if cancel.is_cancelled() {
        return None;
    }
    let raw = accumulate_plane(edges, w, h, r, polarity);
    let support = box_sum_3x3(&raw, w, h);
    Some(Plane {
        index,
        raw,
        support,
    })
}

/// Build planes `range` in parallel. Fails as a whole if any plane observed
/// cancellation.
fn build_chunk(
    range: std::ops::Range<usize>,
    radii: &[f32],
    edges: &[EdgePoint],
    w: usize,
    h: usize,
    polarity: EdgePolarity,
    cancel: &CancelToken,
) -> Result<Vec<Plane>> {
    let planes: Option<Vec<Plane>> = range
        .into_par_iter()
        .map(|k| build_plane(k, radii[k], edges, w, h, polarity, cancel))
        .collect();
    planes.ok_or(AnalysisError::Cancelled)
}

/// Run the Hough search over `[min_radius_px, max_radius_px]`.
///
/// Returns an empty set when the image has no edges. Returns
/// [`AnalysisError::Cancelled`](crate::AnalysisError::Cancelled) if the token
/// fires mid-scan; no partial result is produced.
pub fn detect_candidates(
    gray: &GrayImage,
    params: &DetectionParameters,
    cancel: &CancelToken,
) -> Result<Vec<CircleCandidate>> {
    cancel.check()?;
    let (w, h) = gray.dimensions();
    let (w, h) = (w as usize, h as usize);
    let edges = edge_points(gray, params);
    if edges.is_empty() {
        tracing::debug!("Hough: no edge pixels above threshold");
        return Ok(Vec::new());
    }

    let radii: Vec<f32> = (params.min_radius_px..=params.max_radius_px)
        .map(|r| r as f32)
        .collect();
    let n = radii.len();
    let threshold = params.accumulator_threshold;
    let polarity = params.polarity;
    let chunk = chunk_len(w, h, rayon::current_num_threads());

    let mut window: Vec<Plane> = Vec::new();
    let mut next_plane = 0usize;
    let mut candidates = Vec::new();
    let mut start = 0usize;
    while start < n {
        cancel.check()?;
        let end = (start + chunk).min(n);
        // Peaks in [start, end) need planes up to `end` as the upper neighbor.
        let need = (end + 1).min(n);
        let fresh = build_chunk(next_plane..need, &radii, &edges, w, h, polarity, cancel)?;
        next_plane = need;
        window.extend(fresh);
        window.retain(|p| p.index + 1 >= start);

        let lookup = |k: usize| window.iter().find(|p| p.index == k);
        for k in start..end {
            let Some(cur) = lookup(k) else { continue };
            let prev = k.checked_sub(1).and_then(lookup);
            let next = lookup(k + 1);
            for y in 0..h {
                for x in 0..w {
                    let v = cur.support[y * w + x];
                    if (v as f32) < threshold {
                        continue;
                    }
                    if !is_local_max(prev, cur, next, w, h, x, y) {
                        continue;
                    }
                    if let Some((cx, cy, radius)) =
                        refine_peak(cur, radii[k], &edges, polarity, w, h, x, y)
                    {
                        candidates.push(CircleCandidate {
                            x: cx,
                            y: cy,
                            radius,
                            support: v as f32,
                        });
                    }
                }
            }
        }
        // Refinement of planes below `end` is done; only `support` is still
        // needed as a neighbor.
        for p in window.iter_mut().filter(|p| p.index < end) {
            p.raw = Vec::new();
        }
        start = end;
    }

    tracing::debug!(
        "Hough: {} edge pixels, {} radius planes, {} raw candidates",
        edges.len(),
        n,
        candidates.len()
    );
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::preprocess::smooth;
    use crate::test_utils::draw_disc_gray;

    fn params(min_r: u32, max_r: u32) -> DetectionParameters {
        DetectionParameters {
            min_radius_px: min_r,
            max_radius_px: max_r,
            accumulator_threshold: 20.0,
            ..Default::default()
        }
    }

    #[test]
    fn blank_image_has_no_candidates() {
        let gray = GrayImage::from_pixel(64, 64, image::Luma([128]));
        let out = detect_candidates(&gray, &params(5, 20), &CancelToken::new()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn strongest_candidate_sits_on_the_disc() {
        let gray = draw_disc_gray(96, 96, &[([48.0, 40.0], 15.0)], 40, 220);
        let p = params(8, 24);
        let gray = smooth(&gray, &p.smoothing);
        let mut out = detect_candidates(&gray, &p, &CancelToken::new()).unwrap();
        assert!(!out.is_empty());
        out.sort_by(|a, b| b.support.total_cmp(&a.support));
        let best = out[0];
        assert!((best.x - 48.0).abs() <= 1.0, "{best:?}");
        assert!((best.y - 40.0).abs() <= 1.0, "{best:?}");
        assert!((best.radius - 15.0).abs() <= 1.0, "{best:?}");
        assert!(best.support >= 20.0);
    }

    #[test]
    fn polarity_restricts_voting_side() {
        let gray = draw_disc_gray(96, 96, &[([48.0, 48.0], 14.0)], 40, 220);
        let mut p = params(8, 20);
        let gray = smooth(&gray, &p.smoothing);

        p.polarity = EdgePolarity::DarkOnLight;
        let dark = detect_candidates(&gray, &p, &CancelToken::new()).unwrap();
        assert!(dark
            .iter()
            .any(|c| (c.x - 48.0).abs() <= 1.0 && (c.y - 48.0).abs() <= 1.0));

        p.polarity = EdgePolarity::LightOnDark;
        let light = detect_candidates(&gray, &p, &CancelToken::new()).unwrap();
        assert!(light
            .iter()
            .all(|c| (c.x - 48.0).abs() > 3.0 || (c.y - 48.0).abs() > 3.0));
    }

    #[test]
    fn cancelled_token_aborts_scan() {
        let gray = draw_disc_gray(64, 64, &[([32.0, 32.0], 10.0)], 40, 220);
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = detect_candidates(&gray, &params(5, 20), &cancel).unwrap_err();
        assert_eq!(err, crate::AnalysisError::Cancelled);
    }

    #[test]
    fn box_sum_counts_neighbourhood() {
        let mut raw = vec![0u32; 25];
        raw[12] = 4;
        raw[13] = 1;
        let s = box_sum_3x3(&raw, 5, 5);
        assert_eq!(s[12], 5);
        assert_eq!(s[0], 0);
        assert_eq!(s[13], 5);
        assert_eq!(s[14], 1);
        assert_eq!(s[6], 4);
    }

    #[test]
    fn cancelled_plane_and_chunk_yield_nothing() {
        let gray = draw_disc_gray(48, 48, &[([24.0, 24.0], 10.0)], 40, 220);
        let p = params(5, 15);
        let edges = edge_points(&smooth(&gray, &p.smoothing), &p);
        assert!(!edges.is_empty());
        let radii: Vec<f32> = (5..=15).map(|r| r as f32).collect();

        let live = CancelToken::new();
        let planes = build_chunk(0..4, &radii, &edges, 48, 48, p.polarity, &live).unwrap();
        assert_eq!(planes.len(), 4);

        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(build_plane(0, 5.0, &edges, 48, 48, p.polarity, &cancel).is_none());
        assert_eq!(
            build_chunk(0..4, &radii, &edges, 48, 48, p.polarity, &cancel).unwrap_err(),
            crate::AnalysisError::Cancelled
        );
    }

    #[test]
    fn cancel_from_another_thread_stops_the_scan() {
        let gray = draw_disc_gray(600, 600, &[([300.0, 300.0], 40.0)], 40, 220);
        let p = params(4, 250);
        let gray = smooth(&gray, &p.smoothing);
        let cancel = CancelToken::new();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(1)
            .build()
            .unwrap();

        let remote = cancel.clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(50));
            remote.cancel();
        });
        let out = pool.install(|| detect_candidates(&gray, &p, &cancel));
        canceller.join().unwrap();

        assert_eq!(out.unwrap_err(), crate::AnalysisError::Cancelled);
    }

    #[test]
    fn chunk_length_respects_memory_budget() {
        assert_eq!(chunk_len(640, 480, 8), 8);
        // 12 MP planes: 96 MB each, so at most two fit the budget
        assert_eq!(chunk_len(4000, 3000, 64), 2);
        assert_eq!(chunk_len(20_000, 20_000, 16), 1);
        assert_eq!(chunk_len(10, 10, 0), 1);
    }
}
