//! Grayscale conversion and fixed-kernel noise suppression.

use image::GrayImage;

use super::config::SmoothingParams;
use crate::error::Result;
use crate::image_input::Image;

/// Normalized 1-D Gaussian kernel of odd width `size`.
pub(crate) fn gaussian_kernel(size: usize, sigma: f32) -> Vec<f32> {
    let half = (size / 2) as i32;
    let denom = 2.0 * sigma * sigma;
    let mut k: Vec<f32> = (-half..=half)
        .map(|i| (-((i * i) as f32) / denom).exp())
        .collect();
    let sum: f32 = k.iter().sum();
    for v in &mut k {
        *v /= sum;
    }
    k
}

/// Smooth an already single-channel image with a separable Gaussian.
pub fn smooth(gray: &GrayImage, params: &SmoothingParams) -> GrayImage {
    if params.kernel_size <= 1 {
        return gray.clone();
    }
    let kernel = gaussian_kernel(params.kernel_size, params.sigma);
    imageproc::filter::separable_filter_equal(gray, &kernel)
}

/// Convert to luma and suppress sensor noise.
///
/// Deterministic for identical input bytes and parameters.
pub fn preprocess(image: &Image, params: &SmoothingParams) -> Result<GrayImage> {
    let gray = image.to_gray()?;
    let out = smooth(&gray, params);
    tracing::debug!(
        "Preprocess: {}x{} {:?} -> gray, kernel={} sigma={:.2}",
        image.width(),
        image.height(),
        image.format(),
        params.kernel_size,
        params.sigma
    );
    Ok(out)
}
