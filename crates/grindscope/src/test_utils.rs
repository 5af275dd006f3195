//! Shared test utilities for image-based unit tests.

use image::{GrayImage, Luma};

use crate::image_input::Image;

const SUPERSAMPLE: u32 = 4;

/// Render filled discs on a flat background.
///
/// Each pixel is 4x4 supersampled so disc rims carry partial coverage,
/// which keeps Sobel gradients close to radial.
pub(crate) fn draw_disc_gray(
    w: u32,
    h: u32,
    discs: &[([f32; 2], f32)],
    fg: u8,
    bg: u8,
) -> GrayImage {
    let step = 1.0 / SUPERSAMPLE as f32;
    let total = (SUPERSAMPLE * SUPERSAMPLE) as f32;
    let mut img = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let mut inside = 0u32;
            for sy in 0..SUPERSAMPLE {
                for sx in 0..SUPERSAMPLE {
                    let px = x as f32 + (sx as f32 + 0.5) * step - 0.5;
                    let py = y as f32 + (sy as f32 + 0.5) * step - 0.5;
                    let hit = discs.iter().any(|([cx, cy], r)| {
                        let dx = px - cx;
                        let dy = py - cy;
                        dx * dx + dy * dy <= r * r
                    });
                    if hit {
                        inside += 1;
                    }
                }
            }
            let cov = inside as f32 / total;
            let v = bg as f32 + (fg as f32 - bg as f32) * cov;
            img.put_pixel(x, y, Luma([v.round().clamp(0.0, 255.0) as u8]));
        }
    }
    img
}

/// [`draw_disc_gray`] wrapped as a `Gray8` [`Image`].
pub(crate) fn draw_disc_image(
    w: u32,
    h: u32,
    discs: &[([f32; 2], f32)],
    fg: u8,
    bg: u8,
) -> Image {
    Image::from(draw_disc_gray(w, h, discs, fg, bg))
}
