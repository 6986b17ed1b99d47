//! Synthetic test image generation.
//!
//! Deterministic patterns for controlled testing of the codec. All
//! functions produce reproducible output suitable for regression testing.

#![allow(dead_code)]

use parjpeg::RgbImage;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Solid color image.
pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> RgbImage {
    let data = rgb
        .iter()
        .copied()
        .cycle()
        .take(width as usize * height as usize * 3)
        .collect();
    RgbImage::from_raw(width, height, data).unwrap()
}

/// Diagonal gradient with a 2x2 checkerboard on top.
///
/// The checkerboard puts energy in the highest frequencies, so low
/// quality settings visibly lose detail.
pub fn textured(width: u32, height: u32) -> RgbImage {
    let mut image = RgbImage::new(width, height).unwrap();
    for y in 0..height {
        for x in 0..width {
            let base = (x * 255 / width + y * 255 / height) / 2;
            let bump = if ((x / 2) + (y / 2)) % 2 == 1 { 48 } else { 0 };
            let v = (base + bump).min(255);
            image.set_pixel(
                x,
                y,
                [v as u8, (v + 10).min(255) as u8, v.saturating_sub(10) as u8],
            );
        }
    }
    image
}

/// Uniform random noise from a fixed seed.
pub fn noise(width: u32, height: u32, seed: u64) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let data = (0..width as usize * height as usize * 3)
        .map(|_| rng.gen())
        .collect();
    RgbImage::from_raw(width, height, data).unwrap()
}
