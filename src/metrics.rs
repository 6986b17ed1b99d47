//! Image quality metrics for comparing a reconstruction to its source.
//!
//! Typical PSNR values for 8-bit images:
//! - Excellent: > 40 dB
//! - Good: 30-40 dB
//! - Fair: 20-30 dB
//! - Poor: < 20 dB

use std::fmt;

use crate::error::{Error, Result};
use crate::image::RgbImage;

/// PSNR reported for identical images.
pub const PSNR_IDENTICAL: f64 = 100.0;

const SSIM_C1: f64 = 6.5025; // (0.01 * 255)^2
const SSIM_C2: f64 = 58.5225; // (0.03 * 255)^2

fn check_dimensions(original: &RgbImage, reconstructed: &RgbImage) -> Result<()> {
    if original.width() != reconstructed.width() || original.height() != reconstructed.height() {
        return Err(Error::DimensionMismatch {
            left_width: original.width(),
            left_height: original.height(),
            right_width: reconstructed.width(),
            right_height: reconstructed.height(),
        });
    }
    Ok(())
}

/// Mean squared error over all RGB samples.
pub fn mean_squared_error(original: &RgbImage, reconstructed: &RgbImage) -> Result<f64> {
    check_dimensions(original, reconstructed)?;
    let a = original.as_bytes();
    let b = reconstructed.as_bytes();
    let sum: f64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| {
            let diff = x as f64 - y as f64;
            diff * diff
        })
        .sum();
    Ok(sum / a.len() as f64)
}

/// Peak signal-to-noise ratio in dB, [`PSNR_IDENTICAL`] when the images match.
pub fn psnr(original: &RgbImage, reconstructed: &RgbImage) -> Result<f64> {
    let mse = mean_squared_error(original, reconstructed)?;
    Ok(psnr_from_mse(mse))
}

fn psnr_from_mse(mse: f64) -> f64 {
    if mse < 1e-10 {
        return PSNR_IDENTICAL;
    }
    10.0 * (255.0 * 255.0 / mse).log10()
}

fn luminance(image: &RgbImage) -> Vec<f64> {
    image
        .as_bytes()
        .chunks_exact(3)
        .map(|p| 0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64)
        .collect()
}

/// Structural similarity of the luminance channels, computed over the whole
/// image as a single window.
///
/// Returns a value in `[-1, 1]`; identical images score 1.
pub fn ssim(original: &RgbImage, reconstructed: &RgbImage) -> Result<f64> {
    check_dimensions(original, reconstructed)?;
    let a = luminance(original);
    let b = luminance(reconstructed);
    let n = a.len() as f64;

    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;

    let (mut var_a, mut var_b, mut covariance) = (0.0, 0.0, 0.0);
    for (&x, &y) in a.iter().zip(&b) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        var_a += dx * dx;
        var_b += dy * dy;
        covariance += dx * dy;
    }
    var_a /= n;
    var_b /= n;
    covariance /= n;

    let numerator = (2.0 * mean_a * mean_b + SSIM_C1) * (2.0 * covariance + SSIM_C2);
    let denominator = (mean_a * mean_a + mean_b * mean_b + SSIM_C1) * (var_a + var_b + SSIM_C2);
    Ok(numerator / denominator)
}

/// Raw RGB size divided by `compressed_size`.
///
/// Infinite for an empty stream.
pub fn compression_ratio(original: &RgbImage, compressed_size: usize) -> f64 {
    let raw = original.as_bytes().len() as f64;
    if compressed_size == 0 {
        return f64::INFINITY;
    }
    raw / compressed_size as f64
}

/// Coarse quality bucket for a PSNR value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityRating {
    /// Above 40 dB.
    Excellent,
    /// 30 to 40 dB.
    Good,
    /// 20 to 30 dB.
    Fair,
    /// 20 dB and below.
    Poor,
}

impl QualityRating {
    /// Bucket `psnr` (dB).
    pub fn from_psnr(psnr: f64) -> Self {
        if psnr > 40.0 {
            Self::Excellent
        } else if psnr > 30.0 {
            Self::Good
        } else if psnr > 20.0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    /// Human readable description.
    pub fn description(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent (minimal loss)",
            Self::Good => "Good (acceptable for most uses)",
            Self::Fair => "Fair (noticeable artifacts)",
            Self::Poor => "Poor (significant artifacts)",
        }
    }
}

impl fmt::Display for QualityRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// All metrics for one reconstruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityReport {
    /// Image width.
    pub width: u32,
    /// Image height.
    pub height: u32,
    /// Raw RGB size in bytes.
    pub original_size: usize,
    /// Entropy-coded size in bytes.
    pub compressed_size: usize,
    /// `original_size / compressed_size`.
    pub ratio: f64,
    /// Mean squared error.
    pub mse: f64,
    /// Peak signal-to-noise ratio (dB).
    pub psnr: f64,
    /// Global luminance SSIM.
    pub ssim: f64,
}

impl QualityReport {
    /// Measure `reconstructed` against `original`.
    pub fn new(
        original: &RgbImage,
        reconstructed: &RgbImage,
        compressed_size: usize,
    ) -> Result<Self> {
        let mse = mean_squared_error(original, reconstructed)?;
        Ok(Self {
            width: original.width(),
            height: original.height(),
            original_size: original.as_bytes().len(),
            compressed_size,
            ratio: compression_ratio(original, compressed_size),
            mse,
            psnr: psnr_from_mse(mse),
            ssim: ssim(original, reconstructed)?,
        })
    }

    /// Rating derived from [`QualityReport::psnr`].
    pub fn rating(&self) -> QualityRating {
        QualityRating::from_psnr(self.psnr)
    }
}

impl fmt::Display for QualityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Image:       {}x{}", self.width, self.height)?;
        writeln!(f, "Original:    {} bytes", self.original_size)?;
        writeln!(f, "Compressed:  {} bytes", self.compressed_size)?;
        writeln!(f, "Ratio:       {:.2}:1", self.ratio)?;
        writeln!(f, "MSE:         {:.4}", self.mse)?;
        writeln!(f, "PSNR:        {:.2} dB", self.psnr)?;
        writeln!(f, "SSIM:        {:.4}", self.ssim)?;
        write!(f, "Quality:     {}", self.rating())
    }
}
