//! Color space conversions between RGB and YCbCr.
//!
//! Both directions use the ITU-R BT.601 full-range coefficients, round to
//! the nearest integer and clamp to 0-255.

use std::thread;

use tracing::trace;

use crate::error::Result;
use crate::image::{PlanarImage, RgbImage};
use crate::jpeg::block::Channel;
use crate::jpeg::strategy::join_all;

/// Convert RGB to YCbCr color space.
///
/// Returns (Y, Cb, Cr) where each component is in range 0-255.
/// - Y  = 0.299*R + 0.587*G + 0.114*B
/// - Cb = 128 - 0.168736*R - 0.331264*G + 0.5*B
/// - Cr = 128 + 0.5*R - 0.418688*G - 0.081312*B
#[inline]
pub fn rgb_to_ycbcr(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let r = r as f64;
    let g = g as f64;
    let b = b as f64;

    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let cb = 128.0 - 0.168736 * r - 0.331264 * g + 0.5 * b;
    let cr = 128.0 + 0.5 * r - 0.418688 * g - 0.081312 * b;

    (to_sample(y), to_sample(cb), to_sample(cr))
}

/// Convert YCbCr back to RGB.
#[inline]
pub fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> (u8, u8, u8) {
    let y = y as f64;
    let cb = cb as f64 - 128.0;
    let cr = cr as f64 - 128.0;

    let r = y + 1.402 * cr;
    let g = y - 0.344136 * cb - 0.714136 * cr;
    let b = y + 1.772 * cb;

    (to_sample(r), to_sample(g), to_sample(b))
}

#[inline]
fn to_sample(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Convert a whole RGB image into three full-resolution planes.
pub fn convert_image(image: &RgbImage) -> Result<PlanarImage> {
    let mut planar = PlanarImage::new(image.width(), image.height())?;
    let (y, cb, cr) = planar.planes_mut();
    convert_rows(image.as_bytes(), y, cb, cr);
    Ok(planar)
}

/// Convert with `threads` workers, each owning a contiguous band of rows.
///
/// The output is identical to [`convert_image`].
pub fn convert_image_parallel(image: &RgbImage, threads: usize) -> Result<PlanarImage> {
    let width = image.width() as usize;
    let height = image.height() as usize;
    let threads = threads.clamp(1, height);
    if threads == 1 {
        return convert_image(image);
    }

    let rows_per_thread = height.div_ceil(threads);
    let band = rows_per_thread * width;

    let mut planar = PlanarImage::new(image.width(), image.height())?;
    let (y, cb, cr) = planar.planes_mut();
    let rgb = image.as_bytes();

    thread::scope(|scope| {
        let handles: Vec<_> = y
            .chunks_mut(band)
            .zip(cb.chunks_mut(band))
            .zip(cr.chunks_mut(band))
            .zip(rgb.chunks(band * 3))
            .enumerate()
            .map(|(tid, (((y, cb), cr), rgb))| {
                scope.spawn(move || {
                    trace!(tid, rows = y.len() / width, "color band");
                    convert_rows(rgb, y, cb, cr);
                })
            })
            .collect();

        join_all(handles)
    })?;

    Ok(planar)
}

fn convert_rows(rgb: &[u8], y: &mut [u8], cb: &mut [u8], cr: &mut [u8]) {
    for (i, px) in rgb.chunks_exact(3).enumerate() {
        let (yv, cbv, crv) = rgb_to_ycbcr(px[0], px[1], px[2]);
        y[i] = yv;
        cb[i] = cbv;
        cr[i] = crv;
    }
}

/// Convert three planes back into an interleaved RGB image.
pub fn convert_planes(planar: &PlanarImage) -> Result<RgbImage> {
    let y = planar.plane(Channel::Luma);
    let cb = planar.plane(Channel::ChromaBlue);
    let cr = planar.plane(Channel::ChromaRed);

    let mut data = Vec::with_capacity(y.len() * 3);
    for i in 0..y.len() {
        let (r, g, b) = ycbcr_to_rgb(y[i], cb[i], cr[i]);
        data.extend_from_slice(&[r, g, b]);
    }
    RgbImage::from_raw(planar.width(), planar.height(), data)
}
