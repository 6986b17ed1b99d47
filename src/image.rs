//! Pixel containers consumed and produced by the codec.

use crate::error::{Error, Result};
use crate::jpeg::block::Channel;

/// An interleaved 8-bit RGB image, row-major, 3 bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RgbImage {
    /// Create a black image.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        validate_dimensions(width, height)?;
        Ok(Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 3],
        })
    }

    /// Wrap an existing RGB buffer, checking its length.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        validate_dimensions(width, height)?;
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(Error::InvalidDataLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Deterministic gradient used by the benchmarks and quality reports.
    ///
    /// `r = x*255/w`, `g = y*255/h`, `b = (x+y) % 255`.
    pub fn test_pattern(width: u32, height: u32) -> Result<Self> {
        let mut image = Self::new(width, height)?;
        for y in 0..height {
            for x in 0..width {
                let r = (x as u64 * 255 / width as u64) as u8;
                let g = (y as u64 * 255 / height as u64) as u8;
                let b = ((x as u64 + y as u64) % 255) as u8;
                image.set_pixel(x, y, [r, g, b]);
            }
        }
        Ok(image)
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of pixels.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Read the pixel at `(x, y)`. Panics when out of bounds, like slice indexing.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    /// Overwrite one pixel.
    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        self.data[idx..idx + 3].copy_from_slice(&rgb);
    }

    /// The raw interleaved bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the image, returning its buffer.
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }
}

/// Three full-resolution YCbCr planes.
///
/// Chroma subsampling is not stored here; it happens when blocks are
/// sampled from the planes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanarImage {
    width: u32,
    height: u32,
    planes: [Vec<u8>; 3],
}

impl PlanarImage {
    /// Create planes filled with mid-gray (128, 128, 128).
    pub fn new(width: u32, height: u32) -> Result<Self> {
        validate_dimensions(width, height)?;
        let len = width as usize * height as usize;
        Ok(Self {
            width,
            height,
            planes: [vec![128; len], vec![128; len], vec![128; len]],
        })
    }

    /// Build from three planes of `width * height` samples each.
    pub fn from_planes(
        width: u32,
        height: u32,
        y: Vec<u8>,
        cb: Vec<u8>,
        cr: Vec<u8>,
    ) -> Result<Self> {
        validate_dimensions(width, height)?;
        let expected = width as usize * height as usize;
        for plane in [&y, &cb, &cr] {
            if plane.len() != expected {
                return Err(Error::InvalidDataLength {
                    expected,
                    actual: plane.len(),
                });
            }
        }
        Ok(Self {
            width,
            height,
            planes: [y, cb, cr],
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Samples of one channel, row-major.
    #[inline]
    pub fn plane(&self, channel: Channel) -> &[u8] {
        &self.planes[channel.index()]
    }

    /// Mutable samples of one channel.
    #[inline]
    pub fn plane_mut(&mut self, channel: Channel) -> &mut [u8] {
        &mut self.planes[channel.index()]
    }

    /// Sample of `channel` at `(x, y)`.
    #[inline]
    pub fn sample(&self, channel: Channel, x: usize, y: usize) -> u8 {
        self.planes[channel.index()][y * self.width as usize + x]
    }

    /// Mutable access to all three planes at once.
    pub(crate) fn planes_mut(&mut self) -> (&mut [u8], &mut [u8], &mut [u8]) {
        let [y, cb, cr] = &mut self.planes;
        (y, cb, cr)
    }
}

fn validate_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidDimensions { width, height });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_new_is_black() {
        let img = RgbImage::new(3, 2).unwrap();
        assert_eq!(img.pixel_count(), 6);
        assert!(img.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_rgb_invalid_dimensions() {
        assert_eq!(
            RgbImage::new(0, 5),
            Err(Error::InvalidDimensions {
                width: 0,
                height: 5
            })
        );
        assert!(matches!(
            RgbImage::from_raw(4, 0, vec![]),
            Err(Error::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_rgb_from_raw_length_mismatch() {
        assert_eq!(
            RgbImage::from_raw(2, 2, vec![0; 11]),
            Err(Error::InvalidDataLength {
                expected: 12,
                actual: 11
            })
        );
    }

    #[test]
    fn test_rgb_pixel_roundtrip() {
        let mut img = RgbImage::new(4, 4).unwrap();
        img.set_pixel(3, 2, [1, 2, 3]);
        assert_eq!(img.pixel(3, 2), [1, 2, 3]);
        assert_eq!(img.pixel(2, 3), [0, 0, 0]);
        let raw = img.into_raw();
        assert_eq!(&raw[(2 * 4 + 3) * 3..(2 * 4 + 3) * 3 + 3], &[1, 2, 3]);
    }

    #[test]
    fn test_pattern_values() {
        let img = RgbImage::test_pattern(64, 32).unwrap();
        assert_eq!(img.pixel(0, 0), [0, 0, 0]);
        assert_eq!(img.pixel(32, 0), [127, 0, 32]);
        assert_eq!(img.pixel(63, 31), [251, 247, 94]);
    }

    #[test]
    fn test_planar_starts_mid_gray() {
        let planar = PlanarImage::new(5, 3).unwrap();
        for channel in Channel::ALL {
            assert_eq!(planar.plane(channel).len(), 15);
            assert!(planar.plane(channel).iter().all(|&v| v == 128));
        }
    }

    #[test]
    fn test_planar_from_planes_checks_lengths() {
        assert!(PlanarImage::from_planes(2, 2, vec![0; 4], vec![0; 4], vec![0; 3]).is_err());
        let planar = PlanarImage::from_planes(2, 1, vec![1, 2], vec![3, 4], vec![5, 6]).unwrap();
        assert_eq!(planar.sample(Channel::Luma, 1, 0), 2);
        assert_eq!(planar.sample(Channel::ChromaBlue, 0, 0), 3);
        assert_eq!(planar.sample(Channel::ChromaRed, 1, 0), 6);
    }
}
