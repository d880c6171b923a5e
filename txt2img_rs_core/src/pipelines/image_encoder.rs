use std::{io::Cursor, path::Path};

use image::{ImageFormat, RgbImage};

use crate::error::ImageEncodeError;

use super::latents::CHANNELS;

/// Packs an RGB pixel buffer into a compressed image container.
pub trait ImageEncoder: Send + Sync {
    /// `pixels` is row-major RGB, 3 bytes per pixel, stride `width * 3`.
    fn encode(&self, pixels: Vec<u8>, width: u32, height: u32) -> Result<Vec<u8>, ImageEncodeError>;
}

/// Encodes 8-bit RGB (no alpha) as PNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct PngEncoder;

impl ImageEncoder for PngEncoder {
    fn encode(&self, pixels: Vec<u8>, width: u32, height: u32) -> Result<Vec<u8>, ImageEncodeError> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(CHANNELS))
            .filter(|n| *n > 0)
            .ok_or(ImageEncodeError::SurfaceAllocation { width, height })?;

        let actual = pixels.len();
        let pixel_buffer_error = ImageEncodeError::PixelBuffer {
            width,
            height,
            expected,
            actual,
        };
        // `from_raw` accepts oversized buffers.
        if actual != expected {
            return Err(pixel_buffer_error);
        }
        let img = RgbImage::from_raw(width, height, pixels).ok_or(pixel_buffer_error)?;

        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        Ok(buf)
    }
}

/// A PNG produced by one successful generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedImage {
    bytes: Vec<u8>,
    width: u32,
    height: u32,
}

impl GeneratedImage {
    pub(crate) fn new(bytes: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            bytes,
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// The encoded image.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Write the encoded image to `path` as-is.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        std::fs::write(path, &self.bytes)
    }
}
