//! Frames and canonical image sizing.
//!
//! - `Frame`: one decoded picture from a video source, packed RGB24. Frames are
//!   ephemeral; nothing is persisted unless a capture session selects it.
//! - `TargetSize`: the canonical width x height every image is resized to before
//!   composition.

use image::imageops::FilterType;
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::ingest::normalize::{normalize_to_rgb, PixelFormat};

/// Interpolation used for every resize. Bilinear, fixed so runs are reproducible.
pub const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// Canonical image size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

impl TargetSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Resize `image` to this size. Images already at the size are copied unchanged.
    pub fn resize(&self, image: &RgbImage) -> RgbImage {
        if image.dimensions() == (self.width, self.height) {
            return image.clone();
        }
        image::imageops::resize(image, self.width, self.height, RESIZE_FILTER)
    }
}

impl Default for TargetSize {
    fn default() -> Self {
        Self::new(640, 480)
    }
}

impl std::fmt::Display for TargetSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A decoded frame, packed RGB24 (height x width x 3).
pub struct Frame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// 1-based position of this frame in the source's stream.
    pub sequence: u64,
}

impl Frame {
    /// Build a frame from a source buffer, normalising it to RGB24.
    pub fn from_pixels(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        sequence: u64,
    ) -> Result<Self, SourceError> {
        let pixels = normalize_to_rgb(pixels, width, height, format)?;
        Ok(Self {
            pixels,
            width,
            height,
            sequence,
        })
    }

    /// Wrap an already decoded RGB image.
    pub fn from_image(image: RgbImage, sequence: u64) -> Self {
        let (width, height) = image.dimensions();
        Self {
            pixels: image.into_raw(),
            width,
            height,
            sequence,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_image(self) -> Result<RgbImage, SourceError> {
        let (width, height) = (self.width, self.height);
        RgbImage::from_raw(width, height, self.pixels).ok_or_else(|| {
            SourceError::InvalidFrame(format!("buffer does not hold a {}x{} image", width, height))
        })
    }

    /// Resize to the canonical size for persistence.
    pub fn to_canonical(&self, size: TargetSize) -> Result<RgbImage, SourceError> {
        let image = RgbImage::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or_else(|| {
                SourceError::InvalidFrame(format!(
                    "buffer does not hold a {}x{} image",
                    self.width, self.height
                ))
            })?;
        Ok(size.resize(&image))
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}
