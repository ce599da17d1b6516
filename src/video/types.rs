use std::fmt;

use image::{imageops::FilterType, ImageBuffer, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result, VideoError};

/// Represents a single video frame
///
/// A thin wrapper around an RGB image buffer. Frames are never edited in
/// place once decoded; keying and resizing always produce a new frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    buffer: RgbImage,
}

impl Frame {
    /// Create a new frame from an RGB image buffer
    pub fn new(buffer: RgbImage) -> Self {
        Self { buffer }
    }

    /// Create a new frame with the given dimensions filled with the specified color
    pub fn new_filled(dimensions: Dimensions, color: [u8; 3]) -> Self {
        let buffer = ImageBuffer::from_pixel(dimensions.width(), dimensions.height(), Rgb(color));
        Self { buffer }
    }

    /// Build a frame by evaluating `f` for every pixel position
    pub fn from_fn<F>(dimensions: Dimensions, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> [u8; 3],
    {
        let buffer = ImageBuffer::from_fn(dimensions.width(), dimensions.height(), |x, y| {
            Rgb(f(x, y))
        });
        Self { buffer }
    }

    /// Create a frame from packed RGB24 bytes
    pub fn from_rgb_bytes(dimensions: Dimensions, data: Vec<u8>) -> Option<Self> {
        ImageBuffer::from_raw(dimensions.width(), dimensions.height(), data)
            .map(|buffer| Self { buffer })
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    /// Dimensions of this frame. Decoded frames are never empty.
    pub fn dimensions(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    /// Get a pixel at the given coordinates (returns RGB array)
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.buffer.get_pixel(x, y).0
    }

    /// Iterate over all pixels in row-major order
    pub fn pixels(&self) -> impl Iterator<Item = [u8; 3]> + '_ {
        self.buffer.pixels().map(|p| p.0)
    }

    /// Get the underlying image buffer
    pub fn as_image(&self) -> &RgbImage {
        &self.buffer
    }

    /// Raw packed RGB24 bytes, row-major
    pub fn as_rgb_bytes(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    /// Check that this frame has exactly the given dimensions
    pub fn matches(&self, dimensions: Dimensions) -> bool {
        self.dimensions() == (dimensions.width(), dimensions.height())
    }

    /// Return this frame scaled to `dimensions` with bilinear filtering.
    ///
    /// Frames already at the target size are returned unchanged.
    pub fn resized(&self, dimensions: Dimensions) -> Frame {
        if self.matches(dimensions) {
            return self.clone();
        }
        let buffer = image::imageops::resize(
            &self.buffer,
            dimensions.width(),
            dimensions.height(),
            FilterType::Triangle,
        );
        Self { buffer }
    }

    /// Fail with `DimensionMismatch` unless this frame matches `dimensions`
    pub fn ensure_dimensions(&self, dimensions: Dimensions) -> Result<()> {
        if self.matches(dimensions) {
            return Ok(());
        }
        Err(VideoError::DimensionMismatch {
            expected_width: dimensions.width(),
            expected_height: dimensions.height(),
            actual_width: self.width(),
            actual_height: self.height(),
        }
        .into())
    }

    /// Save the frame as a PNG file
    pub fn save_png<P: AsRef<std::path::Path>>(&self, path: P) -> std::result::Result<(), image::ImageError> {
        self.buffer.save_with_format(path, image::ImageFormat::Png)
    }
}

/// Width and height of a frame, both strictly positive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDimensions", into = "RawDimensions")]
pub struct Dimensions {
    width: u32,
    height: u32,
}

impl Dimensions {
    /// Default size of the calibration preview
    pub const PREVIEW: Dimensions = Dimensions { width: 600, height: 400 };

    /// Validate a width/height pair as supplied by the operator.
    ///
    /// Takes signed input so that negative values typed at a prompt reach this
    /// check instead of failing somewhere in parsing.
    pub fn new(width: i64, height: i64) -> Result<Self> {
        let invalid = || ConfigError::InvalidDimensions { width, height };
        if width <= 0 || height <= 0 {
            return Err(invalid().into());
        }
        let width = u32::try_from(width).map_err(|_| invalid())?;
        let height = u32::try_from(height).map_err(|_| invalid())?;
        Ok(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of bytes in one packed RGB24 frame of this size
    pub fn rgb_frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// True when both sides are even, as yuv420p encoding requires
    pub fn is_even(&self) -> bool {
        self.width % 2 == 0 && self.height % 2 == 0
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Serialize, Deserialize)]
struct RawDimensions {
    width: i64,
    height: i64,
}

impl TryFrom<RawDimensions> for Dimensions {
    type Error = String;

    fn try_from(raw: RawDimensions) -> std::result::Result<Self, Self::Error> {
        Dimensions::new(raw.width, raw.height).map_err(|e| e.to_string())
    }
}

impl From<Dimensions> for RawDimensions {
    fn from(dimensions: Dimensions) -> Self {
        Self {
            width: i64::from(dimensions.width),
            height: i64::from(dimensions.height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(width: i64, height: i64) -> Dimensions {
        Dimensions::new(width, height).unwrap()
    }

    #[test]
    fn test_dimensions_reject_non_positive() {
        assert!(Dimensions::new(0, 10).is_err());
        assert!(Dimensions::new(10, 0).is_err());
        assert!(Dimensions::new(-4, 10).is_err());
        assert!(Dimensions::new(i64::MAX, 10).is_err());
        assert_eq!(dims(640, 480).to_string(), "640x480");
    }

    #[test]
    fn test_dimensions_deserialize_through_validation() {
        let ok: Dimensions = toml::from_str("width = 4\nheight = 2").unwrap();
        assert_eq!(ok, dims(4, 2));

        let bad: std::result::Result<Dimensions, _> = toml::from_str("width = 0\nheight = 2");
        assert!(bad.is_err());
    }

    #[test]
    fn test_resize_is_identity_at_same_size() {
        let frame = Frame::from_fn(dims(3, 2), |x, y| [x as u8, y as u8, 7]);
        assert_eq!(frame.resized(dims(3, 2)), frame);
    }

    #[test]
    fn test_resize_changes_dimensions() {
        let frame = Frame::new_filled(dims(8, 8), [10, 200, 30]);
        let small = frame.resized(dims(2, 3));
        assert_eq!(small.dimensions(), (2, 3));
        assert!(small.ensure_dimensions(dims(2, 3)).is_ok());
        assert!(small.ensure_dimensions(dims(8, 8)).is_err());
    }

    #[test]
    fn test_from_rgb_bytes_checks_length() {
        assert!(Frame::from_rgb_bytes(dims(2, 2), vec![0; 12]).is_some());
        assert!(Frame::from_rgb_bytes(dims(2, 2), vec![0; 11]).is_none());
    }
}
