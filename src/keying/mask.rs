use image::{ImageBuffer, Rgb};

use crate::error::{Result, VideoError};
use crate::keying::ColorBound;
use crate::video::Frame;

fn ensure_same_size(frame: &Frame, background: &Frame) -> Result<()> {
    if frame.dimensions() == background.dimensions() {
        return Ok(());
    }
    Err(VideoError::DimensionMismatch {
        expected_width: frame.width(),
        expected_height: frame.height(),
        actual_width: background.width(),
        actual_height: background.height(),
    }
    .into())
}

/// Replace every pixel of `frame` whose color lies inside `bound` with the
/// pixel at the same position in `background`.
///
/// Each pixel is classified by comparing its channels against the bound
/// directly, so a black foreground pixel outside the bound is kept as is.
/// Both frames must have the same dimensions.
pub fn composite(frame: &Frame, background: &Frame, bound: &ColorBound) -> Result<Frame> {
    ensure_same_size(frame, background)?;

    let (width, height) = frame.dimensions();
    let fg = frame.as_image();
    let bg = background.as_image();

    let buffer = ImageBuffer::from_fn(width, height, |x, y| {
        let pixel = fg.get_pixel(x, y).0;
        if bound.contains(pixel) {
            *bg.get_pixel(x, y)
        } else {
            Rgb(pixel)
        }
    });

    Ok(Frame::new(buffer))
}

/// Row-major backdrop classification: `true` where `bound` keys the pixel out
pub fn backdrop_mask(frame: &Frame, bound: &ColorBound) -> Vec<bool> {
    frame.pixels().map(|pixel| bound.contains(pixel)).collect()
}

/// Share of pixels `bound` would replace, in `0.0..=1.0`
pub fn keyed_fraction(frame: &Frame, bound: &ColorBound) -> f32 {
    let total = frame.width() as usize * frame.height() as usize;
    if total == 0 {
        return 0.0;
    }
    let keyed = frame.pixels().filter(|p| bound.contains(*p)).count();
    keyed as f32 / total as f32
}
