use std::fmt;

use serde::{Deserialize, Serialize};

/// Inclusive axis-aligned box in RGB space.
///
/// A pixel is inside when every channel lies between the matching lower and
/// upper value. If `lower > upper` on any channel the box is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ColorBound {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl ColorBound {
    /// Initial bound before calibration; only matches pure black
    pub const ZERO: ColorBound = ColorBound {
        lower: [0, 0, 0],
        upper: [0, 0, 0],
    };

    /// Matches every color
    pub const FULL: ColorBound = ColorBound {
        lower: [0, 0, 0],
        upper: [255, 255, 255],
    };

    pub fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    /// Build a bound from raw control values, clamping each into 0..=255
    pub fn from_channels(lower: [i32; 3], upper: [i32; 3]) -> Self {
        Self {
            lower: lower.map(clamp_channel),
            upper: upper.map(clamp_channel),
        }
    }

    #[inline]
    pub fn contains(&self, pixel: [u8; 3]) -> bool {
        (0..3).all(|c| self.lower[c] <= pixel[c] && pixel[c] <= self.upper[c])
    }

    /// True when no color can match
    pub fn is_empty(&self) -> bool {
        (0..3).any(|c| self.lower[c] > self.upper[c])
    }

    /// Grow the box by `amount` on every side, saturating at the channel limits
    pub fn widened(&self, amount: u8) -> Self {
        Self {
            lower: self.lower.map(|v| v.saturating_sub(amount)),
            upper: self.upper.map(|v| v.saturating_add(amount)),
        }
    }
}

pub fn clamp_channel(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

impl fmt::Display for ColorBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [lr, lg, lb] = self.lower;
        let [ur, ug, ub] = self.upper;
        write!(f, "RGB({}, {}, {}) - RGB({}, {}, {})", lr, lg, lb, ur, ug, ub)
    }
}
