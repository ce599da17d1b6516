//! # Keying
//!
//! The color-range masking primitive shared by calibration and compositing.
//!
//! ```rust
//! use chroma_keyer::keying::{composite, ColorBound};
//! use chroma_keyer::video::{Dimensions, Frame};
//!
//! let size = Dimensions::new(4, 4)?;
//! let green = Frame::new_filled(size, [0, 255, 0]);
//! let sky = Frame::new_filled(size, [40, 90, 255]);
//!
//! let keyed = composite(&green, &sky, &ColorBound::new([0, 200, 0], [80, 255, 80]))?;
//! assert_eq!(keyed, sky);
//! # Ok::<(), chroma_keyer::CompositorError>(())
//! ```

pub mod bound;
pub mod mask;

pub use bound::{clamp_channel, ColorBound};
pub use mask::{backdrop_mask, composite, keyed_fraction};
