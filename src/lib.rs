//! # Chroma-Keyer
//!
//! Green-screen compositing for a single video: calibrate a color range on the
//! first frame, then replace every pixel inside that range with the matching
//! pixel of a still background image, frame by frame.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::io;
//! use std::path::Path;
//!
//! use chroma_keyer::{
//!     calibration::{PngPreview, TerminalControls},
//!     config::Config,
//!     video::Dimensions,
//!     KeyingSession,
//! };
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::new("keyed.mp4", Dimensions::new(1280, 720)?);
//! let session = KeyingSession::new(config)?;
//!
//! let mut controls = TerminalControls::new(io::stdin().lock(), io::stdout());
//! let mut preview = PngPreview::new("preview.png");
//!
//! let outcome = session.run_files(
//!     Path::new("green_screen.mp4"),
//!     Path::new("beach.jpg"),
//!     &mut controls,
//!     &mut preview,
//!     &mut io::stdout(),
//! )?;
//! println!("{} frames keyed with {}", outcome.report.frames_written, outcome.bound);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`keying`] - The per-pixel color range primitive
//! - [`calibration`] - Interactive threshold calibration on the first frame, in an egui trackbar window or a terminal
//! - [`composition`] - Frame compositor and the session tying both steps together
//! - [`video`] - Frames, FFmpeg-backed sources and sinks
//! - [`config`] - Configuration management

pub mod calibration;
pub mod composition;
pub mod config;
pub mod error;
pub mod keying;
pub mod lifecycle;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    composition::{FrameCompositor, KeyingSession},
    config::Config,
    error::{CompositorError, Result},
    keying::ColorBound,
};
