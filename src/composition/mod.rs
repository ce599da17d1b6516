//! # Composition
//!
//! The frame compositor and the session that runs calibration before it.

pub mod compositor;
pub mod engine;

pub use compositor::{CompositionReport, FrameCompositor, StreamEnd};
pub use engine::{KeyingSession, SessionOutcome};
