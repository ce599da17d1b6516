//! # Video Module
//!
//! Frame type, frame sources (decoding) and output sinks (encoding).

pub mod ffmpeg;
pub mod sink;
pub mod source;
pub mod types;

pub use sink::{EncodedVideo, FfmpegSink, MemorySink, OutputSink};
pub use source::{load_background, FfmpegSource, FrameQueue, VideoSource};
pub use types::{Dimensions, Frame};
