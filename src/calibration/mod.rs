//! # Threshold Calibration
//!
//! Lets an operator converge on the backdrop's color range by adjusting six
//! channel controls while watching the first frame keyed against the
//! background. Produces the [`ColorBound`](crate::keying::ColorBound) the
//! compositor uses for the whole video.

pub mod calibrator;
pub mod controls;
pub mod preview;
pub mod window;

pub use calibrator::{Calibrator, Step, CALIBRATION_INSTRUCTIONS};
pub use controls::{Channel, ChannelSettings, ControlEvent, ControlSurface, ScriptedControls, TerminalControls};
pub use preview::{PngPreview, PreviewDisplay, RecordingPreview};
pub use window::{show_trackbar_window, trackbar_window, TrackbarWindow, WindowControls, WindowPreview};
