use std::io::Write;

use tracing::{debug, info};

use crate::calibration::controls::{ControlEvent, ControlSurface};
use crate::calibration::preview::PreviewDisplay;
use crate::error::{Result, VideoError};
use crate::keying::{composite, keyed_fraction, ColorBound};
use crate::lifecycle::Phase;
use crate::video::{Dimensions, Frame, VideoSource};

pub const CALIBRATION_INSTRUCTIONS: &str = "\
-------------------
Adjust the upper and lower colour threshold values until the preview shows
the background everywhere the backdrop was, and your subject everywhere else.

Once satisfied with your choice, press ENTER to confirm.
-------------------";

/// Outcome of feeding one control event to the calibrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Accept(ColorBound),
}

/// Interactive threshold calibration against the first video frame.
///
/// The loop itself is a small state machine: `render` turns a trial bound
/// into a preview and `step` decides whether an event ends calibration.
/// Showing the preview is the only side effect and goes through
/// [`PreviewDisplay`].
pub struct Calibrator {
    preview_frame: Frame,
    preview_background: Frame,
    trial: ColorBound,
    phase: Phase,
}

impl Calibrator {
    /// Pull exactly one frame from `source`, scaled to the session size.
    ///
    /// An empty or unreadable source is an error; calibration has nothing to
    /// show without it.
    pub fn capture_first_frame<S>(source: &mut S, dimensions: Dimensions) -> Result<Frame>
    where
        S: VideoSource + ?Sized,
    {
        let frame = source.next_frame()?.ok_or_else(|| VideoError::SourceRead {
            source_name: source.name(),
            reason: "cannot read first frame: the video has no frames".to_string(),
        })?;

        debug!(
            "Captured first frame {}x{} from {}",
            frame.width(),
            frame.height(),
            source.name()
        );
        Ok(frame.resized(dimensions))
    }

    /// Prepare calibration at the fixed `preview_size`, independent of the
    /// output dimensions.
    pub fn new(first_frame: &Frame, background: &Frame, preview_size: Dimensions) -> Self {
        Self {
            preview_frame: first_frame.resized(preview_size),
            preview_background: background.resized(preview_size),
            trial: ColorBound::ZERO,
            phase: Phase::NotStarted,
        }
    }

    /// The bound currently being tried
    pub fn trial(&self) -> ColorBound {
        self.trial
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Composite the preview frame with `bound`
    pub fn render(&self, bound: &ColorBound) -> Result<Frame> {
        composite(&self.preview_frame, &self.preview_background, bound)
    }

    /// Decide what an operator event means for the loop
    pub fn step(&mut self, event: ControlEvent) -> Step {
        match event {
            ControlEvent::Adjusted => Step::Continue,
            ControlEvent::Confirm => {
                self.phase.finish();
                Step::Accept(self.trial)
            }
        }
    }

    /// Run the preview loop until the operator confirms.
    ///
    /// There is no cancel: the loop only ends on confirm, or on an error from
    /// the controls or display. The display is closed either way.
    pub fn run<C, D, W>(&mut self, controls: &mut C, display: &mut D, console: &mut W) -> Result<ColorBound>
    where
        C: ControlSurface + ?Sized,
        D: PreviewDisplay + ?Sized,
        W: Write + ?Sized,
    {
        let result = self.drive(controls, display, console);
        display.close();
        result
    }

    fn drive<C, D, W>(&mut self, controls: &mut C, display: &mut D, console: &mut W) -> Result<ColorBound>
    where
        C: ControlSurface + ?Sized,
        D: PreviewDisplay + ?Sized,
        W: Write + ?Sized,
    {
        loop {
            self.trial = controls.settings().bound();
            let preview = self.render(&self.trial)?;
            display.show(&preview)?;

            debug!(
                "Trial {} keys {:.1}% of the preview",
                self.trial,
                keyed_fraction(&self.preview_frame, &self.trial) * 100.0
            );

            if self.phase.start() {
                writeln!(console, "{}", CALIBRATION_INSTRUCTIONS)?;
                console.flush()?;
            }

            let event = controls.wait_event()?;
            if let Step::Accept(bound) = self.step(event) {
                info!("Colour threshold accepted: {}", bound);
                return Ok(bound);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::controls::{ChannelSettings, ScriptedControls};
    use crate::calibration::preview::RecordingPreview;
    use crate::error::{CalibrationError, CompositorError};
    use crate::video::FrameQueue;

    const GREEN: [u8; 3] = [0, 255, 0];
    const BLUE: [u8; 3] = [0, 0, 255];

    fn dims(width: i64, height: i64) -> Dimensions {
        Dimensions::new(width, height).unwrap()
    }

    fn calibrator() -> Calibrator {
        // Left half green backdrop, right half a red subject
        let first = Frame::from_fn(dims(8, 4), |x, _| if x < 4 { GREEN } else { [200, 20, 20] });
        let background = Frame::new_filled(dims(16, 16), BLUE);
        Calibrator::new(&first, &background, dims(6, 2))
    }

    #[test]
    fn test_capture_first_frame_resizes() {
        let mut source = FrameQueue::from_frames(
            "clip",
            vec![
                Frame::new_filled(dims(8, 8), GREEN),
                Frame::new_filled(dims(8, 8), BLUE),
            ],
        );

        let first = Calibrator::capture_first_frame(&mut source, dims(4, 2)).unwrap();
        assert_eq!(first.dimensions(), (4, 2));
        assert_eq!(first.get_pixel(0, 0), GREEN);
        // Only one frame was consumed
        assert_eq!(source.len(), 1);
    }

    #[test]
    fn test_capture_first_frame_empty_source_fails() {
        let mut source = FrameQueue::new("empty.mp4");
        let err = Calibrator::capture_first_frame(&mut source, dims(4, 4)).unwrap_err();
        match err {
            CompositorError::Video(VideoError::SourceRead { source_name, reason }) => {
                assert_eq!(source_name, "empty.mp4");
                assert!(reason.contains("first frame"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_render_uses_preview_size() {
        let calibrator = calibrator();
        let preview = calibrator.render(&ColorBound::new(GREEN, GREEN)).unwrap();
        assert_eq!(preview.dimensions(), (6, 2));
        assert_eq!(preview.get_pixel(0, 0), BLUE);
        assert_eq!(preview.get_pixel(5, 1), [200, 20, 20]);
    }

    #[test]
    fn test_step_only_accepts_on_confirm() {
        let mut calibrator = calibrator();
        assert_eq!(calibrator.step(ControlEvent::Adjusted), Step::Continue);
        assert_eq!(calibrator.step(ControlEvent::Confirm), Step::Accept(ColorBound::ZERO));
        assert_eq!(calibrator.phase(), Phase::Done);
    }

    #[test]
    fn test_run_accepts_last_trial_and_prints_instructions_once() {
        let mut calibrator = calibrator();
        let mut controls = ScriptedControls::new()
            .adjust(ChannelSettings::new([0, 100, 0], [50, 255, 50]))
            .adjust(ChannelSettings::new([0, 200, 0], [40, 255, 40]))
            .confirm();
        let mut display = RecordingPreview::new();
        let mut console = Vec::new();

        let bound = calibrator.run(&mut controls, &mut display, &mut console).unwrap();

        assert_eq!(bound, ColorBound::new([0, 200, 0], [40, 255, 40]));
        // Initial zero bound, two adjustments
        assert_eq!(display.shown.len(), 3);
        assert!(display.closed);
        assert_eq!(display.shown[0].get_pixel(0, 0), GREEN);
        assert_eq!(display.shown[2].get_pixel(0, 0), BLUE);

        let console = String::from_utf8(console).unwrap();
        assert_eq!(console.matches("press ENTER").count(), 1);
    }

    #[test]
    fn test_run_closes_display_when_controls_vanish() {
        let mut calibrator = calibrator();
        let mut controls = ScriptedControls::new().adjust(ChannelSettings::default());
        let mut display = RecordingPreview::new();

        let err = calibrator
            .run(&mut controls, &mut display, &mut std::io::sink())
            .unwrap_err();

        assert!(matches!(
            err,
            CompositorError::Calibration(CalibrationError::ControlsClosed)
        ));
        assert!(display.closed);
        assert_eq!(calibrator.phase(), Phase::Running);
    }

    #[test]
    fn test_instructions_not_printed_before_first_iteration() {
        let calibrator = calibrator();
        assert_eq!(calibrator.phase(), Phase::NotStarted);
        assert_eq!(calibrator.trial(), ColorBound::ZERO);
    }
}
