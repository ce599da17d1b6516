use std::io::Write;
use std::path::Path;

use tracing::info;

use crate::{
    calibration::{Calibrator, ControlSurface, PreviewDisplay},
    composition::compositor::{CompositionReport, FrameCompositor},
    config::Config,
    error::Result,
    keying::ColorBound,
    video::{load_background, FfmpegSink, FfmpegSource, Frame, OutputSink, VideoSource},
};

/// Everything a finished session produced
#[derive(Debug)]
pub struct SessionOutcome<O> {
    pub bound: ColorBound,
    pub report: CompositionReport,
    pub sink: O,
}

/// Runs calibration and then compositing for one video
///
/// The pipeline is strictly ordered:
/// 1. Calibration - key the first frame interactively until the operator confirms
/// 2. Compositing - key every frame with the accepted bound and encode the result
pub struct KeyingSession {
    config: Config,
}

impl KeyingSession {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Step 1: capture the first frame of `source` and run the preview loop
    pub fn calibrate<S, C, D, W>(
        &self,
        source: &mut S,
        background: &Frame,
        controls: &mut C,
        display: &mut D,
        console: &mut W,
    ) -> Result<ColorBound>
    where
        S: VideoSource + ?Sized,
        C: ControlSurface + ?Sized,
        D: PreviewDisplay + ?Sized,
        W: Write + ?Sized,
    {
        info!("Step 1: calibrating colour threshold on the first frame of {}", source.name());

        let first = match Calibrator::capture_first_frame(source, self.config.output.dimensions) {
            Ok(frame) => frame,
            Err(e) => {
                display.close();
                return Err(e);
            }
        };
        let mut calibrator = Calibrator::new(&first, background, self.config.calibration.preview_size);
        calibrator.run(controls, display, console)
    }

    /// Step 2: key every frame of `source` with `bound` into `sink`
    pub fn composite<S, O, W>(
        &self,
        bound: &ColorBound,
        source: &mut S,
        background: &Frame,
        sink: &mut O,
        console: &mut W,
    ) -> Result<CompositionReport>
    where
        S: VideoSource + ?Sized,
        O: OutputSink + ?Sized,
        W: Write + ?Sized,
    {
        info!("Step 2: compositing {} with {}", source.name(), bound);
        FrameCompositor::new(self.config.output.dimensions).run(bound, source, background, sink, console)
    }

    /// Calibrate, then composite.
    ///
    /// `open_source` is called twice: once for the calibration frame and once
    /// for the compositing pass, so the first frame is part of the output too.
    /// The sink is only opened after the operator has confirmed a bound.
    pub fn run<S, FS, O, FO, C, D, W>(
        &self,
        mut open_source: FS,
        background: &Frame,
        open_sink: FO,
        controls: &mut C,
        display: &mut D,
        console: &mut W,
    ) -> Result<SessionOutcome<O>>
    where
        S: VideoSource,
        FS: FnMut() -> Result<S>,
        O: OutputSink,
        FO: FnOnce(&Config) -> Result<O>,
        C: ControlSurface + ?Sized,
        D: PreviewDisplay + ?Sized,
        W: Write + ?Sized,
    {
        let bound = {
            let mut calibration_source = match open_source() {
                Ok(source) => source,
                Err(e) => {
                    display.close();
                    return Err(e);
                }
            };
            self.calibrate(&mut calibration_source, background, controls, display, console)?
        };

        let mut source = open_source()?;
        let mut sink = open_sink(&self.config)?;
        let report = self.composite(&bound, &mut source, background, &mut sink, console)?;

        Ok(SessionOutcome { bound, report, sink })
    }

    /// Run a full session on files, decoding and encoding through FFmpeg
    pub fn run_files<C, D, W>(
        &self,
        video_path: &Path,
        background_path: &Path,
        controls: &mut C,
        display: &mut D,
        console: &mut W,
    ) -> Result<SessionOutcome<FfmpegSink>>
    where
        C: ControlSurface + ?Sized,
        D: PreviewDisplay + ?Sized,
        W: Write + ?Sized,
    {
        let background = match load_background(background_path) {
            Ok(background) => background,
            Err(e) => {
                display.close();
                return Err(e);
            }
        };

        self.run(
            || FfmpegSource::open(video_path),
            &background,
            |config| FfmpegSink::create(&config.output, &config.encoder),
            controls,
            display,
            console,
        )
    }
}
