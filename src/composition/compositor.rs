use std::io::Write;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::keying::{composite, ColorBound};
use crate::lifecycle::Phase;
use crate::video::{Dimensions, Frame, OutputSink, VideoSource};

/// Why the compositing loop stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// The source ran out of frames
    Exhausted,
    /// A frame failed to decode; everything before it was written
    DecodeFailure(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionReport {
    pub frames_written: u64,
    pub end: StreamEnd,
}

/// Keys every remaining frame of a source over the background and appends
/// the results to a sink, one output frame per input frame, in order.
pub struct FrameCompositor {
    dimensions: Dimensions,
    phase: Phase,
}

impl FrameCompositor {
    pub fn new(dimensions: Dimensions) -> Self {
        Self {
            dimensions,
            phase: Phase::NotStarted,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Text shown once before processing begins
    pub fn confirmation(bound: &ColorBound, destination: &str) -> String {
        let [lr, lg, lb] = bound.lower;
        let [ur, ug, ub] = bound.upper;
        format!(
            "-------------------\n\
             Your selected colour threshold is:\n\n\
             Upper: RGB({}, {}, {})\n\
             Lower: RGB({}, {}, {})\n\n\
             Processing starts now.\n\n\
             The result will be written to {}\n\
             -------------------",
            ur, ug, ub, lr, lg, lb, destination
        )
    }

    /// Composite until the source is exhausted.
    ///
    /// The sink is finished when the loop ends normally and aborted on any
    /// error, so it is always released.
    pub fn run<S, O, W>(
        &mut self,
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
        match self.process(bound, source, background, sink, console) {
            Ok(report) => {
                sink.finish()?;
                self.phase.finish();
                info!(
                    "Composited {} frames into {}",
                    report.frames_written,
                    sink.destination()
                );
                Ok(report)
            }
            Err(e) => {
                sink.abort();
                Err(e)
            }
        }
    }

    fn process<S, O, W>(
        &mut self,
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
        writeln!(console, "{}", Self::confirmation(bound, &sink.destination()))?;
        console.flush()?;

        let background = background.resized(self.dimensions);
        let mut frames_written = 0u64;

        loop {
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    return Ok(CompositionReport {
                        frames_written,
                        end: StreamEnd::Exhausted,
                    })
                }
                Err(e) => {
                    warn!(
                        "Stopping after {} frames, {} could not be decoded further: {}",
                        frames_written,
                        source.name(),
                        e
                    );
                    return Ok(CompositionReport {
                        frames_written,
                        end: StreamEnd::DecodeFailure(e.to_string()),
                    });
                }
            };

            let keyed = composite(&frame.resized(self.dimensions), &background, bound)?;
            sink.write_frame(&keyed)?;
            frames_written += 1;

            if self.phase.start() {
                writeln!(console, "Processing...")?;
                console.flush()?;
            }
            if frames_written % 100 == 0 {
                debug!("{} frames composited", frames_written);
            }
        }
    }
}
