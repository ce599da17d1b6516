use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use tracing::{debug, info, warn};

use crate::config::{EncoderConfig, OutputConfig};
use crate::error::{Result, VideoError};
use crate::video::ffmpeg::{quality_to_crf, require_ffmpeg};
use crate::video::types::{Dimensions, Frame};

/// Append-only destination for composited frames.
///
/// Every sink ends with exactly one call to `finish` (commit) or `abort`
/// (discard whatever was written so far).
pub trait OutputSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    fn finish(&mut self) -> Result<()>;

    fn abort(&mut self);

    /// Where the output ends up, for logs and operator messages
    fn destination(&self) -> String;
}

/// Represents an encoded video output
#[derive(Debug, Clone)]
pub struct EncodedVideo {
    pub path: PathBuf,
    pub frame_count: u64,
    pub file_size: u64,
}

/// Encodes frames by piping raw RGB24 into the system `ffmpeg`.
///
/// Output is written to `<stem>.partial.<ext>` next to the target and only
/// renamed into place after ffmpeg exits cleanly, so a failed run never leaves
/// a truncated file at the requested path.
pub struct FfmpegSink {
    output_path: PathBuf,
    partial_path: PathBuf,
    dimensions: Dimensions,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    frame_count: u64,
}

impl FfmpegSink {
    pub fn create(output: &OutputConfig, encoder: &EncoderConfig) -> Result<Self> {
        let output_path = output.output_path.clone();
        let sink_write = |reason: String| VideoError::SinkWrite {
            path: output_path.display().to_string(),
            reason,
        };

        require_ffmpeg()?;

        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| sink_write(format!("cannot create {}: {}", parent.display(), e)))?;
        }

        let partial_path = partial_path_for(&output_path);
        let dimensions = output.dimensions;

        // yuv420p needs even sides; fall back to full chroma for odd sizes
        let pix_fmt = if dimensions.is_even() {
            "yuv420p"
        } else {
            warn!("Output size {} is odd, encoding as yuv444p", dimensions);
            "yuv444p"
        };

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .args([
                "-y",
                "-loglevel",
                "error",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "-s",
                &dimensions.to_string(),
                "-r",
                &output.frame_rate.to_string(),
                "-i",
                "pipe:0",
                "-an",
                "-c:v",
                &encoder.codec,
                "-crf",
                &quality_to_crf(encoder.quality).to_string(),
                "-pix_fmt",
                pix_fmt,
            ])
            .arg(&partial_path);

        debug!("Spawning encoder: {:?}", cmd);

        let mut child = cmd
            .spawn()
            .map_err(|e| sink_write(format!("failed to spawn ffmpeg: {}", e)))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| sink_write("failed to open ffmpeg stdin".to_string()))?;

        info!(
            "Writing {} @ {} fps to {:?}",
            dimensions, output.frame_rate, output_path
        );

        Ok(Self {
            output_path,
            partial_path,
            dimensions,
            child: Some(child),
            stdin: Some(stdin),
            frame_count: 0,
        })
    }

    fn sink_write(&self, reason: String) -> VideoError {
        VideoError::SinkWrite {
            path: self.output_path.display().to_string(),
            reason,
        }
    }

    /// Size and frame count of the committed file
    pub fn encoded(&self) -> Result<EncodedVideo> {
        let metadata = std::fs::metadata(&self.output_path)?;
        Ok(EncodedVideo {
            path: self.output_path.clone(),
            frame_count: self.frame_count,
            file_size: metadata.len(),
        })
    }

    /// Reap an encoder that stopped taking input and fold its stderr into
    /// the error, so the operator sees why ffmpeg gave up
    fn encoder_failure(&mut self, context: String) -> VideoError {
        drop(self.stdin.take());
        let reason = match self.child.take().map(Child::wait_with_output) {
            Some(Ok(output)) => format!("{} ({})", context, exit_detail(&output.status, &output.stderr)),
            Some(Err(e)) => format!("{} (failed to wait for ffmpeg: {})", context, e),
            None => context,
        };
        self.remove_partial();
        self.sink_write(reason)
    }

    fn remove_partial(&self) {
        if self.partial_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.partial_path) {
                warn!("Failed to remove partial output {:?}: {}", self.partial_path, e);
            }
        }
    }
}

impl OutputSink for FfmpegSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        frame.ensure_dimensions(self.dimensions)?;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(self.sink_write("encoder is already closed".to_string()).into());
        };

        if let Err(e) = stdin.write_all(frame.as_rgb_bytes()) {
            return Err(self
                .encoder_failure(format!("failed to write frame {} to ffmpeg: {}", self.frame_count, e))
                .into());
        }

        self.frame_count += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        drop(self.stdin.take());

        let Some(child) = self.child.take() else {
            return Err(self.sink_write("encoder is already closed".to_string()).into());
        };

        let output = match child.wait_with_output() {
            Ok(output) => output,
            Err(e) => {
                self.remove_partial();
                return Err(self.sink_write(format!("failed to wait for ffmpeg: {}", e)).into());
            }
        };

        if !output.status.success() {
            self.remove_partial();
            return Err(self
                .sink_write(exit_detail(&output.status, &output.stderr))
                .into());
        }

        if let Err(e) = std::fs::rename(&self.partial_path, &self.output_path) {
            self.remove_partial();
            return Err(self.sink_write(format!("failed to move output into place: {}", e)).into());
        }

        info!("Encoded {} frames to {:?}", self.frame_count, self.output_path);
        Ok(())
    }

    fn abort(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        self.remove_partial();
        warn!("Discarded incomplete output {:?}", self.output_path);
    }

    fn destination(&self) -> String {
        self.output_path.display().to_string()
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if self.child.is_some() {
            self.abort();
        }
    }
}

fn exit_detail(status: &impl std::fmt::Display, stderr: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("ffmpeg exited with {}", status)
    } else {
        format!("ffmpeg exited with {}: {}", status, stderr)
    }
}

/// `out/video.mp4` -> `out/video.partial.mp4`, keeping the extension so
/// ffmpeg can still pick the container from it
pub fn partial_path_for(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let name = match path.extension() {
        Some(ext) => format!("{}.partial.{}", stem, ext.to_string_lossy()),
        None => format!("{}.partial", stem),
    };
    path.with_file_name(name)
}

/// Collects frames in memory; what gets committed is visible in `frames`
#[derive(Debug, Default)]
pub struct MemorySink {
    pub frames: Vec<Frame>,
    pub finished: bool,
    pub aborted: bool,
    /// Fail the write of this (zero-based) frame index
    pub fail_at: Option<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(index: usize) -> Self {
        Self {
            fail_at: Some(index),
            ..Self::default()
        }
    }
}

impl OutputSink for MemorySink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if self.fail_at == Some(self.frames.len()) {
            return Err(VideoError::SinkWrite {
                path: self.destination(),
                reason: "simulated write failure".to_string(),
            }
            .into());
        }
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.frames.clear();
        self.aborted = true;
    }

    fn destination(&self) -> String {
        "<memory>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::source::{FfmpegSource, VideoSource};
    use tempfile::tempdir;

    fn ffmpeg_tools_available() -> bool {
        let ffprobe_ok = Command::new("ffprobe")
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        crate::video::ffmpeg::check_ffmpeg_available() && ffprobe_ok
    }

    fn output_config(path: PathBuf, dimensions: Dimensions) -> OutputConfig {
        OutputConfig {
            output_path: path,
            frame_rate: 20,
            dimensions,
        }
    }

    #[test]
    fn test_exit_detail_includes_stderr() {
        assert_eq!(
            exit_detail(&"exit status: 1", b"Unknown encoder 'nope'\n"),
            "ffmpeg exited with exit status: 1: Unknown encoder 'nope'"
        );
        assert_eq!(exit_detail(&"exit status: 1", b"  \n"), "ffmpeg exited with exit status: 1");
    }

    #[test]
    fn test_ffmpeg_round_trip_commits_output() {
        if !ffmpeg_tools_available() {
            eprintln!("skipping: ffmpeg/ffprobe not available");
            return;
        }

        let dir = tempdir().unwrap();
        let target = dir.path().join("nested").join("keyed.mp4");
        let size = Dimensions::new(32, 16).unwrap();

        let mut sink = FfmpegSink::create(&output_config(target.clone(), size), &EncoderConfig::default()).unwrap();
        for shade in [40u8, 120, 200] {
            sink.write_frame(&Frame::new_filled(size, [shade, shade, shade])).unwrap();
        }
        sink.finish().unwrap();

        assert!(target.is_file());
        assert!(!partial_path_for(&target).exists());
        assert_eq!(sink.encoded().unwrap().frame_count, 3);

        let mut source = FfmpegSource::open(&target).unwrap();
        let mut frames = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            frames.push(frame);
        }

        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.matches(size)));
        // Lossy, but the order of the shades survives
        let shades: Vec<u8> = frames.iter().map(|f| f.get_pixel(16, 8)[1]).collect();
        assert!(shades[0] < shades[1] && shades[1] < shades[2], "{:?}", shades);
    }

    #[test]
    fn test_ffmpeg_sink_abort_and_drop_remove_partial_output() {
        if !ffmpeg_tools_available() {
            eprintln!("skipping: ffmpeg/ffprobe not available");
            return;
        }

        let dir = tempdir().unwrap();
        let size = Dimensions::new(16, 16).unwrap();
        let frame = Frame::new_filled(size, [0, 255, 0]);

        let aborted = dir.path().join("aborted.mp4");
        let mut sink = FfmpegSink::create(&output_config(aborted.clone(), size), &EncoderConfig::default()).unwrap();
        sink.write_frame(&frame).unwrap();
        sink.abort();
        assert!(!aborted.exists());
        assert!(!partial_path_for(&aborted).exists());

        let dropped = dir.path().join("dropped.mp4");
        {
            let mut sink = FfmpegSink::create(&output_config(dropped.clone(), size), &EncoderConfig::default()).unwrap();
            sink.write_frame(&frame).unwrap();
        }
        assert!(!dropped.exists());
        assert!(!partial_path_for(&dropped).exists());
    }

    #[test]
    fn test_ffmpeg_sink_reports_encoder_stderr() {
        if !ffmpeg_tools_available() {
            eprintln!("skipping: ffmpeg/ffprobe not available");
            return;
        }

        let dir = tempdir().unwrap();
        let target = dir.path().join("bad-codec.mp4");
        let size = Dimensions::new(32, 16).unwrap();
        let encoder = EncoderConfig {
            codec: "definitely-not-a-codec".to_string(),
            quality: 50,
        };
        let frame = Frame::new_filled(size, [10, 20, 30]);

        let mut sink = FfmpegSink::create(&output_config(target.clone(), size), &encoder).unwrap();
        let mut failure = None;
        for _ in 0..100 {
            if let Err(e) = sink.write_frame(&frame) {
                failure = Some(e);
                break;
            }
        }
        let err = failure.unwrap_or_else(|| sink.finish().unwrap_err());

        assert!(
            matches!(err, crate::error::CompositorError::Video(VideoError::SinkWrite { .. })),
            "{}",
            err
        );
        assert!(err.to_string().contains("definitely-not-a-codec"), "{}", err);
        assert!(!target.exists());
        assert!(!partial_path_for(&target).exists());
    }

    #[test]
    fn test_partial_path_keeps_extension() {
        assert_eq!(
            partial_path_for(Path::new("out/result.mp4")),
            PathBuf::from("out/result.partial.mp4")
        );
        assert_eq!(
            partial_path_for(Path::new("result")),
            PathBuf::from("result.partial")
        );
    }

    #[test]
    fn test_memory_sink_abort_discards_frames() {
        let dims = Dimensions::new(2, 2).unwrap();
        let mut sink = MemorySink::failing_at(1);

        sink.write_frame(&Frame::new_filled(dims, [1, 1, 1])).unwrap();
        assert!(sink.write_frame(&Frame::new_filled(dims, [2, 2, 2])).is_err());

        sink.abort();
        assert!(sink.frames.is_empty());
        assert!(sink.aborted);
        assert!(!sink.finished);
    }
}
