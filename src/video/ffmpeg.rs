//! Helpers shared by the FFmpeg-backed source and sink.
//!
//! Both sides talk to the system `ffmpeg`/`ffprobe` binaries over pipes
//! instead of linking FFmpeg, so no native headers are needed at build time.

use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{Result, VideoError};
use crate::video::types::Dimensions;

pub fn check_ffmpeg_available() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Fail early with a readable error when `ffmpeg` is missing from PATH
pub fn require_ffmpeg() -> Result<()> {
    if check_ffmpeg_available() {
        Ok(())
    } else {
        Err(VideoError::FfmpegUnavailable {
            reason: "`ffmpeg -version` could not be run".to_string(),
        }
        .into())
    }
}

/// Read the native size of the first video stream with `ffprobe`
pub fn probe_dimensions(path: &Path) -> Result<Dimensions> {
    let source_read = |reason: String| VideoError::SourceRead {
        source_name: path.display().to_string(),
        reason,
    };

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=s=x:p=0",
        ])
        .arg(path)
        .output()
        .map_err(|e| source_read(format!("ffprobe failed to start: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(source_read(format!("ffprobe failed: {}", stderr.trim())).into());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    debug!("ffprobe reported '{}' for {}", stdout.trim(), path.display());

    parse_probe_output(&stdout).ok_or_else(|| {
        source_read(format!("no video stream found (ffprobe said '{}')", stdout.trim())).into()
    })
}

/// Parse `WIDTHxHEIGHT` as printed by `ffprobe -of csv=s=x:p=0`
fn parse_probe_output(output: &str) -> Option<Dimensions> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty())?;
    let (width, height) = line.split_once('x')?;
    let width = width.trim().parse().ok()?;
    // Some containers append a trailing separator
    let height = height.trim().trim_end_matches('x').parse().ok()?;
    Dimensions::new(width, height).ok()
}

/// Map a 0-100 quality setting onto x264's CRF scale (0 best, 51 worst)
pub fn quality_to_crf(quality: u8) -> u8 {
    (51 - ((quality.min(100) as f32 / 100.0) * 51.0) as u8).clamp(0, 51)
}
