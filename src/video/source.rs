use std::collections::VecDeque;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use tracing::{debug, info, warn};

use crate::error::{Result, VideoError};
use crate::video::ffmpeg::{probe_dimensions, require_ffmpeg};
use crate::video::types::{Dimensions, Frame};

/// A forward-only, finite sequence of decoded frames.
///
/// `Ok(None)` marks the end of the stream. Sources cannot be rewound: a frame
/// handed out once is never produced again.
pub trait VideoSource {
    /// Pull the next frame in presentation order
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Human-readable name used in errors and logs
    fn name(&self) -> String;
}

/// Load a still image (the replacement background) as a single frame
pub fn load_background<P: AsRef<Path>>(path: P) -> Result<Frame> {
    let path = path.as_ref();
    let image = image::open(path).map_err(|e| VideoError::SourceRead {
        source_name: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let frame = Frame::new(image.to_rgb8());
    info!("Loaded background {:?} ({}x{})", path, frame.width(), frame.height());
    Ok(frame)
}

/// Decodes a video file by piping raw RGB24 frames out of the system `ffmpeg`
pub struct FfmpegSource {
    path: PathBuf,
    dimensions: Dimensions,
    child: Child,
    stdout: BufReader<ChildStdout>,
    frames_read: u64,
    finished: bool,
}

impl FfmpegSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.is_file() {
            return Err(VideoError::SourceRead {
                source_name: path.display().to_string(),
                reason: "file does not exist".to_string(),
            }
            .into());
        }

        require_ffmpeg()?;
        let dimensions = probe_dimensions(&path)?;

        let mut child = decode_command(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| VideoError::SourceRead {
                source_name: path.display().to_string(),
                reason: format!("failed to spawn ffmpeg: {}", e),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| VideoError::SourceRead {
            source_name: path.display().to_string(),
            reason: "failed to open ffmpeg stdout".to_string(),
        })?;

        info!("Opened video {:?} ({} native)", path, dimensions);

        Ok(Self {
            path,
            dimensions,
            child,
            stdout: BufReader::new(stdout),
            frames_read: 0,
            finished: false,
        })
    }

    fn source_read(&self, reason: String) -> VideoError {
        VideoError::SourceRead {
            source_name: self.path.display().to_string(),
            reason,
        }
    }

    /// Fill `buf` completely, returning how many bytes were read before EOF
    fn read_full(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    /// Reap the decoder once its output is drained
    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        let status = self
            .child
            .wait()
            .map_err(|e| self.source_read(format!("failed to wait for ffmpeg: {}", e)))?;

        debug!("ffmpeg decoder exited with {} after {} frames", status, self.frames_read);

        if !status.success() && self.frames_read == 0 {
            return Err(self.source_read(format!("ffmpeg could not decode the file ({})", status)).into());
        }
        Ok(())
    }
}

/// Raw RGB24 decode of the first video stream.
///
/// Autorotation stays off: frames must come out at the coded size ffprobe
/// reports, or a rotated clip would be read with the wrong stride.
fn decode_command(path: &Path) -> Command {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-loglevel", "error", "-nostdin", "-noautorotate", "-i"])
        .arg(path)
        .args(["-map", "0:v:0", "-an", "-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"]);
    cmd
}

impl VideoSource for FfmpegSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.finished {
            return Ok(None);
        }

        let mut data = vec![0u8; self.dimensions.rgb_frame_len()];
        let filled = self
            .read_full(&mut data)
            .map_err(|e| self.source_read(e.to_string()))?;

        if filled < data.len() {
            if filled > 0 {
                warn!(
                    "Discarding truncated frame {} ({} of {} bytes)",
                    self.frames_read,
                    filled,
                    data.len()
                );
            }
            self.finish()?;
            return Ok(None);
        }

        self.frames_read += 1;
        Frame::from_rgb_bytes(self.dimensions, data)
            .map(Some)
            .ok_or_else(|| self.source_read("decoded frame has the wrong size".to_string()).into())
    }

    fn name(&self) -> String {
        self.path.display().to_string()
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

enum QueuedItem {
    Frame(Frame),
    Failure(String),
}

/// In-memory source, used for still-image input and for tests.
///
/// A queued failure is returned once as a `SourceRead` error, in order.
pub struct FrameQueue {
    name: String,
    items: VecDeque<QueuedItem>,
}

impl FrameQueue {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            items: VecDeque::new(),
        }
    }

    pub fn from_frames<S, I>(name: S, frames: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = Frame>,
    {
        let mut queue = Self::new(name);
        for frame in frames {
            queue.push(frame);
        }
        queue
    }

    pub fn push(&mut self, frame: Frame) {
        self.items.push_back(QueuedItem::Frame(frame));
    }

    /// Queue a decode failure at the current position
    pub fn push_failure<S: Into<String>>(&mut self, reason: S) {
        self.items.push_back(QueuedItem::Failure(reason.into()));
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl VideoSource for FrameQueue {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match self.items.pop_front() {
            Some(QueuedItem::Frame(frame)) => Ok(Some(frame)),
            Some(QueuedItem::Failure(reason)) => Err(VideoError::SourceRead {
                source_name: self.name.clone(),
                reason,
            }
            .into()),
            None => Ok(None),
        }
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}
