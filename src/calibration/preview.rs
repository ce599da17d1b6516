use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{CalibrationError, Result};
use crate::video::Frame;

/// Where the live calibration preview is shown
pub trait PreviewDisplay {
    fn show(&mut self, frame: &Frame) -> Result<()>;

    /// Release the display. Called once when calibration ends.
    fn close(&mut self);
}

/// Renders the preview into a PNG the operator keeps open in an image viewer.
///
/// The file is rewritten on every update and removed on close.
pub struct PngPreview {
    path: PathBuf,
    updates: u64,
}

impl PngPreview {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            updates: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreviewDisplay for PngPreview {
    fn show(&mut self, frame: &Frame) -> Result<()> {
        // Write next to the target and rename so viewers never see half a file
        let staging = self.path.with_extension("tmp.png");
        frame.save_png(&staging).map_err(|e| CalibrationError::Display {
            reason: format!("cannot write {}: {}", staging.display(), e),
        })?;
        std::fs::rename(&staging, &self.path).map_err(|e| CalibrationError::Display {
            reason: format!("cannot update {}: {}", self.path.display(), e),
        })?;

        if self.updates == 0 {
            info!("Calibration preview written to {:?}", self.path);
        }
        self.updates += 1;
        debug!("Preview update #{}", self.updates);
        Ok(())
    }

    fn close(&mut self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!("Failed to remove preview {:?}: {}", self.path, e);
            }
        }
    }
}

/// Keeps every rendered preview in memory
#[derive(Debug, Default)]
pub struct RecordingPreview {
    pub shown: Vec<Frame>,
    pub closed: bool,
}

impl RecordingPreview {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreviewDisplay for RecordingPreview {
    fn show(&mut self, frame: &Frame) -> Result<()> {
        self.shown.push(frame.clone());
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::Dimensions;
    use tempfile::tempdir;

    #[test]
    fn test_png_preview_updates_and_cleans_up() {
        let dir = tempdir().unwrap();
        let mut preview = PngPreview::new(dir.path().join("preview.png"));
        let size = Dimensions::new(6, 4).unwrap();

        preview.show(&Frame::new_filled(size, [1, 2, 3])).unwrap();
        preview.show(&Frame::new_filled(size, [9, 8, 7])).unwrap();

        let written = image::open(preview.path()).unwrap().to_rgb8();
        assert_eq!(written.get_pixel(0, 0).0, [9, 8, 7]);

        preview.close();
        assert!(!preview.path().exists());
    }

    #[test]
    fn test_png_preview_unwritable_location() {
        let mut preview = PngPreview::new("/definitely/not/here/preview.png");
        let frame = Frame::new_filled(Dimensions::new(2, 2).unwrap(), [0, 0, 0]);
        assert!(preview.show(&frame).is_err());
    }
}
