use thiserror::Error;

/// Main error type for the chroma-keyer library
#[derive(Error, Debug)]
pub enum CompositorError {
    #[error("Video processing error: {0}")]
    Video(#[from] VideoError),

    #[error("Calibration error: {0}")]
    Calibration(#[from] CalibrationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while reading, keying or writing frames
#[derive(Error, Debug)]
pub enum VideoError {
    #[error("Failed to read from source '{source_name}': {reason}")]
    SourceRead { source_name: String, reason: String },

    #[error("Failed to write output '{path}': {reason}")]
    SinkWrite { path: String, reason: String },

    #[error("Frame size mismatch: expected {expected_width}x{expected_height}, got {actual_width}x{actual_height}")]
    DimensionMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("FFmpeg is not available: {reason}")]
    FfmpegUnavailable { reason: String },
}

/// Errors raised by the interactive calibration loop
#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("Control input closed before the color range was confirmed")]
    ControlsClosed,

    #[error("Unrecognised control command: {command}")]
    InvalidCommand { command: String },

    #[error("Preview display failed: {reason}")]
    Display { reason: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file {path}: {reason}")]
    ParseFailed { path: String, reason: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {key}")]
    MissingKey { key: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid dimensions {width}x{height}: width and height must be positive")]
    InvalidDimensions { width: i64, height: i64 },
}

/// Convenience type alias for Results using CompositorError
pub type Result<T> = std::result::Result<T, CompositorError>;

impl CompositorError {
    /// Check if this error is recoverable (can be retried)
    ///
    /// Nothing is retried automatically; this only tells the operator whether
    /// running again unchanged could succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(_) => true,
            Self::Video(VideoError::SinkWrite { .. }) => true,
            _ => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Video(VideoError::SourceRead { source_name, reason }) => {
                format!(
                    "Could not read '{}' ({}). Please check the file exists and is a supported video or image.",
                    source_name, reason
                )
            }
            Self::Video(VideoError::SinkWrite { path, reason }) => {
                format!(
                    "Could not write the output video '{}' ({}). No partial output was kept.",
                    path, reason
                )
            }
            Self::Video(VideoError::FfmpegUnavailable { .. }) => {
                "FFmpeg was not found on PATH. Please install FFmpeg to read and write video files."
                    .to_string()
            }
            Self::Config(ConfigError::InvalidDimensions { width, height }) => {
                format!(
                    "The output size {}x{} is not valid. Width and height must be positive integers.",
                    width, height
                )
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            Self::Calibration(CalibrationError::ControlsClosed) => {
                "Calibration input ended before a color range was confirmed.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_read_message_names_the_file() {
        let err: CompositorError = VideoError::SourceRead {
            source_name: "clip.mp4".to_string(),
            reason: "no frames".to_string(),
        }
        .into();

        let message = err.user_message();
        assert!(message.contains("clip.mp4"));
        assert!(message.contains("no frames"));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_invalid_dimensions_message() {
        let err: CompositorError = ConfigError::InvalidDimensions { width: 0, height: -3 }.into();
        assert!(err.user_message().contains("0x-3"));
    }

    #[test]
    fn test_sink_write_is_recoverable() {
        let err: CompositorError = VideoError::SinkWrite {
            path: "out.mp4".to_string(),
            reason: "disk full".to_string(),
        }
        .into();
        assert!(err.is_recoverable());
    }
}
