use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, Result},
    video::Dimensions,
};

/// Frame rate of the composited output unless configured otherwise
pub const DEFAULT_FRAME_RATE: u32 = 20;

/// Main configuration for a keying session
///
/// The `[output]` table is mandatory: there is no implicit output location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Where and how the composited video is written
    pub output: OutputConfig,

    /// Interactive calibration settings
    #[serde(default)]
    pub calibration: CalibrationConfig,

    /// Encoder settings
    #[serde(default)]
    pub encoder: EncoderConfig,
}

impl Config {
    pub fn new<P: Into<PathBuf>>(output_path: P, dimensions: Dimensions) -> Self {
        Self {
            output: OutputConfig {
                output_path: output_path.into(),
                frame_rate: DEFAULT_FRAME_RATE,
                dimensions,
            },
            calibration: CalibrationConfig::default(),
            encoder: EncoderConfig::default(),
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        Self::parse(&content, &path.display().to_string())
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Self::parse(content, "<inline>")
    }

    fn parse(content: &str, origin: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(|e| ConfigError::ParseFailed {
            path: origin.to_string(),
            reason: e.message().to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue {
            key: "config".to_string(),
            value: e.to_string(),
        })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.output.validate()?;
        self.encoder.validate()?;
        Ok(())
    }
}

/// Output video settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Destination file; the container is picked from its extension
    pub output_path: PathBuf,

    /// Encoding frame rate, independent of the source video's rate
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,

    /// Size every frame and the background are scaled to
    pub dimensions: Dimensions,
}

fn default_frame_rate() -> u32 {
    DEFAULT_FRAME_RATE
}

impl OutputConfig {
    fn validate(&self) -> Result<()> {
        if self.output_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingKey {
                key: "output.output_path".to_string(),
            }
            .into());
        }

        if self.frame_rate == 0 {
            return Err(ConfigError::InvalidValue {
                key: "output.frame_rate".to_string(),
                value: self.frame_rate.to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// Calibration preview settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Image file the live preview is rendered into
    pub preview_path: PathBuf,

    /// Fixed preview size, independent of the output dimensions
    pub preview_size: Dimensions,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            preview_path: std::env::temp_dir().join("chroma-keyer-preview.png"),
            preview_size: Dimensions::PREVIEW,
        }
    }
}

/// Encoder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// FFmpeg video codec name
    pub codec: String,

    /// Quality setting (0-100, higher is better)
    pub quality: u8,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            codec: "libx264".to_string(),
            quality: 85,
        }
    }
}

impl EncoderConfig {
    fn validate(&self) -> Result<()> {
        if self.codec.trim().is_empty() {
            return Err(ConfigError::MissingKey {
                key: "encoder.codec".to_string(),
            }
            .into());
        }

        if self.quality > 100 {
            return Err(ConfigError::InvalidValue {
                key: "encoder.quality".to_string(),
                value: self.quality.to_string(),
            }
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> Config {
        Config::new("out/keyed.mp4", Dimensions::new(1280, 720).unwrap())
    }

    #[test]
    fn test_new_config_is_valid() {
        let config = sample();
        assert!(config.validate().is_ok());
        assert_eq!(config.output.frame_rate, 20);
        assert_eq!(config.calibration.preview_size, Dimensions::PREVIEW);
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("keyer.toml");

        let original = sample();
        original.save_to_file(&file_path).unwrap();
        let loaded = Config::from_file(&file_path).unwrap();

        assert_eq!(original, loaded);
    }

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config = Config::from_toml_str(
            r#"
            [output]
            output_path = "keyed.mp4"
            dimensions = { width = 640, height = 360 }
            "#,
        )
        .unwrap();

        assert_eq!(config.output.frame_rate, DEFAULT_FRAME_RATE);
        assert_eq!(config.encoder, EncoderConfig::default());
    }

    #[test]
    fn test_partial_sections_fill_in_defaults() {
        let config = Config::from_toml_str(
            r#"
            [output]
            output_path = "keyed.mp4"
            dimensions = { width = 640, height = 360 }

            [calibration]
            preview_size = { width = 320, height = 240 }

            [encoder]
            quality = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.calibration.preview_size, Dimensions::new(320, 240).unwrap());
        assert_eq!(config.calibration.preview_path, CalibrationConfig::default().preview_path);
        assert_eq!(config.encoder.codec, "libx264");
        assert_eq!(config.encoder.quality, 60);
    }

    #[test]
    fn test_output_section_is_required() {
        assert!(Config::from_toml_str("[encoder]\ncodec = \"libx264\"\nquality = 50\n").is_err());
    }

    #[test]
    fn test_non_positive_dimensions_rejected() {
        let result = Config::from_toml_str(
            r#"
            [output]
            output_path = "keyed.mp4"
            dimensions = { width = 640, height = 0 }
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_values() {
        let mut config = sample();
        config.output.frame_rate = 0;
        assert!(config.validate().is_err());

        let mut config = sample();
        config.encoder.quality = 101;
        assert!(config.validate().is_err());

        let mut config = sample();
        config.output.output_path = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file("/no/such/keyer.toml").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
