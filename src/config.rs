use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub engines: EngineConfig,

    #[serde(default)]
    pub overlay: OverlayConfig,

    #[serde(default)]
    pub cameras: CameraConfig,
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("camtrap")
        .join("camtrap.db")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Root directory for stored photograph bytes.
    #[serde(default = "default_media_root")]
    pub root: PathBuf,
}

fn default_media_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("camtrap")
        .join("media")
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root: default_media_root(),
        }
    }
}

/// Coordinate convention a detector endpoint reports boxes in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DetectorBoxFormat {
    /// Fractional `[x, y, width, height]`, top-left origin (MegaDetector-style).
    #[default]
    FractionalXywh,
    /// Fractional `[x_min, y_min, x_max, y_max]`, top-left origin.
    FractionalXyxy,
    /// Pixel `[x_min, y_min, x_max, y_max]`, top-left origin.
    PixelXyxy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Text-recognition endpoint; receives the prepared overlay strip.
    #[serde(default = "default_ocr_endpoint")]
    pub ocr_endpoint: String,

    /// Object-detection endpoint; receives the full image.
    #[serde(default = "default_detector_endpoint")]
    pub detector_endpoint: String,

    /// Box convention of the configured detector.
    #[serde(default)]
    pub detector_box_format: DetectorBoxFormat,

    /// Per-request timeout for both engines, in seconds.
    #[serde(default = "default_engine_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_ocr_endpoint() -> String {
    "http://127.0.0.1:8089/recognize".to_string()
}

fn default_detector_endpoint() -> String {
    "http://127.0.0.1:8090/detect".to_string()
}

fn default_engine_timeout_secs() -> u64 {
    120
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ocr_endpoint: default_ocr_endpoint(),
            detector_endpoint: default_detector_endpoint(),
            detector_box_format: DetectorBoxFormat::default(),
            timeout_secs: default_engine_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Fraction of image height occupied by the burned-in bottom strip.
    #[serde(default = "default_strip_fraction")]
    pub strip_fraction: f32,

    /// Upscale factor applied to the strip before recognition.
    #[serde(default = "default_strip_upscale")]
    pub upscale: u32,

    /// Binarization threshold (white text on a black bar).
    #[serde(default = "default_strip_threshold")]
    pub threshold: u8,
}

fn default_strip_fraction() -> f32 {
    0.042
}

fn default_strip_upscale() -> u32 {
    3
}

fn default_strip_threshold() -> u8 {
    140
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            strip_fraction: default_strip_fraction(),
            upscale: default_strip_upscale(),
            threshold: default_strip_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Base location assigned to cameras the resolver creates implicitly.
    #[serde(default = "default_camera_latitude")]
    pub default_latitude: f64,

    #[serde(default = "default_camera_longitude")]
    pub default_longitude: f64,
}

fn default_camera_latitude() -> f64 {
    47.734900
}

fn default_camera_longitude() -> f64 {
    -122.255000
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            default_latitude: default_camera_latitude(),
            default_longitude: default_camera_longitude(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            media: MediaConfig::default(),
            engines: EngineConfig::default(),
            overlay: OverlayConfig::default(),
            cameras: CameraConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            // Create default config
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("camtrap")
    }

    fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_round_trip() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(
            back.engines.detector_box_format,
            DetectorBoxFormat::FractionalXywh
        );
        assert!((back.overlay.strip_fraction - 0.042).abs() < 1e-6);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [engines]
            detector_box_format = "pixel_xyxy"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.engines.detector_box_format,
            DetectorBoxFormat::PixelXyxy
        );
        assert_eq!(config.engines.timeout_secs, 120);
        assert_eq!(config.overlay.upscale, 3);
    }
}
