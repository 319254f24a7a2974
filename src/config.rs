//! Configuration management for the tracking loop

use crate::selector::SelectionStrategy;
use crate::transport::{OverlayMode, MAX_DATAGRAM_BYTES};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Complete tracker configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,

    #[serde(default)]
    pub camera: CameraConfig,

    #[serde(default)]
    pub detector: DetectorConfig,

    #[serde(default)]
    pub servo: ServoConfig,

    #[serde(default)]
    pub stream: StreamConfig,

    #[serde(default)]
    pub resources: ResourceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Cycles between statistics log lines
    #[serde(default = "default_stats_interval")]
    pub stats_interval_cycles: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            stats_interval_cycles: default_stats_interval(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CameraDriver {
    /// Synthetic moving square, no hardware needed
    #[default]
    TestPattern,

    /// GStreamer pipeline (`camera` feature)
    Gstreamer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default)]
    pub driver: CameraDriver,

    /// Device path
    /// - "/dev/video0": v4l2src
    /// - "/base/...": libcamerasrc camera name
    #[serde(default = "default_device")]
    pub device: String,

    /// Sensor readout width in pixels
    #[serde(default = "default_sensor_width")]
    pub sensor_width: u32,

    /// Sensor readout height in pixels
    #[serde(default = "default_sensor_height")]
    pub sensor_height: u32,

    /// Width of the centered window handed to the loop
    #[serde(default = "default_window")]
    pub window_width: u32,

    /// Height of the centered window handed to the loop
    #[serde(default = "default_window")]
    pub window_height: u32,

    /// Frames are discarded for this long after configuration
    #[serde(default = "default_warmup_ms")]
    pub warmup_ms: u64,

    #[serde(default)]
    pub auto_gain: bool,

    #[serde(default = "default_fps")]
    pub fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            driver: CameraDriver::default(),
            device: default_device(),
            sensor_width: default_sensor_width(),
            sensor_height: default_sensor_height(),
            window_width: default_window(),
            window_height: default_window(),
            warmup_ms: default_warmup_ms(),
            auto_gain: false,
            fps: default_fps(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectorBackend {
    /// SeetaFace model through rustface (`rustface` feature)
    #[default]
    Rustface,

    /// No detection; frames are streamed and servos hold position
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    #[serde(default)]
    pub backend: DetectorBackend,

    /// Model file for the rustface backend
    #[serde(default)]
    pub model_path: Option<String>,

    /// Score threshold, on the selected backend's own scale
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    #[serde(default = "default_scale_factor")]
    pub scale_factor: f64,

    #[serde(default = "default_min_face_size")]
    pub min_face_size: u32,

    #[serde(default)]
    pub strategy: SelectionStrategy,

    #[serde(default)]
    pub overlay: OverlayMode,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            backend: DetectorBackend::default(),
            model_path: None,
            threshold: default_threshold(),
            scale_factor: default_scale_factor(),
            min_face_size: default_min_face_size(),
            strategy: SelectionStrategy::default(),
            overlay: OverlayMode::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServoDriver {
    /// In-memory outputs for development hosts
    #[default]
    Simulated,

    /// Raspberry Pi hardware PWM (`rpi` feature)
    Hardware,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServoConfig {
    #[serde(default)]
    pub driver: ServoDriver,

    /// PWM carrier frequency
    #[serde(default = "default_frequency")]
    pub frequency_hz: u32,

    #[serde(default = "default_min_pulse_width")]
    pub min_pulse_width_us: u32,

    #[serde(default = "default_max_pulse_width")]
    pub max_pulse_width_us: u32,

    #[serde(default = "AxisConfig::default_pan")]
    pub pan: AxisConfig,

    #[serde(default = "AxisConfig::default_tilt")]
    pub tilt: AxisConfig,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            driver: ServoDriver::default(),
            frequency_hz: default_frequency(),
            min_pulse_width_us: default_min_pulse_width(),
            max_pulse_width_us: default_max_pulse_width(),
            pan: AxisConfig::default_pan(),
            tilt: AxisConfig::default_tilt(),
        }
    }
}

/// Per-axis servo configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxisConfig {
    /// Microseconds of pulse width per pixel of error
    pub gain: i32,

    /// Pulse width written at startup
    pub initial_pulse_width_us: u32,

    /// Hardware PWM channel (0 or 1)
    pub channel: u8,
}

impl AxisConfig {
    fn default_pan() -> Self {
        Self {
            gain: 2,
            initial_pulse_width_us: 560,
            channel: 1,
        }
    }

    fn default_tilt() -> Self {
        Self {
            gain: 2,
            initial_pulse_width_us: 1000,
            channel: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Viewer host receiving the datagrams
    #[serde(default = "default_dest_host")]
    pub dest_host: String,

    #[serde(default = "default_dest_port")]
    pub dest_port: u16,

    /// JPEG quality (1-100)
    #[serde(default = "default_quality")]
    pub quality: u8,

    /// Frames compressing above this size are dropped
    #[serde(default = "default_max_datagram")]
    pub max_datagram_bytes: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            dest_host: default_dest_host(),
            dest_port: default_dest_port(),
            quality: default_quality(),
            max_datagram_bytes: default_max_datagram(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Cycles are skipped while free memory is below this
    #[serde(default = "default_min_free_bytes")]
    pub min_free_bytes: u64,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            min_free_bytes: default_min_free_bytes(),
        }
    }
}

// Default value functions
fn default_stats_interval() -> u64 {
    100
}
fn default_device() -> String {
    "/dev/video0".to_string()
}
fn default_sensor_width() -> u32 {
    320
}
fn default_sensor_height() -> u32 {
    240
}
fn default_window() -> u32 {
    240
}
fn default_warmup_ms() -> u64 {
    2000
}
fn default_fps() -> u32 {
    30
}
fn default_threshold() -> f64 {
    0.75
}
fn default_scale_factor() -> f64 {
    1.25
}
fn default_min_face_size() -> u32 {
    20
}
fn default_frequency() -> u32 {
    50
}
fn default_min_pulse_width() -> u32 {
    560
}
fn default_max_pulse_width() -> u32 {
    4200
}
fn default_dest_host() -> String {
    "127.0.0.1".to_string()
}
fn default_dest_port() -> u16 {
    6060
}
fn default_quality() -> u8 {
    50
}
fn default_max_datagram() -> usize {
    MAX_DATAGRAM_BYTES
}
fn default_min_free_bytes() -> u64 {
    50_000
}

impl Config {
    /// Loads configuration from TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Loads configuration from TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let cam = &self.camera;
        if cam.sensor_width == 0 || cam.sensor_height == 0 {
            return Err(ConfigError::Invalid(
                "camera: sensor dimensions must be > 0".to_string(),
            ));
        }
        if cam.window_width == 0 || cam.window_height == 0 {
            return Err(ConfigError::Invalid(
                "camera: window dimensions must be > 0".to_string(),
            ));
        }
        if cam.window_width > cam.sensor_width || cam.window_height > cam.sensor_height {
            return Err(ConfigError::Invalid(format!(
                "camera: window {}x{} does not fit sensor {}x{}",
                cam.window_width, cam.window_height, cam.sensor_width, cam.sensor_height
            )));
        }
        if cam.fps > 120 {
            return Err(ConfigError::Invalid(format!(
                "camera: FPS must be at most 120, got {}",
                cam.fps
            )));
        }

        let det = &self.detector;
        if !det.threshold.is_finite() || det.threshold < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "detector: threshold must be >= 0, got {}",
                det.threshold
            )));
        }
        if !det.scale_factor.is_finite() || det.scale_factor <= 1.0 {
            return Err(ConfigError::Invalid(format!(
                "detector: scale_factor must be > 1.0, got {}",
                det.scale_factor
            )));
        }
        if det.backend == DetectorBackend::Rustface && det.model_path.is_none() {
            return Err(ConfigError::Invalid(
                "detector: model_path is required for the rustface backend".to_string(),
            ));
        }

        let servo = &self.servo;
        if servo.min_pulse_width_us >= servo.max_pulse_width_us {
            return Err(ConfigError::Invalid(format!(
                "servo: min_pulse_width_us ({}) must be below max_pulse_width_us ({})",
                servo.min_pulse_width_us, servo.max_pulse_width_us
            )));
        }
        if servo.frequency_hz == 0 {
            return Err(ConfigError::Invalid(
                "servo: frequency_hz must be > 0".to_string(),
            ));
        }
        let period_us = 1_000_000 / servo.frequency_hz;
        if servo.max_pulse_width_us >= period_us {
            return Err(ConfigError::Invalid(format!(
                "servo: max_pulse_width_us ({}) must fit in the {}us PWM period",
                servo.max_pulse_width_us, period_us
            )));
        }
        self.validate_axis(&servo.pan, "pan")?;
        self.validate_axis(&servo.tilt, "tilt")?;
        if servo.pan.channel == servo.tilt.channel {
            return Err(ConfigError::Invalid(format!(
                "servo: pan and tilt share PWM channel {}",
                servo.pan.channel
            )));
        }

        let stream = &self.stream;
        if stream.dest_port == 0 {
            return Err(ConfigError::Invalid(
                "stream: dest_port must be > 0".to_string(),
            ));
        }
        if stream.quality == 0 || stream.quality > 100 {
            return Err(ConfigError::Invalid(format!(
                "stream: quality must be between 1 and 100, got {}",
                stream.quality
            )));
        }
        if stream.max_datagram_bytes == 0 || stream.max_datagram_bytes > MAX_DATAGRAM_BYTES {
            return Err(ConfigError::Invalid(format!(
                "stream: max_datagram_bytes must be between 1 and {}, got {}",
                MAX_DATAGRAM_BYTES, stream.max_datagram_bytes
            )));
        }

        if self.app.stats_interval_cycles == 0 {
            return Err(ConfigError::Invalid(
                "app: stats_interval_cycles must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_axis(&self, axis: &AxisConfig, name: &str) -> Result<(), ConfigError> {
        let servo = &self.servo;
        if !(servo.min_pulse_width_us..=servo.max_pulse_width_us)
            .contains(&axis.initial_pulse_width_us)
        {
            return Err(ConfigError::Invalid(format!(
                "servo.{}: initial_pulse_width_us {} outside [{}, {}]",
                name, axis.initial_pulse_width_us, servo.min_pulse_width_us, servo.max_pulse_width_us
            )));
        }
        if axis.channel > 1 {
            return Err(ConfigError::Invalid(format!(
                "servo.{}: channel must be 0 or 1, got {}",
                name, axis.channel
            )));
        }
        Ok(())
    }

    /// Saves configuration to TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disabled_detector() -> &'static str {
        "[detector]\nbackend = \"disabled\"\n"
    }

    #[test]
    fn test_defaults_match_firmware() {
        let config = Config::default();
        assert_eq!(config.camera.window_width, 240);
        assert_eq!(config.camera.warmup_ms, 2000);
        assert!(!config.camera.auto_gain);
        assert_eq!(config.detector.threshold, 0.75);
        assert_eq!(config.detector.scale_factor, 1.25);
        assert_eq!(config.servo.frequency_hz, 50);
        assert_eq!(config.servo.min_pulse_width_us, 560);
        assert_eq!(config.servo.max_pulse_width_us, 4200);
        assert_eq!(config.servo.pan.gain, 2);
        assert_eq!(config.servo.tilt.initial_pulse_width_us, 1000);
        assert_eq!(config.stream.dest_port, 6060);
        assert_eq!(config.stream.quality, 50);
        assert_eq!(config.stream.max_datagram_bytes, 65_507);
        assert_eq!(config.resources.min_free_bytes, 50_000);
    }

    #[test]
    fn test_default_requires_model_path() {
        // rustface is the default backend and has no default model
        assert!(Config::default().validate().is_err());
        assert!(Config::from_str(disabled_detector()).is_ok());
    }

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
[app]
stats_interval_cycles = 25

[camera]
driver = "gstreamer"
device = "/dev/video2"
warmup_ms = 500

[detector]
backend = "rustface"
model_path = "model/seeta_fd_frontal_v1.0.bin"
threshold = 2.0
strategy = "first-detected"
overlay = "all"

[servo]
driver = "hardware"
min_pulse_width_us = 1000
max_pulse_width_us = 2000

[servo.pan]
gain = 3
initial_pulse_width_us = 1500
channel = 0

[servo.tilt]
gain = -1
initial_pulse_width_us = 1200
channel = 1

[stream]
dest_host = "192.168.0.141"
dest_port = 7070
quality = 70

[resources]
min_free_bytes = 1048576
        "#;

        let config = Config::from_str(toml).unwrap();

        assert_eq!(config.app.stats_interval_cycles, 25);
        assert_eq!(config.camera.driver, CameraDriver::Gstreamer);
        assert_eq!(config.camera.device, "/dev/video2");
        assert_eq!(config.camera.sensor_width, 320);
        assert_eq!(config.detector.strategy, SelectionStrategy::FirstDetected);
        assert_eq!(config.detector.overlay, OverlayMode::All);
        assert_eq!(config.servo.driver, ServoDriver::Hardware);
        assert_eq!(config.servo.pan.gain, 3);
        assert_eq!(config.servo.tilt.gain, -1);
        assert_eq!(config.stream.dest_host, "192.168.0.141");
        assert_eq!(config.stream.quality, 70);
        assert_eq!(config.resources.min_free_bytes, 1_048_576);
    }

    #[test]
    fn test_invalid_pulse_range() {
        let toml = format!(
            "{}[servo]\nmin_pulse_width_us = 3000\nmax_pulse_width_us = 2000\n",
            disabled_detector()
        );
        assert!(Config::from_str(&toml).is_err());
    }

    #[test]
    fn test_initial_width_outside_range() {
        let toml = format!(
            "{}[servo.tilt]\ngain = 2\ninitial_pulse_width_us = 5000\nchannel = 0\n",
            disabled_detector()
        );
        assert!(Config::from_str(&toml).is_err());
    }

    #[test]
    fn test_window_must_fit_sensor() {
        let toml = format!(
            "{}[camera]\nsensor_width = 160\nsensor_height = 120\n",
            disabled_detector()
        );
        assert!(Config::from_str(&toml).is_err());
    }

    #[test]
    fn test_datagram_ceiling() {
        let toml = format!("{}[stream]\nmax_datagram_bytes = 70000\n", disabled_detector());
        assert!(Config::from_str(&toml).is_err());
    }

    #[test]
    fn test_quality_range() {
        let toml = format!("{}[stream]\nquality = 0\n", disabled_detector());
        assert!(Config::from_str(&toml).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::from_str(disabled_detector()).unwrap();
        config.stream.dest_port = 9999;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.stream.dest_port, 9999);
        assert_eq!(loaded.detector.backend, DetectorBackend::Disabled);
    }

    #[test]
    fn test_sample_config_uses_rustface_score_scale() {
        let config = Config::from_str(include_str!("../config.toml")).unwrap();

        assert_eq!(config.detector.backend, DetectorBackend::Rustface);
        assert_eq!(config.detector.threshold, 2.0);
        assert_eq!(config.servo.pan.initial_pulse_width_us, 560);
        assert_eq!(config.stream.quality, 50);
    }
}
