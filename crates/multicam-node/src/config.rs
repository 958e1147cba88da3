use crate::channels::ChannelTemplates;
use crate::worker::Pacing;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Value of a camera register setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SettingValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SettingValue::Int(v) => Some(*v as f64),
            SettingValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(v) => write!(f, "{}", v),
            SettingValue::Int(v) => write!(f, "{}", v),
            SettingValue::Float(v) => write!(f, "{}", v),
            SettingValue::Text(v) => write!(f, "{}", v),
        }
    }
}

/// A single named camera setting (e.g. `ExposureTime: 5000.0`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub field: String,
    pub value: SettingValue,
}

impl Setting {
    pub fn new(field: impl Into<String>, value: SettingValue) -> Self {
        Self {
            field: field.into(),
            value,
        }
    }
}

/// Parameters of the built-in simulated camera backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedConfig {
    /// Number of cameras the runtime reports
    #[serde(default = "default_sim_cameras")]
    pub cameras: usize,
    #[serde(default = "default_sim_width")]
    pub width: u32,
    #[serde(default = "default_sim_height")]
    pub height: u32,
    /// Channels of the raw buffer (1 = mono sensor, 3 = BGR)
    #[serde(default = "default_sim_raw_channels")]
    pub raw_channels: u8,
    /// Produce a color-converted image alongside the raw one
    #[serde(default = "default_true")]
    pub color: bool,
    #[serde(default = "default_sim_fps")]
    pub fps: f64,
    /// Fail every n-th grab (0 disables failures)
    #[serde(default)]
    pub fail_every: u32,
}

fn default_sim_cameras() -> usize {
    1
}

fn default_sim_width() -> u32 {
    640
}

fn default_sim_height() -> u32 {
    480
}

fn default_sim_raw_channels() -> u8 {
    1
}

fn default_sim_fps() -> f64 {
    30.0
}

fn default_true() -> bool {
    true
}

/// Frame period for `fps`, `None` unless it is positive and representable.
pub fn frame_period(fps: f64) -> Option<Duration> {
    if !(fps.is_finite() && fps > 0.0) {
        return None;
    }
    Duration::try_from_secs_f64(1.0 / fps).ok()
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            cameras: default_sim_cameras(),
            width: default_sim_width(),
            height: default_sim_height(),
            raw_channels: default_sim_raw_channels(),
            color: true,
            fps: default_sim_fps(),
            fail_every: 0,
        }
    }
}

/// Camera backend selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    Simulated(SimulatedConfig),
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Simulated(SimulatedConfig::default())
    }
}

/// Per-camera health reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_health_topic")]
    pub topic: String,
    #[serde(default = "default_health_interval")]
    pub interval_secs: u64,
    /// A camera without a successful grab for this long is reported stalled
    #[serde(default = "default_stall_timeout")]
    pub stall_timeout_secs: u64,
}

fn default_health_topic() -> String {
    "/blackfly/health".to_string()
}

fn default_health_interval() -> u64 {
    5
}

fn default_stall_timeout() -> u64 {
    5
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            topic: default_health_topic(),
            interval_secs: default_health_interval(),
            stall_timeout_secs: default_stall_timeout(),
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Successful grabs dropped between two published frames
    #[serde(default)]
    pub skip: u32,
    #[serde(default = "default_topic_raw", alias = "ros_topic_raw")]
    pub topic_raw: String,
    #[serde(default = "default_topic_color", alias = "ros_topic_color")]
    pub topic_color: String,
    #[serde(default = "default_topic_time", alias = "ros_topic_time")]
    pub topic_time: String,
    #[serde(default = "default_topic_metadata", alias = "additional_topic")]
    pub topic_metadata: String,
    /// Delay after a published cycle
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
    /// Delay after a failed grab
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// Settings applied to every camera, in order
    #[serde(default)]
    pub camera_settings: Vec<Setting>,
    /// Extra settings keyed by camera index, applied after `camera_settings`
    #[serde(default)]
    pub per_camera: BTreeMap<usize, Vec<Setting>>,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub source: SourceConfig,
}

fn default_topic_raw() -> String {
    "/blackfly/cam%/image_raw".to_string()
}

fn default_topic_color() -> String {
    "/blackfly/cam%/image_color".to_string()
}

fn default_topic_time() -> String {
    "/blackfly/cam%/time_reference".to_string()
}

fn default_topic_metadata() -> String {
    "/blackfly/cam%/additional".to_string()
}

fn default_pacing_ms() -> u64 {
    10
}

fn default_backoff_ms() -> u64 {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            skip: 0,
            topic_raw: default_topic_raw(),
            topic_color: default_topic_color(),
            topic_time: default_topic_time(),
            topic_metadata: default_topic_metadata(),
            pacing_ms: default_pacing_ms(),
            backoff_ms: default_backoff_ms(),
            camera_settings: Vec::new(),
            per_camera: BTreeMap::new(),
            health: HealthConfig::default(),
            source: SourceConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a YAML string
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.templates().validate()?;

        if self.health.enabled && self.health.interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "health.interval_secs must be greater than 0".to_string(),
            ));
        }

        match &self.source {
            SourceConfig::Simulated(sim) => {
                if sim.width == 0 || sim.height == 0 {
                    return Err(ConfigError::ValidationError(format!(
                        "simulated resolution {}x{} is empty",
                        sim.width, sim.height
                    )));
                }
                if sim.raw_channels != 1 && sim.raw_channels != 3 {
                    return Err(ConfigError::ValidationError(format!(
                        "simulated raw_channels must be 1 or 3, got {}",
                        sim.raw_channels
                    )));
                }
                if frame_period(sim.fps).is_none() {
                    return Err(ConfigError::ValidationError(format!(
                        "simulated fps must be positive with a representable period, got {}",
                        sim.fps
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn templates(&self) -> ChannelTemplates {
        ChannelTemplates {
            raw: self.topic_raw.clone(),
            color: self.topic_color.clone(),
            time_reference: self.topic_time.clone(),
            metadata: self.topic_metadata.clone(),
        }
    }

    pub fn pacing(&self) -> Pacing {
        Pacing {
            publish_delay: Duration::from_millis(self.pacing_ms),
            failure_backoff: Duration::from_millis(self.backoff_ms),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
}
