use serde::{Deserialize, Deserializer};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::boundary::BoundaryConfig;
use crate::playback::PlaybackSettings;
use crate::session::Selection;
use crate::track::NormalizeOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub boundary: BoundaryConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default = "default_devices")]
    pub devices: Vec<Device>,
    #[serde(default)]
    pub selection: Selection,
    #[serde(default)]
    pub normalize: NormalizeOptions,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    #[serde(
        default = "default_tick_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub tick_interval: Duration,
    #[serde(
        default = "default_min_tick_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub min_tick_interval: Duration,
    #[serde(
        default = "default_speed_step",
        deserialize_with = "deserialize_duration"
    )]
    pub speed_step: Duration,
    #[serde(default = "default_step_size")]
    pub step_size: u16,
}

fn default_tick_interval() -> Duration {
    Duration::from_millis(20)
}

fn default_min_tick_interval() -> Duration {
    Duration::from_millis(5)
}

fn default_speed_step() -> Duration {
    Duration::from_millis(5)
}

fn default_step_size() -> u16 {
    10
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tick_interval: default_tick_interval(),
            min_tick_interval: default_min_tick_interval(),
            speed_step: default_speed_step(),
            step_size: default_step_size(),
        }
    }
}

impl PlaybackConfig {
    pub fn settings(&self) -> PlaybackSettings {
        PlaybackSettings {
            tick_interval: self.tick_interval,
            min_tick_interval: self.min_tick_interval,
            speed_step: self.speed_step,
            step_size: self.step_size,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_track_file")]
    pub track_file: PathBuf,
    #[serde(default = "default_trip_dir")]
    pub trip_dir: PathBuf,
}

fn default_track_file() -> PathBuf {
    PathBuf::from("track.json")
}

fn default_trip_dir() -> PathBuf {
    PathBuf::from("trips")
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            track_file: default_track_file(),
            trip_dir: default_trip_dir(),
        }
    }
}

/// Entry of the device selector.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Device {
    pub value: String,
    pub label: String,
}

const SAMPLE_IMEIS: [&str; 7] = [
    "937066763492",
    "700070635325",
    "700070635326",
    "800070635323",
    "900070635323",
    "700080635323",
    "700090635323",
];

fn default_devices() -> Vec<Device> {
    SAMPLE_IMEIS
        .iter()
        .map(|imei| Device {
            value: imei.to_string(),
            label: imei.to_string(),
        })
        .collect()
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            playback: PlaybackConfig::default(),
            boundary: BoundaryConfig::default(),
            source: SourceConfig::default(),
            devices: default_devices(),
            selection: Selection::default(),
            normalize: NormalizeOptions::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.playback.min_tick_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "playback.min_tick_interval must be positive".into(),
            ));
        }
        if self.playback.step_size == 0 {
            return Err(ConfigError::Invalid(
                "playback.step_size must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Case-insensitive match on label or value; an empty query lists everything.
    pub fn search_devices(&self, query: &str) -> Vec<&Device> {
        let needle = query.trim().to_lowercase();
        self.devices
            .iter()
            .filter(|d| {
                d.label.to_lowercase().contains(&needle) || d.value.to_lowercase().contains(&needle)
            })
            .collect()
    }

    pub fn find_device(&self, value: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.value == value)
    }
}
