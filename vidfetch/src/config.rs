use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default location of the config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/vidfetch.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },
    #[error("invalid {field} in {path}: {reason}")]
    Invalid {
        path: PathBuf,
        field: &'static str,
        reason: String,
    },
}

/**
    Top-level service configuration.

    Loaded from YAML, then overridden by `VIDFETCH_*` environment
    variables, then by command line flags.
*/
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub sniff: SniffConfig,
    pub ffmpeg: FfmpegConfig,
    pub jobs: JobsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub downloads_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub tiktok_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            downloads_dir: PathBuf::from("downloads"),
            temp_dir: PathBuf::from("temp"),
            tiktok_dir: PathBuf::from("tiktok"),
        }
    }
}

/**
    Browser sniffing behaviour. Durations are in seconds.
*/
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SniffConfig {
    pub headless: bool,
    pub proxy: Option<String>,
    /// Navigation timeout for each attempt, in order.
    pub attempt_timeouts: Vec<f64>,
    pub settle_delay: f64,
    pub play_wait: f64,
    pub click_timeout: f64,
    /// Regex matched against every request URL the page makes.
    pub stream_pattern: String,
    pub overlay_selector: String,
    pub play_selector: String,
}

impl Default for SniffConfig {
    fn default() -> Self {
        Self {
            headless: true,
            proxy: None,
            attempt_timeouts: vec![60.0, 90.0],
            settle_delay: 3.0,
            play_wait: 5.0,
            click_timeout: 3.0,
            stream_pattern: r"\.m3u8".to_string(),
            overlay_selector: ".poster__background-overlay".to_string(),
            play_selector: "button[aria-label='Play'], button.play".to_string(),
        }
    }
}

impl SniffConfig {
    pub fn attempt_durations(&self) -> Vec<Duration> {
        self.attempt_timeouts.iter().copied().map(seconds).collect()
    }

    fn validate(&self) -> Result<(), (&'static str, String)> {
        if self.attempt_timeouts.is_empty() {
            return Err((
                "sniff.attempt_timeouts",
                "at least one attempt is required".into(),
            ));
        }
        let delays = [
            ("sniff.settle_delay", self.settle_delay),
            ("sniff.play_wait", self.play_wait),
            ("sniff.click_timeout", self.click_timeout),
        ];
        let timeouts = self
            .attempt_timeouts
            .iter()
            .map(|secs| ("sniff.attempt_timeouts", *secs));
        for (field, secs) in timeouts.chain(delays) {
            if !secs.is_finite() || secs < 0.0 {
                return Err((field, format!("{secs} is not a duration in seconds")));
            }
        }
        Ok(())
    }
}

/**
    Convert a configured number of seconds into a `Duration`.

    Negative and NaN values become zero; values too large to represent
    saturate to `Duration::MAX`.
*/
pub fn seconds(value: f64) -> Duration {
    if value.is_nan() || value <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
}

/**
    ffmpeg binaries and encoder settings.
*/
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FfmpegConfig {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    /// Network I/O timeout passed to ffmpeg, in seconds.
    pub network_timeout: f64,
    pub video_codec: String,
    pub crf: u8,
    pub preset: String,
    /// Video bitrate in kbps, also used as the max rate.
    pub video_bitrate: u32,
    /// Rate control buffer in kbps.
    pub bufsize: u32,
    pub height: u32,
    pub audio_codec: String,
    /// Audio bitrate in kbps.
    pub audio_bitrate: u32,
    pub tune: Option<String>,
    pub threads: u32,
    pub require_smaller: bool,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            network_timeout: 30.0,
            video_codec: "libx264".to_string(),
            crf: 23,
            preset: "veryfast".to_string(),
            video_bitrate: 2000,
            bufsize: 4000,
            height: 720,
            audio_codec: "aac".to_string(),
            audio_bitrate: 128,
            tune: Some("fastdecode".to_string()),
            threads: 2,
            require_smaller: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct JobsConfig {
    pub max_concurrent_jobs: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
        }
    }
}

impl Config {
    /**
        Load config from a YAML file.

        An explicit path must exist. When `path` is `None` the default
        location is tried and silently skipped if absent.
    */
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };

        if !required && !path.exists() {
            return Ok(Self::default());
        }

        let yaml = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_yaml(&yaml).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;

        config
            .sniff
            .validate()
            .map_err(|(field, reason)| ConfigError::Invalid {
                path,
                field,
                reason,
            })?;
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }

    /// Apply `VIDFETCH_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("VIDFETCH_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("VIDFETCH_PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "VIDFETCH_PORT",
                value: port,
            })?;
        }
        if let Some(dir) = lookup("VIDFETCH_DOWNLOADS_DIR") {
            self.storage.downloads_dir = dir.into();
        }
        if let Some(dir) = lookup("VIDFETCH_TEMP_DIR") {
            self.storage.temp_dir = dir.into();
        }
        if let Some(dir) = lookup("VIDFETCH_TIKTOK_DIR") {
            self.storage.tiktok_dir = dir.into();
        }
        if let Some(bin) = lookup("VIDFETCH_FFMPEG") {
            self.ffmpeg.ffmpeg = bin.into();
        }
        if let Some(bin) = lookup("VIDFETCH_FFPROBE") {
            self.ffmpeg.ffprobe = bin.into();
        }
        if let Some(headless) = lookup("VIDFETCH_HEADLESS") {
            self.sniff.headless = parse_bool(&headless).ok_or(ConfigError::InvalidEnv {
                name: "VIDFETCH_HEADLESS",
                value: headless,
            })?;
        }
        if let Some(proxy) = lookup("VIDFETCH_PROXY") {
            self.sniff.proxy = (!proxy.is_empty()).then_some(proxy);
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
