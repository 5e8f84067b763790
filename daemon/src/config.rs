//! Configuration loading and management
//!
//! The device configuration lives in `config.json` under the base directory
//! (`MIRROR_HOME`, or the working directory when unset). Every feature flag
//! defaults to disabled, so a missing file yields a bare but working daemon.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::dispatch::MAX_CAPACITY;

/// Errors raised while reading the device configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Boolean switches gating adapters and handlers
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default)]
pub struct FeatureFlags {
    pub google_drive_enabled: bool,
    pub google_assistant_enabled: bool,
    pub youtube_music_enabled: bool,
    pub face_emotion_detection_enabled: bool,
    pub moisture_sensor_enabled: bool,
    pub style_recommendation_enabled: bool,
    pub companion_app_enabled: bool,
    pub hardware_buttons_enabled: bool,
}

/// One physical input line bound to an action token
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ButtonBinding {
    pub line: u32,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

/// Raw shape of `config.json`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
struct DeviceConfig {
    #[serde(flatten)]
    features: FeatureFlags,
    device_logging_option: String,
    dispatch_queue_capacity: usize,
    max_resolve_attempts: Option<usize>,
    search_page_size: usize,
    companion_socket: Option<PathBuf>,
    gpio_chip: String,
    button_bindings: Vec<ButtonBinding>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            features: FeatureFlags::default(),
            device_logging_option: "INFO".to_string(),
            dispatch_queue_capacity: 0,
            max_resolve_attempts: None,
            search_page_size: 5,
            companion_socket: None,
            gpio_chip: "gpiochip0".to_string(),
            button_bindings: Vec::new(),
        }
    }
}

/// Daemon configuration, built once at startup and shared by reference
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding config, settings and caches
    pub base_dir: PathBuf,

    /// Feature switches
    pub features: FeatureFlags,

    /// Default log level when `RUST_LOG` is unset
    pub log_level: String,

    /// Extra queued tokens allowed behind the one in flight
    pub dispatch_queue_capacity: usize,

    /// Upper bound on track resolution attempts per playback request
    pub max_resolve_attempts: Option<usize>,

    /// Results requested per search page
    pub search_page_size: usize,

    /// Path to the Unix domain socket the companion link is bridged onto
    pub companion_socket: PathBuf,

    /// GPIO chip watched for button edges
    pub gpio_chip: String,

    pub button_bindings: Vec<ButtonBinding>,
}

impl Config {
    /// Load configuration from environment and `config.json`
    pub fn load() -> Result<Self, ConfigError> {
        let base_dir = std::env::var_os("MIRROR_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::load_from(&base_dir)
    }

    /// Load configuration rooted at `base_dir`
    pub fn load_from(base_dir: &Path) -> Result<Self, ConfigError> {
        let path = base_dir.join("config.json");
        let device = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str::<DeviceConfig>(&content)
                .map_err(|source| ConfigError::Parse {
                    path: path.clone(),
                    source,
                })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(?path, "config.json not found, all features disabled");
                DeviceConfig::default()
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        Ok(Self::from_device(base_dir, device))
    }

    fn from_device(base_dir: &Path, device: DeviceConfig) -> Self {
        let log_level = match device.device_logging_option.to_ascii_uppercase().as_str() {
            "DEBUG" => "debug",
            _ => "info",
        };

        let mut dispatch_queue_capacity = device.dispatch_queue_capacity;
        if dispatch_queue_capacity > MAX_CAPACITY {
            warn!(
                requested = dispatch_queue_capacity,
                max = MAX_CAPACITY,
                "dispatch-queue-capacity too large, clamping"
            );
            dispatch_queue_capacity = MAX_CAPACITY;
        }

        Self {
            base_dir: base_dir.to_owned(),
            features: device.features,
            log_level: log_level.to_string(),
            dispatch_queue_capacity,
            max_resolve_attempts: device.max_resolve_attempts,
            search_page_size: device.search_page_size.max(1),
            companion_socket: device
                .companion_socket
                .unwrap_or_else(|| base_dir.join("companion.sock")),
            gpio_chip: device.gpio_chip,
            button_bindings: device.button_bindings,
        }
    }

    /// Location of the persisted UI settings
    pub fn settings_path(&self) -> PathBuf {
        self.base_dir.join("settings.json")
    }

    /// Location of the playlist cache
    pub fn playlist_cache_path(&self) -> PathBuf {
        self.base_dir.join("caches").join("youtube_cache.json")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_device(Path::new("."), DeviceConfig::default())
    }
}
