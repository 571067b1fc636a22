use anyhow::{Context, Result};
use config::{Config, File, FileFormat};
use log::{debug, LevelFilter};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::collectors::usb::USB_DEVICES_PATH;
use crate::models::usb::UsbId;

pub const DEFAULT_CONFIG_FILE: &str = "temper.ini";

fn default_usb_root() -> PathBuf {
    PathBuf::from(USB_DEVICES_PATH)
}

fn default_dev_root() -> PathBuf {
    PathBuf::from("/dev")
}

fn default_device_timeout() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn deserialize_usb_id<'de, D>(deserializer: D) -> Result<Option<UsbId>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;

    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(id) => id.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SensorsConfig {
    #[serde(default = "default_usb_root")]
    pub usb_root: PathBuf,
    #[serde(default = "default_dev_root")]
    pub dev_root: PathBuf,
    /// `VENDOR_ID:PRODUCT_ID` to read instead of the known models.
    #[serde(default, deserialize_with = "deserialize_usb_id")]
    pub force: Option<UsbId>,
    /// Seconds allowed for reading one device.
    #[serde(default = "default_device_timeout")]
    pub device_timeout: u64,
}

impl SensorsConfig {
    pub fn device_timeout(&self) -> Duration {
        Duration::from_secs(self.device_timeout)
    }
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            usb_root: default_usb_root(),
            dev_root: default_dev_root(),
            force: None,
            device_timeout: default_device_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub sensors: SensorsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn get_log_level(&self) -> LevelFilter {
        match self.logging.level.to_lowercase().as_str() {
            "trace" => LevelFilter::Trace,
            "debug" => LevelFilter::Debug,
            "info" => LevelFilter::Info,
            "warn" => LevelFilter::Warn,
            "error" => LevelFilter::Error,
            "off" => LevelFilter::Off,
            _ => LevelFilter::Info, // Default to Info if invalid
        }
    }

    /// Defaults when `path` does not exist. A file that exists but does not
    /// parse is an error, so a bad `force` id is never silently dropped.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_path = path.as_ref();
        if !config_path.exists() {
            debug!("No configuration at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }
        Self::from_file(config_path)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_path = path.as_ref();
        debug!("Loading configuration from {}", config_path.display());

        let config = Config::builder()
            .add_source(File::from(config_path).format(FileFormat::Ini))
            .build()
            .context(format!("Failed to load config from {}", config_path.display()))?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize config")?;

        Ok(app_config)
    }
}
