//! Daemon configuration
//!
//! Loaded from TOML (`~/.config/asus-smc/config.toml` by default). Every field
//! has a default, so a missing file or an empty one is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use asus_smc_platform::protocol::method;
use serde::{Deserialize, Serialize};

use crate::backlight::MAX_LEVEL;
use crate::error::SmcError;

/// When interactive keyboard backlight steps are written to durable storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PersistPolicy {
    /// Only registry writes persist; key steps badge but don't save
    Explicit,
    /// Every key step is saved
    #[default]
    EveryStep,
    /// The current level is saved right before the power-off write
    OnSuspend,
}

/// How the keyboard backlight step keys are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BacklightMode {
    /// Levels are tracked here and written to the firmware
    #[default]
    Firmware,
    /// Steps are forwarded as top-case illumination keys; the OS owns the level
    HidKeys,
}

/// Firmware bridge settings (used by the `acpi_call` bridge)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareConfig {
    /// ACPI path of the ATK device
    #[serde(default = "default_device")]
    pub device: String,
    /// acpi_call control file
    #[serde(default = "default_call_path")]
    pub call_path: PathBuf,
    /// Methods reported as present by `validate`
    #[serde(default = "default_supported_methods")]
    pub supported_methods: Vec<String>,
}

fn default_device() -> String {
    "\\_SB.ATKD".to_string()
}

fn default_call_path() -> PathBuf {
    PathBuf::from("/proc/acpi/call")
}

fn default_supported_methods() -> Vec<String> {
    [method::INIT, method::WED, method::SKBV, method::ALSC, method::ALSS]
        .iter()
        .map(|m| m.to_string())
        .collect()
}

impl Default for FirmwareConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            call_path: default_call_path(),
            supported_methods: default_supported_methods(),
        }
    }
}

/// Complete daemon configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmcConfig {
    /// Ambient light poll interval
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Upper bound on the durable store lookup during restoration
    #[serde(default = "default_storage_timeout_ms")]
    pub storage_timeout_ms: u64,
    /// Level used when no persisted level can be read
    #[serde(default = "default_backlight_level")]
    pub default_backlight_level: u8,
    #[serde(default)]
    pub persist_policy: PersistPolicy,
    #[serde(default)]
    pub backlight_mode: BacklightMode,
    /// State database location (default: data dir)
    #[serde(default)]
    pub store_path: Option<PathBuf>,
    #[serde(default)]
    pub firmware: FirmwareConfig,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_storage_timeout_ms() -> u64 {
    5000
}

fn default_backlight_level() -> u8 {
    MAX_LEVEL
}

impl Default for SmcConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            storage_timeout_ms: default_storage_timeout_ms(),
            default_backlight_level: default_backlight_level(),
            persist_policy: PersistPolicy::default(),
            backlight_mode: BacklightMode::default(),
            store_path: None,
            firmware: FirmwareConfig::default(),
        }
    }
}

impl SmcConfig {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("asus-smc")
            .join("config.toml")
    }

    /// Load config from a file, or return default if not found
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: SmcConfig = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the engine can't honor
    pub fn validate(&self) -> Result<(), SmcError> {
        if self.poll_interval_ms == 0 {
            return Err(SmcError::Config("poll_interval_ms must be > 0".into()));
        }
        if self.default_backlight_level > MAX_LEVEL {
            return Err(SmcError::Config(format!(
                "default_backlight_level must be 0-{MAX_LEVEL}"
            )));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_timeout_ms)
    }

    /// State database path, falling back to the user data dir
    pub fn store_path(&self) -> PathBuf {
        self.store_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("asus-smc")
                .join("state")
        })
    }
}
