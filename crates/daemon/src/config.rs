//! Daemon configuration management

use crate::usb::AccessoryIdentity;
use anyhow::{Context, Result};
use event::DeviceClass;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub daemon: DaemonSettings,
    /// Which device classes get a handler at startup
    #[serde(default)]
    pub classes: ClassSettings,
    /// Identity strings announced during the accessory handshake
    #[serde(default)]
    pub accessory: AccessoryIdentity,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            daemon: DaemonSettings::default(),
            classes: ClassSettings::default(),
            accessory: AccessoryIdentity::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonSettings {
    #[serde(default = "DaemonSettings::default_log_level")]
    pub log_level: String,
    /// Headless service mode (no stdin event feed)
    #[serde(default)]
    pub service_mode: bool,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
            service_mode: false,
        }
    }
}

impl DaemonSettings {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassSettings {
    #[serde(default = "ClassSettings::default_enabled")]
    pub usb: bool,
    #[serde(default = "ClassSettings::default_enabled")]
    pub bluetooth: bool,
    #[serde(default = "ClassSettings::default_enabled")]
    pub storage: bool,
}

impl Default for ClassSettings {
    fn default() -> Self {
        Self {
            usb: true,
            bluetooth: true,
            storage: true,
        }
    }
}

impl ClassSettings {
    fn default_enabled() -> bool {
        true
    }
}

impl DaemonConfig {
    /// Whether a device class should get a handler
    pub fn enabled(&self, class: DeviceClass) -> bool {
        match class {
            DeviceClass::Usb => self.classes.usb,
            DeviceClass::Bluetooth => self.classes.bluetooth,
            DeviceClass::Storage => self.classes.storage,
        }
    }

    /// Default config file location
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("hotplugd").join("daemon.toml")
        } else {
            PathBuf::from("/etc/hotplugd/daemon.toml")
        }
    }

    /// Load configuration from an explicit path, or search the defaults
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(p) => {
                let expanded = shellexpand::tilde(&p.to_string_lossy()).to_string();
                PathBuf::from(expanded)
            }
            None => Self::default_path(),
        };

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: DaemonConfig = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Load from the default search path, falling back to built-in defaults
    pub fn load_or_default() -> Self {
        for candidate in [Self::default_path(), PathBuf::from("/etc/hotplugd/daemon.toml")] {
            if candidate.exists() {
                match Self::load(Some(candidate.clone())) {
                    Ok(config) => return config,
                    Err(e) => {
                        warn!("ignoring config {}: {:#}", candidate.display(), e);
                    }
                }
            }
        }
        Self::default()
    }

    /// Write the configuration as TOML, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("failed to write config file {}", path.display()))?;
        Ok(())
    }
}
