//! Server configuration management

use crate::usb::{InterfaceSelection, UsbSettings};
use crate::xylo::{BringUpMode, SessionOptions};
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Longest accepted pause between animation frames
pub const MAX_FRAME_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub usb: UsbConfig,
    #[serde(default)]
    pub bringup: BringUpSettings,
    #[serde(default)]
    pub animation: AnimationSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    pub log_level: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbConfig {
    /// Interface claimed on each card
    #[serde(default)]
    pub interface: u8,
    /// Alternate setting selected after claiming
    #[serde(default = "UsbConfig::default_alt_setting")]
    pub alt_setting: u8,
    /// Follow cards being plugged and unplugged
    #[serde(default = "UsbConfig::default_hotplug")]
    pub hotplug: bool,
}

impl Default for UsbConfig {
    fn default() -> Self {
        Self {
            interface: 0,
            alt_setting: Self::default_alt_setting(),
            hotplug: Self::default_hotplug(),
        }
    }
}

impl UsbConfig {
    fn default_alt_setting() -> u8 {
        1
    }

    fn default_hotplug() -> bool {
        true
    }
}

/// Bring-up policy
///
/// ```toml
/// [bringup]
/// mode = "strict"   # or "continue"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BringUpSettings {
    #[serde(default)]
    pub mode: BringUpMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationSettings {
    #[serde(default = "AnimationSettings::default_enabled")]
    pub enabled: bool,
    #[serde(default = "AnimationSettings::default_frame_delay_ms")]
    pub frame_delay_ms: u64,
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            frame_delay_ms: Self::default_frame_delay_ms(),
        }
    }
}

impl AnimationSettings {
    fn default_enabled() -> bool {
        true
    }

    fn default_frame_delay_ms() -> u64 {
        50
    }
}

impl ServerConfig {
    /// Load configuration from the specified path
    ///
    /// Without a path the standard locations are tried in order and the
    /// first existing file wins.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            let candidates = vec![
                Self::default_path(),
                PathBuf::from("/etc/xylo-led/server.toml"),
            ];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: ServerConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config.validate()?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{:#}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("xylo-led").join("server.toml")
        } else {
            PathBuf::from(".config/xylo-led/server.toml")
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.server.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.server.log_level,
                valid_levels.join(", ")
            ));
        }

        if self.animation.frame_delay_ms > MAX_FRAME_DELAY_MS {
            return Err(anyhow!(
                "Invalid animation frame_delay_ms {}, must be at most {}",
                self.animation.frame_delay_ms,
                MAX_FRAME_DELAY_MS
            ));
        }

        Ok(())
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            bringup_mode: self.bringup.mode,
            animation_enabled: self.animation.enabled,
            frame_delay: Duration::from_millis(self.animation.frame_delay_ms),
        }
    }

    pub fn usb_settings(&self) -> UsbSettings {
        UsbSettings {
            selection: InterfaceSelection {
                interface: self.usb.interface,
                alt_setting: self.usb.alt_setting,
            },
            hotplug: self.usb.hotplug,
            session: self.session_options(),
        }
    }
}

/// Load a configuration file, expanding `~` in the path
pub fn load_config(path: &str) -> Result<ServerConfig> {
    let path_buf = PathBuf::from(shellexpand::tilde(path).as_ref());
    ServerConfig::load(Some(path_buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.usb.interface, 0);
        assert_eq!(config.usb.alt_setting, 1);
        assert!(config.usb.hotplug);
        assert_eq!(config.bringup.mode, BringUpMode::Continue);
        assert!(config.animation.enabled);
        assert_eq!(config.animation.frame_delay_ms, 50);
    }

    #[test]
    fn test_config_serialization() {
        let mut config = ServerConfig::default();
        config.bringup.mode = BringUpMode::Strict;
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: ServerConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config, parsed);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: ServerConfig = toml::from_str("[bringup]\nmode = \"strict\"\n").unwrap();
        assert_eq!(parsed.bringup.mode, BringUpMode::Strict);
        assert_eq!(parsed.usb, UsbConfig::default());
        assert_eq!(parsed.server.log_level, "info");
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = ServerConfig::default();
        assert!(config.validate().is_ok());

        config.server.log_level = "invalid".to_string();
        assert!(config.validate().is_err());

        config.server.log_level = "debug".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_frame_delay() {
        let mut config = ServerConfig::default();
        config.animation.frame_delay_ms = MAX_FRAME_DELAY_MS;
        assert!(config.validate().is_ok());

        config.animation.frame_delay_ms = MAX_FRAME_DELAY_MS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_session_options() {
        let mut config = ServerConfig::default();
        config.animation.enabled = false;
        config.animation.frame_delay_ms = 10;

        let options = config.session_options();
        assert!(!options.animation_enabled);
        assert_eq!(options.frame_delay, Duration::from_millis(10));
        assert_eq!(options.bringup_mode, BringUpMode::Continue);
    }
}
