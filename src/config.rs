//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::controller::auth::is_valid_device_id;
use crate::controller::stick::{StickSide, MAX_DEADZONE};
use crate::controller::ControllerKind;
use crate::error::{AstroError, Result};
use crate::transport::UnitSlot;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub controller: ControllerConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub authorization: AuthorizationConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Controller configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ControllerConfig {
    pub kind: ControllerKind,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_drive_stick")]
    pub drive_stick: StickConfig,

    #[serde(default = "default_dome_stick")]
    pub dome_stick: StickConfig,

    #[serde(default)]
    pub nav: NavConfig,
}

/// One logical stick
#[derive(Debug, Deserialize, Clone)]
pub struct StickConfig {
    pub side: StickSide,

    #[serde(default = "default_deadzone")]
    pub deadzone: u8,
}

/// Navigation pair roles
#[derive(Debug, Deserialize, Clone)]
pub struct NavConfig {
    #[serde(default = "default_drive_unit")]
    pub drive_unit: UnitSlot,
}

/// Fault detection configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SafetyConfig {
    #[serde(default = "default_fault_timeout_ms")]
    pub fault_timeout_ms: u64,

    #[serde(default = "default_max_bad_data")]
    pub max_bad_data: u32,
}

/// Allow-list of controller MAC addresses. Empty accepts every controller.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AuthorizationConfig {
    #[serde(default)]
    pub devices: Vec<String>,
}

/// Host transport configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TransportConfig {
    #[serde(default = "default_input_dir")]
    pub input_dir: String,

    #[serde(default = "default_rescan_interval_ms")]
    pub rescan_interval_ms: u64,

    #[serde(default)]
    pub vendor_id: Option<u16>,

    #[serde(default)]
    pub product_id: Option<u16>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub log_dir: Option<String>,
}

// Default value functions
fn default_poll_interval_ms() -> u64 { 10 }
fn default_deadzone() -> u8 { 10 }
fn default_drive_stick() -> StickConfig { StickConfig { side: StickSide::Left, deadzone: default_deadzone() } }
fn default_dome_stick() -> StickConfig { StickConfig { side: StickSide::Right, deadzone: default_deadzone() } }
fn default_drive_unit() -> UnitSlot { UnitSlot::First }

fn default_fault_timeout_ms() -> u64 { 1000 }
fn default_max_bad_data() -> u32 { 10 }

fn default_input_dir() -> String { "/dev/input".to_string() }
fn default_rescan_interval_ms() -> u64 { 1000 }

fn default_log_level() -> String { "info".to_string() }

impl Default for NavConfig {
    fn default() -> Self {
        Self { drive_unit: default_drive_unit() }
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            fault_timeout_ms: default_fault_timeout_ms(),
            max_bad_data: default_max_bad_data(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            rescan_interval_ms: default_rescan_interval_ms(),
            vendor_id: None,
            product_id: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: None,
        }
    }
}

fn invalid(message: impl std::fmt::Display) -> AstroError {
    AstroError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use astro_controller::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        // Validate timing fields
        if self.controller.poll_interval_ms == 0 || self.controller.poll_interval_ms > 1000 {
            return Err(invalid("poll_interval_ms must be between 1 and 1000"));
        }

        if self.safety.fault_timeout_ms == 0 || self.safety.fault_timeout_ms > 60000 {
            return Err(invalid("fault_timeout_ms must be between 1 and 60000"));
        }

        // The staleness window has to span several polls
        if self.safety.fault_timeout_ms <= self.controller.poll_interval_ms {
            return Err(invalid("fault_timeout_ms must be greater than poll_interval_ms"));
        }

        if self.safety.max_bad_data == 0 {
            return Err(invalid("max_bad_data must be greater than 0"));
        }

        if self.transport.rescan_interval_ms == 0 || self.transport.rescan_interval_ms > 60000 {
            return Err(invalid("rescan_interval_ms must be between 1 and 60000"));
        }

        if self.transport.input_dir.is_empty() {
            return Err(invalid("transport input_dir cannot be empty"));
        }

        // Validate dead zones
        for (name, stick) in [
            ("drive_stick", &self.controller.drive_stick),
            ("dome_stick", &self.controller.dome_stick),
        ] {
            if stick.deadzone > MAX_DEADZONE {
                return Err(invalid(format!(
                    "{} deadzone must be between 0 and {}",
                    name, MAX_DEADZONE
                )));
            }
        }

        // Validate authorized devices
        for device in &self.authorization.devices {
            if !is_valid_device_id(device) {
                return Err(invalid(format!(
                    "authorized device '{}' is not a MAC address (XX:XX:XX:XX:XX:XX)",
                    device
                )));
            }
        }

        // Validate log level
        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid(
                "log level must be one of: trace, debug, info, warn, error",
            ));
        }

        if matches!(&self.logging.log_dir, Some(dir) if dir.is_empty()) {
            return Err(invalid("log_dir cannot be empty when set"));
        }

        Ok(())
    }
}
