//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `presence.toml` in the working directory, or the file named by
//! `PRESENCE_CONFIG`. Every field has a sensible default so the file is
//! optional; an omitted rule list falls back to the reference zigbee2mqtt
//! layout. Environment variables take precedence over file values.

use std::time::Duration;

use presence_adapter_mqtt::MqttConfig;
use presence_app::dispatcher::DispatcherSettings;
use presence_domain::error::ConfigError as RuleError;
use presence_domain::registry::RuleRegistry;
use presence_domain::rule::{CancelSwitchRule, DeviceKind, DeviceRule, SensorRule};
use serde::Deserialize;

const DEFAULT_PATH: &str = "presence.toml";
const ZIGBEE_OFF: &str = r#"{"state":"OFF"}"#;
const ZIGBEE_QUERY: &str = r#"{"state":""}"#;

/// Top-level configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Broker connection settings.
    pub mqtt: MqttConfig,
    /// Override and sequencing timings.
    pub timing: TimingConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Controllable lighting devices.
    pub devices: Vec<DeviceRule>,
    /// Occupancy sensors.
    pub sensors: Vec<SensorRule>,
    /// Multi-click override switches.
    pub cancel_switches: Vec<CancelSwitchRule>,
}

/// Timing configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Seconds during which device echoes are ignored after occupancy.
    pub sleep_window_secs: u32,
    /// Seconds of suppression per click of a cancel switch.
    pub cancel_base_secs: u32,
    /// Milliseconds between the second and third RGBWW restore step.
    pub rgbww_settle_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from the config file (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting values are out of range.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("PRESENCE_CONFIG").unwrap_or_else(|_| DEFAULT_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("PRESENCE_HOST") {
            self.mqtt.host = val;
        }
        if let Ok(val) = std::env::var("PRESENCE_PORT") {
            if let Ok(port) = val.parse() {
                self.mqtt.port = port;
            }
        }
        if let Ok(val) = std::env::var("PRESENCE_USERNAME") {
            self.mqtt.username = Some(val);
        }
        if let Ok(val) = std::env::var("PRESENCE_PASSWORD") {
            self.mqtt.password = Some(val);
        }
        if let Ok(val) = std::env::var("PRESENCE_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.mqtt.qos > 2 {
            return Err(ConfigError::Validation("qos must be 0, 1 or 2".to_string()));
        }
        if self.mqtt.channel_capacity == 0 {
            return Err(ConfigError::Validation(
                "channel_capacity must be non-zero".to_string(),
            ));
        }
        if self.timing.sleep_window_secs == 0 || self.timing.cancel_base_secs == 0 {
            return Err(ConfigError::Validation(
                "sleep_window_secs and cancel_base_secs must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate the rule lists into a registry.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Rules`] for empty or duplicate topics.
    pub fn build_registry(&self) -> Result<RuleRegistry, ConfigError> {
        let registry = RuleRegistry::new(
            self.devices.clone(),
            self.sensors.clone(),
            self.cancel_switches.clone(),
        )?;
        Ok(registry)
    }

    /// Return the config's endpoint as `host:port`.
    #[must_use]
    pub fn broker_addr(&self) -> String {
        format!("{}:{}", self.mqtt.host, self.mqtt.port)
    }
}

impl TimingConfig {
    #[must_use]
    pub fn settings(&self) -> DispatcherSettings {
        DispatcherSettings {
            sleep_window: chrono::TimeDelta::seconds(i64::from(self.sleep_window_secs)),
            cancel_base: chrono::TimeDelta::seconds(i64::from(self.cancel_base_secs)),
            settle_delay: Duration::from_millis(self.rgbww_settle_ms),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mqtt: MqttConfig::default(),
            timing: TimingConfig::default(),
            logging: LoggingConfig::default(),
            devices: default_devices(),
            sensors: default_sensors(),
            cancel_switches: default_cancel_switches(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            sleep_window_secs: 10,
            cancel_base_secs: 15 * 60,
            rgbww_settle_ms: 1000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "presenced=info,presence=info".to_string(),
        }
    }
}

fn default_devices() -> Vec<DeviceRule> {
    vec![
        DeviceRule::new("zigbee2mqtt/RGBWW", DeviceKind::Rgbww, ZIGBEE_OFF)
            .with_query("/get", ZIGBEE_QUERY),
        DeviceRule::new("zigbee2mqtt/WW_U", DeviceKind::WarmWhite, ZIGBEE_OFF)
            .with_query("/get", ZIGBEE_QUERY),
        DeviceRule::new("zigbee2mqtt/WW_L", DeviceKind::WarmWhite, ZIGBEE_OFF)
            .with_query("/get", ZIGBEE_QUERY),
        DeviceRule::new("wled/1cc53a", DeviceKind::Wled, "OFF").with_publish_suffix(""),
    ]
}

fn default_sensors() -> Vec<SensorRule> {
    vec![SensorRule::new("zigbee2mqtt/MotionS", "occupancy")]
}

fn default_cancel_switches() -> Vec<CancelSwitchRule> {
    vec![CancelSwitchRule::new("zigbee2mqtt/CancelSW", "action")]
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
    /// Rule lists are malformed.
    #[error("invalid rule configuration: {0}")]
    Rules(#[from] RuleError),
}
