//! Rules: static description of sensors, cancel switches and devices.
//!
//! Rules are deserialized once from configuration and never change while
//! the process runs.

use serde::Deserialize;

/// Device family, selecting how commands are translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// Plain on/off device; payloads pass through verbatim.
    #[default]
    Simple,
    /// Tunable white bulb; payloads pass through verbatim.
    WarmWhite,
    /// RGB + warm/cold white bulb needing the three-step restore sequence.
    Rgbww,
    /// WLED controller; payloads pass through verbatim.
    Wled,
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simple => f.write_str("simple"),
            Self::WarmWhite => f.write_str("warm_white"),
            Self::Rgbww => f.write_str("rgbww"),
            Self::Wled => f.write_str("wled"),
        }
    }
}

/// A controllable lighting device.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceRule {
    /// Topic the device reports its own state on; also the rule's key.
    #[serde(rename = "topic")]
    pub subscribe_topic: String,
    #[serde(default)]
    pub kind: DeviceKind,
    /// Appended to `subscribe_topic` to form the command topic.
    #[serde(default = "default_publish_suffix")]
    pub publish_suffix: String,
    /// Device-specific "off" command.
    pub off_payload: String,
    /// Sent once per connection to ask the device to report its state.
    #[serde(default)]
    pub query_payload: Option<String>,
    #[serde(default)]
    pub query_topic_suffix: Option<String>,
}

fn default_publish_suffix() -> String {
    "/set".to_string()
}

impl DeviceRule {
    /// Create a rule with the default `/set` publish suffix.
    #[must_use]
    pub fn new(
        subscribe_topic: impl Into<String>,
        kind: DeviceKind,
        off_payload: impl Into<String>,
    ) -> Self {
        Self {
            subscribe_topic: subscribe_topic.into(),
            kind,
            publish_suffix: default_publish_suffix(),
            off_payload: off_payload.into(),
            query_payload: None,
            query_topic_suffix: None,
        }
    }

    #[must_use]
    pub fn with_publish_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.publish_suffix = suffix.into();
        self
    }

    #[must_use]
    pub fn with_query(mut self, suffix: impl Into<String>, payload: impl Into<String>) -> Self {
        self.query_topic_suffix = Some(suffix.into());
        self.query_payload = Some(payload.into());
        self
    }

    /// Topic state-setting commands are published to.
    #[must_use]
    pub fn command_topic(&self) -> String {
        format!("{}{}", self.subscribe_topic, self.publish_suffix)
    }

    /// Topic and payload of the connect-time state query, if configured.
    #[must_use]
    pub fn query(&self) -> Option<(String, &str)> {
        match (&self.query_topic_suffix, &self.query_payload) {
            (Some(suffix), Some(payload)) => {
                Some((format!("{}{suffix}", self.subscribe_topic), payload.as_str()))
            }
            _ => None,
        }
    }
}

/// A binary occupancy sensor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SensorRule {
    #[serde(rename = "topic")]
    pub subscribe_topic: String,
    /// Boolean field carrying the occupancy flag.
    #[serde(default = "default_occupancy_field")]
    pub occupancy_field: String,
}

fn default_occupancy_field() -> String {
    "occupancy".to_string()
}

impl SensorRule {
    #[must_use]
    pub fn new(subscribe_topic: impl Into<String>, occupancy_field: impl Into<String>) -> Self {
        Self {
            subscribe_topic: subscribe_topic.into(),
            occupancy_field: occupancy_field.into(),
        }
    }
}

/// A multi-click switch that overrides occupancy handling.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CancelSwitchRule {
    #[serde(rename = "topic")]
    pub subscribe_topic: String,
    /// String field carrying `single`, `double`, `triple` or `hold`.
    #[serde(default = "default_action_field")]
    pub action_field: String,
}

fn default_action_field() -> String {
    "action".to_string()
}

impl CancelSwitchRule {
    #[must_use]
    pub fn new(subscribe_topic: impl Into<String>, action_field: impl Into<String>) -> Self {
        Self {
            subscribe_topic: subscribe_topic.into(),
            action_field: action_field.into(),
        }
    }
}
