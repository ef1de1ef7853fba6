//! MQTT connection configuration.

use std::time::Duration;

use rumqttc::QoS;
use serde::Deserialize;

use crate::error::MqttError;

/// Configuration for the broker connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// MQTT broker hostname or IP address.
    pub host: String,
    /// MQTT broker port.
    pub port: u16,
    /// MQTT client identifier.
    pub client_id: String,
    /// Username, when the broker requires authentication.
    pub username: Option<String>,
    /// Password for `username`.
    pub password: Option<String>,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u16,
    /// QoS level (0, 1 or 2) for subscriptions and publishes.
    pub qos: u8,
    /// Capacity of the client request queue and of the inbound channel.
    pub channel_capacity: usize,
    /// Pause before polling again after a connection error, in seconds.
    pub reconnect_delay_secs: u16,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "192.168.0.201".to_string(),
            port: 1883,
            client_id: "presence".to_string(),
            username: None,
            password: None,
            keep_alive_secs: 60,
            qos: 1,
            channel_capacity: 64,
            reconnect_delay_secs: 5,
        }
    }
}

impl MqttConfig {
    /// The configured QoS as a rumqttc value.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError::InvalidQos`] for levels above 2.
    pub fn qos(&self) -> Result<QoS, MqttError> {
        match self.qos {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            other => Err(MqttError::InvalidQos(other)),
        }
    }

    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(u64::from(self.keep_alive_secs))
    }

    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(u64::from(self.reconnect_delay_secs))
    }
}
