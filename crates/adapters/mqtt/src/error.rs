//! MQTT adapter error types.

use presence_domain::error::PresenceError;

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The rumqttc client rejected a request (queue closed or full).
    #[error("MQTT client error: {0}")]
    Client(#[source] rumqttc::ClientError),

    /// The broker answered the CONNECT with a refusal.
    #[error("broker refused the connection: {0:?}")]
    Refused(rumqttc::ConnectReturnCode),

    /// The configured QoS level does not exist.
    #[error("invalid QoS level {0}")]
    InvalidQos(u8),
}

impl From<MqttError> for PresenceError {
    fn from(err: MqttError) -> Self {
        PresenceError::transport(err)
    }
}
