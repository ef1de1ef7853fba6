//! # presence-adapter-mqtt
//!
//! MQTT adapter: bridges the broker and the presence dispatcher.
//!
//! ## Responsibilities
//! - Connect to an MQTT broker (credentials, keep-alive, QoS)
//! - Subscribe to every rule topic on each (re)connection
//! - Forward incoming publishes, stamped with their arrival time, to the
//!   dispatcher channel
//! - Publish device commands through [`MqttPublisher`], the
//!   [`MessagePublisher`](presence_app::ports::MessagePublisher) implementation
//! - Disconnect on shutdown, best effort
//!
//! ## Dependency rule
//! Depends on `presence-app` (port traits) and `presence-domain` only.

mod config;
mod error;
mod transport;

pub use config::MqttConfig;
pub use error::MqttError;
pub use transport::{MqttConnection, MqttPublisher, connect};
