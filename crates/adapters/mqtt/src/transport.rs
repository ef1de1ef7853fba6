//! Broker connection: the publisher handle and the polling loop.

use std::future::Future;
use std::time::Duration;

use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::sync::mpsc;

use presence_app::inbound::{Inbound, InboundMessage};
use presence_app::ports::MessagePublisher;
use presence_domain::error::PresenceError;
use presence_domain::time;

use crate::config::MqttConfig;
use crate::error::MqttError;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Cloneable handle publishing device commands through the broker.
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
    qos: QoS,
}

impl MessagePublisher for MqttPublisher {
    fn publish(
        &self,
        topic: String,
        payload: String,
    ) -> impl Future<Output = Result<(), PresenceError>> + Send {
        let client = self.client.clone();
        let qos = self.qos;
        async move {
            client
                .publish(topic, qos, false, payload)
                .await
                .map_err(|err| MqttError::Client(err).into())
        }
    }
}

/// Owns the rumqttc event loop and the subscription list.
///
/// The loop must keep being polled for queued publishes to reach the
/// broker, so it runs on its own task and only forwards what it receives.
pub struct MqttConnection {
    client: AsyncClient,
    eventloop: EventLoop,
    subscriptions: Vec<String>,
    qos: QoS,
    reconnect_delay: Duration,
}

/// Build the client pair. No network IO happens until the connection is polled.
///
/// # Errors
///
/// Returns [`MqttError::InvalidQos`] if the configured QoS is out of range.
pub fn connect(
    config: &MqttConfig,
    subscriptions: Vec<String>,
) -> Result<(MqttPublisher, MqttConnection), MqttError> {
    let qos = config.qos()?;

    let mut options = MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
    options.set_keep_alive(config.keep_alive());
    if let Some(username) = &config.username {
        options.set_credentials(username.clone(), config.password.clone().unwrap_or_default());
    }

    // Subscriptions are queued on every CONNACK, so leave room for them.
    let capacity = config.channel_capacity.max(subscriptions.len() + 1);
    let (client, eventloop) = AsyncClient::new(options, capacity);

    let publisher = MqttPublisher {
        client: client.clone(),
        qos,
    };
    let connection = MqttConnection {
        client,
        eventloop,
        subscriptions,
        qos,
        reconnect_delay: config.reconnect_delay(),
    };
    Ok((publisher, connection))
}

impl MqttConnection {
    /// Poll the broker, forwarding deliveries to `inbound`.
    ///
    /// Every CONNACK (first connection or reconnection) re-issues the
    /// subscriptions and then sends [`Inbound::Connected`]. Connection
    /// errors are logged and polling resumes after the reconnect delay.
    /// Returns `Ok(())` once the receiving side of `inbound` is gone.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError::Refused`] when the broker rejects the
    /// credentials and [`MqttError::Client`] when subscriptions cannot be queued.
    pub async fn run(&mut self, inbound: mpsc::Sender<Inbound>) -> Result<(), MqttError> {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    tracing::info!(code = ?ack.code, "connected to broker");
                    self.subscribe_all()?;
                    if inbound.send(Inbound::Connected).await.is_err() {
                        return Ok(());
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let msg =
                        InboundMessage::new(publish.topic, publish.payload.to_vec(), time::now());
                    tracing::trace!(topic = %msg.topic, "message received");
                    if inbound.send(Inbound::Message(msg)).await.is_err() {
                        return Ok(());
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    tracing::debug!(pkid = ack.pkid, "subscription acknowledged");
                }
                Ok(_) => {}
                Err(ConnectionError::ConnectionRefused(code)) => {
                    tracing::error!(?code, "broker refused the connection");
                    return Err(MqttError::Refused(code));
                }
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        retry_in_secs = self.reconnect_delay.as_secs(),
                        "connection to broker lost"
                    );
                    tokio::time::sleep(self.reconnect_delay).await;
                }
            }
        }
    }

    fn subscribe_all(&self) -> Result<(), MqttError> {
        for filter in &self.subscriptions {
            tracing::debug!(%filter, "subscribing");
            self.client
                .try_subscribe(filter.as_str(), self.qos)
                .map_err(MqttError::Client)?;
        }
        Ok(())
    }

    /// Best-effort disconnect: queue a DISCONNECT and poll until it is sent,
    /// the connection drops, or a short timeout elapses.
    pub async fn shutdown(mut self) {
        if let Err(err) = self.client.try_disconnect() {
            tracing::warn!(error = %err, "could not queue disconnect");
            return;
        }
        let flushed = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
            loop {
                match self.eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        })
        .await;
        match flushed {
            Ok(()) => tracing::info!("disconnected from broker"),
            Err(_) => tracing::warn!("timed out waiting for disconnect"),
        }
    }
}
