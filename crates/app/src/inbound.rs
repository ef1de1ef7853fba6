//! Inbound notifications handed from the transport to the dispatcher.

use presence_domain::time::Timestamp;

/// Something the transport observed on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// The broker acknowledged a (re)connection and subscriptions were issued.
    Connected,
    /// A message arrived on a subscribed topic.
    Message(InboundMessage),
}

/// A single delivered message, stamped with its arrival time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub received_at: Timestamp,
}

impl InboundMessage {
    #[must_use]
    pub fn new(
        topic: impl Into<String>,
        payload: impl Into<Vec<u8>>,
        received_at: Timestamp,
    ) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            received_at,
        }
    }
}
