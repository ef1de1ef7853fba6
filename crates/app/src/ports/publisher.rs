//! Publisher port: fire-and-forget outbound messages on the bus.

use std::future::Future;

use presence_domain::error::PresenceError;

/// Sends a payload to a bus topic.
///
/// Implementations return once the message is handed to the transport;
/// delivery guarantees are the transport's concern.
pub trait MessagePublisher {
    /// Publish `payload` on `topic`.
    fn publish(
        &self,
        topic: String,
        payload: String,
    ) -> impl Future<Output = Result<(), PresenceError>> + Send;
}

impl<T: MessagePublisher + Send + Sync> MessagePublisher for std::sync::Arc<T> {
    fn publish(
        &self,
        topic: String,
        payload: String,
    ) -> impl Future<Output = Result<(), PresenceError>> + Send {
        (**self).publish(topic, payload)
    }
}
