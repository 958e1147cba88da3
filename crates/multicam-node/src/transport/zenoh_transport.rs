use super::{ChannelPublisher, Transport};
use crate::error::TransportError;
use crate::messages::OutboundMessage;
use std::sync::Arc;
use zenoh::pubsub::Publisher;
use zenoh::Wait;

/// Turn a ROS-style channel name into a Zenoh key expression.
///
/// Key expressions may not start or end with `/`, nor contain empty chunks.
pub fn to_key_expr(channel: &str) -> String {
    channel
        .split('/')
        .filter(|chunk| !chunk.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Transport backed by a shared Zenoh session.
///
/// Publishers are driven with the synchronous `wait()` API because capture
/// workers run on blocking threads, outside the async runtime.
pub struct ZenohTransport {
    session: Arc<zenoh::Session>,
}

impl ZenohTransport {
    pub fn new(session: Arc<zenoh::Session>) -> Self {
        Self { session }
    }
}

impl Transport for ZenohTransport {
    type Publisher = ZenohPublisher;

    fn declare(&self, channel: &str) -> Result<Self::Publisher, TransportError> {
        let key = to_key_expr(channel);
        let publisher = self
            .session
            .declare_publisher(key.clone())
            .wait()
            .map_err(|e| TransportError::Declare {
                channel: channel.to_string(),
                reason: e.to_string(),
            })?;

        log::debug!("Declared publisher '{}' -> key '{}'", channel, key);

        Ok(ZenohPublisher {
            channel: channel.to_string(),
            publisher,
        })
    }
}

pub struct ZenohPublisher {
    channel: String,
    publisher: Publisher<'static>,
}

impl ChannelPublisher for ZenohPublisher {
    fn channel(&self) -> &str {
        &self.channel
    }

    fn publish(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        self.publisher
            .put(message.encode_to_vec())
            .wait()
            .map_err(|e| TransportError::Publish {
                channel: self.channel.clone(),
                reason: e.to_string(),
            })
    }
}
