use super::{ChannelPublisher, Transport};
use crate::error::TransportError;
use crate::messages::OutboundMessage;
use std::sync::{Arc, Mutex};

/// A message captured by [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub channel: String,
    pub message: OutboundMessage,
}

/// In-process transport that records every publish in order.
///
/// Nothing is ever evicted; meant for tests, see [`super::LogTransport`] for
/// long-running dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    declared: Arc<Mutex<Vec<String>>>,
    log: Arc<Mutex<Vec<PublishedMessage>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channels declared so far, in declaration order.
    pub fn declared(&self) -> Vec<String> {
        self.declared.lock().map(|d| d.clone()).unwrap_or_default()
    }

    /// Snapshot of every message published so far.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Messages published on `channel`, in order.
    pub fn published_on(&self, channel: &str) -> Vec<OutboundMessage> {
        self.published()
            .into_iter()
            .filter(|p| p.channel == channel)
            .map(|p| p.message)
            .collect()
    }

    pub fn count_on(&self, channel: &str) -> usize {
        self.log
            .lock()
            .map(|l| l.iter().filter(|p| p.channel == channel).count())
            .unwrap_or(0)
    }
}

impl Transport for MemoryTransport {
    type Publisher = MemoryPublisher;

    fn declare(&self, channel: &str) -> Result<Self::Publisher, TransportError> {
        self.declared
            .lock()
            .map_err(|e| TransportError::Declare {
                channel: channel.to_string(),
                reason: e.to_string(),
            })?
            .push(channel.to_string());

        Ok(MemoryPublisher {
            channel: channel.to_string(),
            log: self.log.clone(),
        })
    }
}

pub struct MemoryPublisher {
    channel: String,
    log: Arc<Mutex<Vec<PublishedMessage>>>,
}

impl ChannelPublisher for MemoryPublisher {
    fn channel(&self) -> &str {
        &self.channel
    }

    fn publish(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        log::trace!(
            "[memory] {} <- {} ({} bytes)",
            self.channel,
            message.type_name(),
            message.encode_to_vec().len()
        );
        self.log
            .lock()
            .map_err(|e| TransportError::Publish {
                channel: self.channel.clone(),
                reason: e.to_string(),
            })?
            .push(PublishedMessage {
                channel: self.channel.clone(),
                message: message.clone(),
            });
        Ok(())
    }
}
