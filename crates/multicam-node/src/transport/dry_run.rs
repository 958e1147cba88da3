use super::{ChannelPublisher, Transport};
use crate::error::TransportError;
use crate::messages::OutboundMessage;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Totals {
    messages: AtomicU64,
    bytes: AtomicU64,
}

/// Transport for `--dry-run`: encodes every message, logs its size and drops it.
///
/// Only two counters are kept, so a dry run can stay up indefinitely.
#[derive(Debug, Clone, Default)]
pub struct LogTransport {
    totals: Arc<Totals>,
}

impl LogTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages that would have been sent so far.
    pub fn messages(&self) -> u64 {
        self.totals.messages.load(Ordering::Relaxed)
    }

    /// Encoded bytes that would have been sent so far.
    pub fn bytes(&self) -> u64 {
        self.totals.bytes.load(Ordering::Relaxed)
    }
}

impl Transport for LogTransport {
    type Publisher = LogPublisher;

    fn declare(&self, channel: &str) -> Result<Self::Publisher, TransportError> {
        log::info!("[dry-run] declared '{}'", channel);
        Ok(LogPublisher {
            channel: channel.to_string(),
            totals: self.totals.clone(),
        })
    }
}

pub struct LogPublisher {
    channel: String,
    totals: Arc<Totals>,
}

impl ChannelPublisher for LogPublisher {
    fn channel(&self) -> &str {
        &self.channel
    }

    fn publish(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        let size = message.encode_to_vec().len();
        log::debug!(
            "[dry-run] {} <- {} ({} bytes)",
            self.channel,
            message.type_name(),
            size
        );
        self.totals.messages.fetch_add(1, Ordering::Relaxed);
        self.totals.bytes.fetch_add(size as u64, Ordering::Relaxed);
        Ok(())
    }
}
