//! Publish-only transport seam.
//!
//! Workers only ever see a [`ChannelPublisher`] per channel, created once at
//! startup through [`Transport::declare`].

mod dry_run;
mod memory;
mod zenoh_transport;

pub use dry_run::{LogPublisher, LogTransport};
pub use memory::{MemoryPublisher, MemoryTransport, PublishedMessage};
pub use zenoh_transport::{ZenohPublisher, ZenohTransport};

use crate::error::TransportError;
use crate::messages::OutboundMessage;

/// A declared output channel.
pub trait ChannelPublisher: Send + 'static {
    /// Name the channel was declared with.
    fn channel(&self) -> &str;

    fn publish(&self, message: &OutboundMessage) -> Result<(), TransportError>;
}

/// Factory for channel publishers.
pub trait Transport: Send + Sync + 'static {
    type Publisher: ChannelPublisher;

    fn declare(&self, channel: &str) -> Result<Self::Publisher, TransportError>;
}
