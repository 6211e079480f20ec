pub mod memory;

#[cfg(feature = "redis")]
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;

use crate::types::{ChannelCapabilities, Delivery, OutboundMessage};
use crate::QueueResult;

pub use memory::MemoryBroker;

#[cfg(feature = "redis")]
pub use self::redis::RedisBroker;

/// Named, durable channels with at-least-once delivery.
///
/// A message stays owned by the broker from `publish` until a consumer
/// acknowledges or rejects the delivery that carried it. Each message is
/// handed to exactly one consumer at a time.
#[async_trait]
pub trait ChannelBroker: Send + Sync {
    /// Create the channel if missing. Re-declaring never touches queued messages.
    async fn declare(&self, channel: &str) -> QueueResult<()>;

    /// Append a message. Fails when disconnected or when the channel is unknown.
    async fn publish(&self, channel: &str, message: OutboundMessage) -> QueueResult<()>;

    /// Wait up to `wait` for the next message; `None` on timeout.
    async fn receive(&self, channel: &str, wait: Duration) -> QueueResult<Option<Delivery>>;

    /// Remove the delivered message for good.
    async fn ack(&self, delivery: &Delivery) -> QueueResult<()>;

    /// Give up on the delivered message. With `requeue` it goes back to the
    /// channel, otherwise it is discarded.
    async fn reject(&self, delivery: &Delivery, requeue: bool) -> QueueResult<()>;

    /// Messages waiting in the channel (not counting unacknowledged deliveries).
    async fn message_count(&self, channel: &str) -> QueueResult<usize>;

    fn is_connected(&self) -> bool;

    /// Drop the connection. Outstanding deliveries return to their channels.
    async fn close(&self) -> QueueResult<()>;

    fn capabilities(&self) -> ChannelCapabilities;
}
