use serde::{Deserialize, Serialize};

/// Broker capabilities - explicit feature detection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCapabilities {
    /// Messages survive a broker restart
    pub durable: bool,

    /// Several consumers may compete on one channel
    pub competing_consumers: bool,

    /// Unacknowledged deliveries return to the channel when the connection closes
    pub requeue_on_close: bool,

    /// Rejected messages are routed to a dead-letter channel
    pub dead_letter_queue: bool,
}

impl Default for ChannelCapabilities {
    fn default() -> Self {
        Self {
            durable: true,
            competing_consumers: true,
            requeue_on_close: true,
            dead_letter_queue: false,
        }
    }
}
