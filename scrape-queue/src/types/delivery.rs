use serde::{Deserialize, Serialize};

use super::DeliveryTag;

pub const APPLICATION_JSON: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    Transient,
    /// Written to disk by brokers that distinguish the two
    Persistent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageProperties {
    pub content_type: String,
    pub delivery_mode: DeliveryMode,
}

impl MessageProperties {
    /// Persistent JSON, the only combination the dispatcher publishes
    pub fn persistent_json() -> Self {
        Self {
            content_type: APPLICATION_JSON.to_string(),
            delivery_mode: DeliveryMode::Persistent,
        }
    }
}

impl Default for MessageProperties {
    fn default() -> Self {
        Self::persistent_json()
    }
}

/// A message on its way into a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub body: Vec<u8>,
    pub properties: MessageProperties,
}

impl OutboundMessage {
    pub fn new(body: Vec<u8>, properties: MessageProperties) -> Self {
        Self { body, properties }
    }
}

/// A message handed to a consumer. It stays owned by the broker until
/// acknowledged or rejected through its tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub tag: DeliveryTag,
    pub channel: String,
    pub body: Vec<u8>,
    pub properties: MessageProperties,
    /// Set when the message was handed out before and returned unacknowledged
    pub redelivered: bool,
}
