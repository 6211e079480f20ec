use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Broker-local handle for one delivery, used to ack or reject it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeliveryTag(pub u64);

impl fmt::Display for DeliveryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one consume loop in logs and deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConsumerTag(String);

impl ConsumerTag {
    /// Generate a unique tag scoped to a channel name
    pub fn new(channel: &str) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("{channel}.{}", &suffix[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConsumerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consumer_tags_are_unique_per_loop() {
        let a = ConsumerTag::new("scraper_hockey_queue");
        let b = ConsumerTag::new("scraper_hockey_queue");
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("scraper_hockey_queue."));
    }
}
