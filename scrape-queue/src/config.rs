use std::time::Duration;

use scrape_core::ScrapeTarget;

/// Channel name per scrape target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelNames {
    pub hockey: String,
    pub oscar: String,
}

impl ChannelNames {
    pub fn for_target(&self, target: ScrapeTarget) -> &str {
        match target {
            ScrapeTarget::Hockey => &self.hockey,
            ScrapeTarget::Oscar => &self.oscar,
        }
    }

    pub fn target_of(&self, channel: &str) -> Option<ScrapeTarget> {
        ScrapeTarget::ALL
            .into_iter()
            .find(|target| self.for_target(*target) == channel)
    }
}

impl Default for ChannelNames {
    fn default() -> Self {
        Self {
            hockey: "scraper_hockey_queue".to_string(),
            oscar: "scraper_oscar_queue".to_string(),
        }
    }
}

/// Configuration shared by the dispatcher and workers
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub channels: ChannelNames,
    /// Competing consume loops started per channel by one worker
    pub consumers_per_channel: usize,
    /// How long one receive call waits before re-checking for shutdown
    pub poll_interval: Duration,
    /// Pause after a broker error before receiving again
    pub error_backoff: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            channels: ChannelNames::default(),
            consumers_per_channel: 1,
            poll_interval: Duration::from_secs(1),
            error_backoff: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_channel_names() {
        let names = ChannelNames::default();
        assert_eq!(names.for_target(ScrapeTarget::Hockey), "scraper_hockey_queue");
        assert_eq!(names.target_of("scraper_oscar_queue"), Some(ScrapeTarget::Oscar));
        assert_eq!(names.target_of("unknown"), None);
    }
}
