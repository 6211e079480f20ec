use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use scrape_core::{ConfigError, ConfigSnapshot, ConfigStore};
use scrape_queue::observability::LogFormat;
use scrape_queue::{ChannelNames, QueueConfig};

/// Environment prefix: `SCRAPER__HTTP__PORT=9000` sets `http.port`.
pub const ENV_PREFIX: &str = "SCRAPER";

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Which halves of the pipeline this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// HTTP API and workers in one process
    All,
    Api,
    Worker,
}

impl Role {
    pub fn runs_api(&self) -> bool {
        matches!(self, Role::All | Role::Api)
    }

    pub fn runs_worker(&self) -> bool {
        matches!(self, Role::All | Role::Worker)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Role::All),
            "api" => Ok(Role::Api),
            "worker" => Ok(Role::Worker),
            other => Err(format!("unknown role `{other}`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScraperSettings {
    pub hockey_url: Option<String>,
    pub oscar_url: Option<String>,
    pub user_agent: String,
    pub timeout: Duration,
    /// Pause between page requests
    pub delay: Duration,
    /// `None` keeps paging until an empty page
    pub max_pages: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub role: Role,
    /// `memory`, or a `redis://` URL when built with the `redis` feature
    pub broker_url: String,
    /// Key prefix for channels on a shared Redis
    pub broker_prefix: String,
    /// `memory`, or a `postgres://` URL when built with the `postgres` feature
    pub store_url: String,
    pub queue: QueueConfig,
    pub scraper: ScraperSettings,
    pub log_format: LogFormat,
}

impl Settings {
    /// `.env` has already been loaded into the process environment by the caller.
    pub fn from_env() -> Result<Self> {
        let mut store = ConfigStore::new();
        store.load_env(ENV_PREFIX);
        Ok(Self::from_snapshot(&store.snapshot())?)
    }

    pub fn from_snapshot(config: &ConfigSnapshot) -> Result<Self, ConfigError> {
        let defaults = QueueConfig::default();
        let queue = QueueConfig {
            channels: ChannelNames {
                hockey: config.get_or("queue.hockey", &defaults.channels.hockey),
                oscar: config.get_or("queue.oscar", &defaults.channels.oscar),
            },
            consumers_per_channel: config
                .get_usize("worker.consumers")?
                .unwrap_or(defaults.consumers_per_channel),
            poll_interval: config
                .get_u64("worker.poll_interval_ms")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            error_backoff: config
                .get_u64("worker.error_backoff_ms")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.error_backoff),
        };

        let scraper = ScraperSettings {
            hockey_url: config.get_string("scraper.hockey_url"),
            oscar_url: config.get_string("scraper.oscar_url"),
            user_agent: config.get_or("scraper.user_agent", DEFAULT_USER_AGENT),
            timeout: Duration::from_secs(config.get_u64("scraper.timeout_secs")?.unwrap_or(30)),
            delay: Duration::from_millis(config.get_u64("scraper.delay_ms")?.unwrap_or(1000)),
            max_pages: config.get_usize("scraper.max_pages")?,
        };

        let settings = Self {
            host: config.get_or("http.host", "127.0.0.1"),
            port: config.get_u16("http.port")?.unwrap_or(8000),
            role: config.get_parsed("server.role")?.unwrap_or(Role::All),
            broker_url: config.get_or("broker.url", "memory"),
            broker_prefix: config.get_or("broker.prefix", "scraper"),
            store_url: config.get_or("store.url", "memory"),
            queue,
            scraper,
            log_format: config.get_parsed("log.format")?.unwrap_or_default(),
        };
        settings.check_store()?;
        Ok(settings)
    }

    /// The in-memory store is private to one process, so it only works when
    /// that process is also the only producer and consumer of its jobs.
    fn check_store(&self) -> Result<(), ConfigError> {
        let shared = self.role != Role::All || self.broker_url != "memory";
        if self.store_url == "memory" && shared {
            return Err(ConfigError::Invalid {
                key: "store.url".to_string(),
                value: self.store_url.clone(),
            });
        }
        Ok(())
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
