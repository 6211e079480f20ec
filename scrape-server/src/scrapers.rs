use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scrape_core::{FieldMap, ScrapeTarget};
use scrape_queue::{ScrapeCapability, ScrapeError, ScraperRegistry};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ScraperSettings;

/// Pages through a JSON feed: `GET {url}?page=1`, `?page=2`, ... where every
/// page is an array of row objects. An empty page ends the feed.
pub struct HttpFeedScraper {
    name: String,
    client: Client,
    url: String,
    delay: Duration,
    max_pages: Option<usize>,
}

impl HttpFeedScraper {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        settings: &ScraperSettings,
    ) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(settings.timeout)
            .build()
            .map_err(|e| ScrapeError::config(format!("could not build HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            client,
            url: url.into(),
            delay: settings.delay,
            max_pages: settings.max_pages,
        })
    }

    async fn fetch_page(&self, page: usize) -> Result<Vec<FieldMap>, ScrapeError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("page", page)])
            .send()
            .await
            .map_err(|e| ScrapeError::fetch(format!("{} page {page}: {e}", self.url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::fetch(format!("{} page {page} returned {status}", self.url)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ScrapeError::parse(format!("page {page} is not JSON: {e}")))?;

        let Value::Array(items) = body else {
            return Err(ScrapeError::parse(format!("page {page} is not a JSON array")));
        };

        items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(fields) => Ok(fields),
                _ => Err(ScrapeError::parse(format!("page {page} item {i} is not an object"))),
            })
            .collect()
    }
}

#[async_trait]
impl ScrapeCapability for HttpFeedScraper {
    async fn scrape(&self) -> Result<Vec<FieldMap>, ScrapeError> {
        let mut rows = Vec::new();
        let mut page = 1;

        loop {
            let batch = self.fetch_page(page).await?;
            if batch.is_empty() {
                break;
            }
            debug!("{}: page {} had {} rows", self.name, page, batch.len());
            rows.extend(batch);

            if self.max_pages.is_some_and(|max| page >= max) {
                break;
            }
            page += 1;
            tokio::time::sleep(self.delay).await;
        }

        info!("{}: scraped {} rows", self.name, rows.len());
        Ok(rows)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Stands in for a target whose feed URL is not set, so its jobs fail with a
/// reason instead of waiting on a channel nobody consumes.
pub struct UnconfiguredFeed {
    name: String,
    key: &'static str,
}

#[async_trait]
impl ScrapeCapability for UnconfiguredFeed {
    async fn scrape(&self) -> Result<Vec<FieldMap>, ScrapeError> {
        Err(ScrapeError::config(format!("{} is not set", self.key)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A scraper for every target: the HTTP feed when its URL is configured,
/// otherwise one that always fails.
pub fn registry(settings: &ScraperSettings) -> Result<ScraperRegistry, ScrapeError> {
    let mut registry = ScraperRegistry::new();
    let feeds = [
        (ScrapeTarget::Hockey, "scraper.hockey_url", settings.hockey_url.as_deref()),
        (ScrapeTarget::Oscar, "scraper.oscar_url", settings.oscar_url.as_deref()),
    ];

    for (target, key, url) in feeds {
        let scraper: Arc<dyn ScrapeCapability> = match url {
            Some(url) => Arc::new(HttpFeedScraper::new(format!("{target}-feed"), url, settings)?),
            None => {
                warn!("{} is not set; {} jobs will fail", key, target);
                Arc::new(UnconfiguredFeed {
                    name: format!("{target}-unconfigured"),
                    key,
                })
            }
        };
        registry.register(target, scraper);
    }
    Ok(registry)
}
