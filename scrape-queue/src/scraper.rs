//! The pluggable "run a scrape and return rows" capability.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use scrape_core::{FieldMap, ScrapeTarget};

use crate::{QueueError, QueueResult, ScrapeError};

/// Fetches rows for one target. Implementations own their configuration
/// (URLs, timeouts, pacing); the worker only calls `scrape`.
#[async_trait]
pub trait ScrapeCapability: Send + Sync {
    async fn scrape(&self) -> Result<Vec<FieldMap>, ScrapeError>;

    fn name(&self) -> &str {
        "scraper"
    }
}

/// Closure-backed capability
pub struct FnScraper<F> {
    name: String,
    f: F,
}

/// Wrap an async closure as a [`ScrapeCapability`].
pub fn scraper_fn<F, Fut>(name: impl Into<String>, f: F) -> FnScraper<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<FieldMap>, ScrapeError>> + Send,
{
    FnScraper {
        name: name.into(),
        f,
    }
}

#[async_trait]
impl<F, Fut> ScrapeCapability for FnScraper<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<FieldMap>, ScrapeError>> + Send,
{
    async fn scrape(&self) -> Result<Vec<FieldMap>, ScrapeError> {
        (self.f)().await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Registry of capabilities by target
#[derive(Clone, Default)]
pub struct ScraperRegistry {
    scrapers: HashMap<ScrapeTarget, Arc<dyn ScrapeCapability>>,
}

impl ScraperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, target: ScrapeTarget, scraper: Arc<dyn ScrapeCapability>) {
        self.scrapers.insert(target, scraper);
    }

    pub fn with(mut self, target: ScrapeTarget, scraper: Arc<dyn ScrapeCapability>) -> Self {
        self.register(target, scraper);
        self
    }

    pub fn get(&self, target: ScrapeTarget) -> QueueResult<Arc<dyn ScrapeCapability>> {
        self.scrapers
            .get(&target)
            .cloned()
            .ok_or(QueueError::ScraperNotRegistered(target))
    }

    /// Registered targets in a stable order.
    pub fn targets(&self) -> Vec<ScrapeTarget> {
        ScrapeTarget::ALL
            .into_iter()
            .filter(|t| self.scrapers.contains_key(t))
            .collect()
    }
}
