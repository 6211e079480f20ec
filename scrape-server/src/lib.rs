//! Wiring for the scrape job service: settings, broker selection, the HTTP
//! feed scrapers, and the API and worker built on top of them.

pub mod config;
pub mod scrapers;

use std::sync::Arc;

use anyhow::{bail, Result};
use scrape_axum::{AppState, ScrapeApp};
use scrape_core::{MemoryStore, ScrapeStore};
use scrape_queue::{ChannelBroker, Dispatcher, MemoryBroker, ObservabilityLayer, Worker};
use tracing::info;

pub use config::{Role, Settings};

/// Everything one process needs; `main` decides which halves to run.
pub struct Services {
    pub app: ScrapeApp,
    pub worker: Worker,
    pub broker: Arc<dyn ChannelBroker>,
    pub observability: ObservabilityLayer,
}

/// `memory` gives an in-process broker; `redis://` URLs need the `redis` feature.
pub async fn connect_broker(url: &str, prefix: &str) -> Result<Arc<dyn ChannelBroker>> {
    if url == "memory" {
        return Ok(Arc::new(MemoryBroker::new()));
    }

    if url.starts_with("redis://") || url.starts_with("rediss://") {
        return connect_redis(url, prefix).await;
    }

    bail!("unsupported broker url `{url}`")
}

#[cfg(feature = "redis")]
async fn connect_redis(url: &str, prefix: &str) -> Result<Arc<dyn ChannelBroker>> {
    let broker = scrape_queue::RedisBroker::connect(url, prefix).await?;
    Ok(Arc::new(broker))
}

#[cfg(not(feature = "redis"))]
async fn connect_redis(url: &str, _prefix: &str) -> Result<Arc<dyn ChannelBroker>> {
    bail!("broker url `{url}` needs the `redis` feature")
}

#[cfg(feature = "postgres")]
async fn build_postgres(settings: &Settings) -> Result<Services> {
    let store = scrape_core::PgStore::connect(&settings.store_url).await?;
    wire(settings, Arc::new(store)).await
}

#[cfg(not(feature = "postgres"))]
async fn build_postgres(settings: &Settings) -> Result<Services> {
    bail!("store url `{}` needs the `postgres` feature", settings.store_url)
}

/// `memory` keeps jobs in this process; `postgres://` URLs need the
/// `postgres` feature and are shared by every process using the database.
pub async fn build(settings: &Settings) -> Result<Services> {
    let url = settings.store_url.as_str();
    if url == "memory" {
        return wire(settings, Arc::new(MemoryStore::new())).await;
    }

    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        info!("Using postgres store");
        return build_postgres(settings).await;
    }

    bail!("unsupported store url `{url}`")
}

async fn wire<S: ScrapeStore + 'static>(settings: &Settings, store: Arc<S>) -> Result<Services> {
    let broker = connect_broker(&settings.broker_url, &settings.broker_prefix).await?;
    let observability = ObservabilityLayer::new();

    let dispatcher = Dispatcher::new(store.clone(), broker.clone(), settings.queue.channels.clone())
        .with_observability(observability.clone());
    dispatcher.declare_channels().await?;

    let registry = scrapers::registry(&settings.scraper)?;
    let worker = Worker::new(store.clone(), broker.clone(), registry, settings.queue.clone())
        .with_observability(observability.clone());

    info!("Using {} broker", if settings.broker_url == "memory" { "in-memory" } else { "redis" });

    Ok(Services {
        app: ScrapeApp::new(AppState::new(dispatcher, store)),
        worker,
        broker,
        observability,
    })
}
