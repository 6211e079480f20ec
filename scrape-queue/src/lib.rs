//! # scrape-queue: dispatching scrape jobs through channels
//!
//! The API side hands a [`JobKind`](scrape_core::JobKind) to the
//! [`Dispatcher`], which creates the job and publishes one envelope per
//! target. [`Worker`]s consume those envelopes, run the registered
//! [`ScrapeCapability`] and commit the rows together with the job's status.
//!
//! Delivery is at-least-once: an envelope leaves its channel only when the
//! worker acknowledges or rejects it, and rejected envelopes are dropped
//! rather than requeued.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use scrape_core::{JobKind, MemoryStore, ScrapeTarget};
//! use scrape_queue::prelude::*;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! let broker = Arc::new(MemoryBroker::new());
//! let config = QueueConfig::default();
//!
//! let dispatcher = Dispatcher::new(store.clone(), broker.clone(), config.channels.clone());
//! let receipt = dispatcher.dispatch(JobKind::Hockey).await?;
//!
//! let registry = ScraperRegistry::new().with(
//!     ScrapeTarget::Hockey,
//!     Arc::new(scraper_fn("fixture", || async { Ok::<_, ScrapeError>(Vec::new()) })),
//! );
//! let worker = Worker::new(store, broker, registry, config);
//! let handle = worker.start()?;
//! # let _ = receipt;
//! handle.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod broker;
pub mod codec;
pub mod config;
pub mod consumer;
pub mod dispatcher;
pub mod error;
pub mod observability;
pub mod scraper;
pub mod types;
pub mod worker;

pub use broker::{ChannelBroker, MemoryBroker};
pub use codec::{EnvelopeCodec, JsonCodec};
pub use config::{ChannelNames, QueueConfig};
pub use consumer::{Consumer, Decision, DeliveryHandler};
pub use dispatcher::{DispatchReceipt, Dispatcher};
pub use error::{DispatchError, QueueError, QueueResult, ScrapeError};
pub use observability::{LiveMetrics, MetricsSnapshot, ObservabilityLayer};
pub use scraper::{scraper_fn, FnScraper, ScrapeCapability, ScraperRegistry};
pub use types::{
    ChannelCapabilities, ConsumerTag, Delivery, DeliveryMode, DeliveryTag, Envelope, JobEvent,
    MessageProperties, OutboundMessage,
};
pub use worker::{ScrapeHandler, Worker, WorkerHandle};

#[cfg(feature = "redis")]
pub use broker::RedisBroker;

pub mod prelude {
    pub use crate::{
        scraper_fn, ChannelBroker, ChannelNames, Decision, Dispatcher, DispatchError,
        MemoryBroker, ObservabilityLayer, QueueConfig, QueueError, QueueResult, ScrapeCapability,
        ScrapeError, ScraperRegistry, Worker, WorkerHandle,
    };

    pub use async_trait::async_trait;
}
