use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use scrape_core::{
    Claim, Commit, JobId, JobStatus, RecordBatch, RecordError, ScrapeStore, ScrapeTarget,
    StoreError,
};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::broker::ChannelBroker;
use crate::codec::{EnvelopeCodec, JsonCodec};
use crate::config::QueueConfig;
use crate::consumer::{Consumer, Decision, DeliveryHandler};
use crate::observability::ObservabilityLayer;
use crate::scraper::{ScrapeCapability, ScraperRegistry};
use crate::types::Delivery;
use crate::{QueueError, QueueResult, ScrapeError};

/// Why a claimed part did not commit. The display text becomes the job's
/// `error_message`.
#[derive(Error, Debug)]
enum PartError {
    #[error("scrape failed: {0}")]
    Scrape(#[from] ScrapeError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("could not save results: {0}")]
    Store(#[from] StoreError),
}

/// Runs one target's scrape for every envelope on that target's channel.
///
/// The channel decides the target; the envelope's `type` is informational.
pub struct ScrapeHandler {
    target: ScrapeTarget,
    channel: String,
    store: Arc<dyn ScrapeStore>,
    scraper: Arc<dyn ScrapeCapability>,
    codec: Arc<dyn EnvelopeCodec>,
    observability: ObservabilityLayer,
}

impl ScrapeHandler {
    pub fn target(&self) -> ScrapeTarget {
        self.target
    }

    fn drop_delivery(&self, job_id: Option<JobId>, reason: &str) -> Decision {
        self.observability.record_dropped(job_id, &self.channel, reason);
        Decision::Ack
    }

    async fn run_part(&self, job_id: JobId) -> Result<Commit, PartError> {
        let rows = self.scraper.scrape().await?;
        debug!("Scraper {} returned {} rows for job {}", self.scraper.name(), rows.len(), job_id);

        let batch = RecordBatch::from_fields(self.target, rows)?;
        Ok(self.store.commit_results(job_id, self.target, batch).await?)
    }
}

#[async_trait]
impl DeliveryHandler for ScrapeHandler {
    #[instrument(skip(self, delivery), fields(channel = %delivery.channel, tag = %delivery.tag))]
    async fn handle(&self, delivery: &Delivery) -> Decision {
        let envelope = match self.codec.decode(&delivery.body) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Dropping malformed envelope: {}", e);
                return self.drop_delivery(None, &e.to_string());
            }
        };
        let job_id = envelope.job_id;

        if let Some(named) = envelope.target() {
            if named != self.target {
                debug!("Envelope for job {} names {}, running {}", job_id, named, self.target);
            }
        }

        let claim = match self.store.claim(job_id, self.target).await {
            Ok(claim) => claim,
            Err(e) if e.is_not_found() => {
                warn!("Job {} not found, dropping envelope", job_id);
                return self.drop_delivery(Some(job_id), "job not found");
            }
            Err(e) => {
                error!("Could not claim job {}: {}", job_id, e);
                return Decision::Reject;
            }
        };

        match &claim {
            Claim::Skipped { reason, .. } => {
                warn!("Skipping job {}: {}", job_id, reason);
                return self.drop_delivery(Some(job_id), &reason.to_string());
            }
            Claim::Started(_) => info!("Job {} is running ({})", job_id, self.target),
            Claim::Resumed(_) => info!("Job {} resumed for {}", job_id, self.target),
        }
        self.observability.record_started(job_id, self.target);

        match self.run_part(job_id).await {
            Ok(commit) => {
                let finished = commit.job.status == JobStatus::Completed;
                info!(
                    "Saved {} {} records for job {} (job {})",
                    commit.inserted, self.target, job_id, commit.job.status
                );
                self.observability
                    .record_completed(job_id, self.target, commit.inserted, finished);
                Decision::Ack
            }
            Err(PartError::Store(StoreError::PartAlreadyCommitted { .. })) => {
                warn!("Job {} already has {} results, dropping duplicate", job_id, self.target);
                self.drop_delivery(Some(job_id), "part already committed")
            }
            Err(e) => {
                let message = e.to_string();
                error!("Job {} failed: {}", job_id, message);
                if let Err(mark) = self.store.fail(job_id, message.clone()).await {
                    // Usually a sibling part already failed the job.
                    warn!("Could not mark job {} failed: {}", job_id, mark);
                }
                self.observability.record_failed(job_id, self.target, &message);
                Decision::Reject
            }
        }
    }
}

/// Handle for a started [`Worker`]
pub struct WorkerHandle {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<QueueResult<()>>>,
}

impl WorkerHandle {
    pub fn consumer_count(&self) -> usize {
        self.tasks.len()
    }

    /// Stop every consume loop, letting in-flight deliveries finish.
    pub async fn shutdown(self) -> QueueResult<()> {
        let _ = self.shutdown_tx.send(true);

        let mut first_error = None;
        for joined in join_all(self.tasks).await {
            let outcome = joined
                .map_err(|e| QueueError::Internal(format!("Worker join error: {}", e)))
                .and_then(|result| result);
            if let Err(e) = outcome {
                error!("Consumer ended with error: {}", e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Consumer side of the pipeline: one consume loop per registered target
/// (times `consumers_per_channel`), all sharing one store and broker.
pub struct Worker {
    store: Arc<dyn ScrapeStore>,
    broker: Arc<dyn ChannelBroker>,
    registry: ScraperRegistry,
    codec: Arc<dyn EnvelopeCodec>,
    config: QueueConfig,
    observability: ObservabilityLayer,
}

impl Worker {
    pub fn new(
        store: Arc<dyn ScrapeStore>,
        broker: Arc<dyn ChannelBroker>,
        registry: ScraperRegistry,
        config: QueueConfig,
    ) -> Self {
        Self {
            store,
            broker,
            registry,
            codec: Arc::new(JsonCodec),
            config,
            observability: ObservabilityLayer::new(),
        }
    }

    pub fn with_codec(mut self, codec: Arc<dyn EnvelopeCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_observability(mut self, observability: ObservabilityLayer) -> Self {
        self.observability = observability;
        self
    }

    pub fn observability(&self) -> &ObservabilityLayer {
        &self.observability
    }

    pub fn handler(&self, target: ScrapeTarget) -> QueueResult<ScrapeHandler> {
        Ok(ScrapeHandler {
            target,
            channel: self.config.channels.for_target(target).to_string(),
            store: Arc::clone(&self.store),
            scraper: self.registry.get(target)?,
            codec: Arc::clone(&self.codec),
            observability: self.observability.clone(),
        })
    }

    /// Spawn the consume loops. Must be called inside a tokio runtime.
    pub fn start(&self) -> QueueResult<WorkerHandle> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();

        for target in self.registry.targets() {
            let handler: Arc<dyn DeliveryHandler> = Arc::new(self.handler(target)?);
            let channel = self.config.channels.for_target(target);

            for _ in 0..self.config.consumers_per_channel.max(1) {
                let broker = Arc::clone(&self.broker);
                let consumer = Consumer::new(broker, channel, Arc::clone(&handler))
                    .with_poll_interval(self.config.poll_interval)
                    .with_error_backoff(self.config.error_backoff);
                tasks.push(tokio::spawn(consumer.run(shutdown_rx.clone())));
            }
        }

        info!("Started worker with {} consumer(s)", tasks.len());
        Ok(WorkerHandle { shutdown_tx, tasks })
    }

    /// Receive and fully process at most one delivery from `target`'s channel.
    pub async fn run_once(
        &self,
        target: ScrapeTarget,
        wait: Duration,
    ) -> QueueResult<Option<Decision>> {
        let handler = self.handler(target)?;
        let channel = self.config.channels.for_target(target);
        self.broker.declare(channel).await?;

        let Some(delivery) = self.broker.receive(channel, wait).await? else {
            return Ok(None);
        };
        let decision = handler.handle(&delivery).await;
        decision.settle(self.broker.as_ref(), &delivery).await?;
        Ok(Some(decision))
    }
}
