use std::sync::Arc;

use scrape_core::{Job, JobKind, JobStatus, JobStore, ScrapeTarget};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::broker::ChannelBroker;
use crate::codec::{EnvelopeCodec, JsonCodec};
use crate::config::ChannelNames;
use crate::observability::ObservabilityLayer;
use crate::types::{Envelope, MessageProperties, OutboundMessage};
use crate::{DispatchError, QueueResult};

/// What the caller of [`Dispatcher::dispatch`] gets back on success.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchReceipt {
    pub job_id: scrape_core::JobId,
    pub message: String,
    pub status: JobStatus,
}

impl DispatchReceipt {
    fn accepted(job: &Job) -> Self {
        let message = if job.kind.is_composite() {
            "All scraping jobs started".to_string()
        } else {
            format!("{} scraping job started", capitalize(job.kind.as_str()))
        };
        Self {
            job_id: job.id,
            message,
            status: job.status,
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// API-side half of the pipeline: creates jobs and publishes their envelopes.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn JobStore>,
    broker: Arc<dyn ChannelBroker>,
    codec: Arc<dyn EnvelopeCodec>,
    channels: ChannelNames,
    observability: ObservabilityLayer,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn JobStore>,
        broker: Arc<dyn ChannelBroker>,
        channels: ChannelNames,
    ) -> Self {
        Self {
            store,
            broker,
            codec: Arc::new(JsonCodec),
            channels,
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

    pub fn channels(&self) -> &ChannelNames {
        &self.channels
    }

    pub fn broker(&self) -> &Arc<dyn ChannelBroker> {
        &self.broker
    }

    pub fn observability(&self) -> &ObservabilityLayer {
        &self.observability
    }

    /// Declare every target channel up front. Publishing declares too, so
    /// this only matters for consumers that start before the first job.
    pub async fn declare_channels(&self) -> QueueResult<()> {
        for target in ScrapeTarget::ALL {
            self.broker.declare(self.channels.for_target(target)).await?;
        }
        Ok(())
    }

    /// Create a pending job and publish one envelope per target.
    ///
    /// A failed publish marks the job failed and is returned as an error.
    /// For a composite job, envelopes published before the failure stay in
    /// their channels.
    #[instrument(skip(self))]
    pub async fn dispatch(&self, kind: JobKind) -> Result<DispatchReceipt, DispatchError> {
        let job = self.store.create(kind).await?;
        info!("Created job {} ({})", job.id, kind);

        for &target in kind.targets() {
            let channel = self.channels.for_target(target);
            if let Err(source) = self.publish(&job, target, channel).await {
                return Err(self.abandon(job, channel, source).await);
            }
        }

        self.observability.record_dispatched(job.id, kind);
        info!("Dispatched job {} to {} channel(s)", job.id, kind.targets().len());
        Ok(DispatchReceipt::accepted(&job))
    }

    async fn publish(&self, job: &Job, target: ScrapeTarget, channel: &str) -> QueueResult<()> {
        let body = self.codec.encode(&Envelope::new(job.id, target))?;
        let properties = MessageProperties {
            content_type: self.codec.content_type().to_string(),
            ..MessageProperties::persistent_json()
        };

        self.broker.declare(channel).await?;
        self.broker.publish(channel, OutboundMessage::new(body, properties)).await
    }

    async fn abandon(&self, job: Job, channel: &str, source: crate::QueueError) -> DispatchError {
        error!("Failed to publish job {} to {}: {}", job.id, channel, source);
        self.observability
            .record_dispatch_failed(job.id, channel, &source.to_string());

        let job = match self
            .store
            .fail(job.id, format!("failed to publish message: {source}"))
            .await
        {
            Ok(failed) => failed,
            Err(e) => {
                warn!("Could not mark job {} failed: {}", job.id, e);
                job
            }
        };

        DispatchError::Publish {
            job,
            channel: channel.to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_messages() {
        let job = Job::new(1.into(), JobKind::Hockey);
        assert_eq!(DispatchReceipt::accepted(&job).message, "Hockey scraping job started");

        let job = Job::new(2.into(), JobKind::All);
        let receipt = DispatchReceipt::accepted(&job);
        assert_eq!(receipt.message, "All scraping jobs started");
        assert_eq!(receipt.status, JobStatus::Pending);
    }
}
